//! Selection of prior conversation turns to replay to an invoked agent.

use serde_json::Value;

use crate::arguments::InvocationRequest;
use crate::message::{CustomContent, Message, Role};

/// Build the message list sent to `agent`.
///
/// With history propagation on, every assistant turn whose state is keyed by
/// `agent` is replayed, preceded by the user turn directly before it (text
/// only), with its state narrowed to the agent's own slice. The list always
/// ends with a fresh user message holding the prompt; it carries the custom
/// content of the most recent user turn that has any, so attachments reach
/// the agent even when the prompt does not mention them.
pub fn reconstruct_history(
    messages: &[Message],
    agent: &str,
    request: &InvocationRequest,
) -> Vec<Message> {
    let mut history = Vec::new();

    if request.propagate_history {
        for (i, message) in messages.iter().enumerate() {
            if message.role != Role::Assistant {
                continue;
            }
            let Some(slice) = message.state_for(agent) else {
                continue;
            };

            let previous = i.checked_sub(1).and_then(|p| messages.get(p));
            if let Some(user) = previous.filter(|m| m.role == Role::User) {
                history.push(Message::user(user.text()));
            }
            history.push(narrowed(message, slice));
        }
    }

    let prompt = Message::user(request.prompt.clone());
    let prompt = match latest_user_custom_content(messages) {
        Some(custom_content) => prompt.with_custom_content(custom_content.clone()),
        None => prompt,
    };
    history.push(prompt);

    history
}

/// Copy of `message` whose state is replaced by `slice`.
fn narrowed(message: &Message, slice: &Value) -> Message {
    let custom_content = message.custom_content.as_ref().map(|cc| CustomContent {
        state: Some(slice.clone()).filter(|s| !s.is_null()),
        attachments: cc.attachments.clone(),
        stages: cc.stages.clone(),
    });
    Message {
        custom_content,
        ..message.clone()
    }
}

fn latest_user_custom_content(messages: &[Message]) -> Option<&CustomContent> {
    messages
        .iter()
        .rev()
        .filter(|m| m.role == Role::User)
        .find_map(|m| m.custom_content.as_ref())
}
