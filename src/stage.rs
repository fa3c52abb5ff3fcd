//! Stage tree model and the live progress surface it drives.
//!
//! An invoked agent reports nested progress as numbered stages. Each index
//! gets one [`StageHandle`] the first time it is seen; the handle streams
//! content and attachments until it is closed, and a closed handle never
//! reopens. Every transition is mirrored to a [`ProgressSurface`] as it
//! happens.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::message::{Attachment, StageStatus, StageUpdate};

/// A change visible on the caller's live progress surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Text appended to the invocation's own output.
    Content { text: String },
    /// Attachment added to the caller's result.
    Attachment { attachment: Attachment },
    /// A stage was opened.
    StageOpened { index: i64, name: String },
    /// Text appended to a stage.
    StageContent { index: i64, text: String },
    /// Attachment added to a stage.
    StageAttachment { index: i64, attachment: Attachment },
    /// A stage was closed.
    StageClosed { index: i64 },
}

/// Receiver of live progress for one invocation.
pub trait ProgressSurface: Send {
    /// Publish one event.
    fn emit(&mut self, event: ProgressEvent);
}

impl<F> ProgressSurface for F
where
    F: FnMut(ProgressEvent) + Send,
{
    fn emit(&mut self, event: ProgressEvent) {
        self(event)
    }
}

/// Surface that keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    events: Vec<ProgressEvent>,
}

impl RecordingSurface {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Events in the order they were emitted.
    pub fn events(&self) -> &[ProgressEvent] {
        &self.events
    }

    /// Concatenation of all top-level text appends.
    pub fn content(&self) -> String {
        self.events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Content { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl ProgressSurface for RecordingSurface {
    fn emit(&mut self, event: ProgressEvent) {
        self.events.push(event);
    }
}

/// Lifecycle phase of a stage handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StagePhase {
    /// Opened, nothing appended yet.
    Created,
    /// At least one append happened.
    Streaming,
    /// Terminal.
    Closed,
}

/// Live progress section for one stage index.
#[derive(Debug, Clone, PartialEq)]
pub struct StageHandle {
    index: i64,
    name: String,
    phase: StagePhase,
    content: String,
    attachments: Vec<Attachment>,
}

impl StageHandle {
    fn open(index: i64, name: String, surface: &mut dyn ProgressSurface) -> Self {
        debug!(index, name = %name, "stage opened");
        surface.emit(ProgressEvent::StageOpened {
            index,
            name: name.clone(),
        });
        Self {
            index,
            name,
            phase: StagePhase::Created,
            content: String::new(),
            attachments: Vec::new(),
        }
    }

    /// Stage index.
    pub fn index(&self) -> i64 {
        self.index
    }

    /// Name given when the stage was opened.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current phase.
    pub fn phase(&self) -> StagePhase {
        self.phase
    }

    /// Whether the handle reached its terminal phase.
    pub fn is_closed(&self) -> bool {
        self.phase == StagePhase::Closed
    }

    /// Content appended so far.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Attachments added so far.
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    fn append_content(&mut self, text: &str, surface: &mut dyn ProgressSurface) {
        self.content.push_str(text);
        self.phase = StagePhase::Streaming;
        surface.emit(ProgressEvent::StageContent {
            index: self.index,
            text: text.to_string(),
        });
    }

    fn add_attachment(&mut self, attachment: &Attachment, surface: &mut dyn ProgressSurface) {
        self.attachments.push(attachment.clone());
        self.phase = StagePhase::Streaming;
        surface.emit(ProgressEvent::StageAttachment {
            index: self.index,
            attachment: attachment.clone(),
        });
    }

    /// Close the handle. Returns `false` if it was already closed.
    fn close(&mut self, surface: &mut dyn ProgressSurface) -> bool {
        if self.is_closed() {
            return false;
        }
        self.phase = StagePhase::Closed;
        debug!(index = self.index, "stage closed");
        surface.emit(ProgressEvent::StageClosed { index: self.index });
        true
    }
}

/// Stage handles of one invocation, addressed by stage index.
#[derive(Debug, Default)]
pub struct StageArena {
    handles: Vec<StageHandle>,
    slots: HashMap<i64, usize>,
}

impl StageArena {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one stage update from the stream.
    ///
    /// Unknown indexes open a new handle. Updates for an index whose handle is
    /// already closed are ignored.
    pub fn apply(&mut self, update: &StageUpdate, surface: &mut dyn ProgressSurface) {
        let slot = match self.slots.get(&update.index) {
            Some(&slot) => slot,
            None => {
                let handle = StageHandle::open(update.index, update.name.clone(), surface);
                self.handles.push(handle);
                let slot = self.handles.len() - 1;
                self.slots.insert(update.index, slot);
                slot
            }
        };
        let handle = &mut self.handles[slot];

        if handle.is_closed() {
            if update.content.is_some() || update.attachments.is_some() {
                warn!(index = update.index, "ignoring update for closed stage");
            }
            return;
        }

        if let Some(text) = update.content.as_deref().filter(|t| !t.is_empty()) {
            handle.append_content(text, surface);
        }
        for attachment in update.attachments.iter().flatten() {
            handle.add_attachment(attachment, surface);
        }
        if update.status == Some(StageStatus::Completed) {
            handle.close(surface);
        }
    }

    /// Close every open handle in creation order. Returns how many were open.
    pub fn close_all(&mut self, surface: &mut dyn ProgressSurface) -> usize {
        let mut closed = 0;
        for handle in &mut self.handles {
            if handle.close(surface) {
                closed += 1;
            }
        }
        closed
    }

    /// Look up the handle for an index.
    pub fn get(&self, index: i64) -> Option<&StageHandle> {
        self.slots.get(&index).map(|&slot| &self.handles[slot])
    }

    /// Number of handles created.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether no stage was ever opened.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Number of handles not yet closed.
    pub fn open_count(&self) -> usize {
        self.handles.iter().filter(|h| !h.is_closed()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(index: i64, name: &str, content: Option<&str>, status: Option<StageStatus>) -> StageUpdate {
        StageUpdate {
            index,
            name: name.into(),
            content: content.map(String::from),
            attachments: None,
            status,
        }
    }

    #[test]
    fn test_stage_lifecycle() {
        let mut surface = RecordingSurface::new();
        let mut arena = StageArena::new();

        arena.apply(&update(0, "search", None, None), &mut surface);
        assert_eq!(arena.get(0).unwrap().phase(), StagePhase::Created);

        arena.apply(&update(0, "", Some("q1"), Some(StageStatus::InProgress)), &mut surface);
        assert_eq!(arena.get(0).unwrap().phase(), StagePhase::Streaming);
        assert_eq!(arena.get(0).unwrap().name(), "search");

        arena.apply(&update(0, "", None, Some(StageStatus::Completed)), &mut surface);
        assert!(arena.get(0).unwrap().is_closed());

        assert_eq!(
            surface.events(),
            &[
                ProgressEvent::StageOpened { index: 0, name: "search".into() },
                ProgressEvent::StageContent { index: 0, text: "q1".into() },
                ProgressEvent::StageClosed { index: 0 },
            ]
        );
    }

    #[test]
    fn test_stage_attachments_stream_to_the_stage() {
        let mut surface = RecordingSurface::new();
        let mut arena = StageArena::new();
        let attachment = Attachment::link("report", "files/report.pdf");

        arena.apply(&update(0, "fetch", None, None), &mut surface);
        arena.apply(
            &StageUpdate {
                attachments: Some(vec![attachment.clone()]),
                ..update(0, "", None, None)
            },
            &mut surface,
        );

        let handle = arena.get(0).unwrap();
        assert_eq!(handle.phase(), StagePhase::Streaming);
        assert_eq!(handle.attachments(), &[attachment.clone()]);
        assert_eq!(
            surface.events(),
            &[
                ProgressEvent::StageOpened { index: 0, name: "fetch".into() },
                ProgressEvent::StageAttachment { index: 0, attachment },
            ]
        );
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut surface = RecordingSurface::new();
        let mut arena = StageArena::new();

        arena.apply(&update(3, "read", None, Some(StageStatus::Completed)), &mut surface);
        arena.apply(&update(3, "read", None, Some(StageStatus::Completed)), &mut surface);
        assert_eq!(arena.close_all(&mut surface), 0);

        let closes = surface
            .events()
            .iter()
            .filter(|e| matches!(e, ProgressEvent::StageClosed { .. }))
            .count();
        assert_eq!(closes, 1);
    }

    #[test]
    fn test_updates_after_close_are_ignored() {
        let mut surface = RecordingSurface::new();
        let mut arena = StageArena::new();

        arena.apply(&update(1, "calc", Some("a"), Some(StageStatus::Completed)), &mut surface);
        let before = surface.events().len();
        arena.apply(&update(1, "calc-again", Some("b"), None), &mut surface);

        assert_eq!(surface.events().len(), before);
        assert_eq!(arena.len(), 1);
        assert_eq!(arena.get(1).unwrap().content(), "a");
        assert!(arena.get(1).unwrap().is_closed());
    }

    #[test]
    fn test_close_all_in_creation_order() {
        let mut surface = RecordingSurface::new();
        let mut arena = StageArena::new();

        arena.apply(&update(5, "b", None, None), &mut surface);
        arena.apply(&update(2, "a", None, None), &mut surface);
        arena.apply(&update(9, "c", None, Some(StageStatus::Completed)), &mut surface);
        assert_eq!(arena.open_count(), 2);

        assert_eq!(arena.close_all(&mut surface), 2);
        assert_eq!(arena.open_count(), 0);

        let tail: Vec<_> = surface.events().iter().rev().take(2).rev().cloned().collect();
        assert_eq!(
            tail,
            vec![
                ProgressEvent::StageClosed { index: 5 },
                ProgressEvent::StageClosed { index: 2 },
            ]
        );
    }

    #[test]
    fn test_closure_is_a_surface() {
        let mut seen = Vec::new();
        {
            let mut surface = |event: ProgressEvent| seen.push(event);
            let mut arena = StageArena::new();
            arena.apply(&update(0, "s", None, None), &mut surface);
        }
        assert_eq!(seen.len(), 1);
    }
}
