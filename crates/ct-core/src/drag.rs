//! Drag-and-drop of links between blocks.
//!
//! The source is recorded when a drag starts and consumed exactly once by the
//! drop. Whatever the drop does, the session is empty afterwards.

use crate::mutation::Mutation;

/// The link being dragged and the block it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragSource {
    pub block_id: String,
    pub link_id: String,
}

#[derive(Debug, Default)]
pub struct DragSession {
    source: Option<DragSource>,
}

impl DragSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a drag. A stale source from an abandoned drag is replaced.
    pub fn start(&mut self, source: DragSource) {
        self.source = Some(source);
    }

    pub fn is_active(&self) -> bool {
        self.source.is_some()
    }

    /// Reads and clears the source.
    pub fn take(&mut self) -> Option<DragSource> {
        self.source.take()
    }

    /// Ends the drag on `to_block` at `index`, yielding the move to apply.
    /// `None` when no drag was in progress.
    pub fn drop_onto(&mut self, to_block: impl Into<String>, index: usize) -> Option<Mutation> {
        self.take().map(|source| Mutation::MoveLink {
            from_block: source.block_id,
            link_id: source.link_id,
            to_block: to_block.into(),
            index,
        })
    }
}
