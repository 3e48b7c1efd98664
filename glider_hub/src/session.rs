//! Per-client selection state over a shared synthesizer.

use std::sync::Arc;

use tracing::debug;

use crate::selection::{Selection, SelectionRequest};
use crate::views::{ViewSynthesizer, ViewUpdate};
use crate::HubError;

/// One client's current selection. Sessions never share selection state;
/// the synthesizer behind them is shared and read-only.
pub struct Session {
    synth: Arc<ViewSynthesizer>,
    current: Option<Selection>,
}

impl Session {
    pub fn new(synth: Arc<ViewSynthesizer>) -> Self {
        Self {
            synth,
            current: None,
        }
    }

    pub fn current(&self) -> Option<&Selection> {
        self.current.as_ref()
    }

    /// Initial render: every group for the catalog default selection.
    pub fn open(&mut self) -> ViewUpdate {
        let initial = Selection::initial(self.synth.catalog());
        self.select(initial)
    }

    /// Move to `next`, regenerating only the groups the change invalidates.
    pub fn select(&mut self, next: Selection) -> ViewUpdate {
        let update = self.synth.update(self.current.as_ref(), &next);
        debug!(
            "session now at {} / {} ({} groups regenerated)",
            next.deployment,
            next.parameter,
            update.views.len()
        );
        self.current = Some(next);
        update
    }

    /// Resolve a wire request against the current selection and apply it.
    /// A rejected request leaves the current selection unchanged.
    pub fn apply(&mut self, request: &SelectionRequest) -> Result<ViewUpdate, HubError> {
        let next = request.resolve(self.current.as_ref(), self.synth.catalog())?;
        Ok(self.select(next))
    }
}
