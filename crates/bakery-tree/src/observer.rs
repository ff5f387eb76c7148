//! Change-notification boundary for the selection engine.

use bakery_core::SelectedState;
use bakery_loader::NodeId;

/// Receives one callback per node whose selection state actually changed.
///
/// The engine itself is headless; a display layer implements this trait to
/// refresh checkboxes, and tests implement it to record transition orders.
/// Callbacks arrive while the propagation pass runs, on the caller's
/// thread - implementations must not call back into the engine.
pub trait SelectionObserver {
    /// A node's state changed to `state`.
    fn selection_changed(&mut self, node: NodeId, state: SelectedState);
}

/// Observer that ignores every notification.
///
/// The default boundary for headless use (CLI batch operations, tests that
/// only inspect final states).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl SelectionObserver for NullObserver {
    fn selection_changed(&mut self, _node: NodeId, _state: SelectedState) {}
}

impl SelectionObserver for Vec<(NodeId, SelectedState)> {
    /// Recording observer: collects `(node, state)` pairs in change order.
    fn selection_changed(&mut self, node: NodeId, state: SelectedState) {
        self.push((node, state));
    }
}
