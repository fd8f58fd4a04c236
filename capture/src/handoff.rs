//! Single-slot plan exchange between the plan generator and the orchestrator.
//!
//! Written at most once, read at most once. Both guarantees are enforced by
//! ownership: [`PlanPublisher::publish`] and [`PlanSlot::take`] consume `self`.

use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

use crate::core::types::Plan;

/// Create a connected publisher/slot pair.
pub fn plan_handoff() -> (PlanPublisher, PlanSlot) {
    let (tx, rx) = oneshot::channel();
    (PlanPublisher { tx }, PlanSlot { rx })
}

/// Write side, owned by the plan generator task.
#[derive(Debug)]
pub struct PlanPublisher {
    tx: oneshot::Sender<Plan>,
}

impl PlanPublisher {
    /// Publish the plan. Returns `false` when the reader already took the slot
    /// (the plan arrived too late and is discarded).
    pub fn publish(self, plan: Plan) -> bool {
        self.tx.send(plan).is_ok()
    }
}

/// Read side, owned by the orchestrator.
#[derive(Debug)]
pub struct PlanSlot {
    rx: oneshot::Receiver<Plan>,
}

impl PlanSlot {
    /// Non-blocking read: whatever is present right now wins.
    ///
    /// `None` means not ready, either because the generator is still running or
    /// because it gave up without publishing.
    pub fn take(mut self) -> Option<Plan> {
        match self.rx.try_recv() {
            Ok(plan) => Some(plan),
            Err(TryRecvError::Empty | TryRecvError::Closed) => None,
        }
    }
}
