use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::builder::BuildReport;

type Inflight = Arc<Mutex<HashMap<String, watch::Receiver<Option<BuildReport>>>>>;

/// Per-target build gates with coalescing.
///
/// The first caller for a target becomes the leader and runs the cycle;
/// every caller that arrives while the cycle is in flight becomes a
/// follower and receives the leader's report. Different targets hold
/// independent gates and build in parallel.
#[derive(Default)]
pub struct BuildGates {
    inflight: Inflight,
}

/// What [`BuildGates::acquire`] hands back.
pub enum GateTicket {
    /// This caller runs the cycle and must publish via [`GateLease::publish`].
    Leader(GateLease),
    /// A cycle is already in flight; await its report.
    Follower(watch::Receiver<Option<BuildReport>>),
}

/// The leader's obligation: exactly one publish, which releases the gate.
/// Dropping an unpublished lease releases the gate too, waking followers
/// with no report (the cycle aborted).
pub struct GateLease {
    target: String,
    tx: watch::Sender<Option<BuildReport>>,
    inflight: Inflight,
    published: bool,
}

impl GateLease {
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Publish the report and release the gate.
    pub fn publish(mut self, report: BuildReport) {
        self.inflight.lock().remove(&self.target);
        self.published = true;
        let _ = self.tx.send(Some(report));
    }
}

impl Drop for GateLease {
    fn drop(&mut self) {
        if !self.published {
            self.inflight.lock().remove(&self.target);
        }
    }
}

impl BuildGates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join or open the gate for a target.
    pub fn acquire(&self, target: &str) -> GateTicket {
        let mut map = self.inflight.lock();
        if let Some(rx) = map.get(target) {
            return GateTicket::Follower(rx.clone());
        }
        let (tx, rx) = watch::channel(None);
        map.insert(target.to_string(), rx);
        GateTicket::Leader(GateLease {
            target: target.to_string(),
            tx,
            inflight: self.inflight.clone(),
            published: false,
        })
    }

    /// Whether a cycle for this target is in flight.
    pub fn is_busy(&self, target: &str) -> bool {
        self.inflight.lock().contains_key(target)
    }

    /// Whether any cycle is in flight — the scheduler's skip signal.
    pub fn any_busy(&self) -> bool {
        !self.inflight.lock().is_empty()
    }
}

/// Await the report a follower subscribed to. `None` means the leader
/// aborted without publishing.
pub async fn await_report(
    mut rx: watch::Receiver<Option<BuildReport>>,
) -> Option<BuildReport> {
    loop {
        {
            let current = rx.borrow();
            if current.is_some() {
                return current.clone();
            }
        }
        if rx.changed().await.is_err() {
            return rx.borrow().clone();
        }
    }
}
