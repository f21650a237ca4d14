use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use forge_builder::BuildGates;
use forge_core::{ActionEnvelope, Origin};
use forge_memory::MemoryStore;
use forge_oracle::{Oracle, PromptBuilder};
use forge_registry::CapabilityRegistry;

use crate::docket::Docket;
use crate::router::Router;

/// The autonomous background loop.
///
/// Each tick works the docket: assemble context, ask the oracle for an
/// envelope, validate, route with [`Origin::Scheduler`]. A tick that finds
/// the engine busy is skipped outright — never queued — so at most one
/// envelope is in flight per process and the foreground always wins.
pub struct Scheduler {
    oracle: Arc<dyn Oracle>,
    memory: Arc<MemoryStore>,
    registry: Arc<CapabilityRegistry>,
    docket: Arc<Docket>,
    router: Arc<Router>,
    gates: Arc<BuildGates>,
    interval: Duration,
    prompts: PromptBuilder,
}

/// Shutdown handle for a spawned scheduler.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal the loop to stop and wait for it to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        oracle: Arc<dyn Oracle>,
        memory: Arc<MemoryStore>,
        registry: Arc<CapabilityRegistry>,
        docket: Arc<Docket>,
        router: Arc<Router>,
        gates: Arc<BuildGates>,
        interval: Duration,
    ) -> Self {
        Self {
            oracle,
            memory,
            registry,
            docket,
            router,
            gates,
            interval,
            prompts: PromptBuilder::new(),
        }
    }

    /// Spawn the loop. It runs until the handle signals shutdown.
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown, mut rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            // The first tick fires immediately; skip it so the engine
            // settles before autonomous work starts
            ticker.tick().await;
            info!(interval_secs = self.interval.as_secs(), "scheduler started");
            loop {
                tokio::select! {
                    _ = rx.changed() => {
                        info!("scheduler stopping");
                        break;
                    }
                    _ = ticker.tick() => self.tick().await,
                }
            }
        });
        SchedulerHandle { shutdown, task }
    }

    /// One autonomous tick. Failures log and end the tick; they never
    /// leave partial side effects because routing only happens after a
    /// full validation pass.
    pub async fn tick(&self) {
        if self.gates.any_busy() {
            debug!("build in flight, skipping tick");
            return;
        }
        // Skip-not-queue: if the foreground holds the envelope gate right
        // now, this tick is forfeited
        match self.router.gate().try_lock() {
            Ok(probe) => drop(probe),
            Err(_) => {
                debug!("envelope gate held, skipping tick");
                return;
            }
        }

        let facts = match self.memory.recall(None, None, 50) {
            Ok(facts) => facts
                .into_iter()
                .map(|f| (f.key, f.value))
                .collect::<Vec<_>>(),
            Err(e) => {
                warn!(error = %e, "tick aborted: could not recall facts");
                return;
            }
        };
        let open_tasks: Vec<String> = self
            .docket
            .open_tasks()
            .into_iter()
            .map(|t| t.title)
            .collect();
        let context =
            self.prompts
                .autonomous_context(&self.registry.describe(), &facts, &open_tasks);

        let raw = match self
            .oracle
            .interpret(&context, "Proceed with the backlog.")
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "tick aborted: oracle unavailable");
                return;
            }
        };
        let envelope = match ActionEnvelope::parse(&raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "tick aborted: envelope rejected");
                return;
            }
        };
        // The foreground may have grabbed the gate during the oracle
        // call; a contended gate forfeits the tick rather than queueing
        match self.router.try_route(&envelope, Origin::Scheduler).await {
            Some(Err(e)) => warn!(error = %e, "tick failed during routing"),
            Some(Ok(_)) => {}
            None => debug!("envelope gate contended, tick forfeited"),
        }
    }
}
