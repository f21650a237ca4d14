use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use forge_builder::{BuildGates, Builder, BuilderSettings};
use forge_config::ForgeConfig;
use forge_core::{ActionEnvelope, Origin, Result, SessionId};
use forge_memory::MemoryStore;
use forge_oracle::{Oracle, PromptBuilder};
use forge_registry::{CapabilityRegistry, Dispatcher};

use crate::docket::Docket;
use crate::router::{Router, TurnOutcome};
use crate::scheduler::{Scheduler, SchedulerHandle};

/// The assembled engine: every shared handle lives here and is passed
/// explicitly to both loops. No globals.
pub struct Engine {
    config: ForgeConfig,
    memory: Arc<MemoryStore>,
    registry: Arc<CapabilityRegistry>,
    oracle: Arc<dyn Oracle>,
    router: Arc<Router>,
    docket: Arc<Docket>,
    gates: Arc<BuildGates>,
    prompts: PromptBuilder,
}

impl Engine {
    /// Wire the engine from config and an oracle backend. Opens the store,
    /// loads the docket, and refreshes the registry from the plugins
    /// directory.
    pub fn new(config: ForgeConfig, oracle: Arc<dyn Oracle>) -> Result<Self> {
        let memory = Arc::new(MemoryStore::open(&config.memory.db_path)?);
        let registry = Arc::new(CapabilityRegistry::new());
        registry.refresh(&config.registry.plugins_dir)?;

        let docket_path = config
            .memory
            .db_path
            .parent()
            .map(|p| p.join("docket.json"))
            .unwrap_or_else(|| "docket.json".into());
        let docket = Arc::new(Docket::load(&docket_path)?);

        let gates = Arc::new(BuildGates::new());
        let builder = Arc::new(Builder::new(
            oracle.clone(),
            registry.clone(),
            memory.clone(),
            gates.clone(),
            BuilderSettings {
                plugins_dir: config.registry.plugins_dir.clone(),
                max_repair_attempts: config.builder.max_repair_attempts,
                build_timeout: Duration::from_secs(config.builder.build_timeout_secs),
                test_command: config.builder.test_command.clone(),
            },
        ));

        let gate = Arc::new(tokio::sync::Mutex::new(()));
        let router = Arc::new(Router::new(
            memory.clone(),
            Dispatcher::new(registry.clone()),
            builder,
            docket.clone(),
            gate,
        ));

        info!(
            oracle = oracle.name(),
            capabilities = registry.list_capabilities().len(),
            "engine ready"
        );
        Ok(Self {
            config,
            memory,
            registry,
            oracle,
            router,
            docket,
            gates,
            prompts: PromptBuilder::new(),
        })
    }

    /// One foreground turn: record, interpret, validate, route, record.
    ///
    /// An oracle outage or a rejected envelope aborts the turn before any
    /// side effect; the error text reaches the caller verbatim.
    pub async fn turn(&self, session: SessionId, text: &str) -> Result<TurnOutcome> {
        self.memory.add_turn(&session.to_string(), "user", text)?;

        let facts: Vec<_> = self
            .memory
            .recall(None, None, 50)?
            .into_iter()
            .map(|f| (f.key, f.value))
            .collect();
        let turns: Vec<_> = self
            .memory
            .recent_turns(&session.to_string(), 10)?
            .into_iter()
            .map(|t| (t.role, t.content))
            .collect();
        let context = self
            .prompts
            .interpreter_context(&self.registry.describe(), &facts, &turns);

        let raw = self.oracle.interpret(&context, text).await?;
        let envelope = ActionEnvelope::parse(&raw)?;
        let outcome = self.router.route(&envelope, Origin::Foreground).await?;

        self.memory
            .add_turn(&session.to_string(), "assistant", &outcome.message)?;
        Ok(outcome)
    }

    /// Start the background loop; returns its shutdown handle.
    pub fn spawn_scheduler(&self) -> SchedulerHandle {
        Scheduler::new(
            self.oracle.clone(),
            self.memory.clone(),
            self.registry.clone(),
            self.docket.clone(),
            self.router.clone(),
            self.gates.clone(),
            Duration::from_secs(self.config.scheduler.interval_secs),
        )
        .spawn()
    }

    pub fn config(&self) -> &ForgeConfig {
        &self.config
    }

    pub fn memory(&self) -> &Arc<MemoryStore> {
        &self.memory
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    pub fn docket(&self) -> &Arc<Docket> {
        &self.docket
    }

    pub fn capabilities(&self) -> Vec<String> {
        self.registry.list_capabilities()
    }
}
