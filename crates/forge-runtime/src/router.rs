use std::sync::Arc;

use tracing::{info, warn};

use forge_builder::Builder;
use forge_core::{
    Action, ActionEnvelope, FactToSave, ForgeError, Mode, Origin, Question, Result,
};
use forge_memory::{FactType, MemoryStore, NewFact};
use forge_registry::{DispatchOutcome, Dispatcher, HandlerResult};

use crate::docket::Docket;

/// Keys with this prefix are preference-typed: stored as a fact and
/// additionally promoted to a durable preference row.
const PREFERENCE_PREFIX: &str = "preference.";

/// The user persisting facts through the default single-user surface.
const DEFAULT_USER: &str = "default";

/// What happened to one ready action.
#[derive(Debug, serde::Serialize)]
pub struct ActionReport {
    pub capability: String,
    pub goal: String,
    /// Whether a build cycle ran before the handler answered.
    pub built: bool,
    pub result: ActionResultKind,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionResultKind {
    Handled(HandlerResult),
    /// A handler exists but declined the action.
    Declined,
    BuildFailed(String),
}

/// Structured result of routing one envelope.
#[derive(Debug, Default, serde::Serialize)]
pub struct TurnOutcome {
    pub message: String,
    pub questions: Vec<Question>,
    pub ideas: Vec<String>,
    pub action_results: Vec<ActionReport>,
    /// Actions recorded but deliberately not dispatched this turn.
    pub pending: Vec<Action>,
    pub tasks_added: usize,
}

/// Turns a validated envelope into side effects, under the per-process
/// envelope gate: foreground turns and scheduler ticks never interleave.
pub struct Router {
    memory: Arc<MemoryStore>,
    dispatcher: Dispatcher,
    builder: Arc<Builder>,
    docket: Arc<Docket>,
    gate: Arc<tokio::sync::Mutex<()>>,
}

impl Router {
    pub fn new(
        memory: Arc<MemoryStore>,
        dispatcher: Dispatcher,
        builder: Arc<Builder>,
        docket: Arc<Docket>,
        gate: Arc<tokio::sync::Mutex<()>>,
    ) -> Self {
        Self {
            memory,
            dispatcher,
            builder,
            docket,
            gate,
        }
    }

    /// Route one envelope. The gate is held for the whole call.
    pub async fn route(&self, envelope: &ActionEnvelope, origin: Origin) -> Result<TurnOutcome> {
        let _gate = self.gate.lock().await;
        self.route_inner(envelope, origin).await
    }

    /// Route only if the gate is free right now; `None` means it was
    /// contended and the envelope was forfeited, with zero side effects.
    /// This is the scheduler's skip-not-queue entry point.
    pub async fn try_route(
        &self,
        envelope: &ActionEnvelope,
        origin: Origin,
    ) -> Option<Result<TurnOutcome>> {
        let Ok(_gate) = self.gate.try_lock() else {
            return None;
        };
        Some(self.route_inner(envelope, origin).await)
    }

    async fn route_inner(
        &self,
        envelope: &ActionEnvelope,
        origin: Origin,
    ) -> Result<TurnOutcome> {
        let mut outcome = TurnOutcome {
            message: envelope.assistant_message.clone(),
            questions: envelope.questions.clone(),
            ideas: envelope.ideas.clone(),
            ..Default::default()
        };

        // Planning is orthogonal to execution: the backlog grows whatever
        // the mode says
        for task in &envelope.tasks_to_add {
            self.docket.add(&task.title, task.priority)?;
            outcome.tasks_added += 1;
        }

        match envelope.mode {
            Mode::Brainstorming => {
                // No persistence, no dispatch, even if actions slipped in
                if !envelope.actions.is_empty() {
                    warn!(
                        count = envelope.actions.len(),
                        "brainstorming envelope carried actions, ignoring"
                    );
                }
            }
            // Open questions hold back underspecified work, but an action
            // the oracle already marked ready is fully specified — it
            // dispatches in both modes; only pending actions wait
            Mode::Clarification | Mode::Execution => {
                self.persist_facts(&envelope.facts_to_save, origin)?;
                outcome.pending = envelope.pending_actions().cloned().collect();
                for action in envelope.ready_actions() {
                    let report = self.execute(action, origin).await?;
                    outcome.action_results.push(report);
                }
            }
        }

        info!(
            origin = %origin,
            mode = ?envelope.mode,
            dispatched = outcome.action_results.len(),
            pending = outcome.pending.len(),
            tasks_added = outcome.tasks_added,
            "envelope routed"
        );
        Ok(outcome)
    }

    async fn execute(&self, action: &Action, origin: Origin) -> Result<ActionReport> {
        match self.dispatcher.dispatch(action).await? {
            DispatchOutcome::Completed(result) => {
                self.persist_facts(&result.facts, origin)?;
                Ok(ActionReport {
                    capability: action.plugin.clone(),
                    goal: action.goal.clone(),
                    built: false,
                    result: ActionResultKind::Handled(result),
                })
            }
            DispatchOutcome::Mismatch { capability, goal } => {
                let err = ForgeError::CapabilityMismatch {
                    capability: capability.clone(),
                    goal: goal.clone(),
                };
                warn!(error = %err, "handler declined action");
                Ok(ActionReport {
                    capability,
                    goal,
                    built: false,
                    result: ActionResultKind::Declined,
                })
            }
            DispatchOutcome::NeedsBuild { target, goal } => {
                info!(%target, "capability missing, entering build cycle");
                let report = self.builder.build(&target, &goal).await?;
                if !report.succeeded() {
                    return Ok(ActionReport {
                        capability: target,
                        goal,
                        built: false,
                        result: ActionResultKind::BuildFailed(report.detail),
                    });
                }
                // Exactly one re-dispatch after a successful build
                let result = match self.dispatcher.dispatch(action).await? {
                    DispatchOutcome::Completed(result) => {
                        self.persist_facts(&result.facts, origin)?;
                        ActionResultKind::Handled(result)
                    }
                    DispatchOutcome::Mismatch { .. } => ActionResultKind::Declined,
                    DispatchOutcome::NeedsBuild { .. } => ActionResultKind::BuildFailed(
                        "handler published but still unresolved".into(),
                    ),
                };
                Ok(ActionReport {
                    capability: target,
                    goal,
                    built: true,
                    result,
                })
            }
        }
    }

    /// Persist each fact as one active row. `preference.`-prefixed keys
    /// also promote a preference for the default user.
    fn persist_facts(&self, facts: &[FactToSave], origin: Origin) -> Result<()> {
        for entry in facts {
            let (fact_type, pref_key) = match entry.key.strip_prefix(PREFERENCE_PREFIX) {
                Some(rest) => (FactType::Preference, Some(rest.to_string())),
                None => (FactType::Context, None),
            };
            let fact = self.memory.insert_fact(
                NewFact::new(fact_type, entry.key.clone(), entry.value.clone())
                    .with_source(origin.as_str()),
            )?;
            if let Some(key) = pref_key {
                self.memory.upsert_preference(
                    DEFAULT_USER,
                    "general",
                    &key,
                    &entry.value,
                    1.0,
                    Some(fact.id),
                )?;
            }
        }
        Ok(())
    }

    /// The envelope gate, shared with the scheduler's skip probe.
    pub fn gate(&self) -> &Arc<tokio::sync::Mutex<()>> {
        &self.gate
    }
}
