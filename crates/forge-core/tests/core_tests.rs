use forge_core::{ActionEnvelope, ActionStatus, ForgeError, Mode, TaskPriority};

fn minimal(mode: &str) -> String {
    format!(r#"{{"assistant_message": "ok", "mode": "{mode}"}}"#)
}

// ── Accepting valid envelopes ──────────────────────────────────

#[test]
fn test_parse_minimal_envelope() {
    let env = ActionEnvelope::parse(&minimal("execution")).unwrap();
    assert_eq!(env.mode, Mode::Execution);
    assert_eq!(env.assistant_message, "ok");
    assert!(env.actions.is_empty());
    assert!(env.facts_to_save.is_empty());
}

#[test]
fn test_parse_full_envelope() {
    let raw = r#"{
        "assistant_message": "On it.",
        "mode": "clarification",
        "questions": [{"id": "q1", "scope": "fitness", "question": "Which features?"}],
        "ideas": ["track workouts", "track bodyweight"],
        "facts_to_save": [{"key": "fitness_tracker_features", "value": "workouts + bodyweight"}],
        "tasks_to_add": [{"title": "design schema", "priority": "high"}, {"title": "sketch UI"}],
        "actions": [{"plugin": "fitness_tracker", "goal": "log workouts", "status": "pending", "args": {"unit": "kg"}}],
        "directive_updates": {"tone": "brief"}
    }"#;
    let env = ActionEnvelope::parse(raw).unwrap();
    assert_eq!(env.mode, Mode::Clarification);
    assert_eq!(env.questions.len(), 1);
    assert_eq!(env.questions[0].id, "q1");
    assert_eq!(env.ideas.len(), 2);
    assert_eq!(env.facts_to_save[0].key, "fitness_tracker_features");
    assert_eq!(env.tasks_to_add[0].priority, TaskPriority::High);
    assert_eq!(env.tasks_to_add[1].priority, TaskPriority::Normal);
    assert_eq!(env.actions[0].status, ActionStatus::Pending);
    assert_eq!(env.actions[0].args["unit"], "kg");
    assert_eq!(env.directive_updates["tone"], "brief");
}

#[test]
fn test_parse_tolerates_surrounding_prose() {
    let raw = format!("Here is the envelope:\n```json\n{}\n```", minimal("brainstorming"));
    let env = ActionEnvelope::parse(&raw).unwrap();
    assert_eq!(env.mode, Mode::Brainstorming);
}

// ── Rejecting contract violations ──────────────────────────────

#[test]
fn test_missing_mode_is_schema_violation() {
    let err = ActionEnvelope::parse(r#"{"assistant_message": "hi"}"#).unwrap_err();
    assert!(matches!(err, ForgeError::SchemaViolation(_)));
    assert!(err.to_string().contains("mode"), "error should name the missing field: {err}");
}

#[test]
fn test_unknown_mode_is_schema_violation() {
    let err = ActionEnvelope::parse(&minimal("pondering")).unwrap_err();
    assert!(matches!(err, ForgeError::SchemaViolation(_)));
}

#[test]
fn test_unknown_top_level_key_is_schema_violation() {
    let raw = r#"{"assistant_message": "hi", "mode": "execution", "surprise": true}"#;
    let err = ActionEnvelope::parse(raw).unwrap_err();
    assert!(matches!(err, ForgeError::SchemaViolation(_)));
}

#[test]
fn test_action_missing_goal_is_schema_violation() {
    let raw = r#"{
        "assistant_message": "hi", "mode": "execution",
        "actions": [{"plugin": "fitness_tracker", "status": "ready"}]
    }"#;
    let err = ActionEnvelope::parse(raw).unwrap_err();
    assert!(matches!(err, ForgeError::SchemaViolation(_)));
}

#[test]
fn test_action_bad_status_is_schema_violation() {
    let raw = r#"{
        "assistant_message": "hi", "mode": "execution",
        "actions": [{"plugin": "p", "goal": "g", "status": "done"}]
    }"#;
    let err = ActionEnvelope::parse(raw).unwrap_err();
    assert!(matches!(err, ForgeError::SchemaViolation(_)));
}

#[test]
fn test_no_json_at_all_is_schema_violation() {
    let err = ActionEnvelope::parse("I could not produce an envelope, sorry.").unwrap_err();
    assert!(matches!(err, ForgeError::SchemaViolation(_)));
}

// ── Action filtering helpers ───────────────────────────────────

#[test]
fn test_ready_and_pending_partition() {
    let raw = r#"{
        "assistant_message": "hi", "mode": "execution",
        "actions": [
            {"plugin": "a", "goal": "one", "status": "ready"},
            {"plugin": "b", "goal": "two", "status": "pending"},
            {"plugin": "c", "goal": "three", "status": "ready"}
        ]
    }"#;
    let env = ActionEnvelope::parse(raw).unwrap();
    let ready: Vec<_> = env.ready_actions().map(|a| a.plugin.as_str()).collect();
    let pending: Vec<_> = env.pending_actions().map(|a| a.plugin.as_str()).collect();
    assert_eq!(ready, vec!["a", "c"]);
    assert_eq!(pending, vec!["b"]);
}
