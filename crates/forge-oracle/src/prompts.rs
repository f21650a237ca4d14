//! Prompt assembly for interpretation, scaffolding, and repair.
//!
//! Prompts are plain strings built here so every backend sees identical
//! instructions and the tests can assert on what was sent.

/// Builds the prompts used across the engine.
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn new() -> Self {
        Self
    }

    /// System context for interpretation: the envelope contract plus the
    /// live capability list, recalled facts, and recent conversation turns.
    pub fn interpreter_context(
        &self,
        capabilities: &[(String, String)],
        facts: &[(String, String)],
        recent_turns: &[(String, String)],
    ) -> String {
        let mut out = String::from(ENVELOPE_CONTRACT);

        out.push_str("\n\n## Available capabilities\n");
        if capabilities.is_empty() {
            out.push_str("(none registered yet)\n");
        }
        for (key, description) in capabilities {
            out.push_str(&format!("- {key}: {description}\n"));
        }

        if !facts.is_empty() {
            out.push_str("\n## Known facts\n");
            for (key, value) in facts {
                out.push_str(&format!("- {key}: {value}\n"));
            }
        }

        if !recent_turns.is_empty() {
            out.push_str("\n## Recent conversation\n");
            for (role, content) in recent_turns {
                out.push_str(&format!("{role}: {content}\n"));
            }
        }

        out
    }

    /// System context for an autonomous tick. Same contract, but no user
    /// is present: the model works the backlog instead of a message.
    pub fn autonomous_context(
        &self,
        capabilities: &[(String, String)],
        facts: &[(String, String)],
        open_tasks: &[String],
    ) -> String {
        let mut out = self.interpreter_context(capabilities, facts, &[]);
        out.push_str(
            "\n## Autonomous mode\n\
             No user is present. Review the open tasks below and either make \
             progress on one (mode \"execution\", a single ready action) or \
             reply with mode \"brainstorming\" and no actions when nothing is \
             actionable. Never ask questions.\n\n## Open tasks\n",
        );
        if open_tasks.is_empty() {
            out.push_str("(backlog empty)\n");
        }
        for task in open_tasks {
            out.push_str(&format!("- {task}\n"));
        }
        out
    }

    /// Draft prompt for a brand-new handler script.
    pub fn scaffold_handler(&self, capability: &str, goal: &str) -> String {
        format!(
            "Write a POSIX shell script named handler.sh implementing the \
             capability \"{capability}\".\n\
             Goal: {goal}\n\n\
             The script reads one JSON action object on stdin and writes one \
             JSON object to stdout with exactly two fields: \
             {{\"status\": \"ok\" | \"error\", \"message\": \"<human-readable result>\"}}.\n\
             It must exit 0 even on handled errors (report them via status). \
             Output only the script body, no markdown fences, no commentary."
        )
    }

    /// Draft prompt for the test script that gates publication.
    pub fn scaffold_test(&self, capability: &str, goal: &str, handler_source: &str) -> String {
        format!(
            "Write a POSIX shell script named test.sh that tests this \
             handler for the capability \"{capability}\" (goal: {goal}).\n\n\
             handler.sh:\n{handler_source}\n\n\
             The test must invoke the handler with a representative JSON \
             action on stdin, check the output is valid JSON with a status \
             field, and exit non-zero on any failure. \
             Output only the script body, no markdown fences, no commentary."
        )
    }

    /// Repair prompt: full current source plus the failing test output.
    /// The reply replaces the whole file — no diff format to mis-apply.
    pub fn repair(
        &self,
        capability: &str,
        handler_source: &str,
        test_output: &str,
        attempt: u32,
    ) -> String {
        format!(
            "The handler for capability \"{capability}\" is failing its test \
             suite (repair attempt {attempt}).\n\n\
             Current handler.sh:\n{handler_source}\n\n\
             Test output:\n{test_output}\n\n\
             Return the complete corrected handler.sh. Output the entire \
             file, not a diff. No markdown fences, no commentary."
        )
    }

}

/// The envelope contract shown to the model verbatim.
const ENVELOPE_CONTRACT: &str = r#"You are the interpreter for a task-orchestration engine.
Reply with a single JSON object and nothing else. Schema:

{
  "assistant_message": "<what to say to the user>",
  "mode": "brainstorming" | "clarification" | "execution",
  "questions": [{"id": "<slug>", "scope": "<what it unblocks>", "question": "<text>"}],
  "ideas": ["<idea>"],
  "facts_to_save": [{"key": "<slug>", "value": "<fact>"}],
  "tasks_to_add": [{"title": "<task>", "priority": "normal" | "high"}],
  "actions": [{"plugin": "<capability key>", "goal": "<what to achieve>", "status": "pending" | "ready", "args": {}}],
  "directive_updates": {}
}

Rules:
- Use "brainstorming" when the user is exploring; produce ideas, never actions with status "ready".
- Use "clarification" when information is missing; put what you need in "questions" and keep actions "pending".
- Use "execution" only when an action is fully specified; mark it "ready".
- Reference only capabilities from the list below, or name a new capability key when none fits.
- Every field is optional except "assistant_message" and "mode"."#;
