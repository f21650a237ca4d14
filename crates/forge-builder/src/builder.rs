use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tracing::{info, warn};

use forge_core::{ForgeError, Result};
use forge_memory::MemoryStore;
use forge_oracle::{Oracle, PromptBuilder};
use forge_registry::{CapabilityRegistry, PluginManifest};

use crate::gate::{await_report, BuildGates, GateTicket};

/// Terminal state of one build cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    Succeeded,
    Failed,
}

/// What a build cycle produced, delivered to the leader and every
/// coalesced follower alike.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub target: String,
    pub outcome: BuildOutcome,
    /// Repair attempts consumed (0 = scaffold passed first try).
    pub repair_attempts: u32,
    pub detail: String,
}

impl BuildReport {
    pub fn succeeded(&self) -> bool {
        self.outcome == BuildOutcome::Succeeded
    }
}

/// Policy knobs, injectable so tests can shrink them.
#[derive(Debug, Clone)]
pub struct BuilderSettings {
    pub plugins_dir: PathBuf,
    pub max_repair_attempts: u32,
    pub build_timeout: Duration,
    pub test_command: String,
}

/// The self-healing build pipeline.
///
/// One cycle per target at a time: scaffold handler and test scripts from
/// oracle drafts, run the tests, feed failures back for a full-file
/// rewrite, and publish the manifest only after a pass. A target whose
/// cycle fails leaves no manifest behind, so the registry never sees it.
pub struct Builder {
    oracle: Arc<dyn Oracle>,
    registry: Arc<CapabilityRegistry>,
    memory: Arc<MemoryStore>,
    gates: Arc<BuildGates>,
    settings: BuilderSettings,
    prompts: PromptBuilder,
}

impl Builder {
    pub fn new(
        oracle: Arc<dyn Oracle>,
        registry: Arc<CapabilityRegistry>,
        memory: Arc<MemoryStore>,
        gates: Arc<BuildGates>,
        settings: BuilderSettings,
    ) -> Self {
        Self {
            oracle,
            registry,
            memory,
            gates,
            settings,
            prompts: PromptBuilder::new(),
        }
    }

    pub fn gates(&self) -> &Arc<BuildGates> {
        &self.gates
    }

    /// Build (or wait for) the handler for `target`.
    ///
    /// Concurrent calls for one target coalesce: exactly one cycle runs
    /// and every caller receives its report.
    pub async fn build(&self, target: &str, goal: &str) -> Result<BuildReport> {
        match self.gates.acquire(target) {
            GateTicket::Leader(lease) => {
                let report = self.run_cycle(target, goal).await;
                lease.publish(report.clone());
                Ok(report)
            }
            GateTicket::Follower(rx) => {
                info!(%target, "build already in flight, awaiting its report");
                await_report(rx).await.ok_or_else(|| ForgeError::Build {
                    target: target.to_string(),
                    reason: "in-flight build cycle aborted".into(),
                })
            }
        }
    }

    /// One full scaffold/test/repair cycle under a single wall-clock
    /// budget: `build_timeout` bounds the whole cycle, repairs included,
    /// not each test run. Never returns early without a report — every
    /// failure path is folded into a `Failed` report so coalesced
    /// followers are always woken.
    async fn run_cycle(&self, target: &str, goal: &str) -> BuildReport {
        info!(%target, %goal, "starting build cycle");
        let cycle = self.try_cycle(target, goal);
        match tokio::time::timeout(self.settings.build_timeout, cycle).await {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => {
                warn!(%target, error = %e, "build cycle aborted");
                self.record(target, &e.to_string(), "cycle aborted", false);
                BuildReport {
                    target: target.to_string(),
                    outcome: BuildOutcome::Failed,
                    repair_attempts: 0,
                    detail: e.to_string(),
                }
            }
            Err(_) => {
                let secs = self.settings.build_timeout.as_secs();
                let err = ForgeError::BuildTimeout {
                    target: target.to_string(),
                    secs,
                };
                warn!(%target, secs, "build cycle timed out");
                self.record(target, &err.to_string(), "cycle cancelled", false);
                BuildReport {
                    target: target.to_string(),
                    outcome: BuildOutcome::Failed,
                    repair_attempts: 0,
                    detail: err.to_string(),
                }
            }
        }
    }

    async fn try_cycle(&self, target: &str, goal: &str) -> Result<BuildReport> {
        let dir = self.settings.plugins_dir.join(target);
        std::fs::create_dir_all(&dir)?;
        let handler_path = dir.join("handler.sh");

        // Scaffold: a candidate is never published without its tests
        let handler_src = self
            .oracle
            .draft(&self.prompts.scaffold_handler(target, goal))
            .await?;
        std::fs::write(&handler_path, clean_script(&handler_src))?;

        let test_src = self
            .oracle
            .draft(&self.prompts.scaffold_test(target, goal, &handler_src))
            .await?;
        std::fs::write(dir.join("test.sh"), clean_script(&test_src))?;

        let mut attempts: u32 = 0;
        loop {
            match self.run_tests(target, &dir).await? {
                TestVerdict::Passed => {
                    if attempts > 0 {
                        self.record(
                            target,
                            "tests now passing",
                            &format!("handler rewritten, passed after {attempts} repair(s)"),
                            true,
                        );
                    }
                    self.publish(target, goal, &dir)?;
                    info!(%target, repair_attempts = attempts, "build cycle succeeded");
                    return Ok(BuildReport {
                        target: target.to_string(),
                        outcome: BuildOutcome::Succeeded,
                        repair_attempts: attempts,
                        detail: "tests passed".into(),
                    });
                }
                TestVerdict::Failed(output) => {
                    if attempts >= self.settings.max_repair_attempts {
                        self.record(target, &output, "repair budget exhausted", false);
                        warn!(%target, attempts, "build cycle failed, budget exhausted");
                        return Ok(BuildReport {
                            target: target.to_string(),
                            outcome: BuildOutcome::Failed,
                            repair_attempts: attempts,
                            detail: output,
                        });
                    }
                    attempts += 1;
                    self.record(
                        target,
                        &output,
                        &format!("rewriting handler (attempt {attempts})"),
                        false,
                    );
                    let current = std::fs::read_to_string(&handler_path)?;
                    let replacement = self
                        .oracle
                        .draft(&self.prompts.repair(target, &current, &output, attempts))
                        .await?;
                    // Full-file replacement, no diff application
                    std::fs::write(&handler_path, clean_script(&replacement))?;
                }
            }
        }
    }

    async fn run_tests(&self, target: &str, dir: &std::path::Path) -> Result<TestVerdict> {
        // No timeout here; the cycle-level budget in run_cycle cancels a
        // hung test run (kill_on_drop reaps the child)
        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.settings.test_command)
            .current_dir(dir)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ForgeError::Build {
                target: target.to_string(),
                reason: format!("failed to run tests: {e}"),
            })?;

        if output.status.success() {
            return Ok(TestVerdict::Passed);
        }
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(TestVerdict::Failed(combined.trim().to_string()))
    }

    /// Write the manifest and make the registry see it. The manifest is
    /// the last artifact written: a crashed cycle leaves a directory the
    /// refresh scan ignores.
    fn publish(&self, target: &str, goal: &str, dir: &std::path::Path) -> Result<()> {
        let manifest = PluginManifest {
            name: target.to_string(),
            description: goal.to_string(),
            capabilities: vec![target.to_string()],
            specialist: "handler.sh".into(),
        };
        manifest.save(dir)?;
        self.registry.refresh(&self.settings.plugins_dir)?;
        Ok(())
    }

    fn record(&self, target: &str, error: &str, fix_summary: &str, success: bool) {
        if let Err(e) = self
            .memory
            .record_repair(target, None, error, fix_summary, success)
        {
            warn!(%target, error = %e, "failed to record repair attempt");
        }
    }
}

enum TestVerdict {
    Passed,
    Failed(String),
}

/// Strip markdown code fences a model sometimes wraps scripts in.
fn clean_script(raw: &str) -> String {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        let mut out = trimmed.to_string();
        out.push('\n');
        return out;
    };
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or("");
    let body = body.strip_suffix("```").unwrap_or(body);
    let mut out = body.trim().to_string();
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_script_passthrough() {
        assert_eq!(clean_script("#!/bin/sh\necho hi"), "#!/bin/sh\necho hi\n");
    }

    #[test]
    fn test_clean_script_strips_fences() {
        let fenced = "```sh\n#!/bin/sh\necho hi\n```";
        assert_eq!(clean_script(fenced), "#!/bin/sh\necho hi\n");
    }
}
