use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use forge_config::ConfigLoader;
use forge_core::SessionId;
use forge_oracle::HttpOracle;
use forge_runtime::{ActionResultKind, Engine, TurnOutcome};

/// Forge — autonomous task-orchestration engine
#[derive(Parser)]
#[command(name = "forge", version, about, long_about = None)]
pub struct Cli {
    /// Path to forge.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (e.g. debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive session in the terminal
    Repl,
    /// Run a single turn and print the outcome as JSON
    Once {
        /// The user message for the turn
        text: String,
    },
    /// List registered capability keys
    Capabilities,
}

impl Cli {
    pub async fn run(self) -> forge_core::Result<()> {
        let config = ConfigLoader::load(self.config.as_deref())?;

        let log_level = self
            .log_level
            .clone()
            .unwrap_or_else(|| config.logging.level.clone());
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
            )
            .with_target(false)
            .init();

        let oracle = Arc::new(HttpOracle::from_config(&config.oracle)?);

        match self.command {
            Commands::Repl => {
                let engine = Engine::new(config, oracle)?;
                Self::cmd_repl(engine).await
            }
            Commands::Once { text } => {
                let engine = Engine::new(config, oracle)?;
                let outcome = engine.turn(SessionId::new_v4(), &text).await?;
                println!("{}", serde_json::to_string_pretty(&outcome)?);
                Ok(())
            }
            Commands::Capabilities => {
                let engine = Engine::new(config, oracle)?;
                for key in engine.capabilities() {
                    println!("{key}");
                }
                Ok(())
            }
        }
    }

    async fn cmd_repl(engine: Engine) -> forge_core::Result<()> {
        let scheduler = if engine.config().scheduler.enabled {
            Some(engine.spawn_scheduler())
        } else {
            None
        };

        let session = SessionId::new_v4();
        println!("forge — type a message, or \"exit\" to quit");

        let stdin = std::io::stdin();
        loop {
            print!("> ");
            std::io::stdout().flush()?;
            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                break;
            }
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line == "exit" || line == "quit" {
                break;
            }

            match engine.turn(session, line).await {
                Ok(outcome) => render(&outcome),
                Err(e) => eprintln!("error: {e}"),
            }
        }

        if let Some(handle) = scheduler {
            handle.stop().await;
        }
        Ok(())
    }
}

fn render(outcome: &TurnOutcome) {
    println!("{}", outcome.message);
    for question in &outcome.questions {
        println!("  ? {}", question.question);
    }
    for idea in &outcome.ideas {
        println!("  * {idea}");
    }
    for report in &outcome.action_results {
        match &report.result {
            ActionResultKind::Handled(result) => {
                let built = if report.built { " (built on demand)" } else { "" };
                println!("  [{}]{} {}", report.capability, built, result.message);
            }
            ActionResultKind::Declined => {
                println!("  [{}] declined: {}", report.capability, report.goal);
            }
            ActionResultKind::BuildFailed(detail) => {
                println!("  [{}] build failed: {detail}", report.capability);
            }
        }
    }
    for action in &outcome.pending {
        println!("  … waiting: {} ({})", action.plugin, action.goal);
    }
    if outcome.tasks_added > 0 {
        println!("  + {} task(s) added to the docket", outcome.tasks_added);
    }
}
