//! Implementation of the `statelearner init` command.

use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::adapters::sqlite::{database_url, initialize_database};
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;

/// Create the .statelearner directory, default config and database
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing .statelearner directory
    #[arg(long, short)]
    pub force: bool,

    /// Project directory (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

/// Outcome of `init`.
#[derive(Debug, serde::Serialize)]
pub struct InitOutput {
    /// Whether initialization completed.
    pub success: bool,
    /// Summary for humans.
    pub message: String,
    /// Directory that holds config and database.
    pub state_dir: PathBuf,
    /// Files written, relative to the project directory.
    pub written: Vec<PathBuf>,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.message.clone()];
        lines.extend(
            self.written
                .iter()
                .map(|path| format!("  wrote {}", path.display())),
        );
        if self.success {
            lines.push(format!(
                "Try: statelearner learn --target {}",
                Path::new(STATE_DIR).join(SAMPLE_TARGET).display()
            ));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

const STATE_DIR: &str = ".statelearner";
const SAMPLE_TARGET: &str = "targets/toggle.yaml";

/// A two-state target, small enough to learn in a single step.
const SAMPLE_TARGET_YAML: &str = "\
reset_symbol: reset
initial: s0
states:
  s0:
    a: { output: ok, target: s1 }
    b: { output: s0, target: s0 }
  s1:
    a: { output: ok, target: s0 }
    b: { output: s1, target: s1 }
";

/// Run `init`.
pub async fn execute(args: InitArgs, json_mode: bool) -> Result<()> {
    let project_dir = if args.path.is_absolute() {
        args.path.clone()
    } else {
        std::env::current_dir()
            .context("Failed to get current directory")?
            .join(&args.path)
    };
    let state_dir = project_dir.join(STATE_DIR);

    if state_dir.exists() && !args.force {
        let out = InitOutput {
            success: false,
            message: format!(
                "{} already exists. Use --force to reinitialize.",
                state_dir.display()
            ),
            state_dir,
            written: Vec::new(),
        };
        output(&out, json_mode);
        return Ok(());
    }
    if state_dir.exists() {
        fs::remove_dir_all(&state_dir)
            .await
            .with_context(|| format!("Failed to remove {}", state_dir.display()))?;
    }

    let mut written = Vec::new();
    for dir in ["logs", "targets"] {
        fs::create_dir_all(state_dir.join(dir))
            .await
            .with_context(|| format!("Failed to create {}/{dir}", state_dir.display()))?;
    }

    let config = Config::default();
    let config_yaml = serde_yaml::to_string(&config).context("Failed to render default config")?;
    write_file(&state_dir, "config.yaml", &config_yaml, &mut written).await?;
    write_file(&state_dir, SAMPLE_TARGET, SAMPLE_TARGET_YAML, &mut written).await?;

    // the configured path is relative to the project, not the working directory
    let db_path = project_dir.join(&config.database.path);
    initialize_database(&database_url(&db_path.display().to_string()), None)
        .await
        .with_context(|| format!("Failed to initialize database at {}", db_path.display()))?;
    written.push(PathBuf::from(&config.database.path));

    let out = InitOutput {
        success: true,
        message: format!("Initialized statelearner project in {}", project_dir.display()),
        state_dir,
        written,
    };
    output(&out, json_mode);
    Ok(())
}

async fn write_file(
    state_dir: &Path,
    name: &str,
    contents: &str,
    written: &mut Vec<PathBuf>,
) -> Result<()> {
    let path = state_dir.join(name);
    fs::write(&path, contents)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    written.push(Path::new(STATE_DIR).join(name));
    Ok(())
}
