//! Best-effort source formatting before counting.
//!
//! Failures here are reported as [`FormatWarning`] and never stop a job.

use std::{io, path::Path};

use analyser_core::{
    config::FormatterConfig,
    models::{FrameworkKind, WorkingCopy},
    process::{CommandError, CommandSpec, run, run_checked},
};
use async_trait::async_trait;
use thiserror::Error;

use crate::profile;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatOutcome {
    Formatted,
    Skipped(&'static str),
}

#[derive(Error, Debug)]
pub enum FormatWarning {
    #[error("{step} failed: {source}")]
    Step {
        step: &'static str,
        #[source]
        source: CommandError,
    },
    #[error("failed to write .prettierrc: {0}")]
    Config(#[source] io::Error),
}

#[async_trait]
pub trait Formatter: Send + Sync {
    async fn format(
        &self,
        copy: &WorkingCopy,
        framework: FrameworkKind,
    ) -> Result<FormatOutcome, FormatWarning>;
}

/// Drives npm/npx/forge in the working copy.
pub struct ToolchainFormatter {
    config: FormatterConfig,
}

impl ToolchainFormatter {
    pub fn new(config: FormatterConfig) -> Self { Self { config } }

    fn command(&self, root: &Path, argv: &[&str]) -> CommandSpec {
        CommandSpec::new(argv[0], root, self.config.timeout()).args(argv[1..].iter().copied())
    }

    async fn step(&self, step: &'static str, spec: CommandSpec) -> Result<(), FormatWarning> {
        run_checked(&spec).await.map_err(|source| FormatWarning::Step { step, source })?;
        tracing::info!("{step} succeeded");
        Ok(())
    }

    async fn install_dependencies(&self, root: &Path, framework: FrameworkKind) {
        let install = profile(framework).install;
        if install.is_empty() {
            return;
        }
        // Formatting can still work without a full install.
        if let Err(e) = self.step("dependency install", self.command(root, install)).await {
            tracing::warn!("{e}");
        }
    }

    async fn setup_prettier(&self, root: &Path) -> Result<(), FormatWarning> {
        let installed = match run(&self.command(root, &["npm", "list", "--depth=0", "prettier"]))
            .await
        {
            Ok(output) => output.success() && output.stdout.contains("prettier"),
            Err(e) => {
                tracing::debug!("npm list failed: {e}");
                false
            }
        };
        if installed {
            tracing::info!("Prettier is already installed");
        } else {
            self.step(
                "prettier install",
                self.command(root, &["npm", "install", "prettier", "prettier-plugin-solidity"]),
            )
            .await?;
        }
        write_prettier_config(root, self.config.line_length)
            .await
            .map_err(FormatWarning::Config)?;
        Ok(())
    }
}

#[async_trait]
impl Formatter for ToolchainFormatter {
    async fn format(
        &self,
        copy: &WorkingCopy,
        framework: FrameworkKind,
    ) -> Result<FormatOutcome, FormatWarning> {
        if !self.config.enabled {
            return Ok(FormatOutcome::Skipped("formatting disabled"));
        }
        let root = copy.path.as_path();
        self.install_dependencies(root, framework).await;
        match framework {
            FrameworkKind::Hardhat => {
                self.setup_prettier(root).await?;
                self.step(
                    "prettier",
                    self.command(root, &["npx", "prettier", "--write", "**/*.sol"]),
                )
                .await?;
            }
            FrameworkKind::Foundry => {
                let spec = self
                    .command(root, &["forge", "fmt"])
                    .env("FOUNDRY_FMT_LINE_LENGTH", self.config.line_length.to_string());
                self.step("forge fmt", spec).await?;
            }
            FrameworkKind::Truffle => {
                return Ok(FormatOutcome::Skipped("no formatter for Truffle"));
            }
            FrameworkKind::Unknown => return Ok(FormatOutcome::Skipped("no framework detected")),
        }
        Ok(FormatOutcome::Formatted)
    }
}

/// Write a Solidity prettier config unless the project already has one.
pub async fn write_prettier_config(root: &Path, print_width: u32) -> io::Result<bool> {
    let path = root.join(".prettierrc");
    if tokio::fs::try_exists(&path).await? {
        tracing::info!("Prettier configuration already exists");
        return Ok(false);
    }
    let config = serde_json::json!({
        "plugins": ["prettier-plugin-solidity"],
        "overrides": [{
            "files": "*.sol",
            "options": {
                "parser": "solidity-parse",
                "printWidth": print_width,
                "tabWidth": 4,
                "useTabs": false,
                "singleQuote": false,
                "bracketSpacing": false
            }
        }]
    });
    let contents = serde_json::to_string_pretty(&config).map_err(io::Error::other)?;
    tokio::fs::write(&path, contents).await?;
    tracing::info!("Created {}", path.display());
    Ok(true)
}
