use std::{
    collections::BTreeMap,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::models::{ExclusionPolicy, FrameworkKind};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub slack: SlackConfig,
    #[serde(default)]
    pub git: GitConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub cloc: ClocConfig,
    #[serde(default)]
    pub formatter: FormatterConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self { Self { port: 3000 } }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SlackConfig {
    /// Bot token. Overridden by `SLACK_TOKEN`.
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_slack_api_url")]
    pub api_url: Url,
}

fn default_slack_api_url() -> Url {
    Url::parse("https://slack.com/api/").expect("static URL is valid")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HostAlias {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GitConfig {
    pub binary: String,
    /// Private key handed to ssh for clones. Overridden by `GIT_SSH_KEY`.
    pub ssh_key: Option<PathBuf>,
    pub strict_host_key_checking: bool,
    /// Prefix substitutions applied to repository URIs, first match wins.
    pub host_aliases: Vec<HostAlias>,
    /// Parent directory for working copies. Defaults to the system temp dir.
    pub work_dir: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            binary: "git".to_string(),
            ssh_key: None,
            strict_host_key_checking: false,
            host_aliases: vec![HostAlias {
                from: "git@github.com:hknio".to_string(),
                to: "git@github.com-hacken:hknio".to_string(),
            }],
            work_dir: None,
            timeout_secs: 600,
        }
    }
}

impl GitConfig {
    pub fn timeout(&self) -> Duration { Duration::from_secs(self.timeout_secs) }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Maximum number of pipelines running at once.
    pub concurrency: usize,
    pub dedup_capacity: u64,
    pub dedup_ttl_secs: u64,
    pub registry_capacity: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            dedup_capacity: 100_000,
            dedup_ttl_secs: 7 * 24 * 60 * 60,
            registry_capacity: 1024,
        }
    }
}

impl WorkerConfig {
    pub fn dedup_ttl(&self) -> Duration { Duration::from_secs(self.dedup_ttl_secs) }
}

/// Literal values that stand for "use the default" in a job message.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Sentinels {
    pub branch: String,
    pub revision: String,
    pub scope: String,
}

impl Default for Sentinels {
    fn default() -> Self {
        Self {
            branch: "main".to_string(),
            revision: "latest".to_string(),
            scope: "all".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Messages are only considered if they mention one of these, case-insensitively.
    pub tracked_languages: Vec<String>,
    pub sentinels: Sentinels,
    /// Post a short diagnostic in the thread when a job fails.
    pub reply_on_failure: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tracked_languages: vec!["solidity".to_string(), "rust".to_string()],
            sentinels: Sentinels::default(),
            reply_on_failure: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClocConfig {
    pub binary: String,
    pub timeout_secs: u64,
    /// Exclusion policies keyed by framework name.
    pub policies: BTreeMap<String, ExclusionPolicy>,
}

impl Default for ClocConfig {
    fn default() -> Self {
        Self { binary: "cloc".to_string(), timeout_secs: 300, policies: default_policies() }
    }
}

impl ClocConfig {
    pub fn timeout(&self) -> Duration { Duration::from_secs(self.timeout_secs) }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FormatterConfig {
    pub enabled: bool,
    pub timeout_secs: u64,
    pub line_length: u32,
}

impl Default for FormatterConfig {
    fn default() -> Self { Self { enabled: true, timeout_secs: 600, line_length: 80 } }
}

impl FormatterConfig {
    pub fn timeout(&self) -> Duration { Duration::from_secs(self.timeout_secs) }
}

const SOLIDITY_EXCLUDE_DIRS: &[&str] = &[
    "node_modules",
    "libs?",
    "tests?",
    "mocks?",
    "scripts?",
    "interfaces?",
    "uniswap",
    "openzeppelin",
    "curve",
];

const SOLIDITY_EXCLUDE_FILES: &[&str] =
    &["[Ss]cripts?", "[Ii]nterfaces?", "[Mm]ocks?", "[Tt]ests?"];

fn solidity_policy(build_dirs: &[&str]) -> ExclusionPolicy {
    ExclusionPolicy {
        language: "solidity".to_string(),
        extension: "sol".to_string(),
        exclude_dirs: SOLIDITY_EXCLUDE_DIRS
            .iter()
            .chain(build_dirs)
            .map(|s| s.to_string())
            .collect(),
        exclude_files: SOLIDITY_EXCLUDE_FILES.iter().map(|s| s.to_string()).collect(),
    }
}

/// Built-in framework-keyed exclusion table.
pub fn default_policies() -> BTreeMap<String, ExclusionPolicy> {
    BTreeMap::from([
        (
            FrameworkKind::Hardhat.as_str().to_string(),
            solidity_policy(&["artifacts", "cache", "typechain(-types)?"]),
        ),
        (FrameworkKind::Foundry.as_str().to_string(), solidity_policy(&["out", "cache"])),
        (FrameworkKind::Truffle.as_str().to_string(), solidity_policy(&["build", "migrations"])),
        (FrameworkKind::Unknown.as_str().to_string(), solidity_policy(&[])),
    ])
}

impl Config {
    /// Read the YAML config file and apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = BufReader::new(
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?,
        );
        let mut config: Config = serde_yaml::from_reader(file)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(token) = var("SLACK_TOKEN").filter(|v| !v.is_empty()) {
            self.slack.token = token;
        }
        if let Some(key) = var("GIT_SSH_KEY").filter(|v| !v.is_empty()) {
            self.git.ssh_key = Some(PathBuf::from(key));
        }
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.worker.concurrency > 0, "worker.concurrency must be at least 1");
        for (framework, policy) in &self.cloc.policies {
            policy.validate().with_context(|| format!("Invalid cloc policy `{framework}`"))?;
        }
        Ok(())
    }
}
