use std::{
    io::Read,
    path::{Path, PathBuf},
};

use analyser_core::{
    config::{ClocConfig, PipelineConfig},
    models::FrameworkKind,
};
use anyhow::{Context, Result};

// For argp::FromArgs
pub fn native_path(value: &str) -> Result<PathBuf, String> { Ok(PathBuf::from(value)) }

// For argp::FromArgs
pub fn framework(value: &str) -> Result<FrameworkKind, String> {
    value.parse().map_err(|_| format!("unknown framework `{value}`"))
}

/// Read a file, or stdin for `-`.
pub fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text).context("Failed to read stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// The sections the offline commands need. The config file is optional here,
/// since the chat token is never used.
pub fn load_sections(path: Option<&Path>) -> Result<(PipelineConfig, ClocConfig)> {
    let Some(path) = path else {
        return Ok((PipelineConfig::default(), ClocConfig::default()));
    };
    let config = analyser_core::config::Config::load(path)?;
    Ok((config.pipeline, config.cloc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framework_names() {
        assert_eq!(framework("Foundry"), Ok(FrameworkKind::Foundry));
        assert_eq!(framework("unknown"), Ok(FrameworkKind::Unknown));
        assert!(framework("brownie").is_err());
    }

    #[test]
    fn config_file_is_optional() {
        let (pipeline, cloc) = load_sections(None).unwrap();
        assert_eq!(pipeline.sentinels.scope, "all");
        assert!(cloc.policies.contains_key("hardhat"));
    }

    #[test]
    fn config_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(&path, "slack: {}\npipeline:\n  sentinels:\n    scope: everything\n")
            .unwrap();
        let (pipeline, _) = load_sections(Some(&path)).unwrap();
        assert_eq!(pipeline.sentinels.scope, "everything");
        assert_eq!(pipeline.sentinels.branch, "main");
        assert_eq!(read_input(&path).unwrap().lines().next(), Some("slack: {}"));
    }
}
