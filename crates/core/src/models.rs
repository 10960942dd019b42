use std::{collections::BTreeMap, fmt, path::PathBuf, str::FromStr};

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A message received from the chat transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEvent {
    /// Message timestamp; doubles as the dedup key and the reply thread.
    pub event_id: String,
    pub sender: Option<String>,
    pub channel: String,
    pub text: String,
    /// Set for bot messages and message subtypes (edits, joins, ...).
    pub from_bot: bool,
}

/// Which part of the repository to count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    All,
    /// File names or directory names, in message order.
    Entries(Vec<String>),
}

impl Scope {
    pub fn first(&self) -> Option<&str> {
        match self {
            Self::All => None,
            Self::Entries(entries) => entries.first().map(String::as_str),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Entries(entries) => f.write_str(&entries.join(", ")),
        }
    }
}

/// A validated request to clone, format and count one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobDescriptor {
    pub repository_uri: String,
    pub client_id: String,
    /// Lower-cased.
    pub language: String,
    /// `None` means the remote's default branch.
    pub branch: Option<String>,
    /// `None` means the branch tip.
    pub revision: Option<String>,
    pub scope: Scope,
    /// Message fields with no meaning to the pipeline.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

/// A local checkout owned by a single job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingCopy {
    pub path: PathBuf,
    pub repository_uri: String,
    /// Branch checked out, or `HEAD` when detached at a pinned revision.
    pub branch: String,
    pub revision: String,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameworkKind {
    Hardhat,
    Foundry,
    Truffle,
    Unknown,
}

impl FrameworkKind {
    /// Known frameworks in detection priority order.
    pub const fn variants() -> &'static [Self] { &[Self::Hardhat, Self::Foundry, Self::Truffle] }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hardhat => "hardhat",
            Self::Foundry => "foundry",
            Self::Truffle => "truffle",
            Self::Unknown => "unknown",
        }
    }
}

impl FromStr for FrameworkKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hardhat" => Ok(Self::Hardhat),
            "foundry" => Ok(Self::Foundry),
            "truffle" => Ok(Self::Truffle),
            "unknown" => Ok(Self::Unknown),
            _ => Err(()),
        }
    }
}

impl fmt::Display for FrameworkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Hardhat => "Hardhat",
            Self::Foundry => "Foundry",
            Self::Truffle => "Truffle",
            Self::Unknown => "Unknown",
        })
    }
}

/// Directory and file patterns left out of a line count.
///
/// Each list holds regex fragments that are OR'd into a single matcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionPolicy {
    /// Language this policy counts, lower-case.
    pub language: String,
    /// Source file extension without the dot.
    pub extension: String,
    pub exclude_dirs: Vec<String>,
    pub exclude_files: Vec<String>,
}

impl ExclusionPolicy {
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.extension.is_empty(), "extension must not be empty");
        for pattern in self.exclude_dirs.iter().chain(&self.exclude_files) {
            Regex::new(pattern).with_context(|| format!("Invalid pattern `{pattern}`"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framework_kind_round_trips_names() {
        for kind in FrameworkKind::variants().iter().chain([&FrameworkKind::Unknown]) {
            assert_eq!(kind.as_str().parse::<FrameworkKind>(), Ok(*kind));
        }
        assert_eq!("Foundry".parse::<FrameworkKind>(), Ok(FrameworkKind::Foundry));
        assert!("brownie".parse::<FrameworkKind>().is_err());
    }

    #[test]
    fn detection_priority_is_fixed() {
        assert_eq!(FrameworkKind::variants(), &[
            FrameworkKind::Hardhat,
            FrameworkKind::Foundry,
            FrameworkKind::Truffle
        ]);
    }
}
