//! Builds the cloc invocation for a scope, and evaluates the same selection in-process.

use std::path::{Path, PathBuf};

use analyser_core::models::{ExclusionPolicy, Scope};
use itertools::Itertools;
use regex::Regex;
use serde::Serialize;
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "entries")]
pub enum ScopeMode {
    /// Only the named files.
    Files(Vec<String>),
    WholeRepository,
    /// Only files below the named directories.
    Directories(Vec<String>),
}

impl ScopeMode {
    /// The first entry decides: a source file name selects file-list mode.
    pub fn select(scope: &Scope, extension: &str) -> Self {
        match scope {
            Scope::All => Self::WholeRepository,
            Scope::Entries(entries) => {
                let suffix = format!(".{extension}");
                if entries.first().is_some_and(|first| first.contains(&suffix)) {
                    Self::Files(entries.clone())
                } else {
                    Self::Directories(entries.clone())
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClocQuery {
    pub extension: String,
    pub mode: ScopeMode,
    /// Matched anywhere in each directory name.
    pub exclude_dirs: Option<String>,
    /// Matched anywhere in each file name.
    pub exclude_files: Option<String>,
}

impl ClocQuery {
    pub fn new(policy: &ExclusionPolicy, scope: &Scope) -> Self {
        Self {
            extension: policy.extension.clone(),
            mode: ScopeMode::select(scope, &policy.extension),
            exclude_dirs: alternation(&policy.exclude_dirs),
            exclude_files: alternation(&policy.exclude_files),
        }
    }

    /// Regex restricting file names, in file-list mode.
    pub fn match_files(&self) -> Option<String> {
        match &self.mode {
            ScopeMode::Files(files) => {
                Some(format!("^(?:{})$", files.iter().map(|f| regex::escape(f)).join("|")))
            }
            _ => None,
        }
    }

    /// Regex restricting directory paths, in directory-list mode.
    pub fn match_dirs(&self) -> Option<String> {
        match &self.mode {
            ScopeMode::Directories(dirs) => Some(format!(
                "(?:^|/)(?:{})(?:/|$)",
                dirs.iter().map(|d| regex::escape(d.trim_matches('/'))).join("|")
            )),
            _ => None,
        }
    }

    /// Arguments for a cloc run with the working copy as current directory.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            format!("--include-ext={}", self.extension),
            "--by-file".to_string(),
            "--sum-one".to_string(),
            "--hide-rate".to_string(),
            "--quiet".to_string(),
        ];
        if let Some(pattern) = self.match_files() {
            args.push(format!("--match-f={pattern}"));
        }
        if let Some(pattern) = self.match_dirs() {
            args.push(format!("--match-d={pattern}"));
        }
        if let Some(pattern) = &self.exclude_dirs {
            args.push(format!("--not-match-d={pattern}"));
        }
        if let Some(pattern) = &self.exclude_files {
            args.push(format!("--not-match-f={pattern}"));
        }
        args.push(".".to_string());
        args
    }

    pub fn matcher(&self) -> Result<QueryMatcher, regex::Error> {
        let compile = |pattern: Option<String>| pattern.map(|p| Regex::new(&p)).transpose();
        Ok(QueryMatcher {
            extension: self.extension.clone(),
            match_files: compile(self.match_files())?,
            match_dirs: compile(self.match_dirs())?,
            exclude_dirs: compile(self.exclude_dirs.clone())?,
            exclude_files: compile(self.exclude_files.clone())?,
        })
    }
}

fn alternation(patterns: &[String]) -> Option<String> {
    let patterns = patterns.iter().filter(|p| !p.is_empty()).collect::<Vec<_>>();
    (!patterns.is_empty()).then(|| format!("(?:{})", patterns.iter().join("|")))
}

/// In-process evaluation of a [`ClocQuery`], used to preview which files a run covers.
#[derive(Debug, Clone)]
pub struct QueryMatcher {
    extension: String,
    match_files: Option<Regex>,
    match_dirs: Option<Regex>,
    exclude_dirs: Option<Regex>,
    exclude_files: Option<Regex>,
}

impl QueryMatcher {
    fn excludes_dir(&self, name: &str) -> bool {
        name == ".git" || self.exclude_dirs.as_ref().is_some_and(|re| re.is_match(name))
    }

    /// Whether a path relative to the working copy root would be counted.
    pub fn selects(&self, relative: &Path) -> bool {
        let Some(name) = relative.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if relative.extension().and_then(|e| e.to_str()) != Some(self.extension.as_str()) {
            return false;
        }
        let parent = relative.parent().unwrap_or(Path::new(""));
        let parent_names = parent.components().filter_map(|c| c.as_os_str().to_str());
        if parent_names.clone().any(|dir| self.excludes_dir(dir)) {
            return false;
        }
        if self.exclude_files.as_ref().is_some_and(|re| re.is_match(name)) {
            return false;
        }
        if let Some(re) = &self.match_files
            && !re.is_match(name)
        {
            return false;
        }
        if let Some(re) = &self.match_dirs {
            let dir_path = std::iter::once(".").chain(parent_names).join("/");
            if !re.is_match(&dir_path) {
                return false;
            }
        }
        true
    }

    /// Selected files below `root`, relative and sorted.
    pub fn select_files(&self, root: &Path) -> Vec<PathBuf> {
        WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !entry.file_type().is_dir()
                    || !entry.file_name().to_str().is_some_and(|name| self.excludes_dir(name))
            })
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| entry.path().strip_prefix(root).ok().map(Path::to_path_buf))
            .filter(|relative| self.selects(relative))
            .collect()
    }
}
