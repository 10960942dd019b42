use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::CountToolError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub files: usize,
    pub blank: u64,
    pub comment: u64,
    pub code: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileCount {
    pub path: String,
    pub blank: u64,
    pub comment: u64,
    pub code: u64,
}

/// Counting result plus the job metadata echoed back to the requester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineCountReport {
    /// The counting tool's table, verbatim.
    pub table: String,
    pub files: Vec<FileCount>,
    pub totals: Totals,
    pub branch: String,
    pub revision: String,
}

impl LineCountReport {
    /// Render as a single preformatted block followed by the echoed metadata.
    pub fn render(&self) -> String {
        let table = if self.files.is_empty() { "No files matched." } else { self.table.trim_end() };
        format!("```\n{table}\n```\nBranch: {}\nCommit: {}", self.branch, self.revision)
    }
}

/// Parse `cloc --by-file` text output.
///
/// Output with no table at all is an empty count; a table without a `SUM:`
/// row, or anything else unrecognized, is malformed.
pub fn parse_by_file(stdout: &str) -> Result<(Vec<FileCount>, Totals), CountToolError> {
    static ROW: OnceLock<Regex> = OnceLock::new();
    let row = ROW.get_or_init(|| {
        Regex::new(r"^(?P<path>\S.*?)\s+(?P<blank>\d+)\s+(?P<comment>\d+)\s+(?P<code>\d+)\s*$")
            .unwrap()
    });
    let mut files = Vec::new();
    let mut totals = None;
    for line in stdout.lines() {
        let Some(caps) = row.captures(line) else {
            continue;
        };
        let number = |name: &str| caps[name].parse::<u64>().unwrap_or_default();
        let (blank, comment, code) = (number("blank"), number("comment"), number("code"));
        if &caps["path"] == "SUM:" {
            totals = Some(Totals { files: 0, blank, comment, code });
        } else {
            files.push(FileCount { path: caps["path"].to_string(), blank, comment, code });
        }
    }
    match totals {
        Some(mut totals) => {
            totals.files = files.len();
            Ok((files, totals))
        }
        None if files.is_empty() && looks_empty(stdout) => Ok((files, Totals::default())),
        None => Err(CountToolError::MalformedOutput(stdout.trim().to_string())),
    }
}

fn looks_empty(stdout: &str) -> bool {
    let stdout = stdout.trim();
    stdout.is_empty()
        || stdout.lines().any(|line| {
            let line = line.trim();
            line.starts_with("0 text files") || line.starts_with("0 files")
        })
}
