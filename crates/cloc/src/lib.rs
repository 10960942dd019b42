//! Framework-aware line counting.
//!
//! A [`PolicyEngine`] resolves the exclusion policy for the detected framework,
//! turns the job scope into a [`ClocQuery`] and parses what the counter prints.

pub mod counter;
pub mod policy;
pub mod query;
pub mod report;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

use std::{path::Path, sync::Arc};

use analyser_core::{models::Scope, process::CommandError};
use thiserror::Error;

pub use crate::{
    counter::{Cloc, LineCounter},
    policy::{PolicyLookupError, PolicyTable},
    query::{ClocQuery, ScopeMode},
    report::{LineCountReport, Totals},
};

#[derive(Error, Debug)]
pub enum CountToolError {
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("unrecognized counter output: {0}")]
    MalformedOutput(String),
}

#[derive(Error, Debug)]
pub enum CountError {
    #[error(transparent)]
    Policy(#[from] PolicyLookupError),
    #[error(transparent)]
    Tool(#[from] CountToolError),
}

pub struct CountRequest<'a> {
    pub policy_key: &'a str,
    pub language: &'a str,
    pub scope: &'a Scope,
    pub branch: &'a str,
    pub revision: &'a str,
}

pub struct PolicyEngine {
    table: PolicyTable,
    counter: Arc<dyn LineCounter>,
}

impl PolicyEngine {
    pub fn new(table: PolicyTable, counter: Arc<dyn LineCounter>) -> Self {
        Self { table, counter }
    }

    pub fn table(&self) -> &PolicyTable { &self.table }

    /// Count the lines selected by `request` in the working copy at `root`.
    ///
    /// Does not modify the working copy.
    pub async fn count(
        &self,
        root: &Path,
        request: CountRequest<'_>,
    ) -> Result<LineCountReport, CountError> {
        let policy = self.table.resolve(request.policy_key, request.language)?;
        let query = ClocQuery::new(policy, request.scope);
        tracing::info!(
            "Counting {} files in {} ({:?})",
            query.extension,
            root.display(),
            query.mode
        );
        let table = self.counter.count(root, &query).await?;
        let (files, totals) = report::parse_by_file(&table)?;
        tracing::info!("Counted {} lines of code in {} files", totals.code, totals.files);
        Ok(LineCountReport {
            table,
            files,
            totals,
            branch: request.branch.to_string(),
            revision: request.revision.to_string(),
        })
    }
}
