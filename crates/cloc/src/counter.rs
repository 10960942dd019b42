use std::{path::Path, time::Duration};

use analyser_core::{
    config::ClocConfig,
    process::{CommandSpec, run_checked},
};
use async_trait::async_trait;

use crate::{CountToolError, query::ClocQuery};

/// Produces a per-file line count table for a query run in `root`.
#[async_trait]
pub trait LineCounter: Send + Sync {
    async fn count(&self, root: &Path, query: &ClocQuery) -> Result<String, CountToolError>;
}

/// The `cloc` binary.
pub struct Cloc {
    binary: String,
    timeout: Duration,
}

impl Cloc {
    pub fn new(config: &ClocConfig) -> Self {
        Self { binary: config.binary.clone(), timeout: config.timeout() }
    }
}

#[async_trait]
impl LineCounter for Cloc {
    async fn count(&self, root: &Path, query: &ClocQuery) -> Result<String, CountToolError> {
        let spec = CommandSpec::new(&self.binary, root, self.timeout).args(query.args());
        let output = run_checked(&spec).await?;
        Ok(output.stdout)
    }
}
