use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use analyser_cloc::{Cloc, ClocQuery, CountRequest, PolicyEngine, PolicyTable};
use analyser_core::{message::parse_scope, models::FrameworkKind};
use anyhow::{Context, Result, ensure};
use argp::FromArgs;

use crate::util::{framework, load_sections, native_path};

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// Count lines of code in a checkout the way the bot would.
#[argp(subcommand, name = "count")]
pub struct Args {
    #[argp(positional, from_str_fn(native_path))]
    /// repository root
    path: PathBuf,
    #[argp(option, short = 'l', default = "String::from(\"solidity\")")]
    /// job language (default: solidity)
    language: String,
    #[argp(option, short = 's')]
    /// comma-separated files or directories (default: all)
    scope: Option<String>,
    #[argp(option, short = 'f', from_str_fn(framework))]
    /// exclusion policy to use instead of the detected framework
    framework: Option<FrameworkKind>,
    #[argp(switch)]
    /// list the files that would be counted instead of running cloc
    list: bool,
    #[argp(switch)]
    /// print the report as JSON
    json: bool,
}

pub fn run(args: Args, config: Option<&Path>) -> Result<()> {
    ensure!(args.path.is_dir(), "{} is not a directory", args.path.display());
    let (pipeline, cloc) = load_sections(config)?;
    let scope = parse_scope(args.scope.as_deref(), &pipeline.sentinels.scope);
    let framework =
        args.framework.unwrap_or_else(|| analyser_framework::detect(&args.path).kind);
    let table = PolicyTable::new(cloc.policies.clone());
    let language = args.language.to_lowercase();

    if args.list {
        let policy = table.resolve(framework.as_str(), &language)?;
        let matcher = ClocQuery::new(policy, &scope).matcher().context("Invalid policy")?;
        for file in matcher.select_files(&args.path) {
            println!("{}", file.display());
        }
        return Ok(());
    }

    let engine = PolicyEngine::new(table, Arc::new(Cloc::new(&cloc)));
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?;
    let request = CountRequest {
        policy_key: framework.as_str(),
        language: &language,
        scope: &scope,
        branch: &pipeline.sentinels.branch,
        revision: &pipeline.sentinels.revision,
    };
    let report = runtime.block_on(engine.count(&args.path, request))?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}\nFramework: {framework}", report.render());
    }
    Ok(())
}
