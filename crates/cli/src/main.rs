mod cmd;
mod util;

use std::path::PathBuf;

use argp::FromArgs;
use tracing_subscriber::{EnvFilter, filter::LevelFilter};

use crate::util::native_path;

#[derive(FromArgs, PartialEq, Debug)]
/// Offline tools for the repository analyser.
struct TopLevel {
    #[argp(subcommand)]
    command: SubCommand,
    #[argp(option, short = 'c', from_str_fn(native_path))]
    /// config file (default: built-in defaults)
    config: Option<PathBuf>,
    #[argp(switch, short = 'v')]
    /// print debug logs
    verbose: bool,
}

#[derive(FromArgs, PartialEq, Debug)]
#[argp(subcommand)]
enum SubCommand {
    Parse(cmd::parse::Args),
    Detect(cmd::detect::Args),
    Count(cmd::count::Args),
}

fn main() {
    let args: TopLevel = argp::parse_args_or_exit(argp::DEFAULT);
    let default_level = if args.verbose { LevelFilter::DEBUG } else { LevelFilter::WARN };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::builder().with_default_directive(default_level.into()).from_env_lossy(),
        )
        .init();

    let config = args.config.as_deref();
    let result = match args.command {
        SubCommand::Parse(c_args) => cmd::parse::run(c_args, config),
        SubCommand::Detect(c_args) => cmd::detect::run(c_args),
        SubCommand::Count(c_args) => cmd::count::run(c_args, config),
    };
    if let Err(e) = result {
        eprintln!("Failed: {e:?}");
        std::process::exit(1);
    }
}
