use std::path::PathBuf;

use analyser_core::message::{mentions_tracked_language, parse_job};
use anyhow::{Context, Result};
use argp::FromArgs;

use crate::util::{load_sections, native_path, read_input};

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// Parse a job message and print the resulting job as JSON.
#[argp(subcommand, name = "parse")]
pub struct Args {
    #[argp(positional, from_str_fn(native_path))]
    /// message file, or - for stdin
    input: PathBuf,
}

pub fn run(args: Args, config: Option<&std::path::Path>) -> Result<()> {
    let (pipeline, _) = load_sections(config)?;
    let text = read_input(&args.input)?;
    if !mentions_tracked_language(&text, &pipeline.tracked_languages) {
        tracing::warn!(
            "Message mentions none of {:?}; the bot would ignore it",
            pipeline.tracked_languages
        );
    }
    let job = parse_job(&text, &pipeline.sentinels).context("Failed to parse message")?;
    println!("{}", serde_json::to_string_pretty(&job)?);
    Ok(())
}
