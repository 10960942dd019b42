use std::path::PathBuf;

use anyhow::{Result, ensure};
use argp::FromArgs;

use crate::util::native_path;

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// Detect the build framework of a checkout.
#[argp(subcommand, name = "detect")]
pub struct Args {
    #[argp(positional, from_str_fn(native_path))]
    /// repository root
    path: PathBuf,
}

pub fn run(args: Args) -> Result<()> {
    ensure!(args.path.is_dir(), "{} is not a directory", args.path.display());
    let profile = analyser_framework::detect(&args.path);
    println!("{}", profile.kind);
    Ok(())
}
