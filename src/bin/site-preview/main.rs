use clap::Parser as _;
use proc_exit::prelude::*;

mod args;
mod error;
mod serve;

fn main() {
    human_panic::setup_panic!();
    let result = run();
    proc_exit::exit(result);
}

fn run() -> proc_exit::ExitResult {
    // clap handles `--help`, `--version`, and usage errors itself
    let args = args::Args::parse();
    args::init_logging(args.verbose.log_level_filter());

    args.run().with_code(proc_exit::Code::FAILURE)?;

    Ok(())
}
