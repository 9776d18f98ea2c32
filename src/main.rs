mod args;
mod survey;

use clap::Parser;
use log::debug;

use crate::args::Args;

fn main() {
    let args = Args::parse();
    let mut builder = env_logger::Builder::from_default_env();
    if args.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();
    debug!("main: args: {:?}", args);

    if let Err(e) = survey::run_survey(&args) {
        eprintln!("Error: {}", e);
        let mut source = std::error::Error::source(&*e);
        while let Some(s) = source {
            eprintln!("  caused by: {}", s);
            source = s.source();
        }
        std::process::exit(1);
    }
}
