// vidslice-cli/src/main.rs
//
// Command-line interface for the Vidslice segmentation and encoding system.
//
// Responsibilities include:
// - Defining CLI argument structures (`Cli`, `Commands`, per-command args).
// - Parsing user-provided arguments and size strings.
// - Setting up logging according to verbosity flags.
// - Invoking the core probing/segmentation/compression logic.
// - Handling results and errors, including per-input failure isolation.
// - Managing process exit codes based on success or failure.

mod cli;
mod commands;
mod render;

use clap::Parser;
use console::style;
use log::LevelFilter;
use std::process;

fn main() {
    let cli = cli::Cli::parse();

    let level = if cli.quiet {
        LevelFilter::Error
    } else {
        match cli.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    match run(&cli) {
        Ok(0) => {}
        Ok(failures) => {
            eprintln!(
                "{} {failures} input(s) failed",
                style("error:").red().bold()
            );
            process::exit(1);
        }
        Err(e) => {
            eprintln!("{} {e:#}", style("error:").red().bold());
            process::exit(2);
        }
    }
}

/// Dispatches the subcommand; returns the number of inputs that failed.
fn run(cli: &cli::Cli) -> anyhow::Result<usize> {
    match &cli.command {
        cli::Commands::Split(args) => commands::split::run(args),
        cli::Commands::Compress(args) => commands::compress::run(args),
        cli::Commands::Info(args) => commands::info::run(args),
    }
}
