mod cli;
mod commands;

use cli::{CacheAction, Cli, Command};
use clap::Parser;
use colored::*;
use teto::error::TetoResult;

fn main() {
    let cli = Cli::parse();
    teto::config::init_logging();

    if let Err(e) = run(cli) {
        eprintln!("{} {}", "error:".red().bold(), e);
        if let Some(hint) = e.hint() {
            eprintln!("{} {}", "hint:".yellow().bold(), hint);
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> TetoResult<()> {
    match cli.command {
        Command::Compile { script, output_dir } => commands::compile::run(&script, &output_dir),
        Command::Render {
            script,
            output_dir,
            max_workers,
            verbose,
        } => commands::render::run(&script, &output_dir, max_workers, verbose),
        Command::Cache { action } => match action {
            CacheAction::Info => commands::cache::info(),
            CacheAction::Clear { older_than_days } => commands::cache::clear(older_than_days),
        },
    }
}
