mod commands;
mod config;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{
    export, init, tree, validate, watch, ExportArgs, InitArgs, TreeArgs, ValidateArgs, WatchArgs,
};

/// Library hierarchy tools
#[derive(Parser, Debug)]
#[command(name = "hierarchy")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a config file and a default hierarchy document
    Init(InitArgs),

    /// Check hierarchy documents for multiple parents
    Validate(ValidateArgs),

    /// Print a hierarchy as a tree
    Tree(TreeArgs),

    /// Write a hierarchy under its export file name
    Export(ExportArgs),

    /// Re-import a hierarchy document whenever it changes
    Watch(WatchArgs),
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let cwd = match std::env::current_dir() {
        Ok(dir) => dir.display().to_string(),
        Err(err) => {
            eprintln!("{} Cannot get current directory: {}", "Error:".red().bold(), err);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Command::Init(args) => init(args, &cwd),
        Command::Validate(args) => validate(args, &cwd),
        Command::Tree(args) => tree(args, &cwd),
        Command::Export(args) => export(args, &cwd),
        Command::Watch(args) => watch(args, &cwd),
    };

    if let Err(err) = result {
        eprintln!();
        eprintln!("{} {}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
