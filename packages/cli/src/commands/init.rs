use crate::config::{Config, DEFAULT_CONFIG_NAME};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use hierarchy_document::{default_tree, encode};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Framework name, used for the root library
    #[arg(short, long)]
    pub name: Option<String>,

    /// Hierarchy document to create
    #[arg(short, long, default_value = "hierarchy.bpmn")]
    pub document: String,

    /// Force overwrite existing config
    #[arg(short, long)]
    pub force: bool,
}

pub fn init(args: InitArgs, cwd: &str) -> Result<()> {
    let config_path = PathBuf::from(cwd).join(DEFAULT_CONFIG_NAME);

    if config_path.exists() && !args.force {
        println!(
            "{} {} already exists",
            "⚠️".yellow(),
            DEFAULT_CONFIG_NAME.bright_white()
        );
        println!("Use --force to overwrite");
        return Ok(());
    }

    println!("{}", "📝 Initializing library hierarchy...".bright_blue().bold());

    let config = Config {
        document: args.document.clone(),
        framework_name: args.name.clone(),
        ..Config::default()
    };

    // An existing document is never replaced, even with --force.
    let document_path = config.get_document_path(cwd);
    if !document_path.exists() {
        if let Some(parent) = document_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let document = encode(&default_tree(config.root_name()))?;
        fs::write(&document_path, document)?;
        println!("  {} Created {}", "✓".green(), args.document);
    }

    let config_json = serde_json::to_string_pretty(&config)?;
    fs::write(&config_path, config_json)?;
    println!("  {} Created {}", "✓".green(), DEFAULT_CONFIG_NAME);

    println!();
    println!("{}", "✅ Hierarchy initialized!".green().bold());
    println!();
    println!("Next steps:");
    println!("  1. Run: hierarchy tree");
    println!("  2. Run: hierarchy watch");

    Ok(())
}
