use super::{document_path, load_tree};
use crate::config::Config;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use hierarchy_document::export as export_tree;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Hierarchy document, defaults to the configured one
    pub input: Option<PathBuf>,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    pub out_dir: PathBuf,

    /// Framework name for the file name, defaults to the configured one
    #[arg(short, long)]
    pub name: Option<String>,
}

pub fn export(args: ExportArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let input = document_path(args.input, &config, cwd);
    let out_dir = PathBuf::from(cwd).join(&args.out_dir);
    let name = args.name.or_else(|| config.framework_name.clone());

    let written = export_to(&input, &out_dir, name.as_deref(), config.root_name())?;
    println!("  {} {}", "✓".green(), written.display());
    Ok(())
}

/// Re-encode `input` and write it under its export name in `out_dir`
pub fn export_to(
    input: &Path,
    out_dir: &Path,
    framework_name: Option<&str>,
    root_name: &str,
) -> Result<PathBuf> {
    let tree = load_tree(input, root_name)?;
    let blob = export_tree(&tree, framework_name)?;

    fs::create_dir_all(out_dir)?;
    let path = out_dir.join(blob.file_name());
    fs::write(&path, &blob.contents)?;
    Ok(path)
}
