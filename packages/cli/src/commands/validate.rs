use super::{document_path, load_tree};
use crate::config::Config;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use hierarchy_document::validate as validate_tree;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Document or directory to check, defaults to the configured document
    pub input: Option<PathBuf>,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    pub format: String,
}

/// Result of checking one file
#[derive(Debug, Default, PartialEq)]
pub struct FileReport {
    pub violations: usize,
    pub unreadable: bool,
}

impl FileReport {
    fn failed(&self) -> bool {
        self.unreadable || self.violations > 0
    }
}

pub fn validate(args: ValidateArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let input = document_path(args.input, &config, cwd);
    let json = args.format == "json";

    let files = if input.is_file() {
        vec![input]
    } else if input.is_dir() {
        find_documents(&input)
    } else {
        return Err(anyhow::anyhow!(
            "Input path does not exist: {}",
            input.display()
        ));
    };

    if !json {
        println!("🔍 {} library hierarchy", "Validating".green().bold());
        println!("   Found {} document(s)", files.len());
        println!();
    }

    let mut failed = 0;
    for file in &files {
        if check_file(file, config.root_name(), json)?.failed() {
            failed += 1;
        }
    }

    if !json {
        println!();
        if failed == 0 {
            println!("   {} No issues found!", "✓".green());
        }
    }

    if failed > 0 {
        return Err(anyhow::anyhow!("{} document(s) failed validation", failed));
    }
    Ok(())
}

pub fn check_file(path: &Path, root_name: &str, json: bool) -> Result<FileReport> {
    let tree = match load_tree(path, root_name) {
        Ok(tree) => tree,
        Err(err) => {
            if json {
                let output = serde_json::json!({
                    "file": path.display().to_string(),
                    "valid": false,
                    "error": format!("{:#}", err),
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                eprintln!("{} {:#}", "✗".red(), err);
            }
            return Ok(FileReport {
                violations: 0,
                unreadable: true,
            });
        }
    };

    let report = validate_tree(&tree);

    if json {
        let output = serde_json::json!({
            "file": path.display().to_string(),
            "valid": report.is_valid(),
            "violations": report.violations,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if report.is_valid() {
        println!("{} {}", "✓".green(), path.display());
    } else {
        println!("{}", path.display());
        for violation in &report.violations {
            println!(
                "  {} [{}] {}",
                "error".red().bold(),
                violation.library_id,
                violation.message
            );
        }
    }

    Ok(FileReport {
        violations: report.violations.len(),
        unreadable: false,
    })
}

fn find_documents(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|entry| entry.into_path())
        .filter(|path| path.is_file() && path.extension().map(|e| e == "bpmn").unwrap_or(false))
        .collect()
}
