use super::{document_path, load_tree};
use super::tree::{print_violations, render_tree};
use crate::config::Config;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use hierarchy_workspace::{DocumentWatcher, FileHost, HostEvent, SessionDriver, SessionUpdate};
use std::path::{Path, PathBuf};
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Hierarchy document, defaults to the configured one
    pub input: Option<PathBuf>,
}

pub fn watch(args: WatchArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let path = document_path(args.input, &config, cwd);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(path, config))
}

async fn run(path: PathBuf, config: Config) -> Result<()> {
    let host = FileHost::new(&path);
    let document = host.read()?;

    println!("👀 {} {}", "Watching".green().bold(), path.display());
    println!();
    show(&path, &config);

    let root_name = config.root_name().to_string();
    let (handle, task) = SessionDriver::spawn(
        config.session.clone(),
        host,
        document.as_deref(),
        config.framework_name.as_deref(),
    );
    let mut updates = handle.subscribe();

    let watcher = DocumentWatcher::new(&path)?;
    let forward = handle.clone();
    std::thread::spawn(move || watcher.forward(forward));

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(SessionUpdate::Imported { .. }) => {
                    println!("{} {}", "↻".blue(), path.display());
                    show_tree(&path, &root_name);
                }
                Ok(SessionUpdate::ImportRejected { reason }) => {
                    println!("{} Kept the last good hierarchy: {}", "⚠️".yellow(), reason);
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Missed session updates"),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    handle.send(HostEvent::Shutdown).await.ok();
    task.await?;
    Ok(())
}

fn show(path: &Path, config: &Config) {
    if path.exists() {
        show_tree(path, config.root_name());
    } else {
        println!("   {} does not exist yet", path.display());
    }
}

fn show_tree(path: &Path, root_name: &str) {
    match load_tree(path, root_name) {
        Ok(tree) => {
            print!("{}", render_tree(&tree));
            print_violations(&tree);
            println!();
        }
        Err(err) => eprintln!("{} {:#}", "✗".red(), err),
    }
}
