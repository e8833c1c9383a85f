use super::{document_path, load_tree};
use crate::config::Config;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use hierarchy_document::{validate, HierarchyTree, LibraryNode};
use std::collections::HashSet;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct TreeArgs {
    /// Hierarchy document, defaults to the configured one
    pub input: Option<PathBuf>,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    pub format: String,
}

pub fn tree(args: TreeArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let path = document_path(args.input, &config, cwd);
    let tree = load_tree(&path, config.root_name())?;

    if args.format == "json" {
        let nodes: Vec<&LibraryNode> = tree.nodes().collect();
        let edges: Vec<_> = tree.edges().collect();
        let json = serde_json::json!({ "libraries": nodes, "connections": edges });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    print!("{}", render_tree(&tree));
    print_violations(&tree);
    Ok(())
}

/// Warn about every library that breaks a save-time rule
pub fn print_violations(tree: &HierarchyTree) {
    for violation in validate(tree).violations {
        println!(
            "  {} [{}] {}",
            "error".red().bold(),
            violation.library_id,
            violation.message
        );
    }
}

/// Draw the hierarchy with box-drawing guides.
///
/// Libraries without a parent start their own tree, the root first. A
/// library with several parents is drawn under each of them, and a cycle is
/// cut where it would repeat an ancestor.
pub fn render_tree(tree: &HierarchyTree) -> String {
    let mut out = String::new();
    let mut seen = HashSet::new();
    let mut path = Vec::new();

    let tops = tree
        .nodes()
        .filter(|node| tree.parent_ids(&node.id).is_empty());
    for node in tops {
        render_node(tree, node, "", None, &mut path, &mut seen, &mut out);
    }

    // Libraries only reachable through a cycle
    for node in tree.nodes() {
        if !seen.contains(node.id.as_str()) {
            render_node(tree, node, "", None, &mut path, &mut seen, &mut out);
        }
    }

    out
}

fn render_node<'a>(
    tree: &'a HierarchyTree,
    node: &'a LibraryNode,
    prefix: &str,
    last: Option<bool>,
    path: &mut Vec<&'a str>,
    seen: &mut HashSet<&'a str>,
    out: &mut String,
) {
    let guide = match last {
        None => "",
        Some(true) => "└── ",
        Some(false) => "├── ",
    };

    if path.contains(&node.id.as_str()) {
        out.push_str(&format!("{}{}{} [{}] (cycle)\n", prefix, guide, node.name, node.id));
        return;
    }
    out.push_str(&format!("{}{}{} [{}]\n", prefix, guide, node.name, node.id));
    seen.insert(node.id.as_str());

    let child_prefix = match last {
        None => prefix.to_string(),
        Some(true) => format!("{}    ", prefix),
        Some(false) => format!("{}│   ", prefix),
    };

    path.push(node.id.as_str());
    let children = tree.children(&node.id);
    let count = children.len();
    for (i, child) in children.into_iter().enumerate() {
        render_node(tree, child, &child_prefix, Some(i + 1 == count), path, seen, out);
    }
    path.pop();
}
