//! Shared helper functions for CLI commands
//!
//! Opening the snapshot, and turning [`NodeView`] snapshots into text. All
//! rendering lives here; the core only hands out views.

use console::{style, StyledObject};
use miette::{IntoDiagnostic, Result};
use std::sync::Arc;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::config::Config;
use crate::core::loader::{is_leaf, HierarchyLoader};
use crate::core::{
    spawn_build, CancelToken, DisplayCategory, EagerHierarchyBuilder, ErrorInfo, LazyTree, LoadState,
    NodeKind, NodeView, RootKey, SqliteExecutor, TreeMode, Truncation,
};

/// Truncate a string to max_len characters, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Open the snapshot named by `--database` or the config, and wrap it in a loader
pub fn open_loader(global: &GlobalOpts, config: &Config, mode: TreeMode) -> Result<HierarchyLoader> {
    let path = global
        .database
        .clone()
        .or_else(|| config.database.clone())
        .ok_or_else(|| {
            miette::miette!("No snapshot database configured. Pass --database or set OLT_DATABASE.")
        })?;

    let executor = SqliteExecutor::open(&path)
        .map_err(|e| miette::miette!("Cannot open snapshot {}: {}", path.display(), e))?;

    Ok(HierarchyLoader::new(Arc::new(executor))
        .with_mode(mode)
        .with_filter(config.view_filter()))
}

/// How much of a hierarchy a command materializes
#[derive(Debug, Clone, Default)]
pub struct Materialize {
    pub max_depth: u32,
    /// Build everything up to the depth bound
    pub all: bool,
    /// `>`-separated formatted keys to expand below the root
    pub expand: Option<String>,
    pub row_budget: usize,
}

/// Load the hierarchy under `root` and return its view
///
/// Without `all`, only the root's children are loaded, plus the nodes named
/// by `expand`. Load failures are reported on stderr and left in the view as
/// error nodes.
pub fn materialize(
    loader: HierarchyLoader,
    root: RootKey,
    opts: &Materialize,
    global: &GlobalOpts,
) -> Result<NodeView> {
    if opts.all {
        let builder = EagerHierarchyBuilder::new(loader).with_row_budget(opts.row_budget);
        let build = spawn_build(builder, root, opts.max_depth, CancelToken::new())
            .join()
            .map_err(|_| miette::miette!("Hierarchy build thread panicked"))?
            .into_diagnostic()?;
        if build.truncated && !global.quiet {
            eprintln!(
                "{} hierarchy truncated at depth {} or after {} nodes",
                style("!").yellow(),
                opts.max_depth,
                opts.row_budget
            );
        }
        return build.view().into_diagnostic();
    }

    let mut tree = LazyTree::open(loader, &root, opts.max_depth).into_diagnostic()?;
    let mut targets = vec![tree.root_id()];
    if let Some(path) = &opts.expand {
        let segments: Vec<&str> = path
            .split('>')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        for depth in 0..segments.len() {
            // parents along the path must be loaded before their children can be found
            for id in targets.drain(..) {
                report(tree.expand(id).into_diagnostic()?.error, global);
            }
            let id = tree.find(&segments[..=depth]).ok_or_else(|| {
                miette::miette!("No child '{}' under {}", segments[depth], segments[..depth].join(" > "))
            })?;
            targets.push(id);
        }
    }
    for id in targets {
        report(tree.expand(id).into_diagnostic()?.error, global);
    }
    tree.view().into_diagnostic()
}

fn report(error: Option<ErrorInfo>, global: &GlobalOpts) {
    if let Some(info) = error {
        if !global.quiet {
            eprintln!(
                "{} failed to load children of {}: {}",
                style("!").red(),
                info.identity,
                info.message
            );
        }
    }
}

fn paint(text: String, category: DisplayCategory) -> StyledObject<String> {
    match category {
        DisplayCategory::Blue => style(text).blue(),
        DisplayCategory::Red => style(text).red(),
        DisplayCategory::Black => style(text),
        DisplayCategory::Gray => style(text).dim(),
    }
}

/// One line of text for a node, without tree connectors
pub fn node_line(view: &NodeView, mode: TreeMode) -> String {
    if view.kind == NodeKind::Error {
        return paint(
            format!("{}: {}", view.label, view.description),
            view.category,
        )
        .to_string();
    }

    let mut text = match (view.kind, &view.status) {
        (NodeKind::WorkOrderRoot, Some(status)) => format!("{} {}", status, view.label),
        _ => view.label.clone(),
    };
    // requirement descriptions repeat the label; print the text once
    let redundant =
        view.label.contains(&view.description) || view.description.contains(&view.label);
    if !view.description.is_empty() && !redundant {
        text.push_str(" - ");
        text.push_str(&view.description);
    }

    let mut line = paint(text, view.category).to_string();
    if let Some(qty) = &view.quantity {
        line.push_str(&format!("  {}", style(qty).cyan()));
    }
    if let Some(dates) = &view.dates {
        line.push_str(&format!("  {}", style(dates).dim()));
    }
    if view.kind == NodeKind::Job {
        if let Some(notes) = &view.notes {
            line.push_str(&format!("  ({})", notes));
        }
    }

    match view.truncation {
        Some(Truncation::Depth) => line.push_str(&format!(" {}", style("[depth limit]").yellow())),
        Some(Truncation::Cycle) => line.push_str(&format!(" {}", style("[cycle]").yellow())),
        None => {}
    }
    if view.state == LoadState::NotAttempted && view.truncation.is_none() && !is_leaf(view.kind, mode)
    {
        line.push_str(&format!(" {}", style("[+]").dim()));
    }
    line
}

/// Indented tree of `view` and everything loaded below it
pub fn render_tree(view: &NodeView, mode: TreeMode) -> String {
    let mut output = node_line(view, mode);
    output.push('\n');
    render_children(&mut output, &view.children, "", mode);
    output
}

fn render_children(output: &mut String, children: &[NodeView], prefix: &str, mode: TreeMode) {
    for (i, child) in children.iter().enumerate() {
        let is_last = i + 1 == children.len();
        let branch = if is_last { "└─ " } else { "├─ " };
        output.push_str(prefix);
        output.push_str(branch);
        output.push_str(&node_line(child, mode));
        output.push('\n');

        let next = format!("{}{}", prefix, if is_last { "   " } else { "│  " });
        render_children(output, &child.children, &next, mode);
    }
}

/// Print a view in the requested format
pub fn print_view(view: &NodeView, global: &GlobalOpts, mode: TreeMode) -> Result<()> {
    match global.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(view).into_diagnostic()?);
        }
        OutputFormat::Tree => {
            print!("{}", render_tree(view, mode));
            if !global.quiet {
                println!();
                println!("{} nodes shown", style(view.count()).cyan());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(kind: NodeKind, label: &str, children: Vec<NodeView>) -> NodeView {
        NodeView {
            kind,
            category: kind.category(),
            key: label.to_string(),
            label: label.to_string(),
            description: String::new(),
            quantity: None,
            dates: None,
            status: None,
            notes: None,
            depth: 0,
            state: if children.is_empty() {
                LoadState::NotAttempted
            } else {
                LoadState::LoadedNonEmpty
            },
            truncation: None,
            error: None,
            children,
        }
    }

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("short", 10), "short");
        assert_eq!(truncate_str("a much longer string", 10), "a much ...");
        assert_eq!(truncate_str("ÄÖÜÄÖÜÄÖÜÄÖÜ", 6), "ÄÖÜ...");
    }

    #[test]
    fn test_render_tree_connectors() {
        console::set_colors_enabled(false);
        let tree = view(
            NodeKind::Job,
            "J1",
            vec![
                view(
                    NodeKind::Assembly,
                    "00/0 GB-1",
                    vec![view(NodeKind::Purchased, "01/1 BRG", vec![])],
                ),
                view(NodeKind::Manufactured, "00/1 SH-1", vec![]),
            ],
        );
        let text = render_tree(&tree, TreeMode::Simplified);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "J1");
        assert_eq!(lines[1], "├─ 00/0 GB-1");
        assert_eq!(lines[2], "│  └─ 01/1 BRG");
        assert_eq!(lines[3], "└─ 00/1 SH-1");
    }

    #[test]
    fn test_unloaded_and_truncated_markers() {
        console::set_colors_enabled(false);
        let mut assembly = view(NodeKind::Assembly, "00/0 GB-1", vec![]);
        assert!(node_line(&assembly, TreeMode::Simplified).ends_with("[+]"));

        assembly.state = LoadState::LoadedEmpty;
        assembly.truncation = Some(Truncation::Depth);
        assert!(node_line(&assembly, TreeMode::Simplified).ends_with("[depth limit]"));
    }

    #[test]
    fn test_error_line() {
        console::set_colors_enabled(false);
        let info = ErrorInfo {
            identity: "job J1".to_string(),
            message: "boom".to_string(),
            retryable: true,
        };
        let mut node = view(NodeKind::Error, "Error loading children", vec![]);
        node.description = info.message.clone();
        node.error = Some(info);
        assert_eq!(
            node_line(&node, TreeMode::Simplified),
            "Error loading children: boom"
        );
    }
}
