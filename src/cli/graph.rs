//! Graph validation command handler.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use plugin_status::{DependencyGraph, PluginName};

#[derive(Serialize)]
struct GraphReport<'a> {
    plugins: usize,
    roots: Vec<PluginName>,
    order: &'a [PluginName],
    dependents: BTreeMap<&'a str, &'a [PluginName]>,
}

/// Load a graph file, validate it and print roots, order and reverse edges.
pub(crate) fn cmd_graph(path: &Path, json: bool) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read graph file {}", path.display()))?;
    let edges: BTreeMap<PluginName, Vec<PluginName>> =
        serde_json::from_str(&content).context("Graph file must map plugin names to arrays")?;
    let graph = DependencyGraph::build(edges).context("Invalid dependency graph")?;

    let mut dependents = BTreeMap::new();
    for name in graph.plugins() {
        dependents.insert(name.as_str(), graph.dependents(name)?);
    }
    let report = GraphReport {
        plugins: graph.len(),
        roots: graph.roots(),
        order: graph.topological_order(),
        dependents,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("[OK] {} plugins, no cycles", report.plugins);
    println!("Roots: {}", report.roots.join(", "));
    println!("Order: {}", report.order.join(" -> "));
    println!();
    println!("Dependents:");
    for (name, deps) in &report.dependents {
        if deps.is_empty() {
            println!("  {} (none)", name);
        } else {
            println!("  {} <- {}", name, deps.join(", "));
        }
    }
    Ok(())
}
