//! Static plugin dependency graph.
//!
//! Built once from `plugin -> direct dependencies`. Construction validates
//! that every dependency is a declared plugin and that the graph is acyclic,
//! then derives the reverse edges (`dependents`) and a deterministic
//! topological order. Nothing changes after [`DependencyGraph::build`].

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::error::{Result, StatusError};
use crate::status::PluginName;

#[derive(Debug, Clone, Default)]
struct Node {
    dependencies: Vec<PluginName>,
    dependents: Vec<PluginName>,
    /// Position in the topological order.
    rank: usize,
}

/// Validated, immutable dependency graph.
///
/// # Example
/// ```
/// use std::collections::BTreeMap;
/// use plugin_status::graph::DependencyGraph;
///
/// let mut edges = BTreeMap::new();
/// edges.insert("a".to_string(), vec![]);
/// edges.insert("b".to_string(), vec!["a".to_string()]);
/// let graph = DependencyGraph::build(edges).unwrap();
/// assert_eq!(graph.roots(), vec!["a".to_string()]);
/// assert_eq!(graph.dependents("a").unwrap(), ["b".to_string()]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeMap<PluginName, Node>,
    order: Vec<PluginName>,
}

impl DependencyGraph {
    /// Validate forward edges and build the graph.
    ///
    /// # Errors
    /// - [`StatusError::UnknownDependency`] for a dependency that is not a key.
    /// - [`StatusError::CyclicDependency`] if the edges contain a cycle.
    pub fn build<I, D>(edges: I) -> Result<Self>
    where
        I: IntoIterator<Item = (PluginName, D)>,
        D: IntoIterator<Item = PluginName>,
    {
        let mut nodes: BTreeMap<PluginName, Node> = BTreeMap::new();
        for (plugin, deps) in edges {
            let mut seen = HashSet::new();
            let dependencies: Vec<PluginName> =
                deps.into_iter().filter(|d| seen.insert(d.clone())).collect();
            nodes.insert(
                plugin,
                Node {
                    dependencies,
                    ..Node::default()
                },
            );
        }

        let mut reverse: BTreeMap<PluginName, Vec<PluginName>> = BTreeMap::new();
        for (plugin, node) in &nodes {
            for dependency in &node.dependencies {
                if !nodes.contains_key(dependency) {
                    return Err(StatusError::UnknownDependency {
                        plugin: plugin.clone(),
                        dependency: dependency.clone(),
                    });
                }
                reverse
                    .entry(dependency.clone())
                    .or_default()
                    .push(plugin.clone());
            }
        }
        for (name, dependents) in reverse {
            if let Some(node) = nodes.get_mut(&name) {
                node.dependents = dependents;
            }
        }

        let order = topological_sort(&nodes)?;
        for (rank, name) in order.iter().enumerate() {
            if let Some(node) = nodes.get_mut(name) {
                node.rank = rank;
            }
        }

        Ok(Self { nodes, order })
    }

    /// Plugins with no dependencies, in name order.
    pub fn roots(&self) -> Vec<PluginName> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.dependencies.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Direct dependencies of `name`, in declaration order.
    pub fn dependencies(&self, name: &str) -> Result<&[PluginName]> {
        self.node(name).map(|node| node.dependencies.as_slice())
    }

    /// Plugins that directly depend on `name`, in name order.
    pub fn dependents(&self, name: &str) -> Result<&[PluginName]> {
        self.node(name).map(|node| node.dependents.as_slice())
    }

    /// Every plugin, each listed after all of its dependencies.
    pub fn topological_order(&self) -> &[PluginName] {
        &self.order
    }

    /// Every plugin reachable from `seeds` along reverse edges.
    ///
    /// A seed is only included if another seed reaches it.
    pub fn transitive_dependents<'a, I>(&self, seeds: I) -> BTreeSet<PluginName>
    where
        I: IntoIterator<Item = &'a PluginName>,
    {
        let mut reached = BTreeSet::new();
        let mut stack: Vec<&PluginName> = Vec::new();
        for seed in seeds {
            if let Some(node) = self.nodes.get(seed) {
                stack.extend(node.dependents.iter());
            }
        }
        while let Some(name) = stack.pop() {
            if reached.insert(name.clone()) {
                if let Some(node) = self.nodes.get(name) {
                    stack.extend(node.dependents.iter());
                }
            }
        }
        reached
    }

    /// Sort `names` into topological order. Unknown names are dropped.
    pub fn in_topological_order<'a, I>(&self, names: I) -> Vec<PluginName>
    where
        I: IntoIterator<Item = &'a PluginName>,
    {
        let mut ranked: Vec<(usize, &PluginName)> = names
            .into_iter()
            .filter_map(|name| self.nodes.get(name).map(|node| (node.rank, name)))
            .collect();
        ranked.sort_by_key(|(rank, _)| *rank);
        ranked.dedup_by_key(|(rank, _)| *rank);
        ranked.into_iter().map(|(_, name)| name.clone()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Every plugin, in name order.
    pub fn plugins(&self) -> impl Iterator<Item = &PluginName> {
        self.nodes.keys()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn node(&self, name: &str) -> Result<&Node> {
        self.nodes
            .get(name)
            .ok_or_else(|| StatusError::UnknownPlugin(name.to_string()))
    }
}

/// Kahn's algorithm over name-ordered nodes, so ties break by name.
fn topological_sort(nodes: &BTreeMap<PluginName, Node>) -> Result<Vec<PluginName>> {
    let mut remaining: BTreeMap<&str, usize> = nodes
        .iter()
        .map(|(name, node)| (name.as_str(), node.dependencies.len()))
        .collect();
    let mut ready: BTreeSet<&str> = remaining
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(name, _)| *name)
        .collect();
    let mut order = Vec::with_capacity(nodes.len());

    while let Some(name) = ready.pop_first() {
        remaining.remove(name);
        order.push(name.to_string());
        for dependent in &nodes[name].dependents {
            if let Some(count) = remaining.get_mut(dependent.as_str()) {
                *count -= 1;
                if *count == 0 {
                    ready.insert(dependent.as_str());
                }
            }
        }
    }

    if remaining.is_empty() {
        Ok(order)
    } else {
        let stuck: BTreeSet<&str> = remaining.keys().copied().collect();
        Err(StatusError::CyclicDependency {
            cycle: find_cycle(nodes, &stuck),
        })
    }
}

/// Walk dependencies inside the nodes Kahn could not order until one repeats.
///
/// Every stuck node has at least one stuck dependency, so the walk always
/// closes a loop.
fn find_cycle(nodes: &BTreeMap<PluginName, Node>, stuck: &BTreeSet<&str>) -> Vec<PluginName> {
    let Some(&start) = stuck.first() else {
        return Vec::new();
    };
    let mut path: Vec<&str> = vec![start];
    let mut current = start;
    loop {
        let next = nodes[current]
            .dependencies
            .iter()
            .map(String::as_str)
            .find(|dep| stuck.contains(dep));
        let Some(next) = next else {
            break;
        };
        if let Some(pos) = path.iter().position(|p| *p == next) {
            let mut cycle: Vec<PluginName> = path[pos..].iter().map(|p| p.to_string()).collect();
            cycle.push(next.to_string());
            return cycle;
        }
        path.push(next);
        current = next;
    }
    path.into_iter().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges(table: &[(&str, &[&str])]) -> Vec<(PluginName, Vec<PluginName>)> {
        table
            .iter()
            .map(|(name, deps)| {
                (
                    name.to_string(),
                    deps.iter().map(|d| d.to_string()).collect(),
                )
            })
            .collect()
    }

    fn diamond() -> DependencyGraph {
        DependencyGraph::build(edges(&[
            ("a", &[]),
            ("b", &["a"]),
            ("c", &["a"]),
            ("d", &["b", "c"]),
        ]))
        .unwrap()
    }

    #[test]
    fn test_dependents_are_inverse_of_dependencies() {
        let graph = diamond();
        assert_eq!(graph.dependents("a").unwrap(), ["b", "c"]);
        assert_eq!(graph.dependents("b").unwrap(), ["d"]);
        assert!(graph.dependents("d").unwrap().is_empty());
        assert_eq!(graph.dependencies("d").unwrap(), ["b", "c"]);
    }

    #[test]
    fn test_roots() {
        let graph = DependencyGraph::build(edges(&[("x", &[]), ("y", &["x"]), ("w", &[])])).unwrap();
        assert_eq!(graph.roots(), vec!["w", "x"]);
    }

    #[test]
    fn test_unknown_dependency_rejected() {
        let err = DependencyGraph::build(edges(&[("a", &["ghost"])])).unwrap_err();
        match err {
            StatusError::UnknownDependency { plugin, dependency } => {
                assert_eq!(plugin, "a");
                assert_eq!(dependency, "ghost");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_plugin_query() {
        let graph = diamond();
        assert!(matches!(
            graph.dependencies("nope"),
            Err(StatusError::UnknownPlugin(name)) if name == "nope"
        ));
        assert!(graph.dependents("nope").is_err());
    }

    #[test]
    fn test_cycle_rejected_with_path() {
        let err = DependencyGraph::build(edges(&[("a", &["b"]), ("b", &["c"]), ("c", &["a"])]))
            .unwrap_err();
        match err {
            StatusError::CyclicDependency { cycle } => {
                assert_eq!(cycle.first(), cycle.last());
                assert_eq!(cycle.len(), 4);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_self_dependency_is_cycle() {
        let err = DependencyGraph::build(edges(&[("a", &["a"])])).unwrap_err();
        assert!(matches!(err, StatusError::CyclicDependency { cycle } if cycle == ["a", "a"]));
    }

    #[test]
    fn test_cycle_behind_acyclic_prefix() {
        let err = DependencyGraph::build(edges(&[
            ("root", &[]),
            ("p", &["root", "q"]),
            ("q", &["p"]),
        ]))
        .unwrap_err();
        match err {
            StatusError::CyclicDependency { cycle } => {
                assert!(!cycle.contains(&"root".to_string()));
                assert_eq!(cycle.first(), cycle.last());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_dependencies_collapse() {
        let graph = DependencyGraph::build(edges(&[("a", &[]), ("b", &["a", "a"])])).unwrap();
        assert_eq!(graph.dependencies("b").unwrap(), ["a"]);
        assert_eq!(graph.dependents("a").unwrap(), ["b"]);
    }

    #[test]
    fn test_topological_order_respects_edges() {
        let graph = diamond();
        let order = graph.topological_order();
        let pos = |n: &str| order.iter().position(|x| x == n).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("a") < pos("c"));
        assert!(pos("b") < pos("d"));
        assert!(pos("c") < pos("d"));
        assert_eq!(order, ["a", "b", "c", "d"]);
    }

    #[test]
    fn test_transitive_dependents() {
        let graph = diamond();
        let from_a: Vec<_> = graph
            .transitive_dependents([&"a".to_string()])
            .into_iter()
            .collect();
        assert_eq!(from_a, vec!["b", "c", "d"]);
        let from_b: Vec<_> = graph
            .transitive_dependents([&"b".to_string()])
            .into_iter()
            .collect();
        assert_eq!(from_b, vec!["d"]);
    }

    #[test]
    fn test_in_topological_order_sorts_and_dedups() {
        let graph = diamond();
        let names = vec!["d".to_string(), "a".to_string(), "d".to_string()];
        assert_eq!(graph.in_topological_order(&names), vec!["a", "d"]);
    }

    #[test]
    fn test_empty_graph() {
        let graph = DependencyGraph::build(Vec::<(PluginName, Vec<PluginName>)>::new()).unwrap();
        assert!(graph.is_empty());
        assert!(graph.roots().is_empty());
    }
}
