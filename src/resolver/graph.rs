//! Resolved dependency graph

use crate::index::PackageInterface;
use crate::settings::{Settings, SettingsDigest};
use semver::Version;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Unique key of a node: name, version and the digest of the settings
/// subset the package is sensitive to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageKey {
    pub name: String,
    pub version: Version,
    pub settings: SettingsDigest,
}

impl fmt::Display for PackageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.name, self.version, self.settings.short())
    }
}

/// One resolved package
#[derive(Debug, Clone)]
pub struct PackageNode {
    pub name: String,
    pub version: Version,

    /// Settings restricted to the axes this package declared
    pub settings: Settings,

    /// Direct dependencies by name, in declaration order
    pub requires: Vec<String>,

    pub interface: PackageInterface,

    /// Name of the index source the version was taken from
    pub source: String,

    /// Breadth-first level at which the package was first reached (0 = direct)
    pub depth: usize,
}

impl PackageNode {
    pub fn key(&self) -> PackageKey {
        PackageKey {
            name: self.name.clone(),
            version: self.version.clone(),
            settings: self.settings.digest(),
        }
    }

    /// `name/version` reference
    pub fn reference(&self) -> String {
        format!("{}/{}", self.name, self.version)
    }
}

/// A conflict-free, acyclic set of packages.
///
/// Read-only once built. Nodes keep the breadth-first order in which they
/// were resolved, so iteration is deterministic.
#[derive(Debug, Clone, Default)]
pub struct ResolvedGraph {
    nodes: Vec<PackageNode>,
    roots: Vec<String>,
}

impl ResolvedGraph {
    pub(crate) fn new(nodes: Vec<PackageNode>, roots: Vec<String>) -> Self {
        Self { nodes, roots }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Nodes in breadth-first order
    pub fn nodes(&self) -> &[PackageNode] {
        &self.nodes
    }

    /// Names required directly by the recipe
    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    pub fn get(&self, name: &str) -> Option<&PackageNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Nodes with every dependency before its dependents.
    ///
    /// Depth-first post-order over the breadth-first node list, so the order
    /// only depends on the graph contents.
    pub fn topological_order(&self) -> Vec<&PackageNode> {
        let index: HashMap<&str, &PackageNode> =
            self.nodes.iter().map(|n| (n.name.as_str(), n)).collect();
        let mut visited = HashSet::new();
        let mut order = Vec::with_capacity(self.nodes.len());

        fn visit<'a>(
            node: &'a PackageNode,
            index: &HashMap<&str, &'a PackageNode>,
            visited: &mut HashSet<&'a str>,
            order: &mut Vec<&'a PackageNode>,
        ) {
            if !visited.insert(node.name.as_str()) {
                return;
            }
            for dep in &node.requires {
                if let Some(child) = index.get(dep.as_str()) {
                    visit(child, index, visited, order);
                }
            }
            order.push(node);
        }

        for node in &self.nodes {
            visit(node, &index, &mut visited, &mut order);
        }
        order
    }

    /// A cycle in the dependency edges, as a path that starts and ends on
    /// the same name
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Active,
            Done,
        }

        fn walk(
            name: &str,
            graph: &ResolvedGraph,
            marks: &mut HashMap<String, Mark>,
            stack: &mut Vec<String>,
        ) -> Option<Vec<String>> {
            match marks.get(name) {
                Some(Mark::Done) => return None,
                Some(Mark::Active) => {
                    let start = stack.iter().position(|n| n == name).unwrap_or(0);
                    let mut cycle = stack[start..].to_vec();
                    cycle.push(name.to_string());
                    return Some(cycle);
                }
                None => {}
            }
            marks.insert(name.to_string(), Mark::Active);
            stack.push(name.to_string());
            if let Some(node) = graph.get(name) {
                for dep in &node.requires {
                    if let Some(cycle) = walk(dep, graph, marks, stack) {
                        return Some(cycle);
                    }
                }
            }
            stack.pop();
            marks.insert(name.to_string(), Mark::Done);
            None
        }

        let mut marks = HashMap::new();
        for node in &self.nodes {
            let mut stack = Vec::new();
            if let Some(cycle) = walk(&node.name, self, &mut marks, &mut stack) {
                return Some(cycle);
            }
        }
        None
    }

    /// Stable digest of the node keys and edges
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for node in &self.nodes {
            hasher.update(node.key().to_string().as_bytes());
            hasher.update(b" ->");
            for dep in &node.requires {
                hasher.update(b" ");
                hasher.update(dep.as_bytes());
            }
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }
}
