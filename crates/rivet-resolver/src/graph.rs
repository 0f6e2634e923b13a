//! Target graph construction and traversal.

use std::collections::BTreeMap;
use std::fmt;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use rivet_core::config::ConflictPolicy;
use rivet_core::dependency::AssetFlags;
use rivet_core::framework::Framework;
use rivet_core::package::{PackageId, PackageIdentity};
use rivet_core::version::{PackageVersion, VersionRange};

use crate::conflict::ConflictReport;
use crate::failure::{ProviderFailureKind, RestoreFailure};

/// What the walker decided for one dependency entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disposition {
    Accepted,
    RejectedCycle,
    RejectedDowngradePrevented,
    RejectedVersionConflict,
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Disposition::Accepted => "accepted",
            Disposition::RejectedCycle => "rejected-cycle",
            Disposition::RejectedDowngradePrevented => "rejected-downgrade-prevented",
            Disposition::RejectedVersionConflict => "rejected-version-conflict",
        })
    }
}

/// One dependency entry in a target graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    /// The id as written by the declaring package.
    pub requested_id: PackageId,
    pub range: VersionRange,
    /// `None` when unresolved or rejected.
    pub identity: Option<PackageIdentity>,
    pub depth: usize,
    pub disposition: Disposition,
    /// Intersection of edge flags along the path from the root.
    pub flags: AssetFlags,
    /// Flags of the declaring edge alone.
    pub edge_flags: AssetFlags,
    pub failure: Option<ProviderFailureKind>,
}

impl GraphNode {
    pub fn new(requested_id: PackageId, range: VersionRange, depth: usize, flags: AssetFlags) -> Self {
        Self {
            requested_id,
            range,
            identity: None,
            depth,
            disposition: Disposition::Accepted,
            flags,
            edge_flags: flags,
            failure: None,
        }
    }

    pub fn version(&self) -> Option<&PackageVersion> {
        self.identity.as_ref().map(|i| &i.version)
    }

    pub fn is_accepted(&self) -> bool {
        self.disposition == Disposition::Accepted
    }
}

impl fmt::Display for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.identity {
            Some(identity) => write!(f, "{} {}", identity.id, identity.version),
            None => write!(f, "{} ({})", self.requested_id, self.range.pretty()),
        }
    }
}

/// Edge label: position of the child among its parent's declared dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepEdge {
    pub ordinal: usize,
}

/// A dependency tree for one target, backed by a petgraph arena.
///
/// Node 0 is the project. Every other node has exactly one parent.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<GraphNode, DepEdge>,
    root: NodeIndex,
    /// Package id → the winning node for that id.
    winners: BTreeMap<PackageId, NodeIndex>,
}

impl DependencyGraph {
    pub fn new(project: &str) -> Self {
        let mut graph = DiGraph::new();
        let root = graph.add_node(GraphNode::new(
            PackageId::new(project),
            VersionRange::all(),
            0,
            AssetFlags::ALL,
        ));
        Self {
            graph,
            root,
            winners: BTreeMap::new(),
        }
    }

    pub fn root(&self) -> NodeIndex {
        self.root
    }

    /// The project name.
    pub fn project(&self) -> &PackageId {
        &self.graph[self.root].requested_id
    }

    /// Append `node` as the next child of `parent`.
    pub fn add_child(&mut self, parent: NodeIndex, node: GraphNode) -> NodeIndex {
        let ordinal = self
            .graph
            .edges_directed(parent, Direction::Outgoing)
            .count();
        let idx = self.graph.add_node(node);
        self.graph.add_edge(parent, idx, DepEdge { ordinal });
        idx
    }

    pub fn node(&self, idx: NodeIndex) -> &GraphNode {
        &self.graph[idx]
    }

    pub(crate) fn node_mut(&mut self, idx: NodeIndex) -> &mut GraphNode {
        &mut self.graph[idx]
    }

    pub(crate) fn set_winner(&mut self, id: PackageId, idx: NodeIndex) {
        self.winners.insert(id, idx);
    }

    /// The winning node for `id`.
    pub fn winner(&self, id: &PackageId) -> Option<NodeIndex> {
        self.winners.get(id).copied()
    }

    /// Winning nodes keyed by id, in id order.
    pub fn winners(&self) -> impl Iterator<Item = (&PackageId, NodeIndex)> {
        self.winners.iter().map(|(id, idx)| (id, *idx))
    }

    /// Resolved packages (winners with an identity), in id order.
    pub fn resolved(&self) -> Vec<&PackageIdentity> {
        self.winners
            .values()
            .filter_map(|idx| self.graph[*idx].identity.as_ref())
            .collect()
    }

    /// Resolved versions keyed by id.
    pub fn resolved_versions(&self) -> BTreeMap<PackageId, PackageVersion> {
        self.resolved()
            .into_iter()
            .map(|i| (i.id.clone(), i.version.clone()))
            .collect()
    }

    /// Flags of one package. See [`DependencyGraph::effective_flags`].
    pub fn package_flags(&self, id: &PackageId) -> AssetFlags {
        self.effective_flags().get(id).copied().unwrap_or(AssetFlags::NONE)
    }

    /// Asset flags of every resolved package: the union over its accepted
    /// entries of the declaring package's flags narrowed by the entry's edge.
    ///
    /// Children hang off the winning entry only, so flags that reach a package
    /// through any accepted entry flow on to its dependencies as well. Unions
    /// only grow, so the loop reaches a fixed point.
    pub fn effective_flags(&self) -> BTreeMap<PackageId, AssetFlags> {
        let entries: Vec<(PackageId, Option<NodeIndex>, AssetFlags)> = self
            .nodes()
            .filter(|(_, n)| n.is_accepted())
            .filter_map(|(idx, n)| {
                let identity = n.identity.as_ref()?;
                let parent = self.parent_of(idx).filter(|p| *p != self.root);
                Some((identity.id.clone(), parent, n.edge_flags))
            })
            .collect();

        let mut flags: BTreeMap<PackageId, AssetFlags> = BTreeMap::new();
        let mut changed = true;
        while changed {
            changed = false;
            for (id, parent, edge) in &entries {
                let inherited = match parent {
                    None => AssetFlags::ALL,
                    Some(p) => self.graph[*p]
                        .identity
                        .as_ref()
                        .and_then(|i| flags.get(&i.id))
                        .copied()
                        .unwrap_or(AssetFlags::NONE),
                };
                let current = flags.entry(id.clone()).or_insert(AssetFlags::NONE);
                let merged = current.union(inherited.intersection(*edge));
                if merged != *current {
                    *current = merged;
                    changed = true;
                }
            }
        }
        flags
    }

    /// All nodes except the project, in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &GraphNode)> {
        self.graph
            .node_indices()
            .filter(move |&idx| idx != self.root)
            .map(move |idx| (idx, &self.graph[idx]))
    }

    /// Children of a node in declared order.
    pub fn children_of(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut edges: Vec<(usize, NodeIndex)> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (e.weight().ordinal, e.target()))
            .collect();
        edges.sort_unstable();
        edges.into_iter().map(|(_, child)| child).collect()
    }

    pub fn parent_of(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.graph
            .edges_directed(idx, Direction::Incoming)
            .map(|e| e.source())
            .next()
    }

    /// Parent chain of a node, nearest first, ending with the project.
    pub fn ancestors(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut chain = Vec::new();
        let mut current = self.parent_of(idx);
        while let Some(parent) = current {
            chain.push(parent);
            current = self.parent_of(parent);
        }
        chain
    }

    /// Print the tree. Entries that are not expanded carry a marker.
    pub fn print_tree(&self, max_depth: Option<usize>) -> String {
        let mut output = format!("{}\n", self.project());
        let children = self.children_of(self.root);
        let count = children.len();
        for (i, child) in children.into_iter().enumerate() {
            self.print_subtree(&mut output, child, "", i == count - 1, 1, max_depth);
        }
        output
    }

    fn print_subtree(
        &self,
        output: &mut String,
        idx: NodeIndex,
        prefix: &str,
        is_last: bool,
        depth: usize,
        max_depth: Option<usize>,
    ) {
        let connector = if is_last { "└── " } else { "├── " };
        output.push_str(&format!("{prefix}{connector}{}\n", self.describe(idx)));

        if let Some(max) = max_depth {
            if depth >= max {
                return;
            }
        }

        let child_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });
        let children = self.children_of(idx);
        let count = children.len();
        for (i, child) in children.into_iter().enumerate() {
            self.print_subtree(output, child, &child_prefix, i == count - 1, depth + 1, max_depth);
        }
    }

    fn describe(&self, idx: NodeIndex) -> String {
        let node = &self.graph[idx];
        let winner_version = self
            .winner(&node.requested_id)
            .and_then(|w| self.graph[w].version())
            .map(|v| v.to_string())
            .unwrap_or_default();
        match node.disposition {
            Disposition::Accepted => match (&node.failure, &node.identity) {
                (Some(failure), _) => format!("{node} [unresolved: {failure}]"),
                (None, Some(_)) if self.winner(&node.requested_id) != Some(idx) => {
                    format!("{node} (*)")
                }
                (None, Some(_)) => node.to_string(),
                (None, None) => format!("{node} [unresolved]"),
            },
            Disposition::RejectedCycle => format!("{node} [cycle]"),
            Disposition::RejectedVersionConflict => {
                format!("{node} [conflict: resolved {winner_version}]")
            }
            Disposition::RejectedDowngradePrevented => {
                format!("{node} [downgrade prevented: resolved {winner_version}]")
            }
        }
    }

    /// Path from the project to the winning entry of `id`.
    pub fn find_path(&self, id: &str) -> Option<Vec<&GraphNode>> {
        let target = self.winner(&PackageId::new(id))?;
        let mut path: Vec<&GraphNode> = self
            .ancestors(target)
            .into_iter()
            .map(|idx| &self.graph[idx])
            .collect();
        path.reverse();
        path.push(&self.graph[target]);
        Some(path)
    }

    /// Number of entries, excluding the project.
    pub fn len(&self) -> usize {
        self.graph.node_count().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The resolved graph for one (framework, RID-or-none) pair.
#[derive(Debug, Clone)]
pub struct RestoreTargetGraph {
    pub framework: Framework,
    pub runtime_identifier: Option<String>,
    pub graph: DependencyGraph,
    pub conflicts: ConflictReport,
    pub failures: Vec<RestoreFailure>,
}

impl RestoreTargetGraph {
    pub fn new(project: &str, framework: Framework, runtime_identifier: Option<String>) -> Self {
        Self {
            framework,
            runtime_identifier,
            graph: DependencyGraph::new(project),
            conflicts: ConflictReport::new(),
            failures: Vec::new(),
        }
    }

    /// `netstandard1.5` or `netstandard1.5/win7-x86`.
    pub fn name(&self) -> String {
        match &self.runtime_identifier {
            Some(rid) => format!("{}/{rid}", self.framework),
            None => self.framework.to_string(),
        }
    }

    /// Whether no recorded failure is fatal under `policy`.
    pub fn is_success(&self, policy: ConflictPolicy) -> bool {
        !self.failures.iter().any(|f| f.is_fatal(policy))
    }
}
