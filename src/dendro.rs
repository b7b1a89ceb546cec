//! Dendrogram tree construction and leaf labeling
//!
//! Converts the merge steps produced by the clustering stage into an explicit
//! binary tree and labels its leaves with entity identity and the full metric
//! snapshot. Internal nodes are unlabeled aggregation points. The transient
//! merge-tree node id exists only in the intermediate build structure; no
//! output node carries it.

use serde::Serialize;

use crate::error::AnalyticsError;
use crate::ledger::LedgerRegistry;
use crate::linkage::MergeStep;
use crate::metrics::{MetricEngine, MetricSnapshot};

/// Name of the synthetic root wrapper node
pub const ROOT_NAME: &str = "users";

/// A labeled cluster-tree node: a leaf carrying an entity's metrics, or an
/// internal merge point carrying only its two children
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ClusterNode {
    Leaf(LeafNode),
    Internal(InternalNode),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeafNode {
    pub name: String,
    #[serde(flatten)]
    pub metrics: MetricSnapshot,
}

/// Internal nodes have no identity of their own; the name field is always
/// empty, kept only for output-schema stability
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InternalNode {
    pub name: String,
    pub children: Vec<ClusterNode>,
}

/// The output artifact: a synthetic root holding the labeled forest
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dendrogram {
    pub name: String,
    pub children: Vec<ClusterNode>,
}

impl Dendrogram {
    /// All leaf names, in left-to-right traversal order
    pub fn leaf_names(&self) -> Vec<&str> {
        fn walk<'a>(node: &'a ClusterNode, out: &mut Vec<&'a str>) {
            match node {
                ClusterNode::Leaf(leaf) => out.push(&leaf.name),
                ClusterNode::Internal(internal) => {
                    for child in &internal.children {
                        walk(child, out);
                    }
                }
            }
        }

        let mut names = Vec::new();
        for child in &self.children {
            walk(child, &mut names);
        }
        names
    }
}

/// Intermediate build-time tree node. This is the only place the merge-tree
/// node id lives.
struct BuildNode {
    node_id: usize,
    children: Vec<BuildNode>,
}

/// Builds and labels the dendrogram from a completed registry and its merge
/// sequence
pub struct ClusterTreeBuilder;

impl ClusterTreeBuilder {
    /// Materialize the merge tree and label it against `registry`.
    ///
    /// The registry's first-seen order is the index→name map: original
    /// entities carry ids `0..n-1` and merge step `i` created id `n+i`.
    /// Labeling is pure, so rebuilding from the same inputs yields an
    /// identical tree.
    pub fn build(
        registry: &LedgerRegistry,
        merges: &[MergeStep],
    ) -> Result<Dendrogram, AnalyticsError> {
        let n = registry.len();

        let children = if n == 0 {
            Vec::new()
        } else if merges.is_empty() {
            // No merges happen for a single entity; the forest is that one
            // leaf directly under the root.
            if n != 1 {
                return Err(AnalyticsError::TreeError(format!(
                    "{n} entities but no merge steps"
                )));
            }
            let build = BuildNode {
                node_id: 0,
                children: Vec::new(),
            };
            vec![label(&build, registry)?.0]
        } else {
            // n entities need exactly n - 1 merges; anything else would
            // leave entities out of the tree or reference missing steps.
            if merges.len() != n - 1 {
                return Err(AnalyticsError::TreeError(format!(
                    "{n} entities but {} merge steps",
                    merges.len()
                )));
            }
            let root_id = n + merges.len() - 1;
            let build = materialize(root_id, n, merges)?;
            vec![label(&build, registry)?.0]
        };

        Ok(Dendrogram {
            name: ROOT_NAME.to_string(),
            children,
        })
    }
}

/// Recursively expand a cluster id into its build-time subtree. Ids below `n`
/// are original entities and stay childless until labeling turns them into
/// leaves.
fn materialize(id: usize, n: usize, merges: &[MergeStep]) -> Result<BuildNode, AnalyticsError> {
    if id < n {
        return Ok(BuildNode {
            node_id: id,
            children: Vec::new(),
        });
    }

    let step = merges.get(id - n).ok_or_else(|| {
        AnalyticsError::TreeError(format!("merge step for cluster id {id} is missing"))
    })?;

    Ok(BuildNode {
        node_id: id,
        children: vec![
            materialize(step.left, n, merges)?,
            materialize(step.right, n, merges)?,
        ],
    })
}

/// Post-order labeling. A childless node resolves its name through the
/// registry order and receives the entity's metric snapshot; a node with
/// children becomes an internal node and passes the concatenated child name
/// lists upward (left before right).
fn label(
    node: &BuildNode,
    registry: &LedgerRegistry,
) -> Result<(ClusterNode, Vec<String>), AnalyticsError> {
    if node.children.is_empty() {
        let name = registry.names().get(node.node_id).ok_or_else(|| {
            AnalyticsError::TreeError(format!("leaf id {} has no entity", node.node_id))
        })?;
        let ledger = registry.get(name).ok_or_else(|| {
            AnalyticsError::TreeError(format!("no ledger for entity {name:?}"))
        })?;

        let leaf = ClusterNode::Leaf(LeafNode {
            name: name.clone(),
            metrics: MetricEngine::compute(ledger),
        });
        return Ok((leaf, vec![name.clone()]));
    }

    let mut children = Vec::with_capacity(node.children.len());
    let mut leaf_names = Vec::new();
    for child in &node.children {
        let (labeled, names) = label(child, registry)?;
        children.push(labeled);
        leaf_names.extend(names);
    }

    let internal = ClusterNode::Internal(InternalNode {
        name: String::new(),
        children,
    });
    Ok((internal, leaf_names))
}
