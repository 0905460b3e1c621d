//! The interchange document for trees.
//!
//! ```text
//! Tree      := { "root": Node | null }
//! Node      := { "condition": Condition } | { "outcome": Outcome } | {}
//! Condition := { "predicate": string, "branches": [Branch, ...] }
//! Branch    := { "value": scalar, "next_node": Node | null }
//! Outcome   := { "value": scalar }
//! ```
//!
//! Only persisted fields appear in a document. Decoding yields uncompiled
//! conditions; see [`Tree::initialize`](crate::Tree::initialize).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Branch, Condition, Node, Outcome, Tree, TreeError, Value};

/// Errors raised while reading or writing a tree document.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("malformed tree document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("node at {path} sets both a condition and an outcome")]
    AmbiguousNode { path: String },

    #[error("outcome at {path}: {source}")]
    InvalidOutcome {
        path: String,
        #[source]
        source: TreeError,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TreeDocument {
    #[serde(default)]
    pub root: Option<NodeDocument>,
}

/// A node sets at most one of `condition` and `outcome`. A node with
/// neither is an empty position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<ConditionDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<OutcomeDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConditionDocument {
    pub predicate: String,
    #[serde(default)]
    pub branches: Vec<BranchDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BranchDocument {
    pub value: Value,
    #[serde(default)]
    pub next_node: Option<NodeDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutcomeDocument {
    pub value: Value,
}

// -- Document -> Tree ---------------------------------------------------------

pub(crate) fn decode(document: TreeDocument) -> Result<Tree, DocumentError> {
    let root = match document.root {
        Some(node) => decode_node(node, "root")?,
        None => None,
    };
    Ok(Tree { root })
}

fn decode_node(node: NodeDocument, path: &str) -> Result<Option<Node>, DocumentError> {
    match (node.condition, node.outcome) {
        (Some(_), Some(_)) => Err(DocumentError::AmbiguousNode {
            path: path.to_owned(),
        }),
        (Some(condition), None) => {
            let mut branches = Vec::with_capacity(condition.branches.len());
            for (i, branch) in condition.branches.into_iter().enumerate() {
                let next = match branch.next_node {
                    Some(next) => {
                        decode_node(next, &format!("{path}.condition.branches[{i}].next_node"))?
                    }
                    None => None,
                };
                branches.push(Branch {
                    value: branch.value,
                    next,
                });
            }
            Ok(Some(Node::Condition(Condition::uncompiled(
                condition.predicate,
                branches,
            ))))
        }
        (None, Some(outcome)) => Outcome::new(outcome.value)
            .map(|o| Some(Node::Outcome(o)))
            .map_err(|source| DocumentError::InvalidOutcome {
                path: format!("{path}.outcome"),
                source,
            }),
        (None, None) => Ok(None),
    }
}

// -- Tree -> Document ---------------------------------------------------------

pub(crate) fn encode(tree: &Tree) -> TreeDocument {
    TreeDocument {
        root: tree.root.as_ref().map(encode_node),
    }
}

fn encode_node(node: &Node) -> NodeDocument {
    match node {
        Node::Condition(condition) => NodeDocument {
            condition: Some(ConditionDocument {
                predicate: condition.predicate.clone(),
                branches: condition
                    .branches
                    .iter()
                    .map(|branch| BranchDocument {
                        value: branch.value.clone(),
                        next_node: branch.next.as_ref().map(encode_node),
                    })
                    .collect(),
            }),
            outcome: None,
        },
        Node::Outcome(outcome) => NodeDocument {
            condition: None,
            outcome: Some(OutcomeDocument {
                value: outcome.value().clone(),
            }),
        },
    }
}
