//! Binary serialization and deserialization of trees.
//!
//! This module provides a stable binary format for caching
//! [`Tree`](crate::Tree) values. The format consists of a 32-byte fixed
//! header followed by a bincode-encoded payload.
//!
//! ## Wire Format
//!
//! ```text
//! Offset  Size  Field
//! 0       4     Magic bytes: b"DTRE"
//! 4       2     Format version (u16, little-endian)
//! 6       2     Engine version (u16, little-endian)
//! 8       4     Flags (u32, reserved)
//! 12      4     Payload length in bytes (u32, little-endian)
//! 16      16    BLAKE3 hash of the payload (truncated to 16 bytes)
//! 32..    var   Bincode-encoded payload
//! ```
//!
//! ## Payload
//!
//! Nodes are stored in a flat arena in breadth-first order, with the root at
//! index 0. A branch refers to its next node by index, and always to a later
//! index, so every node has exactly one parent and the arena decodes to a
//! tree without cycles.
//!
//! ## Versioning
//!
//! The format version in the header must match exactly. If it does not,
//! deserialization fails immediately with [`DeserializeError::IncompatibleVersion`].
//! The engine version is informational only.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Branch, Condition, Node, Outcome, Tree, TreeError, Value};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const MAGIC: &[u8; 4] = b"DTRE";
const FORMAT_VERSION: u16 = 1;
const ENGINE_VERSION: u16 = 1;
const HEADER_SIZE: usize = 32;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur when serializing a [`Tree`](crate::Tree) to bytes.
#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("failed to encode tree: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("I/O error during serialization: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur when deserializing a [`Tree`](crate::Tree) from bytes.
#[derive(Debug, Error)]
pub enum DeserializeError {
    #[error("not a dectree binary: invalid magic bytes")]
    BadMagic,

    #[error("incompatible format version: blob is v{blob}, engine supports v{supported}")]
    IncompatibleVersion { blob: u16, supported: u16 },

    #[error("integrity check failed: BLAKE3 checksum mismatch")]
    ChecksumMismatch,

    #[error("payload length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: u32, actual: usize },

    #[error("failed to decode payload: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("tree failed to compile: {0}")]
    Compile(#[source] TreeError),

    #[error("I/O error during deserialization: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Serialized type hierarchy
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct SerializedTree {
    metadata: TreeMetadata,
    root: Option<usize>,
    nodes: Vec<SerializedNode>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TreeMetadata {
    condition_count: usize,
    outcome_count: usize,
    source_digest: Option<[u8; 32]>,
}

#[derive(Debug, Serialize, Deserialize)]
enum SerializedNode {
    Condition {
        predicate: String,
        branches: Vec<SerializedBranch>,
    },
    Outcome(SerializedValue),
}

#[derive(Debug, Serialize, Deserialize)]
struct SerializedBranch {
    value: SerializedValue,
    next: Option<usize>,
}

/// Bincode cannot drive `Value`'s self-describing deserializer, so values
/// travel as a plain tagged enum.
#[derive(Debug, Clone, Serialize, Deserialize)]
enum SerializedValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

// ---------------------------------------------------------------------------
// Value conversion
// ---------------------------------------------------------------------------

fn serialize_value(value: &Value) -> SerializedValue {
    match value {
        Value::Int(v) => SerializedValue::Int(*v),
        Value::Float(v) => SerializedValue::Float(*v),
        Value::Bool(v) => SerializedValue::Bool(*v),
        Value::String(v) => SerializedValue::Str(v.clone()),
    }
}

fn deserialize_value(value: SerializedValue) -> Value {
    match value {
        SerializedValue::Int(v) => Value::Int(v),
        SerializedValue::Float(v) => Value::Float(v),
        SerializedValue::Bool(v) => Value::Bool(v),
        SerializedValue::Str(v) => Value::String(v),
    }
}

// ---------------------------------------------------------------------------
// Tree -> SerializedTree
// ---------------------------------------------------------------------------

fn tree_to_serialized(tree: &Tree, source_text: Option<&str>) -> SerializedTree {
    let source_digest = source_text.map(|s| *blake3::hash(s.as_bytes()).as_bytes());

    let mut nodes = Vec::new();
    let mut queue: VecDeque<&Node> = tree.root.iter().collect();
    // Indices are handed out in enqueue order, which is the order nodes are
    // pushed to the arena.
    let mut next_index = queue.len();
    let (mut condition_count, mut outcome_count) = (0, 0);

    while let Some(node) = queue.pop_front() {
        let serialized = match node {
            Node::Outcome(outcome) => {
                outcome_count += 1;
                SerializedNode::Outcome(serialize_value(outcome.value()))
            }
            Node::Condition(condition) => {
                condition_count += 1;
                let branches = condition
                    .branches
                    .iter()
                    .map(|branch| SerializedBranch {
                        value: serialize_value(&branch.value),
                        next: branch.next.as_ref().map(|next| {
                            queue.push_back(next);
                            next_index += 1;
                            next_index - 1
                        }),
                    })
                    .collect();
                SerializedNode::Condition {
                    predicate: condition.predicate.clone(),
                    branches,
                }
            }
        };
        nodes.push(serialized);
    }

    SerializedTree {
        metadata: TreeMetadata {
            condition_count,
            outcome_count,
            source_digest,
        },
        root: tree.root.as_ref().map(|_| 0),
        nodes,
    }
}

// ---------------------------------------------------------------------------
// SerializedTree -> Tree
// ---------------------------------------------------------------------------

fn serialized_to_tree(ser: SerializedTree) -> Result<Tree, DeserializeError> {
    validate(&ser)?;

    // Children always sit at higher indices, so building from the back
    // finds every child already built.
    let mut built: Vec<Option<Node>> = Vec::with_capacity(ser.nodes.len());
    built.resize_with(ser.nodes.len(), || None);
    for (index, node) in ser.nodes.into_iter().enumerate().rev() {
        let node = match node {
            SerializedNode::Outcome(value) => Outcome::new(deserialize_value(value))
                .map(Node::Outcome)
                .map_err(|e| DeserializeError::Validation(format!("node {index}: {e}")))?,
            SerializedNode::Condition {
                predicate,
                branches,
            } => {
                let branches = branches
                    .into_iter()
                    .map(|branch| Branch {
                        value: deserialize_value(branch.value),
                        next: branch.next.and_then(|next| built[next].take()),
                    })
                    .collect();
                Node::Condition(Condition::uncompiled(predicate, branches))
            }
        };
        built[index] = Some(node);
    }

    let root = match ser.root {
        Some(index) => built[index].take(),
        None => None,
    };
    let mut tree = Tree { root };
    tree.initialize().map_err(DeserializeError::Compile)?;
    Ok(tree)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(ser: &SerializedTree) -> Result<(), DeserializeError> {
    let node_count = ser.nodes.len();

    // Metadata consistency
    let conditions = ser
        .nodes
        .iter()
        .filter(|n| matches!(n, SerializedNode::Condition { .. }))
        .count();
    if ser.metadata.condition_count != conditions {
        return Err(DeserializeError::Validation(format!(
            "metadata says {} conditions but payload has {}",
            ser.metadata.condition_count, conditions
        )));
    }
    if ser.metadata.outcome_count != node_count - conditions {
        return Err(DeserializeError::Validation(format!(
            "metadata says {} outcomes but payload has {}",
            ser.metadata.outcome_count,
            node_count - conditions
        )));
    }

    // Root placement
    match ser.root {
        None if node_count != 0 => {
            return Err(DeserializeError::Validation(format!(
                "no root but {node_count} nodes"
            )));
        }
        Some(root) if root != 0 || node_count == 0 => {
            return Err(DeserializeError::Validation(format!(
                "root index {root} is not the first of {node_count} nodes"
            )));
        }
        _ => {}
    }

    // Every non-root node has exactly one parent, at a lower index.
    let mut referenced = vec![false; node_count];
    for (index, node) in ser.nodes.iter().enumerate() {
        let SerializedNode::Condition { branches, .. } = node else {
            continue;
        };
        for next in branches.iter().filter_map(|b| b.next) {
            validate_edge(index, next, node_count)?;
            if std::mem::replace(&mut referenced[next], true) {
                return Err(DeserializeError::Validation(format!(
                    "node {next} has more than one parent"
                )));
            }
        }
    }
    if let Some(orphan) = referenced.iter().skip(1).position(|r| !r) {
        return Err(DeserializeError::Validation(format!(
            "node {} is unreachable from the root",
            orphan + 1
        )));
    }

    Ok(())
}

fn validate_edge(parent: usize, child: usize, node_count: usize) -> Result<(), DeserializeError> {
    if child >= node_count {
        return Err(DeserializeError::Validation(format!(
            "node ref {child} out of bounds (max {node_count})"
        )));
    }
    if child <= parent {
        return Err(DeserializeError::Validation(format!(
            "node ref {child} violates breadth-first order (parent index {parent})"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Header I/O
// ---------------------------------------------------------------------------

fn write_header(buf: &mut Vec<u8>, payload: &[u8]) {
    let hash = blake3::hash(payload);
    let hash_bytes = hash.as_bytes();

    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    buf.extend_from_slice(&ENGINE_VERSION.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes()); // flags (reserved)
    #[allow(clippy::cast_possible_truncation)] // payload will never exceed 4 GiB
    let payload_len = payload.len() as u32;
    buf.extend_from_slice(&payload_len.to_le_bytes());
    buf.extend_from_slice(&hash_bytes[..16]);
}

#[allow(clippy::cast_possible_truncation)] // HEADER_SIZE is 32, always fits in u32
fn read_header(bytes: &[u8]) -> Result<(u16, u32, [u8; 16]), DeserializeError> {
    if bytes.len() < HEADER_SIZE {
        return Err(DeserializeError::LengthMismatch {
            expected: HEADER_SIZE as u32,
            actual: bytes.len(),
        });
    }

    if &bytes[0..4] != MAGIC {
        return Err(DeserializeError::BadMagic);
    }

    let format_version = u16::from_le_bytes([bytes[4], bytes[5]]);
    // bytes[6..8] is engine_version, bytes[8..12] is flags
    let payload_len = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);

    let mut hash = [0u8; 16];
    hash.copy_from_slice(&bytes[16..32]);

    Ok((format_version, payload_len, hash))
}

// ---------------------------------------------------------------------------
// Public encode/decode
// ---------------------------------------------------------------------------

pub(crate) fn encode(tree: &Tree, source_text: Option<&str>) -> Result<Vec<u8>, SerializeError> {
    let serialized = tree_to_serialized(tree, source_text);
    let payload = bincode::serde::encode_to_vec(&serialized, bincode::config::standard())?;

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    write_header(&mut buf, &payload);
    buf.extend_from_slice(&payload);
    Ok(buf)
}

pub(crate) fn decode(bytes: &[u8]) -> Result<Tree, DeserializeError> {
    let (format_version, payload_len, stored_hash) = read_header(bytes)?;

    if format_version != FORMAT_VERSION {
        return Err(DeserializeError::IncompatibleVersion {
            blob: format_version,
            supported: FORMAT_VERSION,
        });
    }

    let payload_end = HEADER_SIZE + payload_len as usize;
    if bytes.len() < payload_end {
        return Err(DeserializeError::LengthMismatch {
            expected: payload_len,
            actual: bytes.len() - HEADER_SIZE,
        });
    }
    let payload = &bytes[HEADER_SIZE..payload_end];

    let computed_hash = blake3::hash(payload);
    if computed_hash.as_bytes()[..16] != stored_hash {
        return Err(DeserializeError::ChecksumMismatch);
    }

    let (serialized, _): (SerializedTree, usize) =
        bincode::serde::decode_from_slice(payload, bincode::config::standard())?;

    let tree = serialized_to_tree(serialized)?;
    tracing::debug!(bytes = bytes.len(), "tree loaded from binary cache");
    Ok(tree)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
