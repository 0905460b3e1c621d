use std::fmt;

use super::error::TreeError;
use super::node::{Condition, Node};
use super::params::Params;
use super::report::DecisionReport;
use super::value::Value;
use crate::document::{DocumentError, TreeDocument};

/// A decision tree: an optional root [`Node`] walked by [`decide`](Self::decide).
///
/// Trees built from [`Condition::new`] are ready to decide. Trees decoded
/// from a document must be compiled with [`initialize`](Self::initialize)
/// first; [`from_json`](Self::from_json) and [`from_file`](Self::from_file)
/// do both.
///
/// A compiled tree is read-only during decisions and can be shared across
/// threads behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct Tree {
    pub(crate) root: Option<Node>,
}

impl Tree {
    #[must_use]
    pub fn new(root: impl Into<Node>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    /// A tree with no root. Valid, but every decision is undecidable.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn root(&self) -> Option<&Node> {
        self.root.as_ref()
    }

    /// Compile every condition reachable from the root, breadth first.
    ///
    /// A tree without a root, or whose root is an outcome, needs no work.
    /// Compilation stops at the first failing condition; conditions
    /// compiled before it stay compiled.
    ///
    /// # Errors
    ///
    /// Returns the first [`TreeError::InvalidCondition`] encountered.
    pub fn initialize(&mut self) -> Result<(), TreeError> {
        crate::compile::initialize(self.root.as_mut()).map(|_| ())
    }

    /// `true` when every condition reachable from the root is compiled.
    #[must_use]
    pub fn is_compiled(&self) -> bool {
        self.conditions().all(Condition::is_compiled)
    }

    /// Walk from the root to an outcome and return its value.
    ///
    /// # Errors
    ///
    /// - [`TreeError::Undecidable`] if the tree is empty, a predicate result
    ///   has no branch, or the selected branch has no next node.
    /// - [`TreeError::Evaluation`] if a predicate fails against `params`.
    /// - [`TreeError::NotCompiled`] if the walk reaches a condition that was
    ///   decoded but never compiled.
    pub fn decide(&self, params: &Params) -> Result<&Value, TreeError> {
        crate::evaluate::decide(self.root.as_ref(), params, |_, _| {})
    }

    /// Decide with diagnostics: the outcome plus the path taken and timing.
    ///
    /// # Errors
    ///
    /// Same as [`decide`](Self::decide).
    pub fn decide_detailed(&self, params: &Params) -> Result<DecisionReport, TreeError> {
        crate::evaluate::decide_detailed(self.root.as_ref(), params)
    }

    /// Build an uncompiled tree from a decoded document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError`] if a node sets both a condition and an
    /// outcome, or an outcome value is not a single literal.
    pub fn from_document(document: TreeDocument) -> Result<Self, DocumentError> {
        crate::document::decode(document)
    }

    /// The persisted form of this tree. Compiled state is not included.
    #[must_use]
    pub fn to_document(&self) -> TreeDocument {
        crate::document::encode(self)
    }

    /// Decode a JSON tree document and compile it.
    ///
    /// # Errors
    ///
    /// Returns [`DectreeError`](crate::DectreeError) on malformed JSON, an
    /// invalid document, or a condition that fails to compile.
    pub fn from_json(input: &str) -> Result<Self, crate::DectreeError> {
        let document: TreeDocument =
            serde_json::from_str(input).map_err(DocumentError::from)?;
        let mut tree = Self::from_document(document)?;
        tree.initialize()?;
        Ok(tree)
    }

    /// Read a JSON tree document from a file and compile it.
    ///
    /// # Errors
    ///
    /// Returns [`DectreeError`](crate::DectreeError) on I/O, decode, or
    /// compile failure.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, crate::DectreeError> {
        let input = std::fs::read_to_string(path)?;
        Self::from_json(&input)
    }

    /// # Errors
    ///
    /// Returns [`DocumentError::Json`] if encoding fails, such as for a
    /// branch value that is a non-finite float.
    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string(&self.to_document())?)
    }

    /// # Errors
    ///
    /// Returns [`DocumentError::Json`] if encoding fails.
    pub fn to_json_pretty(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(&self.to_document())?)
    }

    /// Conditions reachable from the root, depth first.
    fn conditions(&self) -> impl Iterator<Item = &Condition> {
        let mut stack: Vec<&Node> = self.root.iter().collect();
        std::iter::from_fn(move || loop {
            match stack.pop()? {
                Node::Condition(condition) => {
                    stack.extend(condition.branches.iter().filter_map(|b| b.next.as_ref()));
                    return Some(condition);
                }
                Node::Outcome(_) => {}
            }
        })
    }

    /// (conditions, outcomes, depth) for the tree's summary.
    fn shape(&self) -> (usize, usize, usize) {
        let (mut conditions, mut outcomes, mut depth) = (0, 0, 0);
        let mut stack: Vec<(&Node, usize)> = self.root.iter().map(|n| (n, 1)).collect();
        while let Some((node, level)) = stack.pop() {
            depth = depth.max(level);
            match node {
                Node::Condition(condition) => {
                    conditions += 1;
                    stack.extend(
                        condition
                            .branches
                            .iter()
                            .filter_map(|b| b.next.as_ref())
                            .map(|n| (n, level + 1)),
                    );
                }
                Node::Outcome(_) => outcomes += 1,
            }
        }
        (conditions, outcomes, depth)
    }
}

#[cfg(feature = "binary-cache")]
impl Tree {
    /// Serialize this tree to a byte vector.
    ///
    /// The optional `source_text` is hashed (BLAKE3) and embedded in the
    /// payload metadata, so callers can tell when the document the cache
    /// was built from has changed.
    ///
    /// # Errors
    ///
    /// Returns [`SerializeError`](crate::serial::SerializeError) if encoding fails.
    pub fn to_bytes(
        &self,
        source_text: Option<&str>,
    ) -> Result<Vec<u8>, crate::serial::SerializeError> {
        crate::serial::encode(self, source_text)
    }

    /// Deserialize and compile a tree previously produced by
    /// [`to_bytes`](Self::to_bytes).
    ///
    /// # Errors
    ///
    /// Returns [`DeserializeError`](crate::serial::DeserializeError) on
    /// format, integrity, validation, or compile failure.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, crate::serial::DeserializeError> {
        crate::serial::decode(bytes)
    }

    /// # Errors
    ///
    /// Returns [`SerializeError`](crate::serial::SerializeError) on
    /// encoding or I/O failure.
    pub fn to_binary_file(
        &self,
        path: impl AsRef<std::path::Path>,
        source_text: Option<&str>,
    ) -> Result<(), crate::serial::SerializeError> {
        let bytes = self.to_bytes(source_text)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`DeserializeError`](crate::serial::DeserializeError) on
    /// I/O, format, integrity, validation, or compile failure.
    pub fn from_binary_file(
        path: impl AsRef<std::path::Path>,
    ) -> Result<Self, crate::serial::DeserializeError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (conditions, outcomes, depth) = self.shape();
        write!(
            f,
            "Tree({conditions} conditions, {outcomes} outcomes, depth {depth})"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Outcome;

    fn outcome(v: &str) -> Node {
        Node::from(Outcome::new(v).unwrap())
    }

    fn two_level() -> Tree {
        Tree::new(
            Condition::new("a > 1")
                .unwrap()
                .with_branch(
                    true,
                    Node::from(
                        Condition::new("b == 2")
                            .unwrap()
                            .with_branch(true, outcome("both"))
                            .with_branch(false, outcome("only_a")),
                    ),
                )
                .with_branch(false, outcome("neither")),
        )
    }

    #[test]
    fn empty_tree_is_undecidable() {
        let tree = Tree::empty();
        assert!(tree.root().is_none());
        assert!(tree.is_compiled());
        assert!(matches!(
            tree.decide(&Params::new()),
            Err(TreeError::Undecidable)
        ));
    }

    #[test]
    fn outcome_root_always_decides() {
        let mut tree = Tree::new(Outcome::new(7_i64).unwrap());
        tree.initialize().unwrap();
        assert_eq!(tree.decide(&Params::new()).unwrap(), &Value::Int(7));
    }

    #[test]
    fn decide_walks_levels() {
        let tree = two_level();
        let params = Params::new().set("a", 2_i64).set("b", 2_i64);
        assert_eq!(tree.decide(&params).unwrap(), &Value::from("both"));
        let params = Params::new().set("a", 0_i64);
        assert_eq!(tree.decide(&params).unwrap(), &Value::from("neither"));
    }

    #[test]
    fn decide_detailed_reports_path() {
        let tree = two_level();
        let params = Params::new().set("a", 2_i64).set("b", 3_i64);
        let report = tree.decide_detailed(&params).unwrap();
        assert_eq!(report.outcome(), &Value::from("only_a"));
        let predicates: Vec<&str> = report.path().iter().map(|s| s.predicate()).collect();
        assert_eq!(predicates, ["a > 1", "b == 2"]);
    }

    #[test]
    fn display_summary() {
        assert_eq!(
            two_level().to_string(),
            "Tree(2 conditions, 3 outcomes, depth 3)"
        );
        assert_eq!(
            Tree::empty().to_string(),
            "Tree(0 conditions, 0 outcomes, depth 0)"
        );
    }

    #[test]
    fn initialize_is_idempotent() {
        let mut tree = two_level();
        tree.initialize().unwrap();
        tree.initialize().unwrap();
        let params = Params::new().set("a", 2_i64).set("b", 2_i64);
        assert_eq!(tree.decide(&params).unwrap(), &Value::from("both"));
    }
}
