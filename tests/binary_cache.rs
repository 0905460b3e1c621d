#![cfg(feature = "binary-cache")]

use dectree::{Condition, DeserializeError, Node, Outcome, Params, Tree, TreeError, Value};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn outcome(value: impl Into<Value>) -> Node {
    Node::from(Outcome::new(value).unwrap())
}

fn salary_tree() -> Tree {
    let coffee = Condition::new("free_coffee == true")
        .unwrap()
        .with_branch(true, outcome("accept"))
        .with_branch(false, outcome("decline"));
    let commute = Condition::new("commutation_hour >= 2")
        .unwrap()
        .with_branch(true, outcome("decline"))
        .with_branch(false, Node::from(coffee));
    Tree::new(
        Condition::new("salary >= 50000")
            .unwrap()
            .with_branch(true, Node::from(commute))
            .with_branch(false, outcome("decline")),
    )
}

fn salary_inputs() -> Vec<Params> {
    vec![
        Params::new()
            .set("salary", 50000_i64)
            .set("commutation_hour", 1_i64)
            .set("free_coffee", true),
        Params::new().set("salary", 49999_i64),
        Params::new()
            .set("salary", 50000_i64)
            .set("commutation_hour", 2_i64),
        // free_coffee is missing and needed
        Params::new()
            .set("salary", 50000_i64)
            .set("commutation_hour", 0_i64),
    ]
}

fn same_decisions(a: &Tree, b: &Tree) {
    for params in salary_inputs() {
        let left = a.decide(&params).map_err(|e| e.to_string());
        let right = b.decide(&params).map_err(|e| e.to_string());
        assert_eq!(left, right);
    }
}

// ---------------------------------------------------------------------------
// Round-trips
// ---------------------------------------------------------------------------

#[test]
fn round_trip_simple() {
    let original = salary_tree();
    let bytes = original.to_bytes(None).unwrap();
    let restored = Tree::from_bytes(&bytes).unwrap();

    assert!(restored.is_compiled());
    same_decisions(&original, &restored);
    assert_eq!(restored.to_json().unwrap(), original.to_json().unwrap());
}

#[test]
fn round_trip_with_source_digest() {
    let original = Tree::from_json(&salary_tree().to_json().unwrap()).unwrap();
    let source = original.to_json().unwrap();

    let bytes = original.to_bytes(Some(&source)).unwrap();
    let restored = Tree::from_bytes(&bytes).unwrap();
    same_decisions(&original, &restored);
}

#[test]
fn round_trip_empty_and_outcome_roots() {
    let empty = Tree::from_bytes(&Tree::empty().to_bytes(None).unwrap()).unwrap();
    assert!(empty.root().is_none());

    let leaf = Tree::new(Outcome::new(2.5).unwrap());
    let restored = Tree::from_bytes(&leaf.to_bytes(None).unwrap()).unwrap();
    assert_eq!(restored.decide(&Params::new()).unwrap(), &Value::Float(2.5));
}

#[test]
fn all_value_types_round_trip() {
    let original = Tree::new(
        Condition::new("k % 4")
            .unwrap()
            .with_branch(0_i64, outcome(42_i64))
            .with_branch(1_i64, outcome(-1.25))
            .with_branch(2_i64, outcome(true))
            .with_branch(3_i64, None),
    );
    let restored = Tree::from_bytes(&original.to_bytes(None).unwrap()).unwrap();

    let decide = |k: i64| {
        restored
            .decide(&Params::new().set("k", k))
            .cloned()
            .map_err(|e| e.to_string())
    };
    assert_eq!(decide(0), Ok(Value::Int(42)));
    assert_eq!(decide(1), Ok(Value::Float(-1.25)));
    assert_eq!(decide(2), Ok(Value::Bool(true)));
    assert_eq!(decide(3), Err("undecidable".to_owned()));
}

#[test]
fn deep_tree_round_trip() {
    // 64 nested conditions on `n >= i`, each false branch ending in `i`.
    let mut node = outcome("top");
    for i in (0..64_i64).rev() {
        node = Node::from(
            Condition::new(&format!("n >= {i}"))
                .unwrap()
                .with_branch(true, node)
                .with_branch(false, outcome(i)),
        );
    }
    let original = Tree::new(node);
    let restored = Tree::from_bytes(&original.to_bytes(None).unwrap()).unwrap();

    assert_eq!(restored.to_string(), original.to_string());
    for n in [-1_i64, 0, 17, 63, 100] {
        let params = Params::new().set("n", n);
        assert_eq!(
            original.decide(&params).unwrap(),
            restored.decide(&params).unwrap()
        );
    }
}

// ---------------------------------------------------------------------------
// Corruption
// ---------------------------------------------------------------------------

#[test]
fn corruption_byte_flip() {
    let mut corrupted = salary_tree().to_bytes(None).unwrap();
    let last = corrupted.len() - 1;
    corrupted[last] ^= 0xFF;

    let err = Tree::from_bytes(&corrupted).unwrap_err();
    assert!(
        matches!(err, DeserializeError::ChecksumMismatch),
        "expected ChecksumMismatch, got: {err}"
    );
}

#[test]
fn corruption_truncation() {
    let bytes = salary_tree().to_bytes(None).unwrap();
    let err = Tree::from_bytes(&bytes[..33]).unwrap_err();
    assert!(
        matches!(err, DeserializeError::LengthMismatch { .. }),
        "expected LengthMismatch, got: {err}"
    );
}

#[test]
fn bad_magic() {
    let mut bad = salary_tree().to_bytes(None).unwrap();
    bad[0..4].copy_from_slice(b"BAAD");

    let err = Tree::from_bytes(&bad).unwrap_err();
    assert!(
        matches!(err, DeserializeError::BadMagic),
        "expected BadMagic, got: {err}"
    );
}

#[test]
fn version_mismatch() {
    let mut bad = salary_tree().to_bytes(None).unwrap();
    bad[4] = 99;
    bad[5] = 0;

    let err = Tree::from_bytes(&bad).unwrap_err();
    assert!(
        matches!(
            err,
            DeserializeError::IncompatibleVersion {
                blob: 99,
                supported: 1
            }
        ),
        "expected IncompatibleVersion, got: {err}"
    );
}

#[test]
fn uncompilable_predicate_is_reported() {
    // Decoded, never compiled, and with text that no longer compiles.
    let document: dectree::TreeDocument = serde_json::from_str(
        r#"{"root": {"condition": {"predicate": "1 && 2", "branches": []}}}"#,
    )
    .unwrap();
    let tree = Tree::from_document(document).unwrap();
    let bytes = tree.to_bytes(None).unwrap();

    let err = Tree::from_bytes(&bytes).unwrap_err();
    assert!(matches!(
        err,
        DeserializeError::Compile(TreeError::InvalidCondition { .. })
    ));
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

#[test]
fn file_round_trip() {
    let dir = std::env::temp_dir().join("dectree_test_binary_cache");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("salary.dtree");

    let original = salary_tree();
    original.to_binary_file(&path, None).unwrap();
    let restored = Tree::from_binary_file(&path).unwrap();
    same_decisions(&original, &restored);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn missing_file_is_io_error() {
    let err = Tree::from_binary_file("/nonexistent/dectree/cache.dtree").unwrap_err();
    assert!(matches!(err, DeserializeError::Io(_)));
}
