use super::Value;

/// Hashable form of a [`Value`] used to index a condition's branch table.
///
/// Numbers are unified: a float with an integral value inside the `i64`
/// range keys the same branch as that integer, so `1`, `1.0` and `-0.0`/`0`
/// collide. Every NaN maps to one key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum BranchKey {
    Bool(bool),
    Int(i64),
    Float(u64),
    String(String),
}

// 2^63 as f64; `f < I64_BOUND` keeps the cast exact.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

impl From<&Value> for BranchKey {
    #[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
    fn from(value: &Value) -> Self {
        match value {
            Value::Bool(b) => BranchKey::Bool(*b),
            Value::Int(i) => BranchKey::Int(*i),
            Value::String(s) => BranchKey::String(s.clone()),
            Value::Float(f) if f.is_nan() => BranchKey::Float(f64::NAN.to_bits()),
            Value::Float(f) if f.fract() == 0.0 && *f >= -I64_BOUND && *f < I64_BOUND => {
                BranchKey::Int(*f as i64)
            }
            Value::Float(f) => BranchKey::Float(f.to_bits()),
        }
    }
}
