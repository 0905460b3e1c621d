use std::collections::HashMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

use super::Value;

/// Named input parameters a tree is decided against.
///
/// Names may be dot-separated paths (`"user.age"`), stored as nested groups.
/// Predicates refer to them with the same dotted identifiers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    entries: HashMap<String, Param>,
}

#[derive(Debug, Clone, PartialEq)]
enum Param {
    Scalar(Value),
    Group(HashMap<String, Param>),
}

impl Params {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, consuming and returning `self` for chaining.
    #[must_use]
    pub fn set(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.insert(name, value.into());
        self
    }

    /// Insert a parameter. Intermediate groups are created as needed, and a
    /// scalar sitting on an intermediate segment is replaced by a group.
    pub fn insert(&mut self, name: &str, value: Value) {
        let mut segments = name.split('.').peekable();
        let mut map = &mut self.entries;
        while let Some(segment) = segments.next() {
            if segments.peek().is_none() {
                map.insert(segment.to_owned(), Param::Scalar(value));
                return;
            }
            let slot = map
                .entry(segment.to_owned())
                .or_insert_with(|| Param::Group(HashMap::new()));
            if let Param::Scalar(_) = slot {
                *slot = Param::Group(HashMap::new());
            }
            map = match slot {
                Param::Group(inner) => inner,
                Param::Scalar(_) => return,
            };
        }
    }

    /// Look up a scalar by name. Returns `None` for unknown names and for
    /// names that resolve to a group rather than a scalar.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        let mut segments = name.split('.');
        let first = segments.next()?;
        let mut current = self.entries.get(first)?;
        for segment in segments {
            current = match current {
                Param::Group(inner) => inner.get(segment)?,
                Param::Scalar(_) => return None,
            };
        }
        match current {
            Param::Scalar(value) => Some(value),
            Param::Group(_) => None,
        }
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert_group(&mut self, prefix: &str, entries: HashMap<String, Param>) {
        for (key, param) in entries {
            let name = if prefix.is_empty() {
                key
            } else {
                format!("{prefix}.{key}")
            };
            match param {
                Param::Scalar(value) => self.insert(&name, value),
                Param::Group(inner) => self.insert_group(&name, inner),
            }
        }
    }
}

impl<K: AsRef<str>, V: Into<Value>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (name, value) in iter {
            params.insert(name.as_ref(), value.into());
        }
        params
    }
}

impl<K: AsRef<str>, V: Into<Value>> Extend<(K, V)> for Params {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.insert(name.as_ref(), value.into());
        }
    }
}

struct ParamVisitor;

impl<'de> Visitor<'de> for ParamVisitor {
    type Value = Param;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a scalar or an object of parameters")
    }

    fn visit_bool<E: serde::de::Error>(self, v: bool) -> Result<Param, E> {
        Ok(Param::Scalar(Value::Bool(v)))
    }

    fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Param, E> {
        Ok(Param::Scalar(Value::Int(v)))
    }

    fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Param, E> {
        i64::try_from(v).map(|v| Param::Scalar(Value::Int(v))).map_err(|_| {
            E::invalid_value(serde::de::Unexpected::Unsigned(v), &"an integer within i64")
        })
    }

    fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<Param, E> {
        Ok(Param::Scalar(Value::Float(v)))
    }

    fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Param, E> {
        Ok(Param::Scalar(Value::String(v.to_owned())))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Param, A::Error> {
        let mut group = HashMap::new();
        while let Some((key, value)) = access.next_entry::<String, Param>()? {
            group.insert(key, value);
        }
        Ok(Param::Group(group))
    }
}

impl<'de> Deserialize<'de> for Param {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ParamVisitor)
    }
}

/// Deserializes from an object. Nested objects and dotted keys both become
/// dotted names, so `{"user": {"age": 1}}` and `{"user.age": 1}` are equal.
impl<'de> Deserialize<'de> for Params {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Param::deserialize(deserializer)? {
            Param::Group(entries) => {
                let mut params = Params::new();
                params.insert_group("", entries);
                Ok(params)
            }
            Param::Scalar(_) => Err(serde::de::Error::custom(
                "parameters must be an object, found a scalar",
            )),
        }
    }
}
