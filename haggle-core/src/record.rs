//! Diagnostics records returned by trainer update cycles.
//!
//! A [`Record`] is a small keyed map of diagnostic values. Update cycles
//! return one per completed optimization step (critic loss, actor loss,
//! bootstrap-target statistics); the driving loop decides what to do with
//! it — log it, aggregate it, or drop it.
use crate::error::HaggleError;
use std::collections::{
    hash_map::{IntoIter, Iter, Keys},
    HashMap,
};

/// A value stored in a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    /// A single floating-point value, typically a loss or a batch statistic.
    Scalar(f32),

    /// A 1-dimensional array of floating-point values.
    Array1(Vec<f32>),

    /// A text value, useful for labels.
    String(String),
}

/// A container of key-value diagnostic pairs.
#[derive(Debug, Clone, Default)]
pub struct Record(HashMap<String, RecordValue>);

impl Record {
    /// Creates an empty record.
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    /// Creates a record holding a single scalar.
    pub fn from_scalar(name: impl Into<String>, value: f32) -> Self {
        Self(HashMap::from([(name.into(), RecordValue::Scalar(value))]))
    }

    /// Creates a record from a slice of key-value pairs.
    pub fn from_slice<K: Into<String> + Clone>(s: &[(K, RecordValue)]) -> Self {
        Self(
            s.iter()
                .map(|(k, v)| (k.clone().into(), v.clone()))
                .collect(),
        )
    }

    /// Inserts a key-value pair, replacing any previous value for the key.
    pub fn insert(&mut self, k: impl Into<String>, v: RecordValue) {
        self.0.insert(k.into(), v);
    }

    /// Returns the value for the key, if present.
    pub fn get(&self, k: &str) -> Option<&RecordValue> {
        self.0.get(k)
    }

    /// Returns the scalar stored under the key.
    pub fn get_scalar(&self, k: &str) -> Result<f32, HaggleError> {
        match self.0.get(k) {
            Some(RecordValue::Scalar(v)) => Ok(*v),
            Some(_) => Err(HaggleError::RecordValueType(k.into())),
            None => Err(HaggleError::RecordKeyNotFound(k.into())),
        }
    }

    /// Returns true when the record holds no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns an iterator over the keys.
    pub fn keys(&self) -> Keys<String, RecordValue> {
        self.0.keys()
    }

    /// Returns an iterator over the entries.
    pub fn iter(&self) -> Iter<'_, String, RecordValue> {
        self.0.iter()
    }

    /// Absorbs the entries of another record, consuming both.
    pub fn merge(self, src: Self) -> Self {
        Self(self.0.into_iter().chain(src.0).collect())
    }
}

impl IntoIterator for Record {
    type Item = (String, RecordValue);
    type IntoIter = IntoIter<String, RecordValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::{Record, RecordValue};

    #[test]
    fn scalar_roundtrip() {
        let mut record = Record::from_scalar("loss_critic", 0.5);
        record.insert("loss_actor", RecordValue::Scalar(-1.25));

        assert_eq!(record.get_scalar("loss_critic").unwrap(), 0.5);
        assert_eq!(record.get_scalar("loss_actor").unwrap(), -1.25);
        assert!(record.get_scalar("reward_mean").is_err());
    }

    #[test]
    fn merge_prefers_src_on_collision() {
        let a = Record::from_scalar("x", 1.0);
        let b = Record::from_scalar("x", 2.0);
        assert_eq!(a.merge(b).get_scalar("x").unwrap(), 2.0);
    }

    #[test]
    fn kind_mismatch_is_an_error() {
        let record = Record::from_slice(&[
            ("tag", RecordValue::String("agent_0".into())),
            ("target_q", RecordValue::Array1(vec![2.3, 2.3])),
        ]);
        assert!(record.get_scalar("tag").is_err());
        assert!(record.get_scalar("target_q").is_err());
    }
}
