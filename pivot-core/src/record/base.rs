//! Record and its values.
use crate::error::PivotError;
use std::collections::{
    hash_map::{Iter, Keys},
    BTreeMap, HashMap,
};

/// Represents possible types of values in a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    /// A single value, e.g., a loss.
    Scalar(f32),

    /// 1-dimensional array, e.g., returns of finished episodes.
    Array1(Vec<f32>),
}

/// Key-value pairs of [`RecordValue`]s.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record(HashMap<String, RecordValue>);

impl Record {
    /// Creates an empty record.
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    /// Creates a record with a single scalar.
    pub fn from_scalar(name: impl Into<String>, value: f32) -> Self {
        Self(HashMap::from([(name.into(), RecordValue::Scalar(value))]))
    }

    /// Creates a record from key-value pairs.
    pub fn from_slice<K: Into<String> + Clone>(s: &[(K, RecordValue)]) -> Self {
        Self(
            s.iter()
                .map(|(k, v)| (k.clone().into(), v.clone()))
                .collect(),
        )
    }

    /// Keys in the record.
    pub fn keys(&self) -> Keys<String, RecordValue> {
        self.0.keys()
    }

    /// Inserts a value. An existing value with the same key is replaced.
    pub fn insert(&mut self, k: impl Into<String>, v: RecordValue) {
        self.0.insert(k.into(), v);
    }

    /// Iterator over key-value pairs.
    pub fn iter(&self) -> Iter<'_, String, RecordValue> {
        self.0.iter()
    }

    /// Returns the value for a key.
    pub fn get(&self, k: &str) -> Option<&RecordValue> {
        self.0.get(k)
    }

    /// Merges `record` into `self`. Values of `record` win on conflicting keys.
    pub fn merge_inplace(&mut self, record: Record) {
        self.0.extend(record.0);
    }

    /// Returns the scalar for a key.
    pub fn get_scalar(&self, k: &str) -> Result<f32, PivotError> {
        match self.0.get(k) {
            Some(RecordValue::Scalar(v)) => Ok(*v),
            Some(_) => Err(PivotError::RecordValueTypeError("Scalar".to_string())),
            None => Err(PivotError::RecordKeyError(k.to_string())),
        }
    }

    /// Returns the 1-dimensional array for a key.
    pub fn get_array1(&self, k: &str) -> Result<Vec<f32>, PivotError> {
        match self.0.get(k) {
            Some(RecordValue::Array1(v)) => Ok(v.clone()),
            Some(_) => Err(PivotError::RecordValueTypeError("Array1".to_string())),
            None => Err(PivotError::RecordKeyError(k.to_string())),
        }
    }

    /// The number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the record has no entry.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Averages scalar values key by key. Keys missing in some records are averaged
/// over the records that have them. Arrays are dropped.
pub fn mean_records(records: &[Record]) -> Record {
    let mut sums: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for record in records {
        for (k, v) in record.iter() {
            if let RecordValue::Scalar(v) = v {
                let e = sums.entry(k.as_str()).or_insert((0.0, 0));
                e.0 += *v as f64;
                e.1 += 1;
            }
        }
    }
    let mut record = Record::empty();
    for (k, (sum, n)) in sums {
        record.insert(k, RecordValue::Scalar((sum / n as f64) as f32));
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_getters() {
        let mut record = Record::from_scalar("loss", 0.5);
        record.insert("episode_rewards", RecordValue::Array1(vec![1.0, 2.0]));

        assert_eq!(record.get_scalar("loss"), Ok(0.5));
        assert_eq!(record.get_array1("episode_rewards"), Ok(vec![1.0, 2.0]));
        assert_eq!(
            record.get_scalar("episode_rewards"),
            Err(PivotError::RecordValueTypeError("Scalar".to_string()))
        );
        assert_eq!(
            record.get_array1("returns"),
            Err(PivotError::RecordKeyError("returns".to_string()))
        );
    }

    #[test]
    fn test_merge_overwrites() {
        let mut a = Record::from_slice(&[
            ("x", RecordValue::Scalar(1.0)),
            ("y", RecordValue::Scalar(2.0)),
        ]);
        a.merge_inplace(Record::from_scalar("y", 3.0));
        assert_eq!(a.len(), 2);
        assert_eq!(a.get_scalar("y"), Ok(3.0));
    }

    #[test]
    fn test_mean_records() {
        let records = vec![
            Record::from_scalar("a", 1.0),
            Record::from_slice(&[
                ("a", RecordValue::Scalar(3.0)),
                ("b", RecordValue::Scalar(5.0)),
                ("c", RecordValue::Array1(vec![1.0])),
            ]),
        ];
        let r = mean_records(&records);
        assert_eq!(r.get_scalar("a"), Ok(2.0));
        assert_eq!(r.get_scalar("b"), Ok(5.0));
        assert!(r.get("c").is_none());
        assert!(mean_records(&[]).is_empty());
    }
}
