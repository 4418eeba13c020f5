use std::collections::BTreeMap;

/// Label key/value pairs attached to a metric sample.
///
/// A `BTreeMap` keeps labels sorted so rendered output is deterministic.
pub type LabelSet = BTreeMap<String, String>;

/// Metric registry errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A metric with this name is already registered
    #[error("duplicate metric name: {0}")]
    DuplicateName(String),

    /// No metric with this name is registered
    #[error("unknown metric: {0}")]
    UnknownMetric(String),
}

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Builds a [`LabelSet`] from string pairs.
pub fn labels<K, V>(pairs: &[(K, V)]) -> LabelSet
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    pairs
        .iter()
        .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_builds_sorted_set() {
        let set = labels(&[("zone", "b"), ("host", "a")]);
        let keys: Vec<_> = set.keys().cloned().collect();
        assert_eq!(keys, vec!["host".to_string(), "zone".to_string()]);
        assert_eq!(set.get("host"), Some(&"a".to_string()));
    }

    #[test]
    fn error_display() {
        let err = RegistryError::DuplicateName("obd_engine_rpm".into());
        assert_eq!(err.to_string(), "duplicate metric name: obd_engine_rpm");

        let err = RegistryError::UnknownMetric("nope".into());
        assert_eq!(err.to_string(), "unknown metric: nope");
    }
}
