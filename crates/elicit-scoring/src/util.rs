//! Small shared helpers for scorer implementations.

use serde_json::{Map, Value};

pub(crate) fn signal_map<I>(pairs: I) -> Map<String, Value>
where
    I: IntoIterator<Item = (&'static str, Value)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}
