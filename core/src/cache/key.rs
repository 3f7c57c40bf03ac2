use crate::executor::types::Params;

/// Stable cache key for `(interface_name, params)`.
///
/// `Params` keeps its keys sorted, so equal parameter sets hash equally
/// regardless of insertion order.
pub fn cache_key(interface_name: &str, params: &Params) -> String {
    let serialized = serde_json::to_string(params).unwrap_or_default();
    let mut hasher = blake3::Hasher::new();
    hasher.update(interface_name.as_bytes());
    hasher.update(b"\0");
    hasher.update(serialized.as_bytes());
    hasher.finalize().to_hex().to_string()
}
