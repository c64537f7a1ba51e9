//! Partition keys derived from request paths.

/// Partition used when a path carries no segments.
pub const DEFAULT_PARTITION: &str = "default";

/// Derive a partition key from a request path.
///
/// The first two path segments identify the application and its instance
/// (`/shop/eu/cart` → `shop-eu`). A single segment is used as is; an empty
/// path maps to [`DEFAULT_PARTITION`]. Only one leading `/` is stripped.
pub fn partition_key(path: &str) -> String {
    let path = path.strip_prefix('/').unwrap_or(path);
    if path.is_empty() {
        return DEFAULT_PARTITION.to_string();
    }

    let mut segments = path.split('/');
    match (segments.next(), segments.next()) {
        (Some(app), Some(instance)) => format!("{app}-{instance}"),
        (Some(app), None) => app.to_string(),
        (None, _) => DEFAULT_PARTITION.to_string(),
    }
}
