//! Fingerprint computation for site-tree nodes.
//!
//! A node identifies one scanned resource: method + scheme + host + path,
//! with query and fragment dropped so re-scans with different parameter
//! values land on the same node. Alerts raised on the same node are
//! candidates for duplicate synchronization.

use sha2::{Digest, Sha256};
use url::Url;

/// Normalized resource path for a URI: scheme://host[:port]/path.
///
/// Unparseable URIs fall back to the raw string so they still get a stable,
/// if less precise, node.
pub fn node_path(uri: &str) -> String {
    match Url::parse(uri) {
        Ok(url) => {
            let mut out = format!("{}://", url.scheme());
            if let Some(host) = url.host_str() {
                out.push_str(host);
            }
            if let Some(port) = url.port() {
                out.push_str(&format!(":{port}"));
            }
            out.push_str(url.path());
            out
        }
        Err(_) => uri.to_string(),
    }
}

/// Stable key for the site-tree node of a (method, uri) pair.
pub fn node_key(method: &str, uri: &str) -> String {
    hash(&format!(
        "NODE:{}:{}",
        method.to_ascii_uppercase(),
        node_path(uri)
    ))
}

/// SHA-256 hash a string and return hex-encoded digest.
fn hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_resource_same_key() {
        let a = node_key("GET", "https://example.com/admin/users?id=1");
        let b = node_key("get", "https://example.com/admin/users?id=2#frag");
        assert_eq!(a, b);
    }

    #[test]
    fn method_distinguishes_nodes() {
        let get = node_key("GET", "https://example.com/form");
        let post = node_key("POST", "https://example.com/form");
        assert_ne!(get, post);
    }

    #[test]
    fn path_distinguishes_nodes() {
        let a = node_key("GET", "https://example.com/a");
        let b = node_key("GET", "https://example.com/b");
        assert_ne!(a, b);
    }

    #[test]
    fn node_path_drops_query_keeps_port() {
        assert_eq!(
            node_path("https://example.com:8443/admin/users?id=1"),
            "https://example.com:8443/admin/users"
        );
    }

    #[test]
    fn key_is_hex_sha256() {
        let key = node_key("GET", "https://example.com/");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn unparseable_uri_falls_back_to_raw() {
        assert_eq!(node_path("not a uri"), "not a uri");
    }
}
