//! Response comparison for attack-and-compare active rules.
//!
//! Two responses are reduced to a comparable form (status code, normalized
//! body text, a retained header subset, and an extra marker) and scored with
//! a symmetric similarity in [0, 1]; identical normalized text scores 1.0.

use std::collections::{BTreeMap, HashMap};

use crate::models::http::HttpMessage;

/// Normalized, transient view of a response used for similarity scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparableResponse {
    status: u16,
    body: String,
    headers: BTreeMap<String, String>,
    extra: String,
}

impl ComparableResponse {
    pub fn new(
        status: u16,
        body: &str,
        headers: BTreeMap<String, String>,
        extra: impl Into<String>,
    ) -> Self {
        Self {
            status,
            body: normalize(body),
            headers,
            extra: extra.into(),
        }
    }

    /// Build from a completed message, retaining the named headers.
    ///
    /// A message without a response compares as an empty body with status 0.
    pub fn from_message(msg: &HttpMessage, retained_headers: &[&str], extra: &str) -> Self {
        let (status, body, headers) = match &msg.response {
            Some(response) => {
                let headers = retained_headers
                    .iter()
                    .filter_map(|name| {
                        response
                            .header(name)
                            .map(|value| (name.to_ascii_lowercase(), value.to_string()))
                    })
                    .collect();
                (response.status, response.body.as_str(), headers)
            }
            None => (0, "", BTreeMap::new()),
        };
        Self::new(status, body, headers, extra)
    }

    /// Symmetric similarity against another response.
    ///
    /// Status-code or marker disagreement is conclusive (0.0); otherwise the
    /// score is a token-frequency Dice coefficient over the normalized
    /// bodies, scaled down by mismatching retained headers.
    pub fn compare_with(&self, other: &ComparableResponse) -> f64 {
        if self.status != other.status || self.extra != other.extra {
            return 0.0;
        }
        token_similarity(&self.body, &other.body) * header_factor(&self.headers, &other.headers)
    }
}

/// Lowercase and collapse runs of whitespace.
fn normalize(body: &str) -> String {
    body.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

fn token_counts(text: &str) -> HashMap<&str, usize> {
    let mut counts = HashMap::new();
    for token in text.split(|c: char| !c.is_alphanumeric()) {
        if !token.is_empty() {
            *counts.entry(token).or_insert(0) += 1;
        }
    }
    counts
}

/// Dice coefficient over token multisets. Empty-vs-empty is identical.
fn token_similarity(a: &str, b: &str) -> f64 {
    let counts_a = token_counts(a);
    let counts_b = token_counts(b);
    let total: usize = counts_a.values().sum::<usize>() + counts_b.values().sum::<usize>();
    if total == 0 {
        return 1.0;
    }
    let common: usize = counts_a
        .iter()
        .filter_map(|(token, count)| counts_b.get(token).map(|other| count.min(other)))
        .sum();
    (2 * common) as f64 / total as f64
}

/// Fraction of retained header keys whose values agree; 1.0 when neither
/// side retained anything.
fn header_factor(a: &BTreeMap<String, String>, b: &BTreeMap<String, String>) -> f64 {
    let keys: Vec<&String> = a.keys().chain(b.keys().filter(|k| !a.contains_key(*k))).collect();
    if keys.is_empty() {
        return 1.0;
    }
    let matching = keys.iter().filter(|k| a.get(**k) == b.get(**k)).count();
    matching as f64 / keys.len() as f64
}
