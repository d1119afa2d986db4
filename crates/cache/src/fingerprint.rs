//! Deterministic fingerprints over task inputs
//!
//! Inputs are rendered to a canonical JSON form before hashing: object keys
//! are sorted at every depth and runs of whitespace inside strings collapse
//! to a single space. Array order is significant, so callers must sort any
//! input that is semantically a set.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use taleweave_core::{Fingerprint, TaskKind};

/// Bumped whenever the canonical form changes, so stale entries stop matching
pub const FINGERPRINT_VERSION: u64 = 1;

/// Render a JSON value in canonical form
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

/// SHA-256 over the canonical form of `value`
pub fn fingerprint_value(value: &Value) -> Fingerprint {
    let digest: [u8; 32] = Sha256::digest(canonical_json(value).as_bytes()).into();
    Fingerprint::from_digest(&digest)
}

/// Fingerprint for one task
///
/// Upstream fingerprints are folded in so a downstream artifact is reused
/// only when everything it was derived from is identical too. Their order
/// does not matter.
pub fn task_fingerprint(kind: TaskKind, input: &Value, upstream: &[Fingerprint]) -> Fingerprint {
    let mut upstream: Vec<&str> = upstream.iter().map(Fingerprint::as_str).collect();
    upstream.sort_unstable();
    upstream.dedup();

    let mut doc = Map::new();
    doc.insert("v".into(), Value::from(FINGERPRINT_VERSION));
    doc.insert("kind".into(), Value::from(kind.as_str()));
    doc.insert("input".into(), input.clone());
    doc.insert(
        "upstream".into(),
        Value::Array(upstream.into_iter().map(Value::from).collect()),
    );
    fingerprint_value(&Value::Object(doc))
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) => out.push_str(&value.to_string()),
        Value::String(s) => write_string(&normalize_whitespace(s), out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
    }
}

// Value's Display gives correctly escaped JSON for a string
fn write_string(s: &str, out: &mut String) {
    out.push_str(&Value::String(s.to_owned()).to_string());
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
