//! Port registry snapshot: parsing, serialization and port selection.
//!
//! The persisted form is a flat TSV, one `key<TAB>port` record per line, so
//! it stays human-editable. Locking and file I/O live in
//! `crate::infra::registry`; everything here is pure.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use crate::domain::error::{ConfigError, ProvisionError};

/// Full key→port mapping, ordered by key.
pub type Snapshot = BTreeMap<String, u16>;

/// Parse a registry file. Malformed lines are skipped.
#[must_use]
pub fn parse_snapshot(content: &str) -> Snapshot {
    content
        .lines()
        .filter_map(|line| {
            let (key, port) = line.split_once('\t')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            let port = port.trim().parse::<u16>().ok().filter(|p| *p > 0)?;
            Some((key.to_string(), port))
        })
        .collect()
}

/// Serialize a snapshot, one record per line with a trailing newline.
#[must_use]
pub fn render_snapshot(snapshot: &Snapshot) -> String {
    snapshot
        .iter()
        .map(|(key, port)| format!("{key}\t{port}\n"))
        .collect()
}

/// Reject keys that would not survive a write/parse round trip.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidRegistryKey`] for empty keys, keys with
/// surrounding whitespace, and keys containing a tab or line break.
pub fn validate_key(key: &str) -> Result<(), ConfigError> {
    let unreadable = key.is_empty() || key.trim() != key || key.contains(['\t', '\n', '\r']);
    if unreadable {
        Err(ConfigError::InvalidRegistryKey(key.to_string()))
    } else {
        Ok(())
    }
}

/// Key currently bound to `port`, other than `except`.
#[must_use]
pub fn holder_of<'a>(snapshot: &'a Snapshot, port: u16, except: &str) -> Option<&'a str> {
    snapshot
        .iter()
        .find(|(k, p)| **p == port && k.as_str() != except)
        .map(|(k, _)| k.as_str())
}

/// Choose the port for `key`.
///
/// An existing binding wins regardless of `range`. Otherwise the lowest port
/// in `range` that no other key holds and `is_live` reports free.
///
/// # Errors
///
/// Returns [`ProvisionError::ResourceExhausted`] when every port in the range
/// is taken.
pub fn select_port(
    snapshot: &Snapshot,
    key: &str,
    range: RangeInclusive<u16>,
    mut is_live: impl FnMut(u16) -> bool,
) -> Result<u16, ProvisionError> {
    if let Some(port) = snapshot.get(key) {
        return Ok(*port);
    }
    let (start, end) = (*range.start(), *range.end());
    range
        .into_iter()
        .find(|port| holder_of(snapshot, *port, key).is_none() && !is_live(*port))
        .ok_or(ProvisionError::ResourceExhausted { start, end })
}

/// Entries whose key starts with `project_key:`.
#[must_use]
pub fn entries_for_project(snapshot: &Snapshot, project_key: &str) -> Snapshot {
    let prefix = format!("{project_key}:");
    snapshot
        .iter()
        .filter(|(k, _)| k.starts_with(&prefix))
        .map(|(k, p)| (k.clone(), *p))
        .collect()
}
