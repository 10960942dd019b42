//! Turns a chat message of `*Key:* value` lines into a [`JobDescriptor`].

use std::collections::BTreeMap;

use thiserror::Error;

use crate::{
    config::Sentinels,
    models::{JobDescriptor, Scope},
};

pub const REPO: &str = "Repo";
pub const CLIENT: &str = "Client";
pub const LANGUAGE: &str = "Language";
pub const BRANCH: &str = "Branch";
pub const COMMIT: &str = "Commit";
pub const SCOPE: &str = "Scope";

const KNOWN_KEYS: &[&str] = &[REPO, CLIENT, LANGUAGE, BRANCH, COMMIT, SCOPE];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("`{field}` must not start with `-`: {value}")]
    InvalidReference { field: &'static str, value: String },
}

/// Whether the message mentions any tracked language, case-insensitively.
pub fn mentions_tracked_language(text: &str, tracked: &[String]) -> bool {
    let text = text.to_lowercase();
    tracked.iter().any(|language| !language.is_empty() && text.contains(&language.to_lowercase()))
}

/// Collect every `*Key:* value` line. Recognized keys are stored under their
/// canonical spelling; lines without emphasis or without a colon are skipped.
pub fn message_fields(text: &str) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    for line in text.lines() {
        if !line.contains('*') {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = strip_emphasis(key);
        if key.is_empty() {
            continue;
        }
        let key = KNOWN_KEYS
            .iter()
            .find(|k| k.eq_ignore_ascii_case(&key))
            .map_or(key, |k| k.to_string());
        fields.insert(key, unwrap_link(&strip_emphasis(value)).to_string());
    }
    fields
}

/// Whether the message carries at least one recognized job key.
pub fn has_job_fields(text: &str) -> bool {
    message_fields(text).keys().any(|key| KNOWN_KEYS.contains(&key.as_str()))
}

pub fn parse_job(text: &str, sentinels: &Sentinels) -> Result<JobDescriptor, ParseError> {
    let mut fields = message_fields(text);
    let mut required = |key: &'static str| {
        fields.remove(key).filter(|v| !v.is_empty()).ok_or(ParseError::MissingField(key))
    };
    let repository_uri = required(REPO)?;
    let client_id = required(CLIENT)?;
    let language = required(LANGUAGE)?.to_lowercase();
    let branch = fields.remove(BRANCH).filter(|v| !v.is_empty() && *v != sentinels.branch);
    let revision = fields
        .remove(COMMIT)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case(&sentinels.revision));
    // Refs are handed to git as arguments.
    for (field, value) in [(BRANCH, &branch), (COMMIT, &revision)] {
        if let Some(value) = value
            && value.starts_with('-')
        {
            return Err(ParseError::InvalidReference { field, value: value.clone() });
        }
    }
    let scope = parse_scope(fields.remove(SCOPE).as_deref(), &sentinels.scope);
    Ok(JobDescriptor {
        repository_uri,
        client_id,
        language,
        branch,
        revision,
        scope,
        extra: fields,
    })
}

pub fn parse_scope(value: Option<&str>, sentinel: &str) -> Scope {
    let entries = value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect::<Vec<_>>();
    match entries.as_slice() {
        [] => Scope::All,
        [single] if single.eq_ignore_ascii_case(sentinel) => Scope::All,
        _ => Scope::Entries(entries),
    }
}

fn strip_emphasis(s: &str) -> String { s.replace('*', "").trim().to_string() }

/// Slack wraps links as `<url>` or `<url|label>`.
fn unwrap_link(value: &str) -> &str {
    match value.strip_prefix('<').and_then(|v| v.strip_suffix('>')) {
        Some(inner) => inner.split_once('|').map_or(inner, |(url, _)| url),
        None => value,
    }
}
