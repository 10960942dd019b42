use std::collections::BTreeMap;

use analyser_core::models::ExclusionPolicy;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyLookupError {
    #[error("no exclusion policy for `{key}`")]
    UnknownKey { key: String },
    #[error("exclusion policy `{key}` counts {policy_language}, not {language}")]
    LanguageMismatch { key: String, policy_language: String, language: String },
}

/// Exclusion policies keyed by framework name.
#[derive(Debug, Clone, Default)]
pub struct PolicyTable {
    policies: BTreeMap<String, ExclusionPolicy>,
}

impl PolicyTable {
    pub fn new(policies: BTreeMap<String, ExclusionPolicy>) -> Self { Self { policies } }

    pub fn keys(&self) -> impl Iterator<Item = &str> { self.policies.keys().map(String::as_str) }

    /// Look up the policy for `key` and check that it counts `language`.
    /// Never falls back to counting without exclusions.
    pub fn resolve(
        &self,
        key: &str,
        language: &str,
    ) -> Result<&ExclusionPolicy, PolicyLookupError> {
        let policy = self
            .policies
            .get(key)
            .ok_or_else(|| PolicyLookupError::UnknownKey { key: key.to_string() })?;
        if !policy.language.eq_ignore_ascii_case(language) {
            return Err(PolicyLookupError::LanguageMismatch {
                key: key.to_string(),
                policy_language: policy.language.clone(),
                language: language.to_string(),
            });
        }
        Ok(policy)
    }
}
