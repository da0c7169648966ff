//! Subject keys identify one (match, official) pair, i.e. one mission order.

use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::error::DomainError;

const SEPARATOR: char = ':';

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubjectKey {
    match_id: String,
    official_id: String,
}

impl SubjectKey {
    /// Build a key from its two parts, normalizing both.
    pub fn new(match_id: &str, official_id: &str) -> Result<Self, DomainError> {
        Ok(Self {
            match_id: normalize_part(match_id, "match id")?,
            official_id: normalize_part(official_id, "official id")?,
        })
    }

    /// Parse `<match_id>:<official_id>`, lower-casing and trimming both parts.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let Some((match_id, official_id)) = raw.trim().split_once(SEPARATOR) else {
            return Err(DomainError::validation(format!(
                "subject `{raw}` must look like `<match_id>:<official_id>`"
            )));
        };
        Self::new(match_id, official_id)
    }

    pub fn match_id(&self) -> &str {
        &self.match_id
    }

    pub fn official_id(&self) -> &str {
        &self.official_id
    }
}

fn normalize_part(raw: &str, what: &str) -> Result<String, DomainError> {
    let value = raw.trim().to_ascii_lowercase();
    if value.is_empty() {
        return Err(DomainError::validation(format!("{what} must not be empty")));
    }
    if !value
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    {
        return Err(DomainError::validation(format!(
            "{what} `{value}` contains characters outside [a-z0-9_-]"
        )));
    }
    Ok(value)
}

impl Display for SubjectKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{SEPARATOR}{}", self.match_id, self.official_id)
    }
}

impl FromStr for SubjectKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for SubjectKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SubjectKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        SubjectKey::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Parse raw request items into keys, keeping first-seen order and dropping repeats.
pub fn parse_subject_list(items: &[String]) -> Result<Vec<SubjectKey>, DomainError> {
    if items.is_empty() {
        return Err(DomainError::validation("items must not be empty"));
    }

    let mut seen = HashSet::with_capacity(items.len());
    let mut keys = Vec::with_capacity(items.len());
    for item in items {
        let key = SubjectKey::parse(item)?;
        if seen.insert(key.clone()) {
            keys.push(key);
        }
    }
    Ok(keys)
}
