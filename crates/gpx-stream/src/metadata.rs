//! Document-level GPX metadata
//!
//! The `<metadata>` block of a GPX file is flattened into a map from a fixed
//! vocabulary of keys to string values. The same map is harvested by the
//! detector and consumed by the writer.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Key of a flattened metadata value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetadataKey {
    /// `<name>`
    Name,
    /// `<desc>`
    Description,
    /// `<author><name>`
    AuthorName,
    /// `<author><email id domain>` joined as `id@domain`
    AuthorEmail,
    /// `<author><link href>`
    AuthorLinkHref,
    /// `<author><link><text>`
    AuthorLinkText,
    /// `<author><link><type>`
    AuthorLinkType,
    /// `<copyright author>`
    CopyrightAuthor,
    /// `<copyright><year>`
    CopyrightYear,
    /// `<copyright><license>`
    CopyrightLicense,
    /// `<link href>` of the n-th link (1-based)
    LinkHref(u32),
    /// `<link><text>` of the n-th link
    LinkText(u32),
    /// `<link><type>` of the n-th link
    LinkType(u32),
    /// `<time>`
    Time,
    /// `<keywords>`
    Keywords,
}

impl MetadataKey {
    /// Link number for the numbered link keys
    #[must_use]
    pub const fn link_number(self) -> Option<u32> {
        match self {
            Self::LinkHref(n) | Self::LinkText(n) | Self::LinkType(n) => Some(n),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name => f.write_str("NAME"),
            Self::Description => f.write_str("DESCRIPTION"),
            Self::AuthorName => f.write_str("AUTHOR_NAME"),
            Self::AuthorEmail => f.write_str("AUTHOR_EMAIL"),
            Self::AuthorLinkHref => f.write_str("AUTHOR_LINK_HREF"),
            Self::AuthorLinkText => f.write_str("AUTHOR_LINK_TEXT"),
            Self::AuthorLinkType => f.write_str("AUTHOR_LINK_TYPE"),
            Self::CopyrightAuthor => f.write_str("COPYRIGHT_AUTHOR"),
            Self::CopyrightYear => f.write_str("COPYRIGHT_YEAR"),
            Self::CopyrightLicense => f.write_str("COPYRIGHT_LICENSE"),
            Self::LinkHref(n) => write!(f, "LINK_{n}_HREF"),
            Self::LinkText(n) => write!(f, "LINK_{n}_TEXT"),
            Self::LinkType(n) => write!(f, "LINK_{n}_TYPE"),
            Self::Time => f.write_str("TIME"),
            Self::Keywords => f.write_str("KEYWORDS"),
        }
    }
}

/// Error returned when a string is not a metadata key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMetadataKey(pub String);

impl fmt::Display for UnknownMetadataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown metadata key: {}", self.0)
    }
}

impl std::error::Error for UnknownMetadataKey {}

impl FromStr for MetadataKey {
    type Err = UnknownMetadataKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        let key = match upper.as_str() {
            "NAME" => Self::Name,
            "DESCRIPTION" => Self::Description,
            "AUTHOR_NAME" => Self::AuthorName,
            "AUTHOR_EMAIL" => Self::AuthorEmail,
            "AUTHOR_LINK_HREF" => Self::AuthorLinkHref,
            "AUTHOR_LINK_TEXT" => Self::AuthorLinkText,
            "AUTHOR_LINK_TYPE" => Self::AuthorLinkType,
            "COPYRIGHT_AUTHOR" => Self::CopyrightAuthor,
            "COPYRIGHT_YEAR" => Self::CopyrightYear,
            "COPYRIGHT_LICENSE" => Self::CopyrightLicense,
            "TIME" => Self::Time,
            "KEYWORDS" => Self::Keywords,
            other => {
                let link = other
                    .strip_prefix("LINK_")
                    .and_then(|rest| rest.split_once('_'))
                    .and_then(|(n, field)| Some((n.parse::<u32>().ok()?, field)));
                match link {
                    Some((n, "HREF")) if n > 0 => Self::LinkHref(n),
                    Some((n, "TEXT")) if n > 0 => Self::LinkText(n),
                    Some((n, "TYPE")) if n > 0 => Self::LinkType(n),
                    _ => return Err(UnknownMetadataKey(s.to_string())),
                }
            }
        };
        Ok(key)
    }
}

impl Serialize for MetadataKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MetadataKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Flattened document metadata, keyed by [`MetadataKey`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataMap(BTreeMap<MetadataKey, String>);

impl MetadataMap {
    /// Create an empty map
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, replacing any previous one
    pub fn insert(&mut self, key: MetadataKey, value: impl Into<String>) {
        self.0.insert(key, value.into());
    }

    /// Value stored under `key`
    #[must_use]
    pub fn get(&self, key: MetadataKey) -> Option<&str> {
        self.0.get(&key).map(String::as_str)
    }

    /// Whether a value is stored under `key`
    #[must_use]
    pub fn contains(&self, key: MetadataKey) -> bool {
        self.0.contains_key(&key)
    }

    /// Remove a value
    pub fn remove(&mut self, key: MetadataKey) -> Option<String> {
        self.0.remove(&key)
    }

    /// Number of stored values
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map holds no values
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in key order
    pub fn iter(&self) -> impl Iterator<Item = (MetadataKey, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Numbers of the links that carry an href, ascending
    #[must_use]
    pub fn link_numbers(&self) -> Vec<u32> {
        self.0
            .keys()
            .filter_map(|key| match key {
                MetadataKey::LinkHref(n) => Some(*n),
                _ => None,
            })
            .collect()
    }
}

impl FromIterator<(MetadataKey, String)> for MetadataMap {
    fn from_iter<I: IntoIterator<Item = (MetadataKey, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
