// SPDX-FileCopyrightText: 2025-2026 Groupsync Developers
//
// SPDX-License-Identifier: Apache-2.0

//! Tagged identifiers for remote items.
//!
//! The remote store hands out two identifier spaces for the same logical item:
//! creation returns the parent (secondary) id, while range queries return the
//! occurrence (canonical) id. Until the canonical id is known, a local item
//! carries a fallback id synthesised from the secondary id and the approximate
//! start of the item.

use std::fmt;
use std::str::FromStr;

use jiff::Timestamp;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Scheme prefix carried by every canonical identifier.
pub const CANONICAL_SCHEME: &str = "keriostorage://";

const FALLBACK_SEPARATOR: char = '@';

/// Identifier of a remote item as known by the local store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemId {
    /// Occurrence-level identifier, valid for update, delete and range match.
    Canonical(String),

    /// Parent-level identifier returned by item creation.
    Secondary(String),

    /// Placeholder stored when resolution of the canonical id failed.
    Fallback {
        /// The secondary id the remote returned on creation.
        secondary: String,
        /// Approximate start of the item, used to locate the occurrence.
        approx_start: Timestamp,
    },
}

impl ItemId {
    /// Builds a fallback identifier.
    pub fn fallback(secondary: impl Into<String>, approx_start: Timestamp) -> Self {
        Self::Fallback {
            secondary: secondary.into(),
            approx_start,
        }
    }

    /// Classifies a raw identifier string. Never fails: anything that is
    /// neither canonical nor a well-formed fallback is a secondary id.
    pub fn parse(raw: &str) -> Self {
        if is_canonical(raw) {
            return Self::Canonical(raw.to_string());
        }

        if let Some((secondary, millis)) = raw.rsplit_once(FALLBACK_SEPARATOR)
            && !secondary.is_empty()
            && let Ok(millis) = millis.parse::<i64>()
            && let Ok(approx_start) = Timestamp::from_millisecond(millis)
        {
            return Self::fallback(secondary, approx_start);
        }

        Self::Secondary(raw.to_string())
    }

    /// Whether resolution has already succeeded.
    pub fn is_canonical(&self) -> bool {
        matches!(self, Self::Canonical(_))
    }

    /// The canonical id, if resolved.
    pub fn as_canonical(&self) -> Option<&str> {
        match self {
            Self::Canonical(id) => Some(id),
            _ => None,
        }
    }

    /// The secondary id, if this identifier still needs resolution.
    pub fn secondary(&self) -> Option<&str> {
        match self {
            Self::Canonical(_) => None,
            Self::Secondary(id) => Some(id),
            Self::Fallback { secondary, .. } => Some(secondary),
        }
    }

    /// The approximate start recorded in a fallback id.
    pub fn approx_start(&self) -> Option<Timestamp> {
        match self {
            Self::Fallback { approx_start, .. } => Some(*approx_start),
            _ => None,
        }
    }
}

/// Structural check for canonical identifiers.
pub fn is_canonical(raw: &str) -> bool {
    raw.len() > CANONICAL_SCHEME.len() && raw.starts_with(CANONICAL_SCHEME)
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Canonical(id) | Self::Secondary(id) => f.write_str(id),
            Self::Fallback {
                secondary,
                approx_start,
            } => write!(
                f,
                "{secondary}{FALLBACK_SEPARATOR}{}",
                approx_start.as_millisecond()
            ),
        }
    }
}

impl FromStr for ItemId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl Serialize for ItemId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ItemId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}
