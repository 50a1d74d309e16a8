//! Shared types used across the Tracked workspace.
//!
//! This module defines the identifiers and listing records exchanged between
//! the upstream server-list API, the scanner and its callers.

use crate::error::TrackedError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Newtype for game place identifiers with validation.
///
/// Place IDs are positive decimal integers (1-20 digits, no leading zero).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlaceId(String);

impl PlaceId {
    /// Create a new `PlaceId` from a string.
    ///
    /// Surrounding whitespace is trimmed before validation.
    ///
    /// # Errors
    /// Returns error if the ID is not a well-formed numeric identifier.
    pub fn new(id: impl Into<String>) -> Result<Self, TrackedError> {
        let id = id.into();
        let id = id.trim().to_string();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(id: &str) -> Result<(), TrackedError> {
        static PLACE_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = PLACE_REGEX.get_or_init(|| Regex::new(r"^[1-9][0-9]{0,19}$").expect("valid regex"));

        if regex.is_match(id) {
            Ok(())
        } else {
            Err(TrackedError::Validation(format!(
                "invalid place ID: must be a positive numeric identifier, got '{id}'"
            )))
        }
    }
}

impl fmt::Display for PlaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Listing order requested from the server-list API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortOrder {
    /// Ascending by population; old, emptying instances first
    Asc,
    /// Descending; recently opened instances surface near the head
    Desc,
}

impl SortOrder {
    /// Query-string value expected by the API.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "Asc",
            SortOrder::Desc => "Desc",
        }
    }

    /// The opposite direction.
    #[must_use]
    pub fn reversed(self) -> Self {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One running game instance as reported by the server-list API.
///
/// Records that lack an `id` or carry non-numeric counts fail to decode and
/// are treated as structurally invalid by the scanner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInstance {
    /// Opaque instance identifier, required for joining
    pub id: String,
    /// Current occupancy
    pub playing: u32,
    /// Capacity
    pub max_players: u32,
    /// Server-reported ping in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ping: Option<u32>,
    /// Server tick rate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
}

impl ServerInstance {
    /// Whether a player could join this instance right now.
    #[must_use]
    pub fn is_joinable(&self) -> bool {
        !self.id.is_empty() && self.max_players > 0 && self.playing < self.max_players
    }

    /// Occupancy as a percentage of capacity (0 when capacity is unknown).
    #[must_use]
    pub fn fullness_percent(&self) -> f64 {
        if self.max_players == 0 {
            return 0.0;
        }
        f64::from(self.playing) / f64::from(self.max_players) * 100.0
    }

    /// Ping when it was reported and is non-zero.
    ///
    /// The API reports `0` when no measurement is available.
    #[must_use]
    pub fn measured_ping(&self) -> Option<u32> {
        self.ping.filter(|p| *p > 0)
    }

    /// Tick rate when it was reported and is non-zero.
    #[must_use]
    pub fn measured_fps(&self) -> Option<f64> {
        self.fps.filter(|f| *f > 0.0)
    }
}

/// A server instance annotated with a desirability score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredServerInstance {
    /// The scored instance
    #[serde(flatten)]
    pub instance: ServerInstance,
    /// Desirability, higher is better
    pub score: i64,
    /// Produced by a freshness search
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_new: bool,
    /// Produced by a hunt / auto-join search
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_forced: bool,
}

impl ScoredServerInstance {
    /// Wrap an instance with a score and no display tags.
    #[must_use]
    pub fn new(instance: ServerInstance, score: i64) -> Self {
        Self {
            instance,
            score,
            is_new: false,
            is_forced: false,
        }
    }

    /// Shorthand for the instance identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.instance.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_place_id_valid() {
        let id = PlaceId::new("920587237").expect("valid place ID");
        assert_eq!(id.as_str(), "920587237");
        assert_eq!(id.to_string(), "920587237");

        let trimmed = PlaceId::new("  606849621 ").expect("whitespace is trimmed");
        assert_eq!(trimmed.as_str(), "606849621");
    }

    #[test]
    fn test_place_id_invalid() {
        assert!(PlaceId::new("").is_err());
        assert!(PlaceId::new("0").is_err());
        assert!(PlaceId::new("0123").is_err());
        assert!(PlaceId::new("12a4").is_err());
        assert!(PlaceId::new("-5").is_err());
        assert!(PlaceId::new("123456789012345678901").is_err());
    }

    #[test]
    fn test_sort_order() {
        assert_eq!(SortOrder::Asc.as_str(), "Asc");
        assert_eq!(SortOrder::Desc.to_string(), "Desc");
        assert_eq!(SortOrder::Asc.reversed(), SortOrder::Desc);
    }

    #[test]
    fn test_server_instance_from_api_json() {
        let json = r#"{
            "id": "8d2a1b7c",
            "maxPlayers": 12,
            "playing": 3,
            "playerTokens": ["a", "b", "c"],
            "fps": 59.8,
            "ping": 74
        }"#;
        let server: ServerInstance = serde_json::from_str(json).expect("decode instance");
        assert_eq!(server.id, "8d2a1b7c");
        assert_eq!(server.max_players, 12);
        assert_eq!(server.playing, 3);
        assert_eq!(server.ping, Some(74));
        assert!(server.is_joinable());
        assert!((server.fullness_percent() - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_server_instance_null_stats() {
        let json = r#"{"id": "x", "maxPlayers": 10, "playing": 0, "ping": null, "fps": null}"#;
        let server: ServerInstance = serde_json::from_str(json).expect("decode instance");
        assert_eq!(server.measured_ping(), None);
        assert_eq!(server.measured_fps(), None);
    }

    #[test]
    fn test_server_instance_missing_id_is_rejected() {
        let json = r#"{"maxPlayers": 10, "playing": 1}"#;
        assert!(serde_json::from_str::<ServerInstance>(json).is_err());
    }

    #[test]
    fn test_joinability() {
        let mut server = ServerInstance {
            id: "abc".to_string(),
            playing: 10,
            max_players: 10,
            ping: Some(0),
            fps: None,
        };
        assert!(!server.is_joinable());
        assert_eq!(server.measured_ping(), None);

        server.playing = 9;
        assert!(server.is_joinable());

        server.id.clear();
        assert!(!server.is_joinable());
    }

    #[test]
    fn test_scored_instance_serializes_flat() {
        let scored = ScoredServerInstance::new(
            ServerInstance {
                id: "abc".to_string(),
                playing: 1,
                max_players: 8,
                ping: None,
                fps: None,
            },
            920,
        );
        let value = serde_json::to_value(&scored).expect("serialize scored instance");
        assert_eq!(value["id"], "abc");
        assert_eq!(value["maxPlayers"], 8);
        assert_eq!(value["score"], 920);
        assert!(value.get("isNew").is_none());
    }
}
