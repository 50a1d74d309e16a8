#![allow(clippy::must_use_candidate)]

use serde::{Deserialize, Serialize};
use std::fmt;
use tracked_core::{AutoBlockerConfig, ServerInstance};

/// Predicate a paginated scan applies to every joinable instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InstanceFilter {
    Any,
    MinPlayers(u32),
    Fresh {
        max_fullness_percent: f64,
        max_ping_ms: u32,
    },
}

impl InstanceFilter {
    /// Joinability is always required on top of the variant's own condition.
    pub fn matches(&self, server: &ServerInstance) -> bool {
        if !server.is_joinable() {
            return false;
        }

        match self {
            InstanceFilter::Any => true,
            InstanceFilter::MinPlayers(min) => server.playing >= *min,
            InstanceFilter::Fresh {
                max_fullness_percent,
                max_ping_ms,
            } => {
                server.fullness_percent() < *max_fullness_percent
                    && server.measured_ping().map_or(true, |ping| ping < *max_ping_ms)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockReason {
    Invalid,
    TooManyPlayers { playing: u32 },
    HighPing { ping: u32 },
    Full,
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockReason::Invalid => f.write_str("invalid server record"),
            BlockReason::TooManyPlayers { playing } => write!(f, "too many players ({playing})"),
            BlockReason::HighPing { ping } => write!(f, "high ping ({ping}ms)"),
            BlockReason::Full => f.write_str("server full"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Block(BlockReason),
}

/// Hard thresholds of the auto-blocker, checked in order.
pub fn auto_blocker_verdict(server: &ServerInstance, config: &AutoBlockerConfig) -> Verdict {
    if server.id.is_empty() {
        return Verdict::Block(BlockReason::Invalid);
    }
    if server.playing > config.max_players {
        return Verdict::Block(BlockReason::TooManyPlayers {
            playing: server.playing,
        });
    }
    if let Some(ping) = server.measured_ping() {
        if ping > config.max_ping_ms {
            return Verdict::Block(BlockReason::HighPing { ping });
        }
    }
    if server.playing >= server.max_players {
        return Verdict::Block(BlockReason::Full);
    }
    Verdict::Accept
}

/// Lowest-population joinable instance with at most `max_players` playing.
///
/// The earliest instance wins ties.
pub fn hunt_candidate(servers: &[ServerInstance], max_players: u32) -> Option<&ServerInstance> {
    servers
        .iter()
        .filter(|server| server.is_joinable() && server.playing <= max_players)
        .min_by_key(|server| server.playing)
}
