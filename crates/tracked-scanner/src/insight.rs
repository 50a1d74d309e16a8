//! Display-only quality badges for a server instance.
//!
//! Everything here is derived deterministically from the listing record.
//! The "age" is a stable pseudo-value computed from the instance id, not a
//! real uptime.

use serde::Serialize;
use tracked_core::ServerInstance;

const BASE_TRUST: i32 = 50;

/// Badge shown next to an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Badge {
    /// Low ping, smooth fps, comfortably populated
    Elite,
    /// Reasonable ping and fps
    Safe,
    /// Nearly empty
    Newcomer,
    /// Long-lived and steady
    Stable,
    /// High ping or poor fps
    Risky,
}

impl Badge {
    /// Short label for display.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Badge::Elite => "Elite server",
            Badge::Safe => "Safe",
            Badge::Newcomer => "Newcomer",
            Badge::Stable => "Stable",
            Badge::Risky => "Risky",
        }
    }

    fn trust_delta(self) -> i32 {
        match self {
            Badge::Elite => 40,
            Badge::Safe => 25,
            Badge::Newcomer => -10,
            Badge::Stable => 15,
            Badge::Risky => -25,
        }
    }
}

/// Derived quality summary of one instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInsight {
    /// 0-100, higher is better
    pub trust_score: u8,
    /// Badges in evaluation order
    pub badges: Vec<Badge>,
    /// Pseudo-age in days (0-364)
    pub simulated_age_days: u32,
}

impl ServerInsight {
    /// Analyze one instance. Records without an id get no badges and zero trust.
    #[must_use]
    pub fn analyze(server: &ServerInstance) -> Self {
        if server.id.is_empty() {
            return Self {
                trust_score: 0,
                badges: Vec::new(),
                simulated_age_days: 0,
            };
        }

        let ping = server.measured_ping().unwrap_or(0);
        let fps = server.measured_fps().unwrap_or(0.0);
        let fullness = server.fullness_percent();
        let age = simulated_age_days(&server.id);

        let mut badges = Vec::new();

        if ping > 0 && ping < 60 && fps >= 58.0 && fullness > 30.0 && fullness < 80.0 {
            badges.push(Badge::Elite);
        } else if ping > 0 && ping < 120 && fps >= 50.0 && fullness >= 20.0 {
            badges.push(Badge::Safe);
        }

        if fullness < 25.0 || server.playing <= 2 {
            badges.push(Badge::Newcomer);
        }

        if age > 100 && fps >= 45.0 {
            badges.push(Badge::Stable);
        }

        if ping > 180 || (fps > 0.0 && fps < 35.0) {
            badges.push(Badge::Risky);
        }

        Self {
            trust_score: trust_score(&badges),
            badges,
            simulated_age_days: age,
        }
    }

    /// Whether a badge was awarded.
    #[must_use]
    pub fn has(&self, badge: Badge) -> bool {
        self.badges.contains(&badge)
    }
}

/// Base trust adjusted by each badge, clamped to 0-100.
fn trust_score(badges: &[Badge]) -> u8 {
    let trust = BASE_TRUST + badges.iter().map(|badge| badge.trust_delta()).sum::<i32>();
    u8::try_from(trust.clamp(0, 100)).unwrap_or(0)
}

fn simulated_age_days(id: &str) -> u32 {
    let sum = id.chars().fold(0u64, |acc, c| acc + u64::from(u32::from(c)));
    u32::try_from(sum % 365).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(id: &str, playing: u32, max_players: u32, ping: Option<u32>, fps: Option<f64>) -> ServerInstance {
        ServerInstance {
            id: id.to_string(),
            playing,
            max_players,
            ping,
            fps,
        }
    }

    #[test]
    fn test_simulated_age_is_stable() {
        // 'a' + 'b' = 97 + 98
        assert_eq!(simulated_age_days("ab"), 195);
        assert_eq!(simulated_age_days("ab"), simulated_age_days("ab"));
        assert!(simulated_age_days("zzzzzzzzzzzz") < 365);
    }

    #[test]
    fn test_elite_and_stable() {
        // age 195, 5/10 players, 40ms, 60fps
        let insight = ServerInsight::analyze(&server("ab", 5, 10, Some(40), Some(60.0)));
        assert_eq!(insight.badges, vec![Badge::Elite, Badge::Stable]);
        assert_eq!(insight.trust_score, 100);
    }

    #[test]
    fn test_safe_newcomer() {
        // "a" has age 97, so no stable badge
        let insight = ServerInsight::analyze(&server("a", 2, 10, Some(100), Some(55.0)));
        assert_eq!(insight.badges, vec![Badge::Safe, Badge::Newcomer]);
        assert_eq!(insight.trust_score, 65);
    }

    #[test]
    fn test_risky_score() {
        let insight = ServerInsight::analyze(&server("a", 1, 50, Some(250), Some(20.0)));
        assert_eq!(insight.badges, vec![Badge::Newcomer, Badge::Risky]);
        assert_eq!(insight.trust_score, 15);
        assert!(insight.has(Badge::Risky));
        assert!(!insight.has(Badge::Elite));
    }

    #[test]
    fn test_trust_score_never_negative() {
        // 50 - 10 - 3 * 25 would be negative
        let insight = ServerInsight::analyze(&server("a", 1, 50, Some(250), Some(20.0)));
        let mut badges = insight.badges.clone();
        badges.extend([Badge::Risky, Badge::Risky]);
        assert_eq!(trust_score(&badges), 0);
        assert_eq!(trust_score(&insight.badges), insight.trust_score);
        assert_eq!(trust_score(&[Badge::Elite, Badge::Safe, Badge::Stable]), 100);
    }

    #[test]
    fn test_missing_id() {
        let insight = ServerInsight::analyze(&server("", 1, 10, Some(40), Some(60.0)));
        assert_eq!(insight.trust_score, 0);
        assert!(insight.badges.is_empty());
    }

    #[test]
    fn test_unmeasured_stats_earn_no_quality_badges() {
        let insight = ServerInsight::analyze(&server("a", 6, 10, Some(0), None));
        assert!(insight.badges.is_empty());
        assert_eq!(insight.trust_score, 50);
    }
}
