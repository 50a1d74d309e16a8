//! Desirability scoring for server instances.
//!
//! Scores are pure functions of an instance's stats and a set of weights.
//! Ranking is a stable descending sort, so instances with equal scores keep
//! the order in which the listing returned them.

use std::cmp::Reverse;
use tracked_core::{FreshnessWeights, GeneralWeights, ScoredServerInstance, ServerInstance};

/// Score used by the normal and deep scans: few players, low ping, high fps.
#[must_use]
pub fn general_score(server: &ServerInstance, weights: &GeneralWeights) -> i64 {
    let mut score = weights.base - weights.per_player_penalty * i64::from(server.playing);

    if let Some(ping) = server.ping {
        if ping < weights.low_ping_ms {
            score += weights.low_ping_bonus;
        } else if ping < weights.fair_ping_ms {
            score += weights.fair_ping_bonus;
        } else if ping > weights.high_ping_ms {
            score -= weights.high_ping_penalty;
        }
    }

    if let Some(fps) = server.measured_fps() {
        if fps >= weights.smooth_fps {
            score += weights.smooth_fps_bonus;
        } else if fps >= weights.steady_fps {
            score += weights.steady_fps_bonus;
        }
    }

    let fullness = server.fullness_percent();
    if fullness < weights.sparse_percent {
        score += weights.sparse_bonus;
    } else if fullness > weights.crowded_percent {
        score -= weights.crowded_penalty;
    }

    score
}

/// Score used by the new-server scan: emptiness dominates.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn freshness_score(server: &ServerInstance, weights: &FreshnessWeights) -> i64 {
    let fullness_penalty = (weights.fullness_penalty_per_percent * server.fullness_percent()).round();
    let mut score = weights.base - fullness_penalty as i64;

    if server.playing <= weights.near_empty_players {
        score += weights.near_empty_bonus;
    } else if server.playing <= weights.quiet_players {
        score += weights.quiet_bonus;
    } else if server.playing <= weights.small_players {
        score += weights.small_bonus;
    }

    if let Some(ping) = server.measured_ping() {
        if ping < weights.low_ping_ms {
            score += weights.low_ping_bonus;
        } else if ping < weights.fair_ping_ms {
            score += weights.fair_ping_bonus;
        } else if ping > weights.high_ping_ms {
            score -= weights.high_ping_penalty;
        }
    }

    if let Some(fps) = server.measured_fps() {
        if fps >= weights.smooth_fps {
            score += weights.smooth_fps_bonus;
        } else if fps >= weights.steady_fps {
            score += weights.steady_fps_bonus;
        }
    }

    score
}

/// Score and rank instances with the general weights.
#[must_use]
pub fn score_general(servers: &[ServerInstance], weights: &GeneralWeights) -> Vec<ScoredServerInstance> {
    rank(
        servers
            .iter()
            .map(|server| ScoredServerInstance::new(server.clone(), general_score(server, weights)))
            .collect(),
    )
}

/// Score and rank instances with the freshness weights, tagging them as new.
#[must_use]
pub fn score_freshness(
    servers: &[ServerInstance],
    weights: &FreshnessWeights,
) -> Vec<ScoredServerInstance> {
    rank(
        servers
            .iter()
            .map(|server| ScoredServerInstance {
                is_new: true,
                ..ScoredServerInstance::new(server.clone(), freshness_score(server, weights))
            })
            .collect(),
    )
}

/// Keep the `n` best entries of an already ranked list.
#[must_use]
pub fn top_n(mut ranked: Vec<ScoredServerInstance>, n: usize) -> Vec<ScoredServerInstance> {
    ranked.truncate(n);
    ranked
}

fn rank(mut scored: Vec<ScoredServerInstance>) -> Vec<ScoredServerInstance> {
    // sort_by_key is stable
    scored.sort_by_key(|entry| Reverse(entry.score));
    scored
}
