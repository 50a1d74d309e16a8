//! Terminal rendering of scan progress and outcomes.

use async_trait::async_trait;
use std::fmt::Write as _;
use tokio::sync::mpsc::UnboundedReceiver;
use tracked_core::{PlaceId, ScoredServerInstance};
use tracked_scanner::{
    JoinLink, Notification, ScanDelegate, ScanKind, ScanProgress, ServerInsight,
};

/// Delegate that prints join links, candidate tables and messages.
pub struct ConsoleDelegate;

#[async_trait]
impl ScanDelegate for ConsoleDelegate {
    async fn join_instance(&self, place_id: &PlaceId, instance: &ScoredServerInstance) {
        print!("{}", render_join(place_id, instance));
    }

    async fn present_candidates(
        &self,
        place_id: &PlaceId,
        kind: ScanKind,
        candidates: &[ScoredServerInstance],
    ) {
        print!("{}", render_candidates(place_id, kind, candidates));
    }

    async fn notify(&self, notification: Notification) {
        eprintln!("{notification}");
    }
}

/// Print progress events until the sending side is dropped.
pub async fn print_progress(mut events: UnboundedReceiver<ScanProgress>) {
    while let Some(event) = events.recv().await {
        eprintln!("{}", render_progress(&event));
    }
}

fn render_progress(event: &ScanProgress) -> String {
    match event {
        ScanProgress::Page {
            scanned,
            target,
            page,
        } => format!("Page {page}: {scanned}/{target} servers"),
        ScanProgress::HuntRound {
            attempt,
            max_attempts,
            elapsed,
        } => format!(
            "Hunting... round {attempt}/{max_attempts} ({}s)",
            elapsed.as_secs()
        ),
        ScanProgress::Filtering {
            scanned,
            blocked,
            page,
        } => format!("Filtering page {page}: {scanned} checked, {blocked} blocked"),
        ScanProgress::Blocked {
            server_id,
            reason,
            total_blocked,
        } => format!(
            "Blocked {} ({reason}), {total_blocked} so far",
            server_id.as_deref().map_or("<unnamed>", short_id)
        ),
    }
}

fn render_join(place_id: &PlaceId, instance: &ScoredServerInstance) -> String {
    let link = JoinLink::new(place_id, instance.id());
    let server = &instance.instance;

    let mut out = String::new();
    let _ = writeln!(
        out,
        "Best server {} ({}/{} players, score {})",
        short_id(instance.id()),
        server.playing,
        server.max_players,
        instance.score
    );
    let _ = writeln!(out, "  Join:    {}", link.deep_link());
    let _ = writeln!(out, "  Browser: {}", link.web_url());
    out
}

fn render_candidates(
    place_id: &PlaceId,
    kind: ScanKind,
    candidates: &[ScoredServerInstance],
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} servers from {kind} scan:", candidates.len());
    let _ = writeln!(
        out,
        "{:>3}  {:<10} {:>9} {:>6} {:>5} {:>6} {:>5}  {}",
        "#", "server", "players", "ping", "fps", "score", "trust", "badges"
    );

    for (rank, entry) in candidates.iter().enumerate() {
        let server = &entry.instance;
        let insight = ServerInsight::analyze(server);
        let badges: Vec<_> = insight.badges.iter().map(|badge| badge.label()).collect();

        let _ = writeln!(
            out,
            "{:>3}  {:<10} {:>9} {:>6} {:>5} {:>6} {:>5}  {}",
            rank + 1,
            short_id(entry.id()),
            format!("{}/{}", server.playing, server.max_players),
            server
                .measured_ping()
                .map_or_else(|| "-".to_string(), |ping| format!("{ping}ms")),
            server
                .measured_fps()
                .map_or_else(|| "-".to_string(), |fps| format!("{fps:.0}")),
            entry.score,
            insight.trust_score,
            badges.join(", ")
        );
    }

    if let Some(best) = candidates.first() {
        let _ = writeln!(out, "Join #1: {}", JoinLink::new(place_id, best.id()));
    }
    out
}

fn short_id(id: &str) -> &str {
    id.char_indices().nth(8).map_or(id, |(end, _)| &id[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tracked_core::ServerInstance;
    use tracked_scanner::BlockReason;

    fn scored(id: &str, playing: u32, ping: Option<u32>, score: i64) -> ScoredServerInstance {
        ScoredServerInstance::new(
            ServerInstance {
                id: id.to_string(),
                playing,
                max_players: 10,
                ping,
                fps: Some(60.0),
            },
            score,
        )
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("8d2a1b7c-1f0e-4c1b"), "8d2a1b7c");
        assert_eq!(short_id("abc"), "abc");
    }

    #[test]
    fn test_render_join() {
        let place = PlaceId::new("920587237").expect("valid place ID");
        let text = render_join(&place, &scored("8d2a1b7c-1f0e", 2, Some(40), 1020));

        assert!(text.starts_with("Best server 8d2a1b7c (2/10 players, score 1020)"));
        assert!(text.contains("roblox://experiences/start?placeId=920587237&gameInstanceId=8d2a1b7c-1f0e"));
        assert!(text.contains("https://www.roblox.com/games/start?placeId=920587237"));
    }

    #[test]
    fn test_render_candidates() {
        let place = PlaceId::new("920587237").expect("valid place ID");
        let candidates = vec![scored("first", 1, Some(40), 1040), scored("second", 4, None, 700)];

        let text = render_candidates(&place, ScanKind::Deep, &candidates);
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines[0], "2 servers from deep scan:");
        assert!(lines[2].contains("first") && lines[2].contains("40ms") && lines[2].contains("1040"));
        assert!(lines[3].contains("second") && lines[3].contains(" - "));
        assert!(lines[4].ends_with("gameInstanceId=first"));
    }

    #[test]
    fn test_render_progress() {
        assert_eq!(
            render_progress(&ScanProgress::HuntRound {
                attempt: 3,
                max_attempts: 15,
                elapsed: Duration::from_millis(17_400),
            }),
            "Hunting... round 3/15 (17s)"
        );
        assert_eq!(
            render_progress(&ScanProgress::Blocked {
                server_id: None,
                reason: BlockReason::HighPing { ping: 200 },
                total_blocked: 4,
            }),
            "Blocked <unnamed> (high ping (200ms)), 4 so far"
        );
    }
}
