//! Endpoint-specific cache lifetimes.
//!
//! Upstream data ranges from effectively static (world size, server
//! version) to tick-by-tick (room objects, game time). The table is matched
//! by substring, first match wins, so more specific patterns must precede
//! the broad ones (`/game/market/stats` before `market`).

use std::time::Duration;

const MINUTE: Duration = Duration::from_secs(60);

/// Lifetime used when no pattern matches.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// Longest lifetime in [`TTL_RULES`]; bounds how long any entry can live.
pub const MAX_TTL: Duration = Duration::from_secs(60 * 60);

/// Ordered `(substring, ttl)` rules.
pub const TTL_RULES: &[(&str, Duration)] = &[
    ("/auth/me", Duration::from_secs(15 * 60)),
    ("/version", MAX_TTL),
    ("/game/world-size", MAX_TTL),
    ("/game/shards/info", Duration::from_secs(10 * 60)),
    ("/user/world-status", Duration::from_secs(2 * 60)),
    ("/game/time", Duration::from_secs(5)),
    ("/game/market/stats", MINUTE),
    ("room-terrain", Duration::from_secs(5 * 60)),
    ("room-status", MINUTE),
    ("room-objects", Duration::from_secs(10)),
    ("user/stats", Duration::from_secs(30)),
    ("user/overview", Duration::from_secs(30)),
    ("market", Duration::from_secs(15)),
];

/// Select the cache lifetime for an endpoint (path, optionally with query).
pub fn ttl_for_endpoint(endpoint: &str) -> Duration {
    TTL_RULES
        .iter()
        .find(|(pattern, _)| endpoint.contains(pattern))
        .map(|(_, ttl)| *ttl)
        .unwrap_or(DEFAULT_TTL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specific_market_rule_wins_over_generic() {
        assert_eq!(ttl_for_endpoint("/game/market/stats?resourceType=energy"), MINUTE);
        assert_eq!(
            ttl_for_endpoint("/game/market/orders-index"),
            Duration::from_secs(15)
        );
    }

    #[test]
    fn every_rule_applies_to_real_endpoints() {
        let cases = [
            ("/auth/me", Duration::from_secs(15 * 60)),
            ("/version", MAX_TTL),
            ("/game/world-size", MAX_TTL),
            ("/game/shards/info", Duration::from_secs(10 * 60)),
            ("/user/world-status", Duration::from_secs(2 * 60)),
            ("/game/time?shard=shard0", Duration::from_secs(5)),
            ("/game/market/stats?resourceType=energy", MINUTE),
            ("/game/room-terrain?room=W7N3&encoded=1", Duration::from_secs(5 * 60)),
            ("/game/room-status?room=W7N3&shard=shard0", MINUTE),
            ("/game/room-objects?room=W1N1&shard=shard0", Duration::from_secs(10)),
            ("/user/stats?interval=8", Duration::from_secs(30)),
            ("/user/overview?interval=8", Duration::from_secs(30)),
            ("/game/market/orders?resourceType=H", Duration::from_secs(15)),
        ];
        for (endpoint, expected) in cases {
            assert_eq!(ttl_for_endpoint(endpoint), expected, "{endpoint}");
        }
    }

    #[test]
    fn first_matching_rule_wins() {
        // both "/game/market/stats" and "market" match
        assert_eq!(ttl_for_endpoint("/game/market/stats"), MINUTE);
        assert_ne!(ttl_for_endpoint("/user/world-status"), DEFAULT_TTL);

        let stats = TTL_RULES
            .iter()
            .position(|(p, _)| *p == "/game/market/stats");
        let market = TTL_RULES.iter().position(|(p, _)| *p == "market");
        assert!(stats < market);
    }

    #[test]
    fn unmatched_endpoint_gets_default() {
        assert_eq!(ttl_for_endpoint("/user/rooms?id=abc"), DEFAULT_TTL);
        assert_eq!(ttl_for_endpoint("/user/rooms"), DEFAULT_TTL);
    }

    #[test]
    fn max_ttl_covers_every_rule() {
        assert!(TTL_RULES.iter().all(|(_, ttl)| *ttl <= MAX_TTL));
        assert!(DEFAULT_TTL <= MAX_TTL);
    }
}
