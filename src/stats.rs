//! Operational statistics formatting.

use crate::cache::CacheStats;

/// Format cache statistics as `key: value` lines, one per metric, with
/// `-` standing in for unknown values.
pub fn format_stats(stats: &CacheStats) -> String {
    let mut lines = Vec::with_capacity(5);
    lines.push(format!(
        "ts: {}",
        stats
            .checked_at
            .map(|t| t.timestamp().to_string())
            .unwrap_or_else(|| "-".to_string())
    ));
    lines.push(format!(
        "upd: {}",
        stats
            .updated_at
            .map(|t| t.timestamp().to_string())
            .unwrap_or_else(|| "-".to_string())
    ));
    lines.push(format!(
        "count: {}",
        stats
            .item_count
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string())
    ));
    lines.push(format!(
        "size: {}",
        stats
            .byte_size
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string())
    ));
    lines.push(format!(
        "avg: {}",
        stats
            .daily_average
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string())
    ));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_empty_stats() {
        let out = format_stats(&CacheStats::default());
        assert_eq!(out, "ts: -\nupd: -\ncount: -\nsize: -\navg: -");
    }

    #[test]
    fn test_format_full_stats() {
        let stats = CacheStats {
            checked_at: chrono::Utc.timestamp_opt(1_700_000_000, 0).single(),
            updated_at: chrono::Utc.timestamp_opt(1_700_000_100, 0).single(),
            item_count: Some(50),
            byte_size: Some(123456),
            daily_average: Some(7),
        };
        let out = format_stats(&stats);
        assert!(out.contains("ts: 1700000000"));
        assert!(out.contains("upd: 1700000100"));
        assert!(out.contains("count: 50"));
        assert!(out.contains("size: 123456"));
        assert!(out.contains("avg: 7"));
    }
}
