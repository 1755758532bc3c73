//! Time-series sampling over the monitoring server's own storage.
//!
//! Two tiers with different granularity and retention: fine-grained
//! "history" rows and hourly-averaged "trends" rollups. Sampling is a
//! backward-fill walk: for each requested point, the most recent sample at
//! or before it, taken from whichever tier still covers that point.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use sqlx::mysql::MySqlPoolOptions;
use sqlx::{MySqlPool, Row};

use super::{BackendError, DatabaseParameters};

pub const HISTORY_DELAY_SECONDS: i64 = 15 * 60;
pub const TREND_DELAY_SECONDS: i64 = 60 * 60;

const BYTES_PER_MEGABYTE: f64 = 1024.0 * 1024.0;

/// The four raw tables. Fixed set, so table names never come from input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesTable {
    History,
    HistoryUint,
    Trends,
    TrendsUint,
}

impl SeriesTable {
    pub fn name(&self) -> &'static str {
        match self {
            SeriesTable::History => "history",
            SeriesTable::HistoryUint => "history_uint",
            SeriesTable::Trends => "trends",
            SeriesTable::TrendsUint => "trends_uint",
        }
    }

    /// History tables store raw values; trend tables store hourly averages.
    pub fn value_column(&self) -> &'static str {
        match self {
            SeriesTable::History | SeriesTable::HistoryUint => "value",
            SeriesTable::Trends | SeriesTable::TrendsUint => "value_avg",
        }
    }
}

// Pools are cached per process, keyed by (db name, host, port); the remote
// time-series database is shared by every settings instance pointing at it.
static POOLS: Lazy<DashMap<String, MySqlPool>> = Lazy::new(DashMap::new);

pub fn pool_for(params: &DatabaseParameters) -> Result<MySqlPool, BackendError> {
    let key = format!("{}/{}/{}", params.name, params.host, params.port);
    if let Some(pool) = POOLS.get(&key) {
        return Ok(pool.clone());
    }
    let url = format!(
        "mysql://{}:{}@{}:{}/{}",
        params.user, params.password, params.host, params.port, params.name
    );
    let pool = MySqlPoolOptions::new().connect_lazy(&url)?;
    POOLS.insert(key, pool.clone());
    Ok(pool)
}

/// Fetch `(clock, value)` rows for one item on one host, newest first,
/// bounded to `[from, to]`.
pub async fn fetch_series(
    pool: &MySqlPool,
    table: SeriesTable,
    item_key: &str,
    host_backend_id: &str,
    from: i64,
    to: i64,
) -> Result<Vec<(i64, f64)>, BackendError> {
    let query = format!(
        "SELECT clock, {value} FROM {table} JOIN items ON {table}.itemid = items.itemid \
         WHERE items.key_ = ? AND items.hostid = ? AND clock BETWEEN ? AND ? \
         ORDER BY clock DESC",
        value = table.value_column(),
        table = table.name(),
    );
    let rows = sqlx::query(&query)
        .bind(item_key)
        .bind(host_backend_id)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await?;
    rows.iter()
        .map(|row| {
            let clock: i64 = row.try_get(0)?;
            let value: f64 = row.try_get(1)?;
            Ok((clock, value))
        })
        .collect()
}

/// Cursor over a descending (clock, value) series.
struct SeriesCursor {
    data: Vec<(i64, f64)>,
    pos: usize,
}

impl SeriesCursor {
    fn new(data: Vec<(i64, f64)>) -> Self {
        Self { data, pos: 0 }
    }

    fn peek(&self) -> Option<(i64, f64)> {
        self.data.get(self.pos).copied()
    }

    fn advance(&mut self) {
        self.pos += 1;
    }
}

/// One value per point, input order preserved.
///
/// Points are processed newest-first. For each bucket `(end, start)` the
/// active tier is history while the bucket start is still inside the
/// retention horizon (`history_start`), trends otherwise, with the matching
/// interval tolerance. A sample `(time, value)` is accepted for the bucket
/// when `time <= end` and it is either recent enough (`end - time <
/// tolerance`) or strictly inside the bucket (`time > start`). A cursor
/// exhausting, or the nearest sample predating the tolerance window, yields
/// `None` for that bucket. Byte-valued items are reported in megabytes.
pub fn sample_points(
    points: &[i64],
    history: Vec<(i64, f64)>,
    trends: Vec<(i64, f64)>,
    history_start: i64,
    history_delay: i64,
    is_byte: bool,
) -> Vec<Option<f64>> {
    if points.is_empty() {
        return Vec::new();
    }

    let mut descending: Vec<i64> = points.to_vec();
    descending.reverse();

    let mut history = SeriesCursor::new(history);
    let mut trends = SeriesCursor::new(trends);

    let mut values = Vec::with_capacity(descending.len());
    for (i, &end) in descending.iter().enumerate() {
        // The earliest point has no neighbour to bound its bucket; its tier
        // is chosen by the point itself and its window is one tolerance wide.
        let tier_boundary = descending.get(i + 1).copied().unwrap_or(end);
        let in_history_tier = tier_boundary > history_start;
        let tolerance = if in_history_tier {
            history_delay
        } else {
            TREND_DELAY_SECONDS
        };
        let start = descending.get(i + 1).copied().unwrap_or(end - tolerance);
        let cursor = if in_history_tier {
            &mut history
        } else {
            &mut trends
        };

        let mut value = None;
        while let Some((time, raw)) = cursor.peek() {
            if time > end {
                cursor.advance();
                continue;
            }
            if end - time < tolerance || time > start {
                value = Some(if is_byte { raw / BYTES_PER_MEGABYTE } else { raw });
            }
            // Either accepted, or the nearest sample predates this bucket's
            // tolerance window; keep it for older buckets.
            break;
        }
        values.push(value);
    }

    values.reverse();
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    const HORIZON: i64 = 0; // every bucket inside the history tier

    #[test]
    fn test_backward_fill_from_history() {
        let points = vec![100, 200, 300];
        let history = vec![(290, 5.0), (180, 3.0)];
        let values = sample_points(&points, history, vec![], HORIZON, HISTORY_DELAY_SECONDS, false);
        // 290 is within tolerance of 300; 180 is inside (100, 200];
        // nothing at or before 100.
        assert_eq!(values, vec![None, Some(3.0), Some(5.0)]);
    }

    #[test]
    fn test_output_length_and_order_match_input() {
        let points = vec![10, 20, 30, 40];
        let values = sample_points(&points, vec![(39, 1.0)], vec![], HORIZON, 5, false);
        assert_eq!(values.len(), points.len());
        assert_eq!(values, vec![None, None, None, Some(1.0)]);
    }

    #[test]
    fn test_sample_too_old_for_tolerance_is_skipped() {
        // sample at 60 is 140 older than point 200 and not inside (150, 200]
        let points = vec![150, 200];
        let values = sample_points(&points, vec![(60, 9.0)], vec![], HORIZON, 100, false);
        assert_eq!(values[1], None);
        // but it is within tolerance of the earlier point 150
        assert_eq!(values[0], Some(9.0));
    }

    #[test]
    fn test_trend_tier_used_beyond_retention_horizon() {
        // horizon splits the buckets: start(1000) <= horizon, so the bucket
        // ending at 2000 reads the trend cursor with the one-hour tolerance.
        let points = vec![1000, 2000];
        let history = vec![(1990, 7.0)];
        let trends = vec![(1800, 4.0)];
        let values = sample_points(&points, history, trends, 1500, HISTORY_DELAY_SECONDS, false);
        assert_eq!(values, vec![None, Some(4.0)]);
    }

    #[test]
    fn test_byte_values_reported_in_megabytes() {
        let points = vec![100];
        let history = vec![(100, 2.0 * 1024.0 * 1024.0)];
        let values = sample_points(&points, history, vec![], HORIZON, HISTORY_DELAY_SECONDS, true);
        assert_eq!(values, vec![Some(2.0)]);
    }

    #[test]
    fn test_exhausted_cursor_yields_none() {
        let points = vec![100, 200, 300];
        let values = sample_points(&points, vec![], vec![], HORIZON, HISTORY_DELAY_SECONDS, false);
        assert_eq!(values, vec![None, None, None]);
    }

    #[test]
    fn test_series_table_value_columns() {
        assert_eq!(SeriesTable::History.value_column(), "value");
        assert_eq!(SeriesTable::HistoryUint.value_column(), "value");
        assert_eq!(SeriesTable::Trends.value_column(), "value_avg");
        assert_eq!(SeriesTable::TrendsUint.value_column(), "value_avg");
    }
}
