//! Trend ranking for engagement series
//!
//! Fits an ordinary least squares line through per-period engagement counts
//! and buckets the slope into a small ordinal rank. Lower ranks are hotter.

use serde::{Deserialize, Serialize};

/// Fewer points than this cannot carry a trend
pub const MIN_TREND_POINTS: usize = 3;

/// Ordinal trend strength, used only as a sort key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendRank {
    Hot,
    Bubbling,
    Growing,
    Cooling,
    Unranked,
}

impl TrendRank {
    /// Stored integer form: 0 = hottest, 5 = unranked
    pub fn as_i32(self) -> i32 {
        match self {
            TrendRank::Hot => 0,
            TrendRank::Bubbling => 1,
            TrendRank::Growing => 2,
            TrendRank::Cooling => 4,
            TrendRank::Unranked => 5,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TrendRank::Hot => "hot",
            TrendRank::Bubbling => "bubbling",
            TrendRank::Growing => "slowly growing",
            TrendRank::Cooling => "cooling",
            TrendRank::Unranked => "unranked",
        }
    }

    /// Read a stored rank back; anything unknown is unranked
    pub fn from_i32(rank: i32) -> Self {
        match rank {
            0 => TrendRank::Hot,
            1 => TrendRank::Bubbling,
            2 => TrendRank::Growing,
            4 => TrendRank::Cooling,
            _ => TrendRank::Unranked,
        }
    }
}

impl std::fmt::Display for TrendRank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Least squares slope of `points` against their index.
///
/// `None` for fewer than [`MIN_TREND_POINTS`] values or any non-finite input.
pub fn slope(points: &[f64]) -> Option<f64> {
    if points.len() < MIN_TREND_POINTS || points.iter().any(|p| !p.is_finite()) {
        return None;
    }

    let n = points.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = points.iter().sum::<f64>() / n;

    let (mut cov, mut var) = (0.0, 0.0);
    for (i, y) in points.iter().enumerate() {
        let dx = i as f64 - mean_x;
        cov += dx * (y - mean_y);
        var += dx * dx;
    }

    let slope = cov / var;
    slope.is_finite().then_some(slope)
}

/// Classify an engagement series. Total: never fails.
pub fn rank_trend(points: &[f64]) -> TrendRank {
    match slope(points) {
        None => TrendRank::Unranked,
        Some(s) if s >= 0.7 => TrendRank::Hot,
        Some(s) if s >= 0.4 => TrendRank::Bubbling,
        Some(s) if s >= 0.0 => TrendRank::Growing,
        Some(_) => TrendRank::Cooling,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slope_of_straight_line() {
        let s = slope(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert!((s - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_rank_thresholds() {
        assert_eq!(rank_trend(&[0.0, 1.0, 2.0]), TrendRank::Hot);
        assert_eq!(rank_trend(&[0.0, 0.8, 1.6]), TrendRank::Hot);
        assert_eq!(rank_trend(&[0.0, 0.5, 1.0]), TrendRank::Bubbling);
        assert_eq!(rank_trend(&[3.0, 3.0, 3.0, 3.0]), TrendRank::Growing);
        assert_eq!(rank_trend(&[10.0, 8.0, 5.0, 1.0]), TrendRank::Cooling);
    }

    #[test]
    fn test_insufficient_data_is_unranked() {
        assert_eq!(rank_trend(&[]), TrendRank::Unranked);
        assert_eq!(rank_trend(&[4.0, 9.0]), TrendRank::Unranked);
        assert_eq!(rank_trend(&[1.0, f64::NAN, 3.0]), TrendRank::Unranked);
        assert_eq!(TrendRank::Unranked.as_i32(), 5);
    }

    #[test]
    fn test_unranked_sorts_after_classified() {
        let mut ranks = vec![TrendRank::Unranked, TrendRank::Cooling, TrendRank::Hot];
        ranks.sort();
        assert_eq!(ranks, vec![TrendRank::Hot, TrendRank::Cooling, TrendRank::Unranked]);
        assert_eq!(TrendRank::from_i32(TrendRank::Cooling.as_i32()), TrendRank::Cooling);
        assert_eq!(TrendRank::from_i32(3), TrendRank::Unranked);
    }
}
