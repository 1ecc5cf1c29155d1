use super::schema::{AreaStatus, ContributingStation};

/// Severity rollup for one area, derived from its contributing stations.
#[derive(PartialEq, Debug, Clone)]
pub struct AreaRollup {
    pub max_water_level: f64,
    pub severity_level: u8,
    pub status: AreaStatus,
}

/// Rolls contributing stations up into a single summary.
///
/// This is a read-through summarizer, not a classifier: `status` comes from
/// the upstream per-area classification verbatim, because the thresholds live
/// server-side. An empty station list yields `Unknown` with zero levels.
pub fn aggregate(status: AreaStatus, stations: &[ContributingStation]) -> AreaRollup {
    if stations.is_empty() {
        return AreaRollup {
            max_water_level: 0.0,
            severity_level: 0,
            status: AreaStatus::Unknown,
        };
    }
    AreaRollup {
        // Levels below the reference datum are negative, so the max must not
        // be seeded with zero
        max_water_level: stations
            .iter()
            .map(|it| it.water_level)
            .fold(f64::NEG_INFINITY, f64::max),
        severity_level: stations.iter().map(|it| it.severity).max().unwrap_or(0),
        status,
    }
}
