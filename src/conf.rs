/// Tunable policy constants for the map session.
///
/// The backend owns classification thresholds; everything here is purely
/// client-side behavior. Defaults match the production app configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Conf {
    /// Trailing debounce window for viewport bursts, in milliseconds.
    pub debounce_ms: u64,
    /// Center must move more than this fraction of the current span to refetch.
    pub center_move_fraction: f64,
    /// Zoom span must change by more than this ratio to refetch.
    pub zoom_change_ratio: f64,
    /// Keep the gate's record of a failed fetch attempt. When false, a failed
    /// fetch clears the gate so the next movement retries.
    pub keep_gate_on_fetch_failure: bool,
    pub min_radius_meters: f64,
    pub max_radius_meters: f64,
    pub default_radius_meters: f64,
    /// Free-tier cap on watch areas.
    pub max_areas: usize,
    /// Two area centers closer than this are considered duplicates.
    pub min_separation_meters: f64,
}

impl Default for Conf {
    fn default() -> Self {
        Conf {
            debounce_ms: 1_000,
            center_move_fraction: 0.3,
            zoom_change_ratio: 0.2,
            keep_gate_on_fetch_failure: true,
            min_radius_meters: 50.0,
            max_radius_meters: 150.0,
            default_radius_meters: 100.0,
            max_areas: 5,
            min_separation_meters: 200.0,
        }
    }
}
