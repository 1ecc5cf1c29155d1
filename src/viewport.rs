use crate::conf::Conf;
use serde::{Deserialize, Serialize};

/// The visible map region, center plus zoom span. Recreated on every pan or
/// zoom event, never persisted.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone, Copy)]
pub struct Viewport {
    pub center_lat: f64,
    pub center_lon: f64,
    pub lat_delta: f64,
    pub lon_delta: f64,
}

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone, Copy)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl Viewport {
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox {
            min_lat: self.center_lat - self.lat_delta / 2.0,
            min_lon: self.center_lon - self.lon_delta / 2.0,
            max_lat: self.center_lat + self.lat_delta / 2.0,
            max_lon: self.center_lon + self.lon_delta / 2.0,
        }
    }
}

/// Decides whether a viewport movement is worth a marker refetch.
///
/// Owns the last-fetched viewport cell. The cell is updated via
/// [`record_fetched`](Self::record_fetched) only when a fetch is actually
/// issued, not on every change event. Lifetime is the map session.
#[derive(Debug)]
pub struct ViewportChangeGate {
    last_fetched: Option<Viewport>,
    center_move_fraction: f64,
    zoom_change_ratio: f64,
}

impl ViewportChangeGate {
    pub fn new(conf: &Conf) -> Self {
        ViewportChangeGate {
            last_fetched: None,
            center_move_fraction: conf.center_move_fraction,
            zoom_change_ratio: conf.zoom_change_ratio,
        }
    }

    /// True on the first viewport of a session, on a center move beyond the
    /// configured fraction of the current span, or on a zoom span change
    /// beyond the configured ratio. An identical viewport never refetches.
    pub fn should_fetch(&self, new: &Viewport) -> bool {
        let Some(last) = &self.last_fetched else {
            return true;
        };
        let lat_moved = (new.center_lat - last.center_lat).abs();
        let lon_moved = (new.center_lon - last.center_lon).abs();
        if lat_moved > self.center_move_fraction * new.lat_delta
            || lon_moved > self.center_move_fraction * new.lon_delta
        {
            return true;
        }
        let lat_zoom = (new.lat_delta - last.lat_delta).abs() / last.lat_delta;
        let lon_zoom = (new.lon_delta - last.lon_delta).abs() / last.lon_delta;
        lat_zoom > self.zoom_change_ratio || lon_zoom > self.zoom_change_ratio
    }

    /// Records the viewport a fetch was issued for. Failed fetches keep this
    /// record by default so tiny follow-up pans don't turn into a retry storm.
    pub fn record_fetched(&mut self, viewport: Viewport) {
        self.last_fetched = Some(viewport);
    }

    /// Forgets the last attempt, forcing a fetch on the next movement. Callers
    /// that want failed fetches retried use this.
    pub fn clear(&mut self) {
        self.last_fetched = None;
    }

    pub fn last_fetched(&self) -> Option<&Viewport> {
        self.last_fetched.as_ref()
    }
}
