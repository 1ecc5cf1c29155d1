use crate::area::AreaStatus;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone, Copy)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Reference polygon for the zones view. Closed implicitly, so the last
/// vertex connects back to the first.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct Zone {
    pub id: String,
    pub polygon: Vec<GeoPoint>,
}

/// Read-only gauge snapshot, refreshed wholesale on every fetch cycle.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct Sensor {
    pub id: String,
    pub position: GeoPoint,
    pub water_level: f64,
    pub status: AreaStatus,
}

/// Ray casting, even-odd rule. A horizontal ray is cast at the point's
/// longitude; the inside flag toggles for every edge it crosses.
///
/// Polygons with fewer than 3 vertices are rejected and always return false.
/// Self-intersecting polygons get the even-odd answer, nothing more.
pub fn point_in_polygon(point: &GeoPoint, polygon: &[GeoPoint]) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let pi = &polygon[i];
        let pj = &polygon[j];
        if (pi.longitude > point.longitude) != (pj.longitude > point.longitude) {
            let lat_at_ray = (pj.latitude - pi.latitude) * (point.longitude - pi.longitude)
                / (pj.longitude - pi.longitude)
                + pi.latitude;
            if point.latitude < lat_at_ray {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Sensors contained in the zone's polygon, in input order (stable filter).
/// An unknown zone id yields an empty list.
pub fn sensors_in_zone(zone_id: &str, sensors: &[Sensor], zones: &[Zone]) -> Vec<Sensor> {
    let Some(zone) = zones.iter().find(|it| it.id == zone_id) else {
        return vec![];
    };
    sensors
        .iter()
        .filter(|it| point_in_polygon(&it.position, &zone.polygon))
        .cloned()
        .collect()
}
