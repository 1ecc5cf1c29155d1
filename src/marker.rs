use crate::area::AreaStatus;
use crate::geofence::GeoPoint;
use crate::viewport::BoundingBox;
use crate::Result;
use geojson::{FeatureCollection, Value};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

/// One severity marker inside the current viewport, as rendered on the map.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct SeverityMarker {
    pub station_code: String,
    pub position: GeoPoint,
    pub water_level: f64,
    pub severity_level: u8,
    pub status: AreaStatus,
}

pub trait MarkerRepository {
    fn fetch_severity_markers(
        &self,
        bbox: BoundingBox,
    ) -> impl std::future::Future<Output = Result<Vec<SeverityMarker>>> + Send;
}

pub struct HttpMarkerRepository {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpMarkerRepository {
    pub fn new(base_url: Url) -> Self {
        HttpMarkerRepository {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

impl MarkerRepository for HttpMarkerRepository {
    async fn fetch_severity_markers(&self, bbox: BoundingBox) -> Result<Vec<SeverityMarker>> {
        let url = self.base_url.join("markers")?;
        let response = self
            .client
            .get(url)
            .query(&[
                ("min_lat", bbox.min_lat),
                ("min_lng", bbox.min_lon),
                ("max_lat", bbox.max_lat),
                ("max_lng", bbox.max_lon),
            ])
            .send()
            .await?
            .error_for_status()?;
        let collection = response.json::<FeatureCollection>().await?;
        let markers = markers_from_feature_collection(collection);
        info!(count = markers.len(), "Fetched severity markers");
        Ok(markers)
    }
}

/// Maps a GeoJSON FeatureCollection onto [`SeverityMarker`]s. Features without
/// a Point geometry or a station code are skipped with a diagnostic, they are
/// not an error for the whole collection.
pub fn markers_from_feature_collection(collection: FeatureCollection) -> Vec<SeverityMarker> {
    let mut res = vec![];
    for feature in collection.features {
        let Some(Value::Point(coords)) = feature.geometry.as_ref().map(|it| &it.value) else {
            warn!("Skipping marker feature without a Point geometry");
            continue;
        };
        if coords.len() < 2 {
            warn!("Skipping marker feature with malformed coordinates");
            continue;
        }
        let position = GeoPoint {
            longitude: coords[0],
            latitude: coords[1],
        };
        let Some(station_code) = feature
            .property("station_code")
            .and_then(|it| it.as_str())
            .map(|it| it.to_owned())
        else {
            warn!("Skipping marker feature without a station_code");
            continue;
        };
        let water_level = feature
            .property("water_level")
            .and_then(|it| it.as_f64())
            .unwrap_or(0.0);
        let severity_level = feature
            .property("severity_level")
            .and_then(|it| it.as_u64())
            .map(|it| it.min(5) as u8)
            .unwrap_or(0);
        let status = feature
            .property("status")
            .cloned()
            .and_then(|it| serde_json::from_value(it).ok())
            .unwrap_or(AreaStatus::Unknown);
        res.push(SeverityMarker {
            station_code,
            position,
            water_level,
            severity_level,
            status,
        });
    }
    res
}
