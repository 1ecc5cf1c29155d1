use crate::geofence::GeoPoint;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use time::OffsetDateTime;

/// Per-area classification, assigned server-side. The client never derives
/// this from raw levels, it only rolls it up.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Copy, strum::Display)]
#[serde(rename_all = "lowercase")]
pub enum AreaStatus {
    Normal,
    Watch,
    Warning,
    #[serde(other)]
    Unknown,
}

/// One gauge station contributing to an area's rollup.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct ContributingStation {
    pub station_code: String,
    pub water_level: f64,
    pub distance_meters: f64,
    /// 0-5 ordinal, assigned upstream.
    pub severity: u8,
}

/// A persisted watch area, owned by the remote repository. The client keeps a
/// read-through cache, replaced wholesale on every successful list fetch.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct Area {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address_text: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: f64,
    #[serde(default)]
    pub contributing_stations: Vec<ContributingStation>,
    pub status: AreaStatus,
    pub severity_level: u8,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub evaluated_at: OffsetDateTime,
}

impl Area {
    pub fn center(&self) -> GeoPoint {
        GeoPoint {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// Create/update payload. `name` is required and non-empty, which the
/// lifecycle controller checks before any network call.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct AreaInput {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_text: Option<String>,
}

/// Fresh status snapshot for a single area.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct AreaStatusReport {
    pub status: AreaStatus,
    pub severity_level: u8,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub contributing_stations: Vec<ContributingStation>,
    #[serde(with = "time::serde::rfc3339")]
    pub evaluated_at: OffsetDateTime,
}

/// In-progress watch-area definition. At most one exists at a time, owned by
/// the lifecycle controller.
#[derive(PartialEq, Debug, Clone)]
pub struct DraftArea {
    pub center: GeoPoint,
    pub radius_meters: f64,
    /// Set when the flow edits an existing area instead of creating one.
    pub editing_area_id: Option<String>,
}

/// Typed area failure, always surfaced to the caller and never dropped. The
/// variants let the UI offer "change location" for duplicates vs "try again"
/// for everything else.
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum AreaError {
    Duplicate { existing_area_name: String },
    Validation { title: String, message: String },
    Network { title: String, message: String },
    Unknown { title: String, message: String },
}

impl Display for AreaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AreaError::Duplicate { existing_area_name } => {
                write!(f, "Too close to existing area {}", existing_area_name)
            }
            AreaError::Validation { title, message }
            | AreaError::Network { title, message }
            | AreaError::Unknown { title, message } => write!(f, "{}: {}", title, message),
        }
    }
}

/// Write outcome at the repository seam. Hitting the area quota is not an
/// [`AreaError`], callers route it to an upgrade prompt instead.
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum AreaRejection {
    Quota { max_areas: usize },
    Error(AreaError),
}

/// What a submit attempt came to. `Ignored` means the idempotent guard hit:
/// either no confirmed draft existed or another submit was still in flight.
#[derive(PartialEq, Debug, Clone)]
pub enum SubmitOutcome {
    Saved(Area),
    QuotaExceeded { max_areas: usize },
    Failed(AreaError),
    Ignored,
}
