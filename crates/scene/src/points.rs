use foundation::math::LatLng;
use foundation::math::precision::StableF64;
use serde::{Deserialize, Deserializer, Serialize};

/// Stable identifier of a point record, as issued by the data layer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PointId(pub String);

impl PointId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One mentor location as supplied by the directory API.
///
/// Field names follow the API payload. Missing or `null` coordinates become
/// NaN, which marks the record as unlocated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointRecord {
    pub id: PointId,
    #[serde(rename = "full_name")]
    pub display_name: String,
    #[serde(default = "missing_coord", deserialize_with = "nullable_coord")]
    pub latitude: f64,
    #[serde(default = "missing_coord", deserialize_with = "nullable_coord")]
    pub longitude: f64,
    #[serde(default)]
    pub current_role: Option<String>,
    #[serde(default)]
    pub institution: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub research_interests: Vec<String>,
}

fn missing_coord() -> f64 {
    f64::NAN
}

fn nullable_coord<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

impl PointRecord {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            id: PointId::new(id),
            display_name: display_name.into(),
            latitude,
            longitude,
            current_role: None,
            institution: None,
            city: None,
            country: None,
            research_interests: Vec::new(),
        }
    }

    pub fn raw_position(&self) -> LatLng {
        LatLng::new(self.latitude, self.longitude)
    }

    pub fn is_located(&self) -> bool {
        self.raw_position().is_finite()
    }
}

/// Identity of a group of records sharing identical raw coordinates.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClusterKey {
    lat: StableF64,
    lng: StableF64,
}

impl ClusterKey {
    pub fn of(raw: LatLng) -> Self {
        Self {
            lat: StableF64(raw.lat),
            lng: StableF64(raw.lng),
        }
    }

    pub fn position(&self) -> LatLng {
        LatLng::new(self.lat.0, self.lng.0)
    }
}

impl std::fmt::Display for ClusterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let p = self.position();
        write!(f, "{},{}", p.lat + 0.0, p.lng + 0.0)
    }
}

/// A record placed at its resolved display coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayPoint {
    pub record: PointRecord,
    pub position: LatLng,
    pub cluster_key: ClusterKey,
    pub cluster_index: usize,
    pub cluster_size: usize,
}

impl DisplayPoint {
    pub fn id(&self) -> &PointId {
        &self.record.id
    }

    pub fn raw_position(&self) -> LatLng {
        self.record.raw_position()
    }

    pub fn is_clustered(&self) -> bool {
        self.cluster_size > 1
    }
}
