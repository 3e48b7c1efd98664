//! Selection-driven view synthesis for glider deployment data.
//!
//! A hosting surface owns a [`Selection`] (deployment key + [`Parameter`]) and
//! asks a [`ViewSynthesizer`] for the figures that depend on it. Figures are
//! declarative, Plotly-compatible specifications ([`Figure`]); rendering them
//! is left to whatever plotting layer hosts the views.

pub mod cache;
pub mod catalog;
pub mod downsample;
pub mod figure;
pub mod normalize;
pub mod parameter;
pub mod resources;
pub mod selection;
pub mod session;
pub mod views;

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use cache::DeploymentCache;
pub use catalog::{load_catalog, parse_roster, Catalog, Deployment, DEFAULT_DEPLOYMENT_KEY};
pub use downsample::{downsample, downsampled_len, DEFAULT_STRIDE};
pub use figure::{Figure, Trace, Values};
pub use normalize::{palette_for, percentile_range, robust_range, ColorScale, Normalizer};
pub use parameter::Parameter;
pub use resources::{
    parse_profile, parse_track, DeploymentData, DirStore, MemoryStore, ProfileRecord, ProfileSet,
    ResourceLoader, ResourceStore, TrackRecord,
};
pub use selection::{Selection, SelectionChange, SelectionRequest};
pub use session::Session;
pub use views::{
    DeploymentViews, FailureKind, ViewFailure, ViewGroup, ViewOutcome, ViewSet, ViewSynthesizer,
    ViewUpdate,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HubError {
    #[error("failed to load deployment roster: {0}")]
    CatalogLoad(String),
    #[error("no {kind} resource for deployment '{key}'")]
    ResourceNotFound { key: String, kind: ResourceKind },
    #[error("failed to parse {kind} resource for deployment '{key}': {detail}")]
    ResourceParse {
        key: String,
        kind: ResourceKind,
        detail: String,
    },
    #[error("unknown parameter: {0}")]
    UnknownParameter(String),
    #[error("no finite values available for a color range")]
    EmptyRange,
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

/// The two per-deployment resources.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Track,
    Profile,
}

impl ResourceKind {
    /// File name suffix appended to a deployment key.
    pub fn file_suffix(self) -> &'static str {
        match self {
            ResourceKind::Track => "_current_tc.csv",
            ResourceKind::Profile => "_ctd_tc.csv",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Track => f.write_str("track"),
            ResourceKind::Profile => f.write_str("profile"),
        }
    }
}

/// Which profile rows feed the percentile clip of a robust color range.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RangeBasis {
    /// The downsampled rows actually drawn in the view.
    Loaded,
    /// Every row of the profile resource.
    FullResolution,
}

impl Default for RangeBasis {
    fn default() -> Self {
        RangeBasis::Loaded
    }
}

/// What the loader does with timestamps that go backwards.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimeOrder {
    /// Keep rows in file order.
    Trust,
    /// Reject the resource with a parse error.
    Validate,
    /// Stable-sort rows by timestamp.
    Sort,
}

impl Default for TimeOrder {
    fn default() -> Self {
        TimeOrder::Sort
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MapSettings {
    pub center_lat: f64,
    pub center_lon: f64,
    pub zoom: f64,
    pub style: String,
    pub tile_source: String,
    pub attribution: String,
}

const OCEAN_BASE_TILES: &str = concat!(
    "https://services.arcgisonline.com/arcgis/rest/services/",
    "Ocean/World_Ocean_Base/MapServer/tile/{z}/{y}/{x}"
);

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            center_lat: 35.3,
            center_lon: -75.4,
            zoom: 7.0,
            style: "white-bg".to_string(),
            tile_source: OCEAN_BASE_TILES.to_string(),
            attribution: "United States Geological Survey".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HubConfig {
    pub data_dir: PathBuf,
    pub roster: PathBuf,
    pub stride: usize,
    pub robust_percentiles: (f64, f64),
    pub range_basis: RangeBasis,
    pub time_order: TimeOrder,
    pub map: MapSettings,
    pub marker_size_3d: f64,
    pub cache_deployments: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            roster: PathBuf::from("data/glider_deployments.csv"),
            stride: DEFAULT_STRIDE,
            robust_percentiles: (5.0, 95.0),
            range_basis: RangeBasis::Loaded,
            time_order: TimeOrder::Sort,
            map: MapSettings::default(),
            marker_size_3d: 3.0,
            cache_deployments: false,
        }
    }
}

impl HubConfig {
    pub fn validate(&self) -> Result<(), HubError> {
        if self.stride == 0 {
            return Err(HubError::InvalidParameter("stride must be >= 1".into()));
        }
        let (low, high) = self.robust_percentiles;
        if !(0.0..=100.0).contains(&low) || !(0.0..=100.0).contains(&high) || low > high {
            return Err(HubError::InvalidParameter(format!(
                "robust percentiles must satisfy 0 <= low <= high <= 100, got ({low}, {high})"
            )));
        }
        if !(self.marker_size_3d > 0.0) {
            return Err(HubError::InvalidParameter(
                "3D marker size must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = HubConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.stride, 10);
        assert_eq!(config.range_basis, RangeBasis::Loaded);
    }

    #[test]
    fn rejects_zero_stride_and_inverted_percentiles() {
        let mut config = HubConfig::default();
        config.stride = 0;
        assert!(matches!(
            config.validate(),
            Err(HubError::InvalidParameter(_))
        ));

        let mut config = HubConfig::default();
        config.robust_percentiles = (95.0, 5.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_config_fills_defaults() {
        let config: HubConfig =
            serde_json::from_str(r#"{"stride": 4, "range_basis": "full_resolution"}"#).unwrap();
        assert_eq!(config.stride, 4);
        assert_eq!(config.range_basis, RangeBasis::FullResolution);
        assert_eq!(config.time_order, TimeOrder::Sort);
        assert_eq!(config.map.zoom, 7.0);
    }
}
