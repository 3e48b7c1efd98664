//! Per-deployment track and profile resources.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::downsample::downsample;
use crate::{HubConfig, HubError, RangeBasis, ResourceKind, TimeOrder};

const TIME_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S%.f",
];

/// One row of the current/track resource.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TrackRecord {
    #[serde(deserialize_with = "de_time")]
    pub time: NaiveDateTime,
    #[serde(deserialize_with = "de_float")]
    pub lat: f64,
    #[serde(deserialize_with = "de_float")]
    pub lon: f64,
    #[serde(deserialize_with = "de_float")]
    pub xr: f64,
    #[serde(deserialize_with = "de_float")]
    pub yr: f64,
    #[serde(deserialize_with = "de_float")]
    pub u: f64,
    #[serde(deserialize_with = "de_float")]
    pub v: f64,
}

/// One timestamp + depth sample of the CTD/profile resource.
///
/// `depth` is stored positive (meters below the surface).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProfileRecord {
    #[serde(deserialize_with = "de_time")]
    pub time: NaiveDateTime,
    #[serde(deserialize_with = "de_float")]
    pub depth: f64,
    #[serde(deserialize_with = "de_float")]
    pub lat: f64,
    #[serde(deserialize_with = "de_float")]
    pub lon: f64,
    #[serde(deserialize_with = "de_float")]
    pub xr: f64,
    #[serde(deserialize_with = "de_float")]
    pub yr: f64,
    #[serde(deserialize_with = "de_float")]
    pub t: f64,
    #[serde(deserialize_with = "de_float")]
    pub s: f64,
    #[serde(deserialize_with = "de_float")]
    pub dens: f64,
    #[serde(deserialize_with = "de_float")]
    pub chl: f64,
}

trait Timestamped {
    fn time(&self) -> NaiveDateTime;
}

impl Timestamped for TrackRecord {
    fn time(&self) -> NaiveDateTime {
        self.time
    }
}

impl Timestamped for ProfileRecord {
    fn time(&self) -> NaiveDateTime {
        self.time
    }
}

pub(crate) fn parse_float(raw: &str) -> Result<f64, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("nan")
        || trimmed.eq_ignore_ascii_case("na")
        || trimmed.eq_ignore_ascii_case("null")
    {
        return Ok(f64::NAN);
    }
    trimmed
        .parse::<f64>()
        .map_err(|_| format!("invalid number '{trimmed}'"))
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, String> {
    let trimmed = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.naive_utc());
    }
    for format in TIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(dt);
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| format!("unparseable timestamp '{trimmed}'"))
}

fn de_float<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_float(&raw).map_err(de::Error::custom)
}

fn de_time<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(de::Error::custom)
}

fn parse_rows<T: DeserializeOwned>(
    key: &str,
    kind: ResourceKind,
    input: &[u8],
) -> Result<Vec<T>, HubError> {
    let parse_err = |detail: String| HubError::ResourceParse {
        key: key.to_string(),
        kind,
        detail,
    };
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(input);
    let mut out = Vec::new();
    for row in reader.deserialize::<T>() {
        out.push(row.map_err(|e| parse_err(e.to_string()))?);
    }
    if out.is_empty() {
        return Err(parse_err("resource has no data rows".into()));
    }
    Ok(out)
}

fn apply_time_order<T: Timestamped>(
    key: &str,
    kind: ResourceKind,
    records: &mut [T],
    policy: TimeOrder,
) -> Result<(), HubError> {
    if policy == TimeOrder::Trust {
        return Ok(());
    }
    let first_regression = records
        .windows(2)
        .position(|w| w[1].time() < w[0].time());
    let Some(idx) = first_regression else {
        return Ok(());
    };
    match policy {
        TimeOrder::Validate => Err(HubError::ResourceParse {
            key: key.to_string(),
            kind,
            detail: format!("timestamps decrease at data row {}", idx + 2),
        }),
        TimeOrder::Sort => {
            warn!(
                "{} resource for {} is out of time order (row {}); sorting",
                kind,
                key,
                idx + 2
            );
            records.sort_by_key(|r| r.time());
            Ok(())
        }
        TimeOrder::Trust => Ok(()),
    }
}

/// Parse a track resource, checking time order per `policy`.
pub fn parse_track(
    key: &str,
    input: &[u8],
    policy: TimeOrder,
) -> Result<Vec<TrackRecord>, HubError> {
    let mut records: Vec<TrackRecord> = parse_rows(key, ResourceKind::Track, input)?;
    apply_time_order(key, ResourceKind::Track, &mut records, policy)?;
    Ok(records)
}

/// Parse a profile resource, checking time order per `policy`.
pub fn parse_profile(
    key: &str,
    input: &[u8],
    policy: TimeOrder,
) -> Result<Vec<ProfileRecord>, HubError> {
    let mut records: Vec<ProfileRecord> = parse_rows(key, ResourceKind::Profile, input)?;
    apply_time_order(key, ResourceKind::Profile, &mut records, policy)?;
    Ok(records)
}

/// Storage collaborator holding the raw per-deployment resources.
pub trait ResourceStore: Send + Sync {
    fn fetch(&self, key: &str, kind: ResourceKind) -> Result<Vec<u8>, HubError>;
}

/// Flat directory of `<key>_current_tc.csv` / `<key>_ctd_tc.csv` files.
#[derive(Clone, Debug)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resource_path(&self, key: &str, kind: ResourceKind) -> PathBuf {
        self.root.join(format!("{key}{}", kind.file_suffix()))
    }
}

impl ResourceStore for DirStore {
    fn fetch(&self, key: &str, kind: ResourceKind) -> Result<Vec<u8>, HubError> {
        let path = self.resource_path(key, kind);
        fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => HubError::ResourceNotFound {
                key: key.to_string(),
                kind,
            },
            _ => HubError::ResourceParse {
                key: key.to_string(),
                kind,
                detail: format!("failed to read {}: {e}", path.display()),
            },
        })
    }
}

/// In-process store, for embedding hosts and tests.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    resources: HashMap<(String, ResourceKind), Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, kind: ResourceKind, data: impl Into<Vec<u8>>) {
        self.resources.insert((key.to_string(), kind), data.into());
    }

    pub fn with(mut self, key: &str, kind: ResourceKind, data: impl Into<Vec<u8>>) -> Self {
        self.insert(key, kind, data);
        self
    }
}

impl ResourceStore for MemoryStore {
    fn fetch(&self, key: &str, kind: ResourceKind) -> Result<Vec<u8>, HubError> {
        self.resources
            .get(&(key.to_string(), kind))
            .cloned()
            .ok_or_else(|| HubError::ResourceNotFound {
                key: key.to_string(),
                kind,
            })
    }
}

/// Profile rows as drawn, plus the rows that feed robust color ranges.
#[derive(Clone, Debug, PartialEq)]
pub struct ProfileSet {
    /// Downsampled rows used by every profile view.
    pub rows: Vec<ProfileRecord>,
    pub source_len: usize,
    pub stride: usize,
    full: Option<Vec<ProfileRecord>>,
}

impl ProfileSet {
    pub fn new(full: Vec<ProfileRecord>, stride: usize, basis: RangeBasis) -> Self {
        let rows = downsample(&full, stride);
        let source_len = full.len();
        let full = match basis {
            RangeBasis::FullResolution => Some(full),
            RangeBasis::Loaded => None,
        };
        Self {
            rows,
            source_len,
            stride,
            full,
        }
    }

    /// Rows a percentile clip is computed from.
    pub fn range_rows(&self) -> &[ProfileRecord] {
        self.full.as_deref().unwrap_or(&self.rows)
    }
}

/// Everything the views of one deployment are built from.
///
/// Track and profile failures are kept apart so one broken resource only
/// fails the view groups that depend on it.
#[derive(Clone, Debug)]
pub struct DeploymentData {
    pub key: String,
    pub track: Result<Vec<TrackRecord>, HubError>,
    pub profile: Result<ProfileSet, HubError>,
}

impl DeploymentData {
    pub fn is_complete(&self) -> bool {
        self.track.is_ok() && self.profile.is_ok()
    }
}

/// Resolves catalog keys to parsed resources.
#[derive(Clone)]
pub struct ResourceLoader {
    store: Arc<dyn ResourceStore>,
    catalog: Arc<Catalog>,
    time_order: TimeOrder,
}

impl ResourceLoader {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        catalog: Arc<Catalog>,
        time_order: TimeOrder,
    ) -> Self {
        Self {
            store,
            catalog,
            time_order,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn fetch(&self, key: &str, kind: ResourceKind) -> Result<Vec<u8>, HubError> {
        if !self.catalog.contains(key) {
            return Err(HubError::ResourceNotFound {
                key: key.to_string(),
                kind,
            });
        }
        self.store.fetch(key, kind)
    }

    pub fn load_track(&self, key: &str) -> Result<Vec<TrackRecord>, HubError> {
        let data = self.fetch(key, ResourceKind::Track)?;
        let records = parse_track(key, &data, self.time_order)?;
        debug!("loaded {} track rows for {}", records.len(), key);
        Ok(records)
    }

    pub fn load_profile(&self, key: &str) -> Result<Vec<ProfileRecord>, HubError> {
        let data = self.fetch(key, ResourceKind::Profile)?;
        let records = parse_profile(key, &data, self.time_order)?;
        debug!("loaded {} profile rows for {}", records.len(), key);
        Ok(records)
    }

    /// Load both resources and downsample the profile per `config`.
    pub fn load_deployment(&self, key: &str, config: &HubConfig) -> DeploymentData {
        let track = self.load_track(key);
        let profile = self
            .load_profile(key)
            .map(|rows| ProfileSet::new(rows, config.stride, config.range_basis));
        if let Err(err) = &track {
            warn!("track unavailable: {}", err);
        }
        if let Err(err) = &profile {
            warn!("profile unavailable: {}", err);
        }
        DeploymentData {
            key: key.to_string(),
            track,
            profile,
        }
    }
}
