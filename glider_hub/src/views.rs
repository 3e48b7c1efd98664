//! View synthesis: loaded deployment data + selection -> figures.
//!
//! Groups 1-4 depend only on the deployment and come from
//! [`deployment_views`]; group 5 also depends on the parameter and comes from
//! [`parameter_view`]. Both are pure over already-loaded data, so either can
//! be memoized independently by a host.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use ndarray::Array1;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::DeploymentCache;
use crate::catalog::Catalog;
use crate::figure::{
    axis_id, axis_key, stacked_domains, Annotation, Axis, ColorBar, Figure, LatLon, Layout,
    MapLayer, MapTrace, Mapbox, Marker, Mode, Scene, SceneDomain, Trace, Trace3d, Values, XyTrace,
};
use crate::normalize::{ColorScale, Normalizer};
use crate::parameter::Parameter;
use crate::resources::{DeploymentData, ProfileSet, ResourceLoader, ResourceStore, TrackRecord};
use crate::selection::{Selection, SelectionChange};
use crate::{HubConfig, HubError, MapSettings};

const MARGIN_PX: u32 = 20;
const SCENE_MARGIN_PX: u32 = 10;
const PANEL_SPACING: f64 = 0.01;
const SCENE_SPACING: f64 = 0.15;
const COLORBAR_LEN: f64 = 0.25;
const HOVER_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ViewGroup {
    GeographicTrack,
    TransformedTrack,
    Velocity,
    DepthTime,
    Scatter3d,
}

impl ViewGroup {
    pub const ALL: [ViewGroup; 5] = [
        ViewGroup::GeographicTrack,
        ViewGroup::TransformedTrack,
        ViewGroup::Velocity,
        ViewGroup::DepthTime,
        ViewGroup::Scatter3d,
    ];

    /// Element id the dashboard hosts this view under.
    pub fn element_id(self) -> &'static str {
        match self {
            ViewGroup::GeographicTrack => "glider_map",
            ViewGroup::TransformedTrack => "map_tc",
            ViewGroup::Velocity => "time_series",
            ViewGroup::DepthTime => "ctd",
            ViewGroup::Scatter3d => "3d_map",
        }
    }
}

impl fmt::Display for ViewGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.element_id())
    }
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    CatalogLoad,
    ResourceNotFound,
    ResourceParse,
    UnknownParameter,
    EmptyRange,
    InvalidParameter,
}

/// Error state shown in place of a view group.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ViewFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl From<&HubError> for ViewFailure {
    fn from(err: &HubError) -> Self {
        let kind = match err {
            HubError::CatalogLoad(_) => FailureKind::CatalogLoad,
            HubError::ResourceNotFound { .. } => FailureKind::ResourceNotFound,
            HubError::ResourceParse { .. } => FailureKind::ResourceParse,
            HubError::UnknownParameter(_) => FailureKind::UnknownParameter,
            HubError::EmptyRange => FailureKind::EmptyRange,
            HubError::InvalidParameter(_) => FailureKind::InvalidParameter,
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ViewOutcome {
    Ready { figure: Figure },
    Failed { error: ViewFailure },
}

impl ViewOutcome {
    pub fn from_result(result: Result<Figure, &HubError>) -> Self {
        match result {
            Ok(figure) => ViewOutcome::Ready { figure },
            Err(err) => ViewOutcome::Failed {
                error: ViewFailure::from(err),
            },
        }
    }

    pub fn figure(&self) -> Option<&Figure> {
        match self {
            ViewOutcome::Ready { figure } => Some(figure),
            ViewOutcome::Failed { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<&ViewFailure> {
        match self {
            ViewOutcome::Ready { .. } => None,
            ViewOutcome::Failed { error } => Some(error),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.figure().is_some()
    }
}

fn hover_times(track: &[TrackRecord]) -> Vec<String> {
    track
        .iter()
        .map(|r| r.time.format(HOVER_TIME_FORMAT).to_string())
        .collect()
}

/// Trajectory in longitude/latitude over the ocean base map.
pub fn geographic_track_figure(track: &[TrackRecord], map: &MapSettings) -> Figure {
    let trace = MapTrace {
        mode: Mode::Markers,
        lat: track.iter().map(|r| r.lat).collect(),
        lon: track.iter().map(|r| r.lon).collect(),
        hovertext: hover_times(track),
    };
    let mut layout = Layout::with_margin(MARGIN_PX);
    layout.mapbox = Some(Mapbox {
        style: map.style.clone(),
        center: LatLon {
            lat: map.center_lat,
            lon: map.center_lon,
        },
        zoom: map.zoom,
        layers: vec![MapLayer {
            below: "traces".to_string(),
            sourcetype: "raster".to_string(),
            sourceattribution: map.attribution.clone(),
            source: vec![map.tile_source.clone()],
        }],
    });
    Figure {
        data: vec![Trace::Scattermapbox(trace)],
        layout,
    }
}

/// Trajectory in the transformed frame; same rows as the geographic view.
pub fn transformed_track_figure(track: &[TrackRecord]) -> Figure {
    let trace = XyTrace {
        name: None,
        mode: Mode::Markers,
        x: Values::Numbers(track.iter().map(|r| r.xr).collect()),
        y: Values::Numbers(track.iter().map(|r| r.yr).collect()),
        hovertext: Some(hover_times(track)),
        marker: None,
        xaxis: None,
        yaxis: None,
    };
    let mut layout = Layout::with_margin(MARGIN_PX);
    layout.axes.insert(axis_key("x", 1), Axis::titled("xr"));
    layout.axes.insert(axis_key("y", 1), Axis::titled("yr"));
    Figure {
        data: vec![Trace::Scatter(trace)],
        layout,
    }
}

/// Depth-averaged `u` and `v` against time.
pub fn velocity_figure(track: &[TrackRecord]) -> Figure {
    let times: Vec<_> = track.iter().map(|r| r.time).collect();
    let line = |name: &str, values: Vec<f64>| {
        Trace::Scatter(XyTrace {
            name: Some(name.to_string()),
            mode: Mode::Lines,
            x: Values::Times(times.clone()),
            y: Values::Numbers(values),
            hovertext: None,
            marker: None,
            xaxis: None,
            yaxis: None,
        })
    };
    let mut layout = Layout::with_margin(MARGIN_PX);
    layout.axes.insert(axis_key("x", 1), Axis::titled("Time"));
    layout
        .axes
        .insert(axis_key("y", 1), Axis::titled("Velocity (m/s)"));
    Figure {
        data: vec![
            line("u", track.iter().map(|r| r.u).collect()),
            line("v", track.iter().map(|r| r.v).collect()),
        ],
        layout,
    }
}

fn colored_marker(values: Vec<f64>, scale: &ColorScale, colorbar: Option<ColorBar>) -> Marker {
    Marker {
        size: None,
        color: Some(values),
        colorscale: Some(scale.palette.to_string()),
        cmin: scale.clip.map(|(low, _)| low),
        cmax: scale.clip.map(|(_, high)| high),
        showscale: Some(true),
        colorbar,
    }
}

/// Uncolored marker for a series that has nothing to color by.
fn placeholder_marker() -> Marker {
    Marker {
        showscale: Some(false),
        ..Marker::default()
    }
}

/// Four stacked (time, depth) panels, one per parameter, sharing both axes.
pub fn depth_time_figure(profile: &ProfileSet, normalizer: &Normalizer) -> Figure {
    let rows = &profile.rows;
    let times: Vec<_> = rows.iter().map(|r| r.time).collect();
    let depth: Vec<f64> = rows.iter().map(|r| r.depth).collect();
    let domains = stacked_domains(Parameter::ALL.len(), PANEL_SPACING);

    let mut layout = Layout::with_margin(MARGIN_PX);
    layout.showlegend = Some(false);
    let mut data = Vec::with_capacity(Parameter::ALL.len());

    for (row, (parameter, domain)) in Parameter::ALL.into_iter().zip(domains).enumerate() {
        let index = row + 1;
        let xa = axis_id("x", index);
        let ya = axis_id("y", index);
        let last_row = index == Parameter::ALL.len();

        let marker = match normalizer.color_scale(parameter, profile) {
            Ok(scale) => {
                let colorbar = ColorBar {
                    len: COLORBAR_LEN,
                    y: (domain[0] + domain[1]) / 2.0,
                };
                colored_marker(parameter.values(rows), &scale, Some(colorbar))
            }
            Err(err) => {
                warn!("{} panel has no color range: {}", parameter.label(), err);
                layout.annotations.push(Annotation::no_data(&xa, &ya));
                placeholder_marker()
            }
        };

        data.push(Trace::Scattergl(XyTrace {
            name: Some(parameter.label().to_string()),
            mode: Mode::Markers,
            x: Values::Times(times.clone()),
            y: Values::Numbers(depth.clone()),
            hovertext: None,
            marker: Some(marker),
            xaxis: Some(xa.clone()),
            yaxis: Some(ya.clone()),
        }));

        let mut x_axis = if last_row {
            Axis::titled("Time")
        } else {
            Axis::default()
        };
        x_axis.anchor = Some(ya.clone());
        x_axis.showticklabels = Some(last_row);
        if index > 1 {
            x_axis.matches = Some(axis_id("x", 1));
        }
        layout.axes.insert(axis_key("x", index), x_axis);

        let mut y_axis = Axis::titled("Depth (m)");
        y_axis.domain = Some(domain);
        y_axis.anchor = Some(xa);
        y_axis.autorange = Some("reversed".to_string());
        if index > 1 {
            y_axis.matches = Some(axis_id("y", 1));
        }
        layout.axes.insert(axis_key("y", index), y_axis);
    }

    Figure { data, layout }
}

/// Geographic and transformed 3D point clouds colored by `parameter`.
pub fn scatter3d_figure(
    profile: &ProfileSet,
    parameter: Parameter,
    normalizer: &Normalizer,
    marker_size: f64,
) -> Figure {
    let rows = &profile.rows;
    let depth = Array1::from_iter(rows.iter().map(|r| r.depth));
    let z = depth.mapv(|d| -d).to_vec();
    let values = parameter.values(rows);
    let scale = normalizer.color_scale(parameter, profile);
    let domains = stacked_domains(2, SCENE_SPACING);

    let mut layout = Layout::with_margin(SCENE_MARGIN_PX);
    layout.showlegend = Some(false);

    let frames: [(&str, Vec<f64>, Vec<f64>, &str, &str); 2] = [
        (
            "scene",
            rows.iter().map(|r| r.lon).collect(),
            rows.iter().map(|r| r.lat).collect(),
            "lon",
            "lat",
        ),
        (
            "scene2",
            rows.iter().map(|r| r.xr).collect(),
            rows.iter().map(|r| r.yr).collect(),
            "xr",
            "yr",
        ),
    ];

    let mut data = Vec::with_capacity(frames.len());
    for ((scene, x, y, x_title, y_title), domain) in frames.into_iter().zip(domains) {
        let mut marker = match &scale {
            Ok(scale) => colored_marker(values.clone(), scale, None),
            Err(_) => {
                layout
                    .annotations
                    .push(Annotation::no_data_at((domain[0] + domain[1]) / 2.0));
                placeholder_marker()
            }
        };
        marker.size = Some(marker_size);
        data.push(Trace::Scatter3d(Trace3d {
            mode: Mode::Markers,
            x,
            y,
            z: z.clone(),
            marker,
            scene: scene.to_string(),
        }));
        layout.scenes.insert(
            scene.to_string(),
            Scene {
                domain: SceneDomain {
                    x: [0.0, 1.0],
                    y: domain,
                },
                xaxis: Axis::titled(x_title),
                yaxis: Axis::titled(y_title),
                zaxis: Axis::titled("-depth"),
            },
        );
    }
    if let Err(err) = &scale {
        warn!("3D {} view has no color range: {}", parameter.label(), err);
    }

    Figure { data, layout }
}

/// View groups 1-4 of a deployment.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct DeploymentViews {
    pub geographic_track: ViewOutcome,
    pub transformed_track: ViewOutcome,
    pub velocity: ViewOutcome,
    pub depth_time: ViewOutcome,
}

pub fn deployment_views(data: &DeploymentData, config: &HubConfig) -> DeploymentViews {
    let normalizer = Normalizer::from_config(config);
    let track = data.track.as_ref();
    DeploymentViews {
        geographic_track: ViewOutcome::from_result(
            track.map(|t| geographic_track_figure(t, &config.map)),
        ),
        transformed_track: ViewOutcome::from_result(track.map(|t| transformed_track_figure(t))),
        velocity: ViewOutcome::from_result(track.map(|t| velocity_figure(t))),
        depth_time: ViewOutcome::from_result(
            data.profile
                .as_ref()
                .map(|p| depth_time_figure(p, &normalizer)),
        ),
    }
}

/// View group 5 for one parameter.
pub fn parameter_view(
    data: &DeploymentData,
    parameter: Parameter,
    config: &HubConfig,
) -> ViewOutcome {
    let normalizer = Normalizer::from_config(config);
    ViewOutcome::from_result(
        data.profile
            .as_ref()
            .map(|p| scatter3d_figure(p, parameter, &normalizer, config.marker_size_3d)),
    )
}

/// All five view groups for one selection.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ViewSet {
    pub selection: Selection,
    pub geographic_track: ViewOutcome,
    pub transformed_track: ViewOutcome,
    pub velocity: ViewOutcome,
    pub depth_time: ViewOutcome,
    pub scatter3d: ViewOutcome,
}

impl ViewSet {
    pub fn from_parts(
        selection: Selection,
        views: DeploymentViews,
        scatter3d: ViewOutcome,
    ) -> Self {
        Self {
            selection,
            geographic_track: views.geographic_track,
            transformed_track: views.transformed_track,
            velocity: views.velocity,
            depth_time: views.depth_time,
            scatter3d,
        }
    }

    pub fn get(&self, group: ViewGroup) -> &ViewOutcome {
        match group {
            ViewGroup::GeographicTrack => &self.geographic_track,
            ViewGroup::TransformedTrack => &self.transformed_track,
            ViewGroup::Velocity => &self.velocity,
            ViewGroup::DepthTime => &self.depth_time,
            ViewGroup::Scatter3d => &self.scatter3d,
        }
    }

    pub fn failed_groups(&self) -> Vec<ViewGroup> {
        ViewGroup::ALL
            .into_iter()
            .filter(|g| !self.get(*g).is_ready())
            .collect()
    }
}

/// Response to a selection change: only the regenerated groups.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ViewUpdate {
    pub selection: Selection,
    pub change: SelectionChange,
    pub views: BTreeMap<ViewGroup, ViewOutcome>,
}

impl ViewUpdate {
    pub fn regenerated(&self) -> Vec<ViewGroup> {
        self.views.keys().copied().collect()
    }
}

/// Orchestrates loading, downsampling, normalization and figure building.
///
/// Holds only read-only state (catalog, store, config) plus the optional
/// deployment cache, so one instance can serve concurrent sessions.
pub struct ViewSynthesizer {
    loader: ResourceLoader,
    config: HubConfig,
    cache: Option<DeploymentCache>,
}

impl ViewSynthesizer {
    pub fn new(
        catalog: Arc<Catalog>,
        store: Arc<dyn ResourceStore>,
        config: HubConfig,
    ) -> Result<Self, HubError> {
        config.validate()?;
        let loader = ResourceLoader::new(store, catalog, config.time_order);
        let cache = config.cache_deployments.then(DeploymentCache::new);
        Ok(Self {
            loader,
            config,
            cache,
        })
    }

    pub fn catalog(&self) -> &Catalog {
        self.loader.catalog()
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn loader(&self) -> &ResourceLoader {
        &self.loader
    }

    /// Loaded and downsampled resources for `key`, from the cache when
    /// enabled.
    pub fn load(&self, key: &str) -> Arc<DeploymentData> {
        let load = || self.loader.load_deployment(key, &self.config);
        match &self.cache {
            Some(cache) => cache.get_or_load(key, load),
            None => Arc::new(load()),
        }
    }

    pub fn deployment_views(&self, key: &str) -> DeploymentViews {
        deployment_views(&self.load(key), &self.config)
    }

    pub fn parameter_view(&self, selection: &Selection) -> ViewOutcome {
        parameter_view(&self.load(&selection.deployment), selection.parameter, &self.config)
    }

    /// Every view group for `selection`, from a single load.
    pub fn synthesize(&self, selection: &Selection) -> ViewSet {
        let data = self.load(&selection.deployment);
        let views = deployment_views(&data, &self.config);
        let scatter3d = parameter_view(&data, selection.parameter, &self.config);
        let set = ViewSet::from_parts(selection.clone(), views, scatter3d);
        let failed = set.failed_groups();
        if failed.is_empty() {
            info!(
                "synthesized views for {} / {}",
                selection.deployment, selection.parameter
            );
        } else {
            warn!(
                "views for {} / {}: {} of 5 groups failed",
                selection.deployment,
                selection.parameter,
                failed.len()
            );
        }
        set
    }

    /// Regenerate only the groups invalidated by moving from `previous` to
    /// `next`.
    pub fn update(&self, previous: Option<&Selection>, next: &Selection) -> ViewUpdate {
        let change = SelectionChange::between(previous, next);
        let groups = change.affected_groups();
        debug!("selection change {:?} -> {:?}", change, groups);
        let mut views = BTreeMap::new();
        if !groups.is_empty() {
            let data = self.load(&next.deployment);
            if change.deployment {
                let d = deployment_views(&data, &self.config);
                views.insert(ViewGroup::GeographicTrack, d.geographic_track);
                views.insert(ViewGroup::TransformedTrack, d.transformed_track);
                views.insert(ViewGroup::Velocity, d.velocity);
                views.insert(ViewGroup::DepthTime, d.depth_time);
            }
            views.insert(
                ViewGroup::Scatter3d,
                parameter_view(&data, next.parameter, &self.config),
            );
        }
        ViewUpdate {
            selection: next.clone(),
            change,
            views,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::ProfileRecord;
    use crate::RangeBasis;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2017, 5, 10)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn track(n: usize) -> Vec<TrackRecord> {
        (0..n)
            .map(|i| TrackRecord {
                time: t0() + Duration::minutes(i as i64 * 30),
                lat: 35.0 + i as f64 * 0.01,
                lon: -75.0 - i as f64 * 0.01,
                xr: i as f64,
                yr: -(i as f64),
                u: 0.1,
                v: -0.1,
            })
            .collect()
    }

    fn profile(n: usize, chl: impl Fn(usize) -> f64) -> Vec<ProfileRecord> {
        (0..n)
            .map(|i| ProfileRecord {
                time: t0() + Duration::seconds(i as i64),
                depth: (i % 50) as f64,
                lat: 35.0,
                lon: -75.0,
                xr: 0.0,
                yr: 0.0,
                t: 20.0 - i as f64 * 0.01,
                s: 35.0,
                dens: 1025.0,
                chl: chl(i),
            })
            .collect()
    }

    fn marker_of(trace: &Trace) -> Option<&Marker> {
        match trace {
            Trace::Scattergl(t) | Trace::Scatter(t) => t.marker.as_ref(),
            Trace::Scatter3d(t) => Some(&t.marker),
            Trace::Scattermapbox(_) => None,
        }
    }

    #[test]
    fn trajectory_views_share_rows() {
        let rows = track(12);
        let geo = geographic_track_figure(&rows, &MapSettings::default());
        let tc = transformed_track_figure(&rows);
        let (Trace::Scattermapbox(g), Trace::Scatter(t)) = (&geo.data[0], &tc.data[0]) else {
            panic!("unexpected trace types");
        };
        assert_eq!(g.lat.len(), 12);
        assert_eq!(t.x.len(), 12);
        assert_eq!(Some(&g.hovertext), t.hovertext.as_ref());
        let mapbox = geo.layout.mapbox.as_ref().unwrap();
        assert_eq!(mapbox.center.lat, 35.3);
        assert_eq!(mapbox.center.lon, -75.4);
        assert_eq!(mapbox.zoom, 7.0);
        assert!(tc.layout.mapbox.is_none());
    }

    #[test]
    fn velocity_has_u_and_v_lines() {
        let fig = velocity_figure(&track(7));
        assert_eq!(fig.data.len(), 2);
        for (trace, name) in fig.data.iter().zip(["u", "v"]) {
            let Trace::Scatter(t) = trace else {
                panic!("expected scatter");
            };
            assert_eq!(t.name.as_deref(), Some(name));
            assert_eq!(t.mode, Mode::Lines);
            assert_eq!(t.x.as_times().map(|x| x.len()), Some(7));
            assert_eq!(t.y.len(), 7);
        }
        let y_title = fig.layout.axes["yaxis"].title.as_ref().unwrap();
        assert_eq!(y_title.text, "Velocity (m/s)");
    }

    #[test]
    fn depth_time_panel_clips_only_chlorophyll() {
        let set = ProfileSet::new(profile(300, |i| i as f64), 10, RangeBasis::Loaded);
        let fig = depth_time_figure(&set, &Normalizer::default());
        assert_eq!(fig.data.len(), 4);
        for (trace, parameter) in fig.data.iter().zip(Parameter::ALL) {
            let marker = marker_of(trace).unwrap();
            assert_eq!(marker.colorscale.as_deref(), Some(parameter.palette()));
            assert_eq!(marker.cmin.is_some(), parameter.uses_robust_range());
            assert_eq!(marker.color.as_ref().map(Vec::len), Some(30));
        }
        for index in 1..=4 {
            let y = &fig.layout.axes[&axis_key("y", index)];
            assert_eq!(y.autorange.as_deref(), Some("reversed"));
        }
        assert!(fig.layout.annotations.is_empty());
    }

    #[test]
    fn empty_chlorophyll_shows_placeholder_only_in_its_panel() {
        let set = ProfileSet::new(profile(40, |_| f64::NAN), 10, RangeBasis::Loaded);
        let fig = depth_time_figure(&set, &Normalizer::default());
        assert_eq!(fig.layout.annotations.len(), 1);
        assert_eq!(fig.layout.annotations[0].yref, "y4 domain");
        assert!(marker_of(&fig.data[3]).unwrap().color.is_none());
        assert!(marker_of(&fig.data[0]).unwrap().color.is_some());
    }

    #[test]
    fn scatter3d_negates_depth_and_uses_selected_palette() {
        let set = ProfileSet::new(profile(100, |i| i as f64), 10, RangeBasis::Loaded);
        let fig = scatter3d_figure(&set, Parameter::Salinity, &Normalizer::default(), 3.0);
        assert_eq!(fig.data.len(), 2);
        for trace in &fig.data {
            let Trace::Scatter3d(t) = trace else {
                panic!("expected scatter3d");
            };
            assert!(t.z.iter().all(|z| *z <= 0.0));
            assert_eq!(t.marker.colorscale.as_deref(), Some("haline"));
            assert_eq!(t.marker.size, Some(3.0));
            assert!(t.marker.cmin.is_none());
        }
        assert!(fig.layout.scenes.contains_key("scene"));
        assert!(fig.layout.scenes.contains_key("scene2"));
    }

    #[test]
    fn full_resolution_basis_changes_the_clip() {
        // Every 10th row has a large value; the downsampled rows see only those.
        let rows = profile(200, |i| if i % 10 == 0 { 100.0 } else { 1.0 });
        let loaded = ProfileSet::new(rows.clone(), 10, RangeBasis::Loaded);
        let full = ProfileSet::new(rows, 10, RangeBasis::FullResolution);
        let loaded_clip = Normalizer::new((5.0, 95.0), RangeBasis::Loaded)
            .color_scale(Parameter::Chlorophyll, &loaded)
            .unwrap()
            .clip;
        let full_clip = Normalizer::new((5.0, 95.0), RangeBasis::FullResolution)
            .color_scale(Parameter::Chlorophyll, &full)
            .unwrap()
            .clip;
        assert_eq!(loaded_clip, Some((100.0, 100.0)));
        assert_eq!(full_clip.map(|(low, _)| low), Some(1.0));
    }

    #[test]
    fn failures_are_scoped_to_dependent_groups() {
        let data = DeploymentData {
            key: "k".into(),
            track: Err(HubError::ResourceParse {
                key: "k".into(),
                kind: crate::ResourceKind::Track,
                detail: "bad".into(),
            }),
            profile: Ok(ProfileSet::new(profile(20, |i| i as f64), 10, RangeBasis::Loaded)),
        };
        let config = HubConfig::default();
        let views = deployment_views(&data, &config);
        assert_eq!(
            views.velocity.failure().map(|f| f.kind),
            Some(FailureKind::ResourceParse)
        );
        assert!(!views.geographic_track.is_ready());
        assert!(views.depth_time.is_ready());
        assert!(parameter_view(&data, Parameter::Chlorophyll, &config).is_ready());
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let outcome = ViewOutcome::from_result(Err(&HubError::EmptyRange));
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"]["kind"], "empty_range");
    }
}
