//! Declarative figure specifications.
//!
//! The shapes follow Plotly's JSON schema (`{"data": [...], "layout": {...}}`)
//! so a browser host can hand them to `Plotly.react` unchanged, while other
//! hosts read the same fields to drive their own plotting layer. Non-finite
//! numbers serialize as `null`, which plotting layers treat as gaps.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;
use sha2::{Digest, Sha256};

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Values {
    Numbers(Vec<f64>),
    Times(Vec<NaiveDateTime>),
}

impl Values {
    pub fn len(&self) -> usize {
        match self {
            Values::Numbers(v) => v.len(),
            Values::Times(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_numbers(&self) -> Option<&[f64]> {
        match self {
            Values::Numbers(v) => Some(v),
            Values::Times(_) => None,
        }
    }

    pub fn as_times(&self) -> Option<&[NaiveDateTime]> {
        match self {
            Values::Times(v) => Some(v),
            Values::Numbers(_) => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Markers,
    Lines,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ColorBar {
    pub len: f64,
    pub y: f64,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct Marker {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colorscale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmin: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmax: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub showscale: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colorbar: Option<ColorBar>,
}

/// Points on a tiled base map.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct MapTrace {
    pub mode: Mode,
    pub lat: Vec<f64>,
    pub lon: Vec<f64>,
    pub hovertext: Vec<String>,
}

/// 2D cartesian series.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct XyTrace {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub mode: Mode,
    pub x: Values,
    pub y: Values,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hovertext: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<Marker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xaxis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yaxis: Option<String>,
}

/// 3D point cloud bound to a scene.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Trace3d {
    pub mode: Mode,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
    pub marker: Marker,
    pub scene: String,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Trace {
    Scattermapbox(MapTrace),
    Scatter(XyTrace),
    /// WebGL variant of `Scatter` for dense point sets.
    Scattergl(XyTrace),
    Scatter3d(Trace3d),
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Margin {
    pub l: u32,
    pub r: u32,
    pub t: u32,
    pub b: u32,
}

impl Margin {
    pub fn uniform(px: u32) -> Self {
        Self {
            l: px,
            r: px,
            t: px,
            b: px,
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Title {
    pub text: String,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct Axis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<Title>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autorange: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<[f64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matches: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub showticklabels: Option<bool>,
}

impl Axis {
    pub fn titled(text: &str) -> Self {
        Self {
            title: Some(Title {
                text: text.to_string(),
            }),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct SceneDomain {
    pub x: [f64; 2],
    pub y: [f64; 2],
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Scene {
    pub domain: SceneDomain,
    pub xaxis: Axis,
    pub yaxis: Axis,
    pub zaxis: Axis,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct MapLayer {
    pub below: String,
    pub sourcetype: String,
    pub sourceattribution: String,
    pub source: Vec<String>,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Mapbox {
    pub style: String,
    pub center: LatLon,
    pub zoom: f64,
    pub layers: Vec<MapLayer>,
}

/// Text placed over a panel, e.g. a "No data" placeholder.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Annotation {
    pub text: String,
    pub xref: String,
    pub yref: String,
    pub x: f64,
    pub y: f64,
    pub showarrow: bool,
}

impl Annotation {
    /// Centered placeholder in the given axis pair's domain.
    pub fn no_data(xaxis: &str, yaxis: &str) -> Self {
        Self {
            text: "No data".to_string(),
            xref: format!("{xaxis} domain"),
            yref: format!("{yaxis} domain"),
            x: 0.5,
            y: 0.5,
            showarrow: false,
        }
    }

    /// Centered placeholder at a paper-coordinate height.
    pub fn no_data_at(y: f64) -> Self {
        Self {
            text: "No data".to_string(),
            xref: "paper".to_string(),
            yref: "paper".to_string(),
            x: 0.5,
            y,
            showarrow: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Layout {
    pub margin: Margin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub showlegend: Option<bool>,
    /// `xaxis`, `yaxis2`, ... keyed the Plotly way.
    #[serde(flatten)]
    pub axes: BTreeMap<String, Axis>,
    /// `scene`, `scene2`, ...
    #[serde(flatten)]
    pub scenes: BTreeMap<String, Scene>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapbox: Option<Mapbox>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
}

impl Layout {
    pub fn with_margin(px: u32) -> Self {
        Self {
            margin: Margin::uniform(px),
            showlegend: None,
            axes: BTreeMap::new(),
            scenes: BTreeMap::new(),
            mapbox: None,
            annotations: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Figure {
    pub data: Vec<Trace>,
    pub layout: Layout,
}

impl Figure {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Hex SHA-256 of the figure's JSON form; equal digests mean
    /// byte-identical figures.
    pub fn digest(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        let hash = Sha256::digest(&bytes);
        hash.iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// Plotly's `make_subplots` row domains, top row first.
pub fn stacked_domains(rows: usize, spacing: f64) -> Vec<[f64; 2]> {
    if rows == 0 {
        return Vec::new();
    }
    let height = (1.0 - spacing * (rows - 1) as f64) / rows as f64;
    (0..rows)
        .map(|row| {
            let top = 1.0 - row as f64 * (height + spacing);
            [(top - height).max(0.0), top]
        })
        .collect()
}

/// Plotly axis id for a 1-based subplot index: `x`, `x2`, ...
pub fn axis_id(prefix: &str, index: usize) -> String {
    if index <= 1 {
        prefix.to_string()
    } else {
        format!("{prefix}{index}")
    }
}

/// Layout key for an axis id: `x` -> `xaxis`, `y3` -> `yaxis3`.
pub fn axis_key(prefix: &str, index: usize) -> String {
    if index <= 1 {
        format!("{prefix}axis")
    } else {
        format!("{prefix}axis{index}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domains_match_make_subplots() {
        let domains = stacked_domains(4, 0.01);
        assert_eq!(domains.len(), 4);
        assert!((domains[0][1] - 1.0).abs() < 1e-12);
        assert!((domains[0][0] - 0.7575).abs() < 1e-9);
        assert!((domains[3][0]).abs() < 1e-9);
        assert!((domains[3][1] - 0.2425).abs() < 1e-9);
        assert!(stacked_domains(0, 0.1).is_empty());
    }

    #[test]
    fn axis_naming() {
        assert_eq!(axis_id("x", 1), "x");
        assert_eq!(axis_id("y", 3), "y3");
        assert_eq!(axis_key("x", 1), "xaxis");
        assert_eq!(axis_key("y", 4), "yaxis4");
    }

    #[test]
    fn serializes_plotly_shape() {
        let mut layout = Layout::with_margin(20);
        layout.axes.insert("yaxis".into(), Axis::titled("Velocity (m/s)"));
        let figure = Figure {
            data: vec![Trace::Scatter(XyTrace {
                name: Some("u".into()),
                mode: Mode::Lines,
                x: Values::Numbers(vec![0.0, 1.0]),
                y: Values::Numbers(vec![f64::NAN, 2.0]),
                hovertext: None,
                marker: None,
                xaxis: None,
                yaxis: None,
            })],
            layout,
        };
        let json: serde_json::Value = serde_json::from_str(&figure.to_json().unwrap()).unwrap();
        assert_eq!(json["data"][0]["type"], "scatter");
        assert_eq!(json["data"][0]["mode"], "lines");
        assert!(json["data"][0]["y"][0].is_null());
        assert_eq!(json["layout"]["yaxis"]["title"]["text"], "Velocity (m/s)");
        assert_eq!(json["layout"]["margin"]["l"], 20);
        assert!(json["layout"].get("annotations").is_none());
    }

    #[test]
    fn digest_tracks_content() {
        let a = Figure {
            data: Vec::new(),
            layout: Layout::with_margin(20),
        };
        let mut b = a.clone();
        assert_eq!(a.digest(), b.digest());
        assert_eq!(a.digest().len(), 64);
        b.layout.showlegend = Some(false);
        assert_ne!(a.digest(), b.digest());
    }
}
