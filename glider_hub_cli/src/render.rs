//! Static PNG/SVG rendering of figure specifications through plotters.
//!
//! The renderer reads the same fields a browser host would: trace types,
//! marker colors and clips, axis titles, reversed axes and "No data"
//! annotations. Tile layers are not fetched; the geographic track is drawn
//! as plain lon/lat.

use std::ops::Range;
use std::panic;
use std::path::Path;

use anyhow::Result;
use chrono::{Duration, NaiveDateTime};
use glider_hub::figure::{axis_key, Marker};
use glider_hub::{Figure, Trace, Values};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::{FontDesc, FontFamily, FontStyle};
use plotters_backend::{
    BackendColor, BackendCoord, BackendStyle, BackendTextStyle, DrawingBackend, DrawingErrorKind,
};
use tracing::debug;

use crate::colormap::{palette, ColorMapper};

const POINT_RADIUS: i32 = 2;
const LINE_COLORS: [RGBColor; 2] = [RGBColor(31, 119, 180), RGBColor(255, 127, 14)];
const MARKER_COLOR: RGBColor = RGBColor(31, 119, 180);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChartKind {
    Png,
    Svg,
}

impl ChartKind {
    pub fn extension(self) -> &'static str {
        match self {
            ChartKind::Png => "png",
            ChartKind::Svg => "svg",
        }
    }
}

/// Render `figure` to `path`, turning backend panics into errors.
pub fn render_chart_guard(
    figure: &Figure,
    path: &Path,
    kind: ChartKind,
    size: (u32, u32),
) -> Result<(), String> {
    let render =
        || render_figure(figure, path, kind, size).map_err(|e| format!("plotting error: {e}"));
    panic::catch_unwind(panic::AssertUnwindSafe(render))
        .map_err(|_| "plotting backend panicked".to_string())?
}

fn render_figure(figure: &Figure, path: &Path, kind: ChartKind, size: (u32, u32)) -> Result<()> {
    match kind {
        ChartKind::Png => {
            let root = TextSafeBackend::new(BitMapBackend::new(path, size)).into_drawing_area();
            draw_figure(root, figure)
        }
        ChartKind::Svg => {
            let root = TextSafeBackend::new(SVGBackend::new(path, size)).into_drawing_area();
            draw_figure(root, figure)
        }
    }
}

fn draw_figure<DB>(root: DrawingArea<DB, Shift>, figure: &Figure) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;
    if figure.data.iter().any(|t| matches!(t, Trace::Scatter3d(_))) {
        draw_scenes(&root, figure)?;
    } else if figure.data.iter().any(|t| matches!(t, Trace::Scattergl(_))) {
        draw_panels(&root, figure)?;
    } else {
        draw_single(&root, figure)?;
    }
    root.present()?;
    Ok(())
}

/// A 2D series in plotting coordinates; times become hours since `origin`.
struct Series {
    name: Option<String>,
    points: Vec<(f64, f64)>,
    colors: Option<Vec<f64>>,
    mapper: Option<ColorMapper>,
    lines: bool,
}

fn time_origin(figure: &Figure) -> Option<NaiveDateTime> {
    figure
        .data
        .iter()
        .filter_map(|t| match t {
            Trace::Scatter(xy) | Trace::Scattergl(xy) => xy.x.as_times(),
            _ => None,
        })
        .flat_map(|times| times.iter().copied())
        .min()
}

fn to_axis(values: &Values, origin: Option<NaiveDateTime>) -> Vec<f64> {
    match values {
        Values::Numbers(v) => v.clone(),
        Values::Times(times) => {
            let Some(origin) = origin else {
                return vec![f64::NAN; times.len()];
            };
            times
                .iter()
                .map(|t| (*t - origin).num_milliseconds() as f64 / 3_600_000.0)
                .collect()
        }
    }
}

fn hours_label(origin: NaiveDateTime, hours: f64) -> String {
    let t = origin + Duration::milliseconds((hours * 3_600_000.0) as i64);
    t.format("%m-%d %H:%M").to_string()
}

fn mapper_for(marker: &Marker) -> Option<ColorMapper> {
    let colors = marker.color.as_ref()?;
    let palette = palette(marker.colorscale.as_deref().unwrap_or_default());
    ColorMapper::fitted(palette, colors, marker.cmin.zip(marker.cmax))
}

fn series_of(trace: &Trace, origin: Option<NaiveDateTime>) -> Option<Series> {
    match trace {
        Trace::Scattermapbox(map) => Some(Series {
            name: None,
            points: map.lon.iter().copied().zip(map.lat.iter().copied()).collect(),
            colors: None,
            mapper: None,
            lines: false,
        }),
        Trace::Scatter(xy) | Trace::Scattergl(xy) => {
            let x = to_axis(&xy.x, origin);
            let y = to_axis(&xy.y, origin);
            let marker = xy.marker.as_ref();
            Some(Series {
                name: xy.name.clone(),
                points: x.into_iter().zip(y).collect(),
                colors: marker.and_then(|m| m.color.clone()),
                mapper: marker.and_then(mapper_for),
                lines: xy.mode == glider_hub::figure::Mode::Lines,
            })
        }
        Trace::Scatter3d(_) => None,
    }
}

fn padded_extent(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !lo.is_finite() {
        return 0.0..1.0;
    }
    let pad = ((hi - lo) * 0.03).max(1e-6);
    (lo - pad)..(hi + pad)
}

fn axis_title(figure: &Figure, prefix: &str, index: usize) -> Option<String> {
    figure
        .layout
        .axes
        .get(&axis_key(prefix, index))
        .and_then(|a| a.title.as_ref())
        .map(|t| t.text.clone())
}

fn is_reversed(figure: &Figure, index: usize) -> bool {
    figure
        .layout
        .axes
        .get(&axis_key("y", index))
        .and_then(|a| a.autorange.as_deref())
        == Some("reversed")
}

fn label_font() -> FontDesc<'static> {
    FontDesc::new(FontFamily::SansSerif, 14.0, FontStyle::Normal)
}

fn draw_no_data<DB>(area: &DrawingArea<DB, Shift>) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let (w, h) = area.dim_in_pixel();
    area.draw(&Text::new(
        "No data",
        (w as i32 / 2 - 30, h as i32 / 2),
        label_font().color(&BLACK.mix(0.6)),
    ))?;
    Ok(())
}

/// Draw `series` on one cartesian panel. `flip_y` plots `-y` and labels it
/// back, so a reversed axis reads top-down.
fn draw_series_panel<DB>(
    area: &DrawingArea<DB, Shift>,
    series: &[Series],
    x_title: Option<&str>,
    y_title: Option<&str>,
    origin: Option<NaiveDateTime>,
    flip_y: bool,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let sign = if flip_y { -1.0 } else { 1.0 };
    let x_range = padded_extent(series.iter().flat_map(|s| s.points.iter().map(|p| p.0)));
    let y_range = padded_extent(series.iter().flat_map(|s| s.points.iter().map(|p| sign * p.1)));

    let mut chart = ChartBuilder::on(area)
        .margin(12)
        .x_label_area_size(if x_title.is_some() { 40 } else { 20 })
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, y_range)?;

    let x_fmt = |v: &f64| match origin {
        Some(origin) => hours_label(origin, *v),
        None => format!("{v:.2}"),
    };
    let y_fmt = |v: &f64| format!("{:.1}", sign * v);
    let mut mesh = chart.configure_mesh();
    mesh.light_line_style(&TRANSPARENT)
        .x_labels(6)
        .x_label_formatter(&x_fmt)
        .y_label_formatter(&y_fmt)
        .label_style(label_font().color(&BLACK.mix(0.85)));
    if let Some(title) = x_title {
        mesh.x_desc(title);
    }
    if let Some(title) = y_title {
        mesh.y_desc(title);
    }
    mesh.draw()?;

    for (idx, s) in series.iter().enumerate() {
        let finite = s
            .points
            .iter()
            .enumerate()
            .filter(|(_, (x, y))| x.is_finite() && y.is_finite());
        if s.lines {
            let color = LINE_COLORS[idx % LINE_COLORS.len()];
            let drawn = chart.draw_series(LineSeries::new(
                finite.map(|(_, (x, y))| (*x, sign * y)),
                &color,
            ))?;
            if let Some(name) = &s.name {
                drawn
                    .label(name.as_str())
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
            }
        } else {
            chart.draw_series(finite.map(|(i, (x, y))| {
                let color = match (&s.mapper, &s.colors) {
                    (Some(mapper), Some(colors)) => mapper.color(colors[i]),
                    _ => MARKER_COLOR,
                };
                Circle::new((*x, sign * y), POINT_RADIUS, color.filled())
            }))?;
        }
    }

    if series.iter().any(|s| s.lines && s.name.is_some()) {
        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.7))
            .border_style(&BLACK.mix(0.3))
            .label_font(label_font())
            .position(SeriesLabelPosition::UpperRight)
            .draw()?;
    }
    Ok(())
}

fn draw_single<DB>(root: &DrawingArea<DB, Shift>, figure: &Figure) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let origin = time_origin(figure);
    let series: Vec<Series> = figure
        .data
        .iter()
        .filter_map(|t| series_of(t, origin))
        .collect();
    let map_like = figure.layout.mapbox.is_some();
    let x_title = axis_title(figure, "x", 1).or_else(|| map_like.then(|| "lon".to_string()));
    let y_title = axis_title(figure, "y", 1).or_else(|| map_like.then(|| "lat".to_string()));
    draw_series_panel(
        root,
        &series,
        x_title.as_deref(),
        y_title.as_deref(),
        origin,
        is_reversed(figure, 1),
    )
}

/// One stacked panel per trace, shared time axis.
fn draw_panels<DB>(root: &DrawingArea<DB, Shift>, figure: &Figure) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let origin = time_origin(figure);
    let areas = root.split_evenly((figure.data.len().max(1), 1));
    for (idx, (trace, area)) in figure.data.iter().zip(&areas).enumerate() {
        let index = idx + 1;
        let Some(series) = series_of(trace, origin) else {
            continue;
        };
        let no_data = series.mapper.is_none()
            && figure
                .layout
                .annotations
                .iter()
                .any(|a| a.yref == format!("{} domain", glider_hub::figure::axis_id("y", index)));
        let y_title = match &series.name {
            Some(name) => format!("{name}: {}", axis_title(figure, "y", index).unwrap_or_default()),
            None => axis_title(figure, "y", index).unwrap_or_default(),
        };
        let x_title = axis_title(figure, "x", index);
        draw_series_panel(
            area,
            std::slice::from_ref(&series),
            x_title.as_deref(),
            Some(y_title.as_str()),
            origin,
            is_reversed(figure, index),
        )?;
        if no_data {
            draw_no_data(area)?;
        }
    }
    Ok(())
}

/// One 3D panel per scene; depth runs along the vertical axis.
fn draw_scenes<DB>(root: &DrawingArea<DB, Shift>, figure: &Figure) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let traces: Vec<_> = figure
        .data
        .iter()
        .filter_map(|t| match t {
            Trace::Scatter3d(t) => Some(t),
            _ => None,
        })
        .collect();
    let areas = root.split_evenly((traces.len().max(1), 1));
    for (trace, area) in traces.into_iter().zip(&areas) {
        let titles = figure.layout.scenes.get(&trace.scene).map(|scene| {
            [&scene.xaxis, &scene.yaxis, &scene.zaxis]
                .map(|a| a.title.as_ref().map(|t| t.text.clone()).unwrap_or_default())
        });
        let caption = titles
            .map(|[x, y, z]| format!("{x} / {y} / {z}"))
            .unwrap_or_else(|| trace.scene.clone());

        let x_range = padded_extent(trace.x.iter().copied());
        let z_range = padded_extent(trace.y.iter().copied());
        let y_range = padded_extent(trace.z.iter().copied());
        let mut chart = ChartBuilder::on(area)
            .margin(10)
            .caption(caption, label_font())
            .build_cartesian_3d(x_range, y_range, z_range)?;
        chart.with_projection(|mut pb| {
            pb.yaw = 0.6;
            pb.pitch = 0.35;
            pb.scale = 0.85;
            pb.into_matrix()
        });
        chart
            .configure_axes()
            .label_style(label_font().color(&BLACK.mix(0.85)))
            .draw()?;

        let mapper = mapper_for(&trace.marker);
        let colors = trace.marker.color.as_deref();
        let radius = trace.marker.size.unwrap_or(3.0).round().max(1.0) as i32;
        let points = (0..trace.x.len())
            .filter(|&i| trace.x[i].is_finite() && trace.y[i].is_finite() && trace.z[i].is_finite())
            .map(|i| {
                let color = match (&mapper, colors) {
                    (Some(mapper), Some(colors)) => mapper.color(colors[i]),
                    _ => MARKER_COLOR,
                };
                Circle::new((trace.x[i], trace.z[i], trace.y[i]), radius, color.filled())
            });
        chart.draw_series(points)?;
        if mapper.is_none() {
            draw_no_data(area)?;
        }
    }
    Ok(())
}

/// Delegating backend that skips text the inner backend cannot draw, so a
/// host without system fonts still gets the plot marks.
struct TextSafeBackend<DB> {
    inner: DB,
    skipped_text: usize,
}

impl<DB> TextSafeBackend<DB> {
    fn new(inner: DB) -> Self {
        Self {
            inner,
            skipped_text: 0,
        }
    }
}

impl<DB: DrawingBackend> DrawingBackend for TextSafeBackend<DB> {
    type ErrorType = DB::ErrorType;

    fn get_size(&self) -> (u32, u32) {
        self.inner.get_size()
    }

    fn ensure_prepared(&mut self) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.ensure_prepared()
    }

    fn present(&mut self) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        if self.skipped_text > 0 {
            debug!("skipped {} text labels (no usable font)", self.skipped_text);
        }
        self.inner.present()
    }

    fn draw_pixel(
        &mut self,
        point: BackendCoord,
        color: BackendColor,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.draw_pixel(point, color)
    }

    fn draw_line<S: BackendStyle>(
        &mut self,
        from: BackendCoord,
        to: BackendCoord,
        style: &S,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.draw_line(from, to, style)
    }

    fn draw_rect<S: BackendStyle>(
        &mut self,
        upper_left: BackendCoord,
        bottom_right: BackendCoord,
        style: &S,
        fill: bool,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.draw_rect(upper_left, bottom_right, style, fill)
    }

    fn draw_path<S: BackendStyle, I: IntoIterator<Item = BackendCoord>>(
        &mut self,
        path: I,
        style: &S,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.draw_path(path, style)
    }

    fn draw_circle<S: BackendStyle>(
        &mut self,
        center: BackendCoord,
        radius: u32,
        style: &S,
        fill: bool,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.draw_circle(center, radius, style, fill)
    }

    fn fill_polygon<S: BackendStyle, I: IntoIterator<Item = BackendCoord>>(
        &mut self,
        vert: I,
        style: &S,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.fill_polygon(vert, style)
    }

    fn draw_text<TStyle: BackendTextStyle>(
        &mut self,
        text: &str,
        style: &TStyle,
        pos: BackendCoord,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        let inner = &mut self.inner;
        match panic::catch_unwind(panic::AssertUnwindSafe(|| inner.draw_text(text, style, pos))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(DrawingErrorKind::FontError(_))) | Err(_) => {
                self.skipped_text += 1;
                Ok(())
            }
            Ok(Err(err)) => Err(err),
        }
    }

    fn estimate_text_size<TStyle: BackendTextStyle>(
        &self,
        text: &str,
        style: &TStyle,
    ) -> Result<(u32, u32), DrawingErrorKind<Self::ErrorType>> {
        let estimated = panic::catch_unwind(panic::AssertUnwindSafe(|| {
            self.inner.estimate_text_size(text, style)
        }));
        match estimated {
            Ok(Ok(size)) => Ok(size),
            _ => {
                let height = style.size().max(1.0);
                let width = text.chars().count() as f64 * height * 0.55;
                Ok((width.ceil() as u32, height.ceil() as u32))
            }
        }
    }

    fn blit_bitmap(
        &mut self,
        pos: BackendCoord,
        (iw, ih): (u32, u32),
        src: &[u8],
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.blit_bitmap(pos, (iw, ih), src)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use glider_hub::figure::{Layout, Mode, XyTrace};

    fn t(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2017, 5, 10)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn line(times: Vec<NaiveDateTime>, y: Vec<f64>) -> Trace {
        Trace::Scatter(XyTrace {
            name: Some("u".into()),
            mode: Mode::Lines,
            x: Values::Times(times),
            y: Values::Numbers(y),
            hovertext: None,
            marker: None,
            xaxis: None,
            yaxis: None,
        })
    }

    #[test]
    fn times_become_hours_from_earliest() {
        let figure = Figure {
            data: vec![line(vec![t(3), t(5)], vec![0.0, 1.0]), line(vec![t(1)], vec![2.0])],
            layout: Layout::with_margin(20),
        };
        let origin = time_origin(&figure);
        assert_eq!(origin, Some(t(1)));
        let series = series_of(&figure.data[0], origin).unwrap();
        assert_eq!(series.points, vec![(2.0, 0.0), (4.0, 1.0)]);
        assert!(series.lines);
        assert_eq!(hours_label(t(1), 2.0), "05-10 03:00");
    }

    #[test]
    fn extent_pads_and_survives_empty_input() {
        let r = padded_extent([1.0, f64::NAN, 3.0].into_iter());
        assert!(r.start < 1.0 && r.end > 3.0);
        assert_eq!(padded_extent(std::iter::empty()), 0.0..1.0);
        let flat = padded_extent([2.0, 2.0].into_iter());
        assert!(flat.start < flat.end);
    }

    #[test]
    fn svg_render_writes_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("time_series.svg");
        let figure = Figure {
            data: vec![line(vec![t(1), t(2), t(3)], vec![0.1, f64::NAN, 0.3])],
            layout: Layout::with_margin(20),
        };
        render_chart_guard(&figure, &path, ChartKind::Svg, (640, 480)).unwrap();
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
    }
}
