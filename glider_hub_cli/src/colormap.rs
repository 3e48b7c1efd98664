//! Palette sampling for raster/vector rendering.
//!
//! Stops approximate the cmocean maps the figures name (`thermal`, `haline`,
//! `dense`, `algae`), sampled at seven evenly spaced positions.

use plotters::style::RGBColor;

/// Color for non-finite values.
pub const MISSING: RGBColor = RGBColor(190, 190, 190);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorStop {
    /// Position along the palette, 0..=1
    pub t: f64,
    pub rgb: [u8; 3],
}

#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    pub name: &'static str,
    pub stops: Vec<ColorStop>,
}

const THERMAL: [[u8; 3]; 7] = [
    [0x04, 0x23, 0x33],
    [0x2c, 0x33, 0x95],
    [0x74, 0x49, 0x92],
    [0xb1, 0x5f, 0x82],
    [0xeb, 0x76, 0x55],
    [0xfb, 0xb3, 0x3f],
    [0xe8, 0xfa, 0x5b],
];

const HALINE: [[u8; 3]; 7] = [
    [0x2a, 0x18, 0x6c],
    [0x14, 0x43, 0x9c],
    [0x20, 0x6e, 0x8b],
    [0x3c, 0x93, 0x87],
    [0x5a, 0xb9, 0x78],
    [0xaa, 0xd8, 0x5c],
    [0xfd, 0xef, 0x9a],
];

const DENSE: [[u8; 3]; 7] = [
    [0xe6, 0xf1, 0xf1],
    [0x9c, 0xc8, 0xe1],
    [0x7b, 0x95, 0xe6],
    [0x7c, 0x5e, 0xc4],
    [0x6a, 0x32, 0x88],
    [0x46, 0x18, 0x4f],
    [0x36, 0x0e, 0x24],
];

const ALGAE: [[u8; 3]; 7] = [
    [0xd7, 0xf9, 0xd0],
    [0x9c, 0xd5, 0x8e],
    [0x5d, 0xb4, 0x64],
    [0x28, 0x90, 0x3f],
    [0x10, 0x69, 0x2c],
    [0x15, 0x46, 0x1d],
    [0x12, 0x24, 0x14],
];

const GREYS: [[u8; 3]; 2] = [[0xff, 0xff, 0xff], [0x00, 0x00, 0x00]];

fn evenly_spaced(rgb: &[[u8; 3]]) -> Vec<ColorStop> {
    let last = rgb.len().saturating_sub(1).max(1) as f64;
    rgb.iter()
        .enumerate()
        .map(|(i, rgb)| ColorStop {
            t: i as f64 / last,
            rgb: *rgb,
        })
        .collect()
}

/// Palette by figure name; unknown names fall back to a grey ramp.
pub fn palette(name: &str) -> Palette {
    let (name, rgb) = match name {
        "thermal" => ("thermal", &THERMAL[..]),
        "haline" => ("haline", &HALINE[..]),
        "dense" => ("dense", &DENSE[..]),
        "algae" => ("algae", &ALGAE[..]),
        _ => ("greys", &GREYS[..]),
    };
    Palette {
        name,
        stops: evenly_spaced(rgb),
    }
}

#[inline]
fn srgb_to_linear(c: u8) -> f64 {
    let c = c as f64 / 255.0;
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

#[inline]
fn linear_to_srgb(c: f64) -> u8 {
    let c = c.clamp(0.0, 1.0);
    let s = if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    };
    (s * 255.0).round() as u8
}

/// Sample at `t` (clamped to 0..=1), interpolating in linear light.
pub fn sample(palette: &Palette, t: f64) -> [u8; 3] {
    let stops = &palette.stops;
    let Some(first) = stops.first() else {
        return [0, 0, 0];
    };
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    if t <= first.t {
        return first.rgb;
    }
    for pair in stops.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if t <= b.t {
            let span = (b.t - a.t).max(f64::EPSILON);
            let w = (t - a.t) / span;
            let mut out = [0u8; 3];
            for (i, channel) in out.iter_mut().enumerate() {
                let la = srgb_to_linear(a.rgb[i]);
                let lb = srgb_to_linear(b.rgb[i]);
                *channel = linear_to_srgb(la + (lb - la) * w);
            }
            return out;
        }
    }
    stops[stops.len() - 1].rgb
}

/// Maps values in `[low, high]` onto a palette; values outside are clamped.
#[derive(Debug, Clone)]
pub struct ColorMapper {
    palette: Palette,
    low: f64,
    high: f64,
}

impl ColorMapper {
    pub fn new(palette: Palette, low: f64, high: f64) -> Self {
        Self { palette, low, high }
    }

    /// Mapper over the finite extent of `values`, or an explicit clip.
    pub fn fitted(palette: Palette, values: &[f64], clip: Option<(f64, f64)>) -> Option<Self> {
        let (low, high) = match clip {
            Some(clip) => clip,
            None => values
                .iter()
                .copied()
                .filter(|v| v.is_finite())
                .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                    None => Some((v, v)),
                    Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
                })?,
        };
        Some(Self::new(palette, low, high))
    }

    pub fn color(&self, value: f64) -> RGBColor {
        if !value.is_finite() {
            return MISSING;
        }
        let span = self.high - self.low;
        let t = if span > 0.0 {
            (value - self.low) / span
        } else {
            0.5
        };
        let [r, g, b] = sample(&self.palette, t);
        RGBColor(r, g, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_palettes_resolve() {
        for name in ["thermal", "haline", "dense", "algae"] {
            let pal = palette(name);
            assert_eq!(pal.name, name);
            assert_eq!(pal.stops.len(), 7);
            assert_eq!(pal.stops[0].t, 0.0);
            assert_eq!(pal.stops[6].t, 1.0);
        }
        assert_eq!(palette("viridis").name, "greys");
    }

    #[test]
    fn endpoints_are_exact_and_clamped() {
        let pal = palette("thermal");
        assert_eq!(sample(&pal, 0.0), THERMAL[0]);
        assert_eq!(sample(&pal, 1.0), THERMAL[6]);
        assert_eq!(sample(&pal, -3.0), THERMAL[0]);
        assert_eq!(sample(&pal, 7.0), THERMAL[6]);
    }

    #[test]
    fn midpoint_interpolates_in_linear_light() {
        let pal = palette("unknown");
        let mid = sample(&pal, 0.5);
        // Linear-light midpoint of white and black is ~#BCBCBC, not #808080.
        assert!((mid[0] as i32 - 188).abs() <= 1, "{mid:?}");
    }

    #[test]
    fn mapper_clamps_and_flags_missing() {
        let mapper = ColorMapper::new(palette("algae"), 5.0, 95.0);
        let [r, g, b] = ALGAE[6];
        assert_eq!(mapper.color(10_000.0), RGBColor(r, g, b));
        assert_eq!(mapper.color(f64::NAN), MISSING);
    }

    #[test]
    fn fitted_uses_finite_extent_without_clip() {
        let mapper = ColorMapper::fitted(palette("haline"), &[f64::NAN, 3.0, 1.0], None).unwrap();
        assert_eq!((mapper.low, mapper.high), (1.0, 3.0));
        assert!(ColorMapper::fitted(palette("haline"), &[f64::NAN], None).is_none());
        let clipped =
            ColorMapper::fitted(palette("haline"), &[f64::NAN], Some((0.0, 1.0))).unwrap();
        assert_eq!((clipped.low, clipped.high), (0.0, 1.0));
    }
}
