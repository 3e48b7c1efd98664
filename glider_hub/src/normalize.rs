//! Color scales: palette lookup and percentile clipping.

use ndarray::Array1;
use ordered_float::OrderedFloat;

use crate::parameter::Parameter;
use crate::resources::ProfileSet;
use crate::{HubConfig, HubError, RangeBasis};

pub fn palette_for(parameter: Parameter) -> &'static str {
    parameter.palette()
}

/// Sorted finite subset of `values`.
fn finite_sorted(values: &[f64]) -> Array1<f64> {
    let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    finite.sort_by_key(|v| OrderedFloat(*v));
    Array1::from_vec(finite)
}

/// Linear interpolation between closest ranks (numpy's default).
fn percentile_of_sorted(sorted: &Array1<f64>, pct: f64) -> f64 {
    let last = sorted.len() - 1;
    let rank = (pct / 100.0).clamp(0.0, 1.0) * last as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// `(low_pct, high_pct)` percentiles of the finite subset of `values`.
pub fn percentile_range(
    values: &[f64],
    low_pct: f64,
    high_pct: f64,
) -> Result<(f64, f64), HubError> {
    let sorted = finite_sorted(values);
    if sorted.is_empty() {
        return Err(HubError::EmptyRange);
    }
    Ok((
        percentile_of_sorted(&sorted, low_pct),
        percentile_of_sorted(&sorted, high_pct),
    ))
}

/// 5th/95th percentile range of the finite subset of `values`.
pub fn robust_range(values: &[f64]) -> Result<(f64, f64), HubError> {
    percentile_range(values, 5.0, 95.0)
}

/// Min/max of the finite subset of `values`.
pub fn finite_extent(values: &[f64]) -> Result<(f64, f64), HubError> {
    let sorted = finite_sorted(values);
    if sorted.is_empty() {
        return Err(HubError::EmptyRange);
    }
    Ok((sorted[0], sorted[sorted.len() - 1]))
}

/// Palette plus an optional clip; `None` leaves the plotting layer's
/// default min/max scaling in place.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorScale {
    pub palette: &'static str,
    pub clip: Option<(f64, f64)>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Normalizer {
    percentiles: (f64, f64),
    basis: RangeBasis,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            percentiles: (5.0, 95.0),
            basis: RangeBasis::Loaded,
        }
    }
}

impl Normalizer {
    pub fn new(percentiles: (f64, f64), basis: RangeBasis) -> Self {
        Self { percentiles, basis }
    }

    pub fn from_config(config: &HubConfig) -> Self {
        Self::new(config.robust_percentiles, config.range_basis)
    }

    pub fn basis(&self) -> RangeBasis {
        self.basis
    }

    /// Color scale for `parameter` over a loaded profile.
    ///
    /// Fails with [`HubError::EmptyRange`] when the parameter has no finite
    /// value to color by, robust or not.
    pub fn color_scale(
        &self,
        parameter: Parameter,
        profile: &ProfileSet,
    ) -> Result<ColorScale, HubError> {
        let palette = palette_for(parameter);
        if parameter.uses_robust_range() {
            let values = parameter.values(profile.range_rows());
            let (low, high) = self.percentiles;
            let clip = percentile_range(&values, low, high)?;
            Ok(ColorScale {
                palette,
                clip: Some(clip),
            })
        } else {
            finite_extent(&parameter.values(&profile.rows))?;
            Ok(ColorScale {
                palette,
                clip: None,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn robust_range_of_one_to_hundred() {
        let values: Vec<f64> = (1..=100).map(f64::from).collect();
        let (lo, hi) = robust_range(&values).unwrap();
        assert!(approx(lo, 5.95), "lo = {lo}");
        assert!(approx(hi, 95.05), "hi = {hi}");
    }

    #[test]
    fn outlier_does_not_stretch_the_clip() {
        let mut values: Vec<f64> = (1..=100).map(f64::from).collect();
        values.push(10_000.0);
        let (lo, hi) = robust_range(&values).unwrap();
        assert!(approx(lo, 6.0), "lo = {lo}");
        assert!(approx(hi, 96.0), "hi = {hi}");
        assert!(hi < 100.0);
    }

    #[test]
    fn non_finite_values_are_excluded() {
        let finite: Vec<f64> = (1..=100).map(f64::from).collect();
        let mut mixed = finite.clone();
        mixed.insert(3, f64::NAN);
        mixed.insert(50, f64::INFINITY);
        mixed.push(f64::NEG_INFINITY);
        mixed.push(f64::NAN);
        let expected = robust_range(&finite).unwrap();
        let got = robust_range(&mixed).unwrap();
        assert_eq!(got, expected);
        assert!(got.0 <= got.1);
    }

    #[test]
    fn single_value_gives_degenerate_but_ordered_range() {
        assert_eq!(robust_range(&[f64::NAN, 2.5]).unwrap(), (2.5, 2.5));
    }

    #[test]
    fn empty_finite_subset_is_an_error() {
        assert_eq!(robust_range(&[]), Err(HubError::EmptyRange));
        assert_eq!(
            robust_range(&[f64::NAN, f64::INFINITY]),
            Err(HubError::EmptyRange)
        );
        assert_eq!(finite_extent(&[f64::NAN]), Err(HubError::EmptyRange));
    }

    #[test]
    fn extent_ignores_non_finite() {
        assert_eq!(finite_extent(&[3.0, f64::NAN, -1.0, 7.5]).unwrap(), (-1.0, 7.5));
    }

    #[test]
    fn palette_lookup_is_total() {
        let names: Vec<_> = Parameter::ALL.into_iter().map(palette_for).collect();
        assert_eq!(names, vec!["thermal", "haline", "dense", "algae"]);
    }
}
