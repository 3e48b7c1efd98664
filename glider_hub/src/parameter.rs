use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::resources::ProfileRecord;
use crate::HubError;

/// Scalar water property carried by every profile row.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Parameter {
    #[serde(rename = "t")]
    Temperature,
    #[serde(rename = "s")]
    Salinity,
    #[serde(rename = "dens")]
    Density,
    #[serde(rename = "chl")]
    Chlorophyll,
}

impl Default for Parameter {
    fn default() -> Self {
        Parameter::Temperature
    }
}

impl Parameter {
    /// Panel order of the depth/time view, top to bottom.
    pub const ALL: [Parameter; 4] = [
        Parameter::Temperature,
        Parameter::Salinity,
        Parameter::Density,
        Parameter::Chlorophyll,
    ];

    /// Column name in the profile resource and selection key.
    pub fn key(self) -> &'static str {
        match self {
            Parameter::Temperature => "t",
            Parameter::Salinity => "s",
            Parameter::Density => "dens",
            Parameter::Chlorophyll => "chl",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Parameter::Temperature => "Temperature",
            Parameter::Salinity => "Salinity",
            Parameter::Density => "Density",
            Parameter::Chlorophyll => "Chlorophyll",
        }
    }

    /// cmocean palette name understood by the plotting layer.
    pub fn palette(self) -> &'static str {
        match self {
            Parameter::Temperature => "thermal",
            Parameter::Salinity => "haline",
            Parameter::Density => "dense",
            Parameter::Chlorophyll => "algae",
        }
    }

    /// Whether the color scale is clipped to a percentile range.
    pub fn uses_robust_range(self) -> bool {
        match self {
            Parameter::Chlorophyll => true,
            Parameter::Temperature | Parameter::Salinity | Parameter::Density => false,
        }
    }

    pub fn value(self, record: &ProfileRecord) -> f64 {
        match self {
            Parameter::Temperature => record.t,
            Parameter::Salinity => record.s,
            Parameter::Density => record.dens,
            Parameter::Chlorophyll => record.chl,
        }
    }

    pub fn values(self, records: &[ProfileRecord]) -> Vec<f64> {
        records.iter().map(|r| self.value(r)).collect()
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Parameter {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Parameter::ALL
            .into_iter()
            .find(|p| p.key() == s.trim())
            .ok_or_else(|| HubError::UnknownParameter(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_round_trip_through_from_str() {
        for parameter in Parameter::ALL {
            assert_eq!(parameter.key().parse::<Parameter>().unwrap(), parameter);
        }
    }

    #[test]
    fn unknown_key_is_rejected() {
        assert_eq!(
            "oxygen".parse::<Parameter>(),
            Err(HubError::UnknownParameter("oxygen".into()))
        );
    }

    #[test]
    fn only_chlorophyll_is_robust() {
        let robust: Vec<_> = Parameter::ALL
            .into_iter()
            .filter(|p| p.uses_robust_range())
            .collect();
        assert_eq!(robust, vec![Parameter::Chlorophyll]);
    }

    #[test]
    fn serde_uses_column_keys() {
        let json = serde_json::to_string(&Parameter::Density).unwrap();
        assert_eq!(json, "\"dens\"");
        let back: Parameter = serde_json::from_str("\"chl\"").unwrap();
        assert_eq!(back, Parameter::Chlorophyll);
    }
}
