//! Deployment roster: selection keys and display labels.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::HubError;

/// Deployment selected when the roster contains it.
pub const DEFAULT_DEPLOYMENT_KEY: &str = "Ramses_Deployment1";

const GLIDER_COLUMN: &str = "glider";
const DEPLOYMENT_COLUMN: &str = "Deployment #";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Deployment {
    pub glider: String,
    pub ordinal: u32,
    /// Selection key, also the prefix of the deployment's resource files.
    pub key: String,
    pub label: String,
}

impl Deployment {
    pub fn new(glider: &str, ordinal: u32) -> Self {
        Self {
            glider: glider.to_string(),
            ordinal,
            key: format!("{glider}_Deployment{ordinal}"),
            label: format!("{glider} Deployment #{ordinal}"),
        }
    }
}

/// Non-empty, ordered, key-unique set of deployments.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Catalog {
    deployments: Vec<Deployment>,
}

impl Catalog {
    pub fn from_deployments(deployments: Vec<Deployment>) -> Result<Self, HubError> {
        if deployments.is_empty() {
            return Err(HubError::CatalogLoad("roster lists no deployments".into()));
        }
        let mut seen = HashSet::new();
        for deployment in &deployments {
            if !seen.insert(deployment.key.as_str()) {
                return Err(HubError::CatalogLoad(format!(
                    "duplicate deployment key '{}'",
                    deployment.key
                )));
            }
        }
        Ok(Self { deployments })
    }

    pub fn deployments(&self) -> &[Deployment] {
        &self.deployments
    }

    pub fn len(&self) -> usize {
        self.deployments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deployments.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Deployment> {
        self.deployments.iter().find(|d| d.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.deployments.iter().map(|d| d.key.as_str())
    }

    /// `Ramses_Deployment1` when listed, otherwise the first roster row.
    pub fn default_deployment(&self) -> &Deployment {
        self.get(DEFAULT_DEPLOYMENT_KEY).unwrap_or(&self.deployments[0])
    }
}

/// Parse the roster CSV, preserving row order.
pub fn parse_roster(input: &[u8]) -> Result<Catalog, HubError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(input);
    let headers = reader
        .headers()
        .map_err(|e| HubError::CatalogLoad(e.to_string()))?
        .clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| HubError::CatalogLoad(format!("missing column '{name}'")))
    };
    let glider_idx = column(GLIDER_COLUMN)?;
    let deployment_idx = column(DEPLOYMENT_COLUMN)?;

    let mut deployments = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|e| HubError::CatalogLoad(e.to_string()))?;
        let glider = record.get(glider_idx).unwrap_or("");
        if glider.is_empty() {
            return Err(HubError::CatalogLoad(format!(
                "row {}: empty glider name",
                row + 1
            )));
        }
        let number = record.get(deployment_idx).unwrap_or("");
        let ordinal = number
            .chars()
            .last()
            .and_then(|c| c.to_digit(10))
            .filter(|d| *d > 0)
            .ok_or_else(|| {
                HubError::CatalogLoad(format!(
                    "row {}: deployment number '{number}' does not end in a positive digit",
                    row + 1
                ))
            })?;
        deployments.push(Deployment::new(glider, ordinal));
    }
    Catalog::from_deployments(deployments)
}

pub fn load_catalog(path: &Path) -> Result<Catalog, HubError> {
    let data = fs::read(path)
        .map_err(|e| HubError::CatalogLoad(format!("{}: {e}", path.display())))?;
    parse_roster(&data)
}
