//! The two selection controls and which view groups a change invalidates.

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::parameter::Parameter;
use crate::views::ViewGroup;
use crate::HubError;

/// Deployment key + parameter, owned by the hosting surface.
///
/// The deployment key is not checked against the catalog here: an unknown
/// key surfaces as a per-view `ResourceNotFound` failure.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Selection {
    pub deployment: String,
    pub parameter: Parameter,
}

impl Selection {
    pub fn new(deployment: impl Into<String>, parameter: Parameter) -> Self {
        Self {
            deployment: deployment.into(),
            parameter,
        }
    }

    /// Catalog default deployment with temperature.
    pub fn initial(catalog: &Catalog) -> Self {
        Self::new(catalog.default_deployment().key.clone(), Parameter::default())
    }

    pub fn with_deployment(&self, deployment: impl Into<String>) -> Self {
        Self::new(deployment, self.parameter)
    }

    pub fn with_parameter(&self, parameter: Parameter) -> Self {
        Self::new(self.deployment.clone(), parameter)
    }
}

/// Wire form of a selection as forwarded by a host. A missing field keeps
/// the current value of that control.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelectionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_key: Option<String>,
}

impl SelectionRequest {
    pub fn resolve(
        &self,
        current: Option<&Selection>,
        catalog: &Catalog,
    ) -> Result<Selection, HubError> {
        let base = current.cloned().unwrap_or_else(|| Selection::initial(catalog));
        let parameter = match &self.parameter_key {
            Some(key) => key.parse()?,
            None => base.parameter,
        };
        let deployment = self.deployment_key.clone().unwrap_or(base.deployment);
        Ok(Selection::new(deployment, parameter))
    }
}

/// Which controls differ between two selections.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub struct SelectionChange {
    pub deployment: bool,
    pub parameter: bool,
}

impl SelectionChange {
    /// A missing previous selection counts as a change of both controls.
    pub fn between(previous: Option<&Selection>, next: &Selection) -> Self {
        match previous {
            None => Self {
                deployment: true,
                parameter: true,
            },
            Some(prev) => Self {
                deployment: prev.deployment != next.deployment,
                parameter: prev.parameter != next.parameter,
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.deployment && !self.parameter
    }

    /// Deployment changes invalidate every group; parameter changes only
    /// the 3D scatter pair.
    pub fn affected_groups(&self) -> Vec<ViewGroup> {
        if self.deployment {
            ViewGroup::ALL.to_vec()
        } else if self.parameter {
            vec![ViewGroup::Scatter3d]
        } else {
            Vec::new()
        }
    }
}
