//! Declarative distillation configuration
//!
//! A whole distillation recipe is expressed as configuration: which
//! intermediate values to record on each side, which exchange points to
//! intercept, which loss modules to build, and how recorded data feeds each
//! loss's forward arguments. Nothing in the student or teacher model code
//! changes between recipes.
//!
//! # Example
//!
//! ```yaml
//! student_recorders:
//!   fc: { type: ModuleOutputs, source: head.fc }
//!
//! teacher_recorders:
//!   fc: { type: ModuleOutputs, source: head.fc }
//!
//! distill_losses:
//!   loss_kl: { type: KLDivergence, tau: 1.0, loss_weight: 5.0 }
//!
//! loss_forward_mappings:
//!   loss_kl:
//!     preds_S: { recorder: fc, from: student }
//!     preds_T: { recorder: fc, from: teacher }
//! ```

mod mapping;
mod validate;

pub use mapping::{ArgumentMap, LossForwardMappings, RecordLocation, SourceSide};
pub use validate::{validate_forward_mappings, ValidationError};

use std::cell::Cell;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::delivery::{Delivery, ModuleExchangeDelivery};
use crate::error::{Error, Result};
use crate::losses::{KLDivergenceLoss, L2Loss, LossModule};
use crate::record::{ModuleOutputsRecorder, Recorder};

/// Config for one recorder; the `type` field selects the implementation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RecorderConfig {
    /// Capture the output of the named module each time it runs.
    ModuleOutputs { source: String },
}

impl RecorderConfig {
    pub(crate) fn build(&self) -> Box<dyn Recorder> {
        match self {
            RecorderConfig::ModuleOutputs { source } => {
                Box::new(ModuleOutputsRecorder::new(source.clone()))
            }
        }
    }
}

/// Config for one delivery; the `type` field selects the implementation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DeliveryConfig {
    /// Intercept the value produced by the named module.
    ModuleExchange { source: String },
}

impl DeliveryConfig {
    pub(crate) fn build(&self, override_data: Rc<Cell<bool>>) -> Box<dyn Delivery> {
        match self {
            DeliveryConfig::ModuleExchange { source } => {
                Box::new(ModuleExchangeDelivery::new(source.clone(), override_data))
            }
        }
    }
}

/// Config for one loss module; the `type` field selects the implementation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LossConfig {
    /// Temperature-scaled KL divergence on `(preds_S, preds_T)`.
    KLDivergence { tau: f32, loss_weight: f32 },
    /// Mean squared feature difference on `(s_feature, t_feature)`.
    L2 { loss_weight: f32 },
}

impl LossConfig {
    pub(crate) fn build(&self) -> Box<dyn LossModule> {
        match self {
            LossConfig::KLDivergence { tau, loss_weight } => {
                Box::new(KLDivergenceLoss::new(*tau, *loss_weight))
            }
            LossConfig::L2 { loss_weight } => Box::new(L2Loss::new(*loss_weight)),
        }
    }
}

/// The full declarative recipe consumed by
/// [`ConfigurableDistill`](crate::distill::ConfigurableDistill).
///
/// All sections default to empty so partial recipes parse; the consistency
/// of `loss_forward_mappings` against the other sections is checked eagerly
/// at algorithm construction, never at step time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DistillConfig {
    /// Recorders observing the student model, by logical name.
    #[serde(default)]
    pub student_recorders: BTreeMap<String, RecorderConfig>,

    /// Recorders observing the teacher model, by logical name.
    #[serde(default)]
    pub teacher_recorders: BTreeMap<String, RecorderConfig>,

    /// Interception channels between the two forward passes.
    #[serde(default)]
    pub distill_deliveries: BTreeMap<String, DeliveryConfig>,

    /// Loss modules to build, by name. Names containing `"loss"`
    /// backpropagate; others are logging-only statistics.
    #[serde(default)]
    pub distill_losses: BTreeMap<String, LossConfig>,

    /// Binding of loss forward arguments to recorded-data locations.
    #[serde(default)]
    pub loss_forward_mappings: LossForwardMappings,
}

impl DistillConfig {
    /// Parse a recipe from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| Error::Config(format!("failed to parse distill config: {e}")))
    }
}

/// Load a recipe from a YAML file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<DistillConfig> {
    let yaml = fs::read_to_string(path.as_ref()).map_err(|e| {
        Error::Config(format!(
            "failed to read config file {}: {e}",
            path.as_ref().display()
        ))
    })?;
    DistillConfig::from_yaml_str(&yaml)
}
