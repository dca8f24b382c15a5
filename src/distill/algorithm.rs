//! The generic, configuration-driven distillation core

use ndarray::ArrayD;

use crate::config::{
    validate_forward_mappings, DistillConfig, LossForwardMappings, RecordLocation, SourceSide,
};
use crate::delivery::DeliveryManager;
use crate::distill::{driver, LossResults};
use crate::error::Result;
use crate::losses::{DistillLosses, NamingWarning};
use crate::record::RecorderManager;

/// Reproduces most distillation algorithms without touching the code of the
/// student or teacher model.
///
/// Intermediate results are captured by named recorders on each side, and
/// deliveries can substitute the teacher's intermediate results into the
/// student's forward pass. Which recorded data feeds which loss argument is
/// pure configuration, validated eagerly at construction so a broken recipe
/// fails before any training compute is spent.
///
/// The managers are built here but not yet bound to models: the set of
/// models (one teacher, several, none) is a concern of the variant layered
/// on top, which calls `initialize` on each manager once the models exist.
pub struct ConfigurableDistill {
    /// Recorders observing the student. Bind with
    /// [`RecorderManager::initialize`] before the first step.
    pub student_recorders: RecorderManager,
    /// Recorders observing the teacher.
    pub teacher_recorders: RecorderManager,
    /// Interception channels; initialize once per participating model.
    pub distill_deliveries: DeliveryManager,
    distill_losses: DistillLosses,
    loss_forward_mappings: LossForwardMappings,
}

impl ConfigurableDistill {
    /// Build managers and losses from `config` and validate the forward
    /// mappings.
    ///
    /// An empty mapping section skips validation: a recipe may build
    /// recorders and deliveries only, and drive losses through other means.
    pub fn new(config: DistillConfig) -> Result<Self> {
        let student_recorders =
            RecorderManager::build(SourceSide::Student, &config.student_recorders);
        let teacher_recorders =
            RecorderManager::build(SourceSide::Teacher, &config.teacher_recorders);
        let distill_deliveries = DeliveryManager::build(&config.distill_deliveries);
        let distill_losses = DistillLosses::build(&config.distill_losses)?;

        if !config.loss_forward_mappings.is_empty() {
            validate_forward_mappings(
                &distill_losses,
                &config.loss_forward_mappings,
                &student_recorders,
                &teacher_recorders,
            )?;
        }

        Ok(Self {
            student_recorders,
            teacher_recorders,
            distill_deliveries,
            distill_losses,
            loss_forward_mappings: config.loss_forward_mappings,
        })
    }

    pub fn distill_losses(&self) -> &DistillLosses {
        &self.distill_losses
    }

    /// The validated mappings; immutable after construction.
    pub fn loss_forward_mappings(&self) -> &LossForwardMappings {
        &self.loss_forward_mappings
    }

    /// Naming-convention diagnostics collected while building the losses.
    pub fn naming_warnings(&self) -> &[NamingWarning] {
        self.distill_losses.warnings()
    }

    /// Fetch one recorded value from the manager its location names.
    pub fn get_record(&self, location: &RecordLocation) -> Result<ArrayD<f32>> {
        driver::get_record(location, &self.student_recorders, &self.teacher_recorders)
    }

    /// Compute every mapped distill loss from the recorded data of the
    /// current step.
    pub fn compute_distill_losses(&self) -> Result<LossResults> {
        driver::compute_distill_losses(
            &self.distill_losses,
            &self.loss_forward_mappings,
            &self.student_recorders,
            &self.teacher_recorders,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    const RECIPE: &str = r#"
student_recorders:
  fc: { type: ModuleOutputs, source: head.fc }
teacher_recorders:
  fc: { type: ModuleOutputs, source: head.fc }
distill_losses:
  loss_kl: { type: KLDivergence, tau: 1.0, loss_weight: 5.0 }
loss_forward_mappings:
  loss_kl:
    preds_S: { recorder: fc, from: student }
    preds_T: { recorder: fc, from: teacher }
"#;

    #[test]
    fn test_construction_from_valid_recipe() {
        let config = DistillConfig::from_yaml_str(RECIPE).unwrap();
        let algorithm = ConfigurableDistill::new(config).unwrap();

        assert!(algorithm.distill_losses().contains("loss_kl"));
        assert!(algorithm.student_recorders.contains("fc"));
        assert!(algorithm.teacher_recorders.contains("fc"));
        assert!(algorithm.naming_warnings().is_empty());
    }

    #[test]
    fn test_construction_fails_on_unknown_recorder() {
        let mut config = DistillConfig::from_yaml_str(RECIPE).unwrap();
        config.teacher_recorders.clear();

        let err = ConfigurableDistill::new(config).err().unwrap();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_empty_mappings_skip_validation() {
        let mut config = DistillConfig::from_yaml_str(RECIPE).unwrap();
        config.loss_forward_mappings.clear();

        // Losses without mappings are allowed when the mapping section is
        // absent entirely; the driver then simply computes nothing.
        let algorithm = ConfigurableDistill::new(config).unwrap();
        assert!(algorithm.compute_distill_losses().unwrap().is_empty());
    }

    #[test]
    fn test_statistic_loss_name_surfaces_warning() {
        let yaml = r#"
distill_losses:
  kd_stat: { type: L2, loss_weight: 1.0 }
"#;
        let config = DistillConfig::from_yaml_str(yaml).unwrap();
        let algorithm = ConfigurableDistill::new(config).unwrap();
        assert_eq!(algorithm.naming_warnings().len(), 1);
        assert_eq!(algorithm.naming_warnings()[0].loss_name, "kd_stat");
    }
}
