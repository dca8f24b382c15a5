//! Loss-computation driver: resolve recorded data and invoke loss modules

use ndarray::ArrayD;

use crate::config::{LossForwardMappings, RecordLocation, SourceSide};
use crate::distill::LossResults;
use crate::error::Result;
use crate::losses::{DistillLosses, LossArgs};
use crate::record::RecorderManager;

/// Resolve one record location against the manager its side names.
pub fn get_record(
    location: &RecordLocation,
    student_recorders: &RecorderManager,
    teacher_recorders: &RecorderManager,
) -> Result<ArrayD<f32>> {
    let manager = match location.from {
        SourceSide::Student => student_recorders,
        SourceSide::Teacher => teacher_recorders,
    };
    manager
        .get_recorder(&location.recorder)?
        .get_record_data(location.record_idx, location.data_idx)
}

/// Compute every mapped loss from the currently recorded data.
///
/// For each loss name in mapping iteration order, every argument is
/// resolved by a recorder lookup (repeated lookups are not deduplicated;
/// they are cheap) and the loss module is invoked with the assembled
/// keyword arguments. A recorder the source-side forward pass never
/// populated surfaces as [`Error::RecordNotPopulated`](crate::Error).
pub fn compute_distill_losses(
    losses: &DistillLosses,
    mappings: &LossForwardMappings,
    student_recorders: &RecorderManager,
    teacher_recorders: &RecorderManager,
) -> Result<LossResults> {
    let mut results = LossResults::new();
    for (loss_name, argument_map) in mappings {
        let mut args = LossArgs::new();
        for (arg, location) in argument_map {
            let value = get_record(location, student_recorders, teacher_recorders)?;
            args.insert(arg.clone(), value);
        }

        // Validation pinned every mapping key to a built loss.
        let module = losses
            .get(loss_name)
            .ok_or_else(|| crate::config::ValidationError::UnknownLoss {
                loss_name: loss_name.clone(),
            })?;
        results.insert(loss_name.clone(), module.forward(&args)?);
    }
    Ok(results)
}
