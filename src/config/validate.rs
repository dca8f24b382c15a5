//! Forward-mapping validation
//!
//! Checks that a [`LossForwardMappings`] is self-consistent against the
//! built losses and both recorder managers before any training compute is
//! spent. Runs once, inside algorithm construction; a recipe that passes
//! here can only fail at step time for runtime reasons (a recorder the
//! forward pass never populated).

use crate::config::{LossForwardMappings, SourceSide};
use crate::losses::DistillLosses;
use crate::record::RecorderManager;

/// Why a loss-forward mapping was rejected.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error(
        "'{loss_name}' is not among the built distill losses; the keys of \
         loss_forward_mappings must match the keys of distill_losses"
    )]
    UnknownLoss { loss_name: String },

    #[error(
        "mapping for '{loss_name}' declares {declared} argument(s) but its \
         loss module takes {expected}; the argument sets must match exactly"
    )]
    SignatureMismatch {
        loss_name: String,
        expected: usize,
        declared: usize,
    },

    #[error("'{arg}' is not an argument of loss '{loss_name}' (expects {expected:?})")]
    UnknownArgument {
        loss_name: String,
        arg: String,
        expected: &'static [&'static str],
    },

    #[error("for argument '{arg}', recorder '{recorder}' is not in the {side} recorders")]
    UnknownRecorder {
        arg: String,
        recorder: String,
        side: SourceSide,
    },

    #[error(
        "built loss '{loss_name}' has no entry in loss_forward_mappings; \
         every built loss must be mapped"
    )]
    UnmappedLoss { loss_name: String },
}

/// Validate `mappings` against the built losses and both recorder managers.
///
/// The mapping keys and the built loss names must correspond one-to-one:
/// an unmapped loss is as much an error as a mapping for a loss that was
/// never built. Every argument map must cover the loss module's declared
/// arguments exactly (the count comparison is a fast pre-check, per-key
/// membership is the authoritative rule), and every record location must
/// name a recorder that exists on its declared side.
pub fn validate_forward_mappings(
    losses: &DistillLosses,
    mappings: &LossForwardMappings,
    student_recorders: &RecorderManager,
    teacher_recorders: &RecorderManager,
) -> Result<(), ValidationError> {
    for (loss_name, argument_map) in mappings {
        let module = losses
            .get(loss_name)
            .ok_or_else(|| ValidationError::UnknownLoss {
                loss_name: loss_name.clone(),
            })?;

        let expected = module.forward_args();
        if argument_map.len() != expected.len() {
            return Err(ValidationError::SignatureMismatch {
                loss_name: loss_name.clone(),
                expected: expected.len(),
                declared: argument_map.len(),
            });
        }

        for (arg, location) in argument_map {
            if !expected.contains(&arg.as_str()) {
                return Err(ValidationError::UnknownArgument {
                    loss_name: loss_name.clone(),
                    arg: arg.clone(),
                    expected,
                });
            }

            let manager = match location.from {
                SourceSide::Student => student_recorders,
                SourceSide::Teacher => teacher_recorders,
            };
            if !manager.contains(&location.recorder) {
                return Err(ValidationError::UnknownRecorder {
                    arg: arg.clone(),
                    recorder: location.recorder.clone(),
                    side: location.from,
                });
            }
        }
    }

    for loss_name in losses.names() {
        if !mappings.contains_key(loss_name) {
            return Err(ValidationError::UnmappedLoss {
                loss_name: loss_name.to_string(),
            });
        }
    }
    Ok(())
}
