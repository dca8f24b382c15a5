//! Distillation orchestration
//!
//! [`ConfigurableDistill`] is the generic core: it owns the recorder
//! managers for both sides, the delivery manager, the built loss modules,
//! and the validated loss-forward mappings. [`TruncatedTeacherDistill`]
//! layers the per-step choreography on top of it for the variant where the
//! teacher runs only its feature trunk.
//!
//! ## Example
//!
//! ```
//! use destilar::config::DistillConfig;
//! use destilar::distill::ConfigurableDistill;
//!
//! let config = DistillConfig::from_yaml_str(r#"
//! student_recorders:
//!   fc: { type: ModuleOutputs, source: head.fc }
//! teacher_recorders:
//!   fc: { type: ModuleOutputs, source: head.fc }
//! distill_losses:
//!   loss_kl: { type: KLDivergence, tau: 1.0, loss_weight: 5.0 }
//! loss_forward_mappings:
//!   loss_kl:
//!     preds_S: { recorder: fc, from: student }
//!     preds_T: { recorder: fc, from: teacher }
//! "#).unwrap();
//!
//! let algorithm = ConfigurableDistill::new(config).unwrap();
//! assert!(algorithm.distill_losses().contains("loss_kl"));
//! ```

mod algorithm;
mod driver;
mod variant;


pub use algorithm::ConfigurableDistill;
pub use driver::{compute_distill_losses, get_record};
pub use variant::{add_prefix, DistillModel, TruncatedTeacherDistill};

use std::collections::BTreeMap;

/// Named loss values produced by one training step.
pub type LossResults = BTreeMap<String, f32>;
