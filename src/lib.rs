//! # Destilar: Declarative Knowledge-Distillation Orchestration
//!
//! Destilar wires together a student model, a teacher model, recorders that
//! capture intermediate tensors from each forward pass, deliveries that can
//! substitute one model's intermediate values into the other's computation,
//! and loss modules that consume recorded values by name. An entire
//! distillation algorithm (feature matching, logit matching, attention
//! transfer) is expressed purely through configuration, without modifying
//! the student or teacher model code.
//!
//! ## Architecture
//!
//! - **record**: named capture points and the per-side [`RecorderManager`]
//! - **delivery**: interception channels and the [`DeliveryManager`] with
//!   its shared override switch
//! - **losses**: the [`LossModule`] contract, reference losses, and the
//!   name-indexed registry
//! - **config**: the declarative YAML recipe and the eager forward-mapping
//!   validator
//! - **distill**: the [`ConfigurableDistill`] core, the loss-computation
//!   driver, and the truncated-teacher step variant
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
//! "#)?;
//!
//! let algorithm = ConfigurableDistill::new(config)?;
//! # Ok::<(), destilar::Error>(())
//! ```
//!
//! A misconfigured recipe (an argument the loss does not take, a recorder
//! missing from the declared side) fails at construction, never mid-training.

pub mod config;
pub mod delivery;
pub mod distill;
pub mod losses;
pub mod record;

pub mod error;

// Re-export commonly used types
pub use config::{DistillConfig, LossForwardMappings, RecordLocation, SourceSide};
pub use delivery::DeliveryManager;
pub use distill::{ConfigurableDistill, LossResults, TruncatedTeacherDistill};
pub use error::{Error, Result};
pub use losses::LossModule;
pub use record::RecorderManager;
