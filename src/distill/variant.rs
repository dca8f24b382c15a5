//! Truncated-teacher distillation: the per-step choreography
//!
//! When everything a recipe records from the teacher comes out of the
//! feature trunk (backbone and neck), running the teacher's task head is
//! wasted compute. This variant runs the teacher trunk-only when the
//! teacher is trainable, or a full gradient-free pass otherwise, then runs
//! the student with deliveries overriding, and finally drives the loss
//! computation.

use ndarray::ArrayD;

use crate::delivery::Deliverable;
use crate::distill::{ConfigurableDistill, LossResults};
use crate::error::Result;
use crate::record::Recordable;

/// Contract a model must satisfy to participate in a distillation step.
///
/// Gradient bookkeeping (enabling it for a trainable teacher, disabling it
/// for a frozen one) is the implementation's concern, not this crate's.
pub trait DistillModel: Recordable + Deliverable {
    /// Full forward pass; returns the model's own task losses by name.
    fn forward_loss(&mut self, batch: &ArrayD<f32>) -> Result<LossResults>;

    /// Feature-trunk-only forward pass, no task head, no task losses.
    fn extract_feat(&mut self, batch: &ArrayD<f32>) -> Result<()>;
}

/// Prefix every key of `losses` with `"{prefix}."`.
pub fn add_prefix(losses: LossResults, prefix: &str) -> LossResults {
    losses
        .into_iter()
        .map(|(key, value)| (format!("{prefix}.{key}"), value))
        .collect()
}

/// Distillation where the teacher executes only its feature trunk.
pub struct TruncatedTeacherDistill<S, T> {
    algorithm: ConfigurableDistill,
    student: S,
    teacher: T,
    teacher_trainable: bool,
}

impl<S: DistillModel, T: DistillModel> TruncatedTeacherDistill<S, T> {
    /// Bind both models to the algorithm's managers.
    ///
    /// The student gets the student recorders and a delivery port; the
    /// teacher gets the teacher recorders and the same delivery ports, so
    /// values intercepted during the teacher pass can be substituted into
    /// the student pass.
    pub fn new(
        mut algorithm: ConfigurableDistill,
        mut student: S,
        mut teacher: T,
        teacher_trainable: bool,
    ) -> Result<Self> {
        algorithm.student_recorders.initialize(&mut student)?;
        algorithm.teacher_recorders.initialize(&mut teacher)?;
        algorithm.distill_deliveries.initialize(&mut teacher)?;
        algorithm.distill_deliveries.initialize(&mut student)?;
        Ok(Self {
            algorithm,
            student,
            teacher,
            teacher_trainable,
        })
    }

    pub fn algorithm(&self) -> &ConfigurableDistill {
        &self.algorithm
    }

    pub fn student(&self) -> &S {
        &self.student
    }

    pub fn teacher(&self) -> &T {
        &self.teacher
    }

    /// Run one training step and return all named losses.
    ///
    /// Student task losses come back under the `student.` prefix and
    /// distill losses under `distill.`; the training loop then applies the
    /// `"loss"` substring convention to decide what backpropagates.
    pub fn step(&mut self, batch: &ArrayD<f32>) -> Result<LossResults> {
        // Observe-only: deliveries record what flows through the teacher.
        self.algorithm.distill_deliveries.set_override_data(false);
        if self.teacher_trainable {
            // Trainable teacher: trunk only, so no teacher task loss exists.
            let _recorders = self.algorithm.teacher_recorders.scope();
            let _deliveries = self.algorithm.distill_deliveries.scope();
            self.teacher.extract_feat(batch)?;
        } else {
            // Frozen teacher: full pass, task losses discarded.
            let _recorders = self.algorithm.teacher_recorders.scope();
            let _deliveries = self.algorithm.distill_deliveries.scope();
            let _ = self.teacher.forward_loss(batch)?;
        }

        // Observe-and-override: the student consumes the recorded values.
        self.algorithm.distill_deliveries.set_override_data(true);
        let student_losses = {
            let _recorders = self.algorithm.student_recorders.scope();
            let _deliveries = self.algorithm.distill_deliveries.scope();
            self.student.forward_loss(batch)?
        };

        let mut losses = add_prefix(student_losses, "student");
        let distill_losses = self.algorithm.compute_distill_losses()?;
        losses.extend(add_prefix(distill_losses, "distill"));
        Ok(losses)
    }
}
