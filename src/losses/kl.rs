//! Temperature-scaled KL divergence between student and teacher logits

use ndarray::{Array2, ArrayD, Axis, Ix2};

use crate::error::{Error, Result};
use crate::losses::{LossArgs, LossModule};

/// KL divergence distillation loss.
///
/// Both logit sets are softened by the temperature `tau` before the
/// divergence is taken, and the result is scaled by `tau²` so gradient
/// magnitudes stay comparable across temperatures, then by `loss_weight`.
///
/// ```text
/// L = loss_weight * tau² * KL(softmax(preds_T / tau) || softmax(preds_S / tau))
/// ```
///
/// Expects 2-D logits `[batch, classes]`; the divergence is averaged over
/// the batch.
#[derive(Debug, Clone)]
pub struct KLDivergenceLoss {
    pub tau: f32,
    pub loss_weight: f32,
}

impl KLDivergenceLoss {
    /// # Panics
    ///
    /// Panics if `tau <= 0`.
    pub fn new(tau: f32, loss_weight: f32) -> Self {
        assert!(tau > 0.0, "Temperature must be positive, got {}", tau);
        Self { tau, loss_weight }
    }
}

impl LossModule for KLDivergenceLoss {
    fn forward_args(&self) -> &'static [&'static str] {
        &["preds_S", "preds_T"]
    }

    fn forward(&self, args: &LossArgs) -> Result<f32> {
        let preds_s = as_logits(args.get("preds_S")?)?;
        let preds_t = as_logits(args.get("preds_T")?)?;
        if preds_s.shape() != preds_t.shape() {
            return Err(Error::Config(format!(
                "preds_S shape {:?} does not match preds_T shape {:?}",
                preds_s.shape(),
                preds_t.shape()
            )));
        }

        let soft_s = softmax_rows(&(&preds_s / self.tau));
        let soft_t = softmax_rows(&(&preds_t / self.tau));

        let kl = kl_divergence(&soft_t, &soft_s);
        Ok(self.loss_weight * self.tau * self.tau * kl)
    }
}

fn as_logits(x: &ArrayD<f32>) -> Result<Array2<f32>> {
    x.view()
        .into_dimensionality::<Ix2>()
        .map(|v| v.to_owned())
        .map_err(|_| {
            Error::Config(format!(
                "expected 2-D logits [batch, classes], got shape {:?}",
                x.shape()
            ))
        })
}

/// Row-wise softmax with max-subtraction for numerical stability.
fn softmax_rows(x: &Array2<f32>) -> Array2<f32> {
    let mut result = x.clone();
    for mut row in result.axis_iter_mut(Axis(0)) {
        let max_val = row.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
        row.mapv_inplace(|v| (v - max_val).exp());
        let sum: f32 = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
    result
}

/// KL(p || q) averaged over the batch dimension.
fn kl_divergence(p: &Array2<f32>, q: &Array2<f32>) -> f32 {
    let mut total = 0.0;
    for (p_row, q_row) in p.axis_iter(Axis(0)).zip(q.axis_iter(Axis(0))) {
        for (&p_i, &q_i) in p_row.iter().zip(q_row.iter()) {
            if p_i > 1e-10 {
                total += p_i * (p_i / q_i.max(1e-10)).ln();
            }
        }
    }
    total / p.nrows() as f32
}
