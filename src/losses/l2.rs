//! Feature-map matching via mean squared difference

use crate::error::{Error, Result};
use crate::losses::{LossArgs, LossModule};

/// L2 feature-matching loss.
///
/// `loss_weight * mean((s_feature - t_feature)²)` over all elements, for
/// feature maps of any (matching) shape.
#[derive(Debug, Clone)]
pub struct L2Loss {
    pub loss_weight: f32,
}

impl L2Loss {
    pub fn new(loss_weight: f32) -> Self {
        Self { loss_weight }
    }
}

impl LossModule for L2Loss {
    fn forward_args(&self) -> &'static [&'static str] {
        &["s_feature", "t_feature"]
    }

    fn forward(&self, args: &LossArgs) -> Result<f32> {
        let s_feature = args.get("s_feature")?;
        let t_feature = args.get("t_feature")?;
        if s_feature.shape() != t_feature.shape() {
            return Err(Error::Config(format!(
                "s_feature shape {:?} does not match t_feature shape {:?}",
                s_feature.shape(),
                t_feature.shape()
            )));
        }

        let diff = s_feature - t_feature;
        let mse = (&diff * &diff).mean().unwrap_or(0.0);
        Ok(self.loss_weight * mse)
    }
}
