//! Loss modules and the name-indexed loss registry
//!
//! A loss module declares its forward argument names statically via
//! [`LossModule::forward_args`]; the validator compares those names against
//! the configured mapping, and the driver assembles a [`LossArgs`] set keyed
//! by the same names before invoking [`LossModule::forward`].
//!
//! Naming convention: the surrounding training loop backpropagates every
//! entry whose name contains the substring `"loss"` and treats the rest as
//! logging-only statistics. The registry warns (but does not fail) when a
//! name omits the substring, since the convention is easy to violate by
//! accident.

mod kl;
mod l2;

pub use kl::KLDivergenceLoss;
pub use l2::L2Loss;

use std::collections::BTreeMap;

use ndarray::ArrayD;
use tracing::warn;

use crate::config::LossConfig;
use crate::error::{Error, Result};

/// Keyword-argument set passed to a loss module's forward call.
#[derive(Debug, Default)]
pub struct LossArgs {
    values: BTreeMap<String, ArrayD<f32>>,
}

impl LossArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ArrayD<f32>) {
        self.values.insert(name.into(), value);
    }

    /// Fetch one argument by its declared name.
    ///
    /// Unresolved names cannot occur after validation, but the lookup stays
    /// fallible so loss modules never panic on a hand-built argument set.
    pub fn get(&self, name: &str) -> Result<&ArrayD<f32>> {
        self.values.get(name).ok_or_else(|| Error::MissingArgument {
            arg: name.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A named loss computation consuming recorded values.
pub trait LossModule {
    /// The formal argument names of the forward call, in declaration order.
    fn forward_args(&self) -> &'static [&'static str];

    /// Compute the loss from the resolved arguments.
    fn forward(&self, args: &LossArgs) -> Result<f32>;
}

/// Diagnostic emitted when a loss name violates the `"loss"` convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingWarning {
    pub loss_name: String,
}

/// The built loss modules, indexed by their configured names.
#[derive(Default)]
pub struct DistillLosses {
    modules: BTreeMap<String, Box<dyn LossModule>>,
    warnings: Vec<NamingWarning>,
}

impl DistillLosses {
    /// Instantiate every configured loss module.
    pub fn build(configs: &BTreeMap<String, LossConfig>) -> Result<Self> {
        let mut losses = Self::default();
        for (name, cfg) in configs {
            losses.insert(name, cfg.build())?;
        }
        Ok(losses)
    }

    /// Register a loss module under `name`.
    ///
    /// Fails with [`Error::DuplicateLoss`] if the name is taken. Warns when
    /// the name lacks the `"loss"` substring; the module is still registered
    /// and usable as a logging-only statistic.
    pub fn insert(&mut self, name: &str, module: Box<dyn LossModule>) -> Result<()> {
        if self.modules.contains_key(name) {
            return Err(Error::DuplicateLoss(name.to_string()));
        }
        if !name.contains("loss") {
            warn!(
                loss_name = name,
                "loss name lacks the 'loss' substring: it will be treated as \
                 a logging-only statistic and excluded from backpropagation"
            );
            self.warnings.push(NamingWarning {
                loss_name: name.to_string(),
            });
        }
        self.modules.insert(name.to_string(), module);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&dyn LossModule> {
        self.modules.get(name).map(|m| m.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Naming-convention diagnostics collected during registration.
    pub fn warnings(&self) -> &[NamingWarning] {
        &self.warnings
    }
}
