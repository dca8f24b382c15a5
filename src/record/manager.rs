//! Name-indexed registry and scoped activation for recorders

use std::collections::BTreeMap;

use crate::config::{RecorderConfig, SourceSide};
use crate::error::{Error, Result};
use crate::record::{Recordable, Recorder};

/// Owns one side's recorders, indexed by logical name.
///
/// Built once from configuration, then bound to a concrete model with
/// [`initialize`](RecorderManager::initialize). The split exists because the
/// algorithm core is constructed before it knows which model each manager
/// will observe; the variant layer binds them once the models exist.
pub struct RecorderManager {
    side: SourceSide,
    recorders: BTreeMap<String, Box<dyn Recorder>>,
    initialized: bool,
}

impl RecorderManager {
    /// Build recorders from their configs. No model is bound yet.
    pub fn build(side: SourceSide, configs: &BTreeMap<String, RecorderConfig>) -> Self {
        let recorders = configs
            .iter()
            .map(|(name, cfg)| (name.clone(), cfg.build()))
            .collect();
        Self {
            side,
            recorders,
            initialized: false,
        }
    }

    /// The side this manager's names resolve against.
    pub fn side(&self) -> SourceSide {
        self.side
    }

    /// Bind every owned recorder to `model`. May be called once.
    pub fn initialize(&mut self, model: &mut dyn Recordable) -> Result<()> {
        if self.initialized {
            return Err(Error::AlreadyInitialized {
                what: format!("{} recorder manager", self.side),
            });
        }
        for recorder in self.recorders.values_mut() {
            recorder.initialize(model)?;
        }
        self.initialized = true;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Look up a recorder by its logical name.
    pub fn get_recorder(&self, name: &str) -> Result<&dyn Recorder> {
        self.recorders
            .get(name)
            .map(|r| r.as_ref())
            .ok_or_else(|| Error::RecorderNotFound {
                name: name.to_string(),
                side: self.side,
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.recorders.contains_key(name)
    }

    pub fn recorder_names(&self) -> impl Iterator<Item = &str> {
        self.recorders.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.recorders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recorders.is_empty()
    }

    /// True while a [`RecorderScope`] is open on this manager.
    pub fn is_active(&self) -> bool {
        self.recorders.values().any(|r| r.is_active())
    }

    /// Activate every recorder for one forward pass.
    ///
    /// The returned guard deactivates them when dropped, including when the
    /// protected pass panics, so no capture state leaks into later steps.
    pub fn scope(&mut self) -> RecorderScope<'_> {
        for recorder in self.recorders.values_mut() {
            recorder.activate();
        }
        RecorderScope { manager: self }
    }
}

/// RAII guard for one recorded forward pass. See [`RecorderManager::scope`].
pub struct RecorderScope<'a> {
    manager: &'a mut RecorderManager,
}

impl RecorderScope<'_> {
    pub fn is_active(&self) -> bool {
        self.manager.is_active()
    }
}

impl Drop for RecorderScope<'_> {
    fn drop(&mut self) {
        for recorder in self.manager.recorders.values_mut() {
            recorder.deactivate();
        }
    }
}
