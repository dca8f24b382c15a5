//! Name-indexed registry and scoped activation for deliveries

use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::config::DeliveryConfig;
use crate::delivery::{Deliverable, Delivery};
use crate::error::{Error, Result};

/// Owns the distillation deliveries and their shared override flag.
///
/// Setting [`set_override_data`](DeliveryManager::set_override_data) toggles
/// every owned delivery uniformly: off means record-and-pass-through, on
/// means substitute the recorded data into the consuming model. Deliveries
/// read the flag at exchange time, so it must be set before entering the
/// scope whose pass it should govern.
pub struct DeliveryManager {
    deliveries: BTreeMap<String, Box<dyn Delivery>>,
    override_data: Rc<Cell<bool>>,
    initialized_models: usize,
}

impl DeliveryManager {
    /// Build deliveries from their configs. No model is bound yet.
    pub fn build(configs: &BTreeMap<String, DeliveryConfig>) -> Self {
        let override_data = Rc::new(Cell::new(false));
        let deliveries = configs
            .iter()
            .map(|(name, cfg)| (name.clone(), cfg.build(override_data.clone())))
            .collect();
        Self {
            deliveries,
            override_data,
            initialized_models: 0,
        }
    }

    /// Install every delivery's port into `model`.
    ///
    /// Unlike recorder managers, a delivery manager is initialized once per
    /// participating model: the producing and consuming sides share each
    /// delivery's queue.
    pub fn initialize(&mut self, model: &mut dyn Deliverable) -> Result<()> {
        for delivery in self.deliveries.values_mut() {
            delivery.initialize(model)?;
        }
        self.initialized_models += 1;
        Ok(())
    }

    /// Number of models this manager has been initialized against.
    pub fn initialized_models(&self) -> usize {
        self.initialized_models
    }

    pub fn get_delivery(&self, name: &str) -> Result<&dyn Delivery> {
        self.deliveries
            .get(name)
            .map(|d| d.as_ref())
            .ok_or_else(|| Error::DeliveryNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.deliveries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.deliveries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deliveries.is_empty()
    }

    pub fn override_data(&self) -> bool {
        self.override_data.get()
    }

    /// Switch between observe-only (false) and observe-and-override (true).
    pub fn set_override_data(&self, override_data: bool) {
        self.override_data.set(override_data);
    }

    /// True while a [`DeliveryScope`] is open on this manager.
    pub fn is_active(&self) -> bool {
        self.deliveries.values().any(|d| d.is_active())
    }

    /// Activate every delivery for one forward pass; the guard deactivates
    /// them on drop, panics included.
    pub fn scope(&mut self) -> DeliveryScope<'_> {
        for delivery in self.deliveries.values_mut() {
            delivery.activate();
        }
        DeliveryScope { manager: self }
    }
}

/// RAII guard for one intercepted forward pass. See [`DeliveryManager::scope`].
pub struct DeliveryScope<'a> {
    manager: &'a mut DeliveryManager,
}

impl DeliveryScope<'_> {
    pub fn is_active(&self) -> bool {
        self.manager.is_active()
    }
}

impl Drop for DeliveryScope<'_> {
    fn drop(&mut self) {
        for delivery in self.manager.deliveries.values_mut() {
            delivery.deactivate();
        }
    }
}
