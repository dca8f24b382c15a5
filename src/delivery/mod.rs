//! Deliveries: interception channels between two forward passes
//!
//! A delivery sits at a named exchange point present in both the teacher and
//! the student. During the recording pass (override off) it copies every
//! value flowing through the point and lets it pass unchanged; during the
//! consuming pass (override on) it substitutes the recorded values, oldest
//! first, for whatever the consuming model produced. The override flag is a
//! single switch shared by every delivery of one [`DeliveryManager`].
//!
//! The flag is read at exchange time, not at scope entry: set it *before*
//! opening the scope that runs the pass.

mod manager;

pub use manager::{DeliveryManager, DeliveryScope};

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use ndarray::ArrayD;

use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct PortState {
    active: bool,
    queue: VecDeque<ArrayD<f32>>,
}

/// Exchange handle installed into every participating model.
///
/// Clones share the owning delivery's queue and the manager's override flag.
#[derive(Debug, Clone)]
pub struct DeliveryPort {
    source: String,
    state: Rc<RefCell<PortState>>,
    override_data: Rc<Cell<bool>>,
}

impl DeliveryPort {
    /// Pass `value` through the exchange point.
    ///
    /// Inactive ports are transparent. An active port either records the
    /// value (override off) or replaces it with the oldest recorded one
    /// (override on); the latter fails with [`Error::DeliveryExhausted`]
    /// when the recording pass produced fewer values than the consuming
    /// pass requests.
    pub fn exchange(&self, value: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let mut state = self.state.borrow_mut();
        if !state.active {
            return Ok(value);
        }
        if self.override_data.get() {
            state
                .queue
                .pop_front()
                .ok_or_else(|| Error::DeliveryExhausted {
                    name: self.source.clone(),
                })
        } else {
            state.queue.push_back(value.clone());
            Ok(value)
        }
    }
}

/// Contract a model implements to expose named exchange points.
pub trait Deliverable {
    /// Install `port` at the exchange point called `source`.
    ///
    /// Returns [`Error::SourceNotFound`] if the model has no such point.
    fn install_port(&mut self, source: &str, port: DeliveryPort) -> Result<()>;
}

/// A single named interception channel.
pub trait Delivery {
    /// The exchange point this delivery intercepts.
    fn source(&self) -> &str;

    /// Bind this delivery to a model by installing its port. Called once
    /// per participating model; teacher and student share the same queue.
    fn initialize(&mut self, model: &mut dyn Deliverable) -> Result<()>;

    /// Start intercepting. When override is off this begins a fresh
    /// recording pass and drops previously queued data; when override is on
    /// the queue is preserved for consumption.
    fn activate(&mut self);

    fn deactivate(&mut self);

    fn is_active(&self) -> bool;

    /// Recorded values waiting to be substituted.
    fn queued(&self) -> usize;
}

/// Intercepts the value produced by one named module/submodule.
#[derive(Debug)]
pub struct ModuleExchangeDelivery {
    port: DeliveryPort,
}

impl ModuleExchangeDelivery {
    pub(crate) fn new(source: impl Into<String>, override_data: Rc<Cell<bool>>) -> Self {
        Self {
            port: DeliveryPort {
                source: source.into(),
                state: Rc::default(),
                override_data,
            },
        }
    }
}

impl Delivery for ModuleExchangeDelivery {
    fn source(&self) -> &str {
        &self.port.source
    }

    fn initialize(&mut self, model: &mut dyn Deliverable) -> Result<()> {
        model.install_port(&self.port.source, self.port.clone())
    }

    fn activate(&mut self) {
        let mut state = self.port.state.borrow_mut();
        if !self.port.override_data.get() {
            state.queue.clear();
        }
        state.active = true;
    }

    fn deactivate(&mut self) {
        self.port.state.borrow_mut().active = false;
    }

    fn is_active(&self) -> bool {
        self.port.state.borrow().active
    }

    fn queued(&self) -> usize {
        self.port.state.borrow().queue.len()
    }
}
