//! Recorders: named capture points for intermediate forward-pass values
//!
//! A recorder does not reach into a model on its own. Instead, a model that
//! supports recording implements [`Recordable`] and accepts a [`Tap`] for
//! each named instrumentation point; its forward pass pushes values through
//! the tap, and the tap buffers them only while the owning recorder is
//! active. This keeps the model code free of any knowledge about which
//! distillation recipe is running.
//!
//! # Example
//!
//! ```
//! use destilar::record::{ModuleOutputsRecorder, Recordable, Recorder, Tap};
//! use ndarray::ArrayD;
//!
//! struct Toy {
//!     fc_tap: Option<Tap>,
//! }
//!
//! impl Recordable for Toy {
//!     fn install_tap(&mut self, source: &str, tap: Tap) -> destilar::Result<()> {
//!         match source {
//!             "fc" => {
//!                 self.fc_tap = Some(tap);
//!                 Ok(())
//!             }
//!             other => Err(destilar::Error::SourceNotFound { name: other.into() }),
//!         }
//!     }
//! }
//!
//! let mut model = Toy { fc_tap: None };
//! let mut recorder = ModuleOutputsRecorder::new("fc");
//! recorder.initialize(&mut model).unwrap();
//!
//! recorder.activate();
//! let out = ArrayD::from_elem(vec![2], 1.0f32);
//! model.fc_tap.as_ref().unwrap().record(out.clone());
//! recorder.deactivate();
//!
//! assert_eq!(recorder.get_record_data(0, None).unwrap(), out);
//! ```

mod manager;

pub use manager::{RecorderManager, RecorderScope};

use std::cell::RefCell;
use std::rc::Rc;

use ndarray::ArrayD;

use crate::error::{Error, Result};

/// Buffered state shared between a recorder and the tap handles it hands out.
#[derive(Debug, Default)]
struct TapState {
    active: bool,
    /// One entry per capture-point invocation; each invocation may carry
    /// several data items (the `data_idx` axis).
    records: Vec<Vec<ArrayD<f32>>>,
}

/// Write handle a model's forward pass pushes captured values into.
///
/// Cloning is cheap; all clones share the owning recorder's buffer. Writes
/// while the recorder is inactive are dropped, so a model can record
/// unconditionally.
#[derive(Debug, Clone, Default)]
pub struct Tap {
    state: Rc<RefCell<TapState>>,
}

impl Tap {
    /// Record one invocation carrying a single data item.
    pub fn record(&self, value: ArrayD<f32>) {
        let mut state = self.state.borrow_mut();
        if state.active {
            state.records.push(vec![value]);
        }
    }

    /// Record one invocation carrying several data items.
    pub fn record_many(&self, values: Vec<ArrayD<f32>>) {
        let mut state = self.state.borrow_mut();
        if state.active {
            state.records.push(values);
        }
    }
}

/// Contract a model implements to expose named instrumentation points.
pub trait Recordable {
    /// Install `tap` at the instrumentation point called `source`.
    ///
    /// Returns [`Error::SourceNotFound`] if the model has no such point.
    fn install_tap(&mut self, source: &str, tap: Tap) -> Result<()>;
}

/// A single named capture point.
///
/// Constructed from configuration, then bound to a concrete model via
/// [`Recorder::initialize`]; activation and data retrieval are driven by the
/// owning [`RecorderManager`].
pub trait Recorder {
    /// The model instrumentation point this recorder captures.
    fn source(&self) -> &str;

    /// Bind this recorder to a model by installing its tap.
    fn initialize(&mut self, model: &mut dyn Recordable) -> Result<()>;

    /// Start capturing. Clears data from any previous pass.
    fn activate(&mut self);

    /// Stop capturing. Recorded data stays readable until the next
    /// activation, so losses can be computed after the scope closes.
    fn deactivate(&mut self);

    fn is_active(&self) -> bool;

    /// Number of invocations captured by the last recorded pass.
    fn num_records(&self) -> usize;

    /// Retrieve one captured value.
    ///
    /// `record_idx` selects the invocation. `data_idx` selects one item of
    /// a multi-item invocation; when absent, the invocation must hold
    /// exactly one item.
    fn get_record_data(&self, record_idx: usize, data_idx: Option<usize>) -> Result<ArrayD<f32>>;
}

/// Records the output of one named module/submodule per invocation.
#[derive(Debug)]
pub struct ModuleOutputsRecorder {
    source: String,
    tap: Tap,
}

impl ModuleOutputsRecorder {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            tap: Tap::default(),
        }
    }
}

impl Recorder for ModuleOutputsRecorder {
    fn source(&self) -> &str {
        &self.source
    }

    fn initialize(&mut self, model: &mut dyn Recordable) -> Result<()> {
        model.install_tap(&self.source, self.tap.clone())
    }

    fn activate(&mut self) {
        let mut state = self.tap.state.borrow_mut();
        state.records.clear();
        state.active = true;
    }

    fn deactivate(&mut self) {
        self.tap.state.borrow_mut().active = false;
    }

    fn is_active(&self) -> bool {
        self.tap.state.borrow().active
    }

    fn num_records(&self) -> usize {
        self.tap.state.borrow().records.len()
    }

    fn get_record_data(&self, record_idx: usize, data_idx: Option<usize>) -> Result<ArrayD<f32>> {
        let state = self.tap.state.borrow();
        let record = state
            .records
            .get(record_idx)
            .ok_or_else(|| Error::RecordNotPopulated {
                recorder: self.source.clone(),
                record_idx,
            })?;
        match data_idx {
            Some(idx) => record
                .get(idx)
                .cloned()
                .ok_or_else(|| Error::DataIndexOutOfRange {
                    recorder: self.source.clone(),
                    record_idx,
                    data_idx: idx,
                    len: record.len(),
                }),
            None if record.len() == 1 => Ok(record[0].clone()),
            None => Err(Error::AmbiguousRecord {
                recorder: self.source.clone(),
                record_idx,
                len: record.len(),
            }),
        }
    }
}
