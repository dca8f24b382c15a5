//! The loss-forward mapping: which recorded data feeds which loss argument

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Which model's recorders a record location resolves against.
///
/// The student and teacher sides are independent namespaces: a recorder
/// named `fc` on the student side is unrelated to a teacher recorder of
/// the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceSide {
    Student,
    Teacher,
}

impl fmt::Display for SourceSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceSide::Student => write!(f, "student"),
            SourceSide::Teacher => write!(f, "teacher"),
        }
    }
}

/// Where a single loss-forward argument comes from.
///
/// `recorder` names a recorder inside the manager selected by `from`.
/// `record_idx` picks the forward-pass invocation (a capture point may be
/// reached several times per pass); `data_idx` picks one item when a single
/// invocation captured several.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordLocation {
    /// Name of the recorder holding the data.
    pub recorder: String,
    /// Side whose recorder manager resolves `recorder`.
    pub from: SourceSide,
    /// Invocation index within the recorded forward pass.
    #[serde(default)]
    pub record_idx: usize,
    /// Item index within one invocation's captured data.
    #[serde(default)]
    pub data_idx: Option<usize>,
}

impl RecordLocation {
    /// Location of the first record of `recorder` on the given side.
    pub fn new(recorder: impl Into<String>, from: SourceSide) -> Self {
        Self {
            recorder: recorder.into(),
            from,
            record_idx: 0,
            data_idx: None,
        }
    }

    /// Select a different forward-pass invocation.
    pub fn at_record(mut self, record_idx: usize) -> Self {
        self.record_idx = record_idx;
        self
    }

    /// Select one item of a multi-item invocation.
    pub fn at_data(mut self, data_idx: usize) -> Self {
        self.data_idx = Some(data_idx);
        self
    }
}

/// Maps a loss module's formal argument names to record locations.
pub type ArgumentMap = BTreeMap<String, RecordLocation>;

/// Maps each loss name to the argument map feeding its forward call.
///
/// Keys must correspond one-to-one with the built loss modules; each
/// argument map's key set must equal the loss module's declared argument
/// names exactly. Both properties are checked eagerly by
/// [`validate_forward_mappings`](crate::config::validate_forward_mappings).
pub type LossForwardMappings = BTreeMap<String, ArgumentMap>;
