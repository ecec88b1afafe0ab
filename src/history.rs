//! Registration of persistent per-contact history values.
//!
//! Contact laws call [`HistorySetup::add_value`] once per scalar they need to
//! remember between timesteps, in a fixed order at construction time. The
//! returned offset indexes the contact's history block for the life of the model.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GranularError, Result};

/// Hands out history offsets during model construction.
pub trait HistorySetup {
    /// Reserves one history scalar and returns its offset in the per-contact block.
    ///
    /// `newton` marks values that travel with the pair when its reaction is
    /// accounted for on the neighbor's owner.
    fn add_value(&mut self, name: &str, newton: bool) -> usize;
}

/// One registered history scalar.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryValue {
    pub name: String,
    pub newton: bool,
}

/// Frozen record of every history scalar a pair style stores per contact.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryLayout {
    values: Vec<HistoryValue>,
}

impl HistoryLayout {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, name: &str, newton: bool) -> usize {
        let offset = self.values.len();
        self.values.push(HistoryValue {
            name: name.to_string(),
            newton,
        });
        debug!(name, offset, "registered contact history value");
        offset
    }

    /// Per-contact stride: the number of registered scalars.
    pub fn dnum(&self) -> usize {
        self.values.len()
    }

    pub fn values(&self) -> &[HistoryValue] {
        &self.values
    }

    /// Offset of the first value registered under `name`.
    pub fn offset_of(&self, name: &str) -> Option<usize> {
        self.values.iter().position(|v| v.name == name)
    }

    /// Checks that a restored layout matches this one entry by entry.
    pub fn ensure_matches(&self, restored: &HistoryLayout) -> Result<()> {
        if self.dnum() != restored.dnum() {
            return Err(GranularError::layout_mismatch(format!(
                "{} values registered, restart holds {}",
                self.dnum(),
                restored.dnum()
            )));
        }
        for (offset, (ours, theirs)) in self.values.iter().zip(&restored.values).enumerate() {
            if ours != theirs {
                return Err(GranularError::layout_mismatch(format!(
                    "offset {offset}: expected '{}', restart holds '{}'",
                    ours.name, theirs.name
                )));
            }
        }
        Ok(())
    }
}

/// History setup bound to a pair style's layout.
///
/// The mutable borrow ends with model construction, after which the layout
/// can no longer grow.
pub struct PairContactHistorySetup<'a> {
    layout: &'a mut HistoryLayout,
}

impl<'a> PairContactHistorySetup<'a> {
    pub fn new(layout: &'a mut HistoryLayout) -> Self {
        Self { layout }
    }
}

impl HistorySetup for PairContactHistorySetup<'_> {
    fn add_value(&mut self, name: &str, newton: bool) -> usize {
        self.layout.push(name, newton)
    }
}

/// Self-contained counter used for particle-wall contacts.
#[derive(Debug, Default)]
pub struct WallContactHistorySetup {
    dnum: usize,
}

impl WallContactHistorySetup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dnum(&self) -> usize {
        self.dnum
    }
}

impl HistorySetup for WallContactHistorySetup {
    fn add_value(&mut self, _name: &str, _newton: bool) -> usize {
        let offset = self.dnum;
        self.dnum += 1;
        offset
    }
}
