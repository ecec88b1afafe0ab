//! Binary restart snapshots of the pair style's contact memory.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{GranularError, Result};
use crate::history::HistoryLayout;
use crate::model::ContactLaw;
use crate::neighbor::NeighborList;
use crate::pair::{check_hashcode, PairGranular};
use crate::wall::{WallGranular, WallHistory};

/// Everything needed to resume contact evaluation where a run stopped.
///
/// Wall contact memory is only present when captured with [`Self::with_walls`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RestartSnapshot {
    pub hashcode: i64,
    pub layout: HistoryLayout,
    pub neighbor_list: NeighborList,
    pub walls: Option<WallHistory>,
}

impl RestartSnapshot {
    pub fn capture<M: ContactLaw>(pair: &PairGranular<M>, list: &NeighborList) -> Self {
        Self {
            hashcode: pair.hashcode(),
            layout: pair.layout().clone(),
            neighbor_list: list.clone(),
            walls: None,
        }
    }

    /// Adds the particle-wall contact memory of `walls`.
    pub fn with_walls<M: ContactLaw>(mut self, walls: &WallGranular<M>) -> Self {
        self.walls = Some(walls.history());
        self
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| GranularError::Snapshot(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| GranularError::Snapshot(e.to_string()))
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let bytes = self.to_bytes()?;
        writer.write_all(&bytes)?;
        info!(
            bytes = bytes.len(),
            npairs = self.neighbor_list.npairs(),
            "wrote restart snapshot"
        );
        Ok(())
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let snapshot = Self::from_bytes(&bytes)?;
        info!(
            bytes = bytes.len(),
            npairs = snapshot.neighbor_list.npairs(),
            "read restart snapshot"
        );
        Ok(snapshot)
    }

    /// Validates the snapshot against `pair` and hands back its neighbor list.
    pub fn restore<M: ContactLaw>(self, pair: &PairGranular<M>) -> Result<NeighborList> {
        check_hashcode(pair.hashcode(), self.hashcode)?;
        pair.layout().ensure_matches(&self.layout)?;
        if self.neighbor_list.dnum() != pair.dnum() {
            return Err(GranularError::StrideMismatch {
                expected: pair.dnum(),
                found: self.neighbor_list.dnum(),
            });
        }
        Ok(self.neighbor_list)
    }

    /// Hands the wall contact memory back to `walls`. Snapshots without wall
    /// memory leave `walls` untouched.
    pub fn restore_walls<M: ContactLaw>(&self, walls: &mut WallGranular<M>) -> Result<()> {
        check_hashcode(M::ID, self.hashcode)?;
        match &self.walls {
            Some(state) => walls.restore_history(state.clone()),
            None => Ok(()),
        }
    }
}
