//! Half neighbor list with per-contact touch words and history blocks.

use serde::{Deserialize, Serialize};

/// Neighbors of every owned particle, with persistent contact state.
///
/// For particle `i`, `neighbors(i)[jj]` is the `jj`-th neighbor; its touch word
/// is `touch(i)[jj]` and its history block is
/// `history(i)[jj * dnum..(jj + 1) * dnum]`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NeighborList {
    dnum: usize,
    ilist: Vec<usize>,
    neighbors: Vec<Vec<usize>>,
    touch: Vec<Vec<u32>>,
    history: Vec<Vec<f64>>,
}

impl NeighborList {
    /// Empty list storing `dnum` history values per contact.
    pub fn new(dnum: usize) -> Self {
        Self {
            dnum,
            ..Self::default()
        }
    }

    /// History values per contact.
    pub fn dnum(&self) -> usize {
        self.dnum
    }

    /// Number of particles with a neighbor row.
    pub fn inum(&self) -> usize {
        self.ilist.len()
    }

    pub fn ilist(&self) -> &[usize] {
        &self.ilist
    }

    /// Total number of stored pairs.
    pub fn npairs(&self) -> usize {
        self.ilist.iter().map(|&i| self.neighbors[i].len()).sum()
    }

    /// Adds the row of particle `i` with fresh (untouched, zeroed) contact state.
    pub fn push_row(&mut self, i: usize, neighbors: Vec<usize>) {
        let n = neighbors.len();
        self.push_row_with_state(i, neighbors, vec![0; n], vec![0.0; n * self.dnum]);
    }

    /// Adds the row of particle `i` with existing contact state.
    ///
    /// `touch` holds one word per neighbor and `history` `dnum` values per neighbor.
    pub fn push_row_with_state(
        &mut self,
        i: usize,
        neighbors: Vec<usize>,
        touch: Vec<u32>,
        history: Vec<f64>,
    ) {
        debug_assert_eq!(touch.len(), neighbors.len());
        debug_assert_eq!(history.len(), neighbors.len() * self.dnum);

        if self.neighbors.len() <= i {
            self.neighbors.resize_with(i + 1, Vec::new);
            self.touch.resize_with(i + 1, Vec::new);
            self.history.resize_with(i + 1, Vec::new);
        }
        self.ilist.push(i);
        self.neighbors[i] = neighbors;
        self.touch[i] = touch;
        self.history[i] = history;
    }

    pub fn neighbors(&self, i: usize) -> &[usize] {
        self.neighbors.get(i).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn touch(&self, i: usize) -> &[u32] {
        self.touch.get(i).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn history(&self, i: usize) -> &[f64] {
        self.history.get(i).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Neighbor indices of `i` together with its mutable touch words and history.
    pub fn row_mut(&mut self, i: usize) -> (&[usize], &mut [u32], &mut [f64]) {
        (
            &self.neighbors[i],
            &mut self.touch[i],
            &mut self.history[i],
        )
    }

    /// Touch word and history block of the pair `(i, j)`, if listed.
    pub fn find(&self, i: usize, j: usize) -> Option<(u32, &[f64])> {
        let jj = self.neighbors(i).iter().position(|&n| n == j)?;
        let dnum = self.dnum;
        Some((self.touch[i][jj], &self.history[i][jj * dnum..(jj + 1) * dnum]))
    }

    /// Iterates over every listed pair with its contact state.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize, u32, &[f64])> + '_ {
        let dnum = self.dnum;
        self.ilist.iter().flat_map(move |&i| {
            self.neighbors[i]
                .iter()
                .enumerate()
                .map(move |(jj, &j)| {
                    (i, j, self.touch[i][jj], &self.history[i][jj * dnum..(jj + 1) * dnum])
                })
        })
    }
}
