use std::collections::HashMap;

use dashmap::DashMap;
use glam::{DVec3, IVec3};
use rayon::prelude::*;
use tracing::info;

use crate::neighbor::NeighborList;
use crate::particle::Particles;

/// Cells further out than this are clamped onto the boundary layer.
const MAX_CELL_COORD: i32 = i32::MAX / 4;

/// Sparse uniform cell grid used to build neighbor lists. Only occupied
/// cells are stored, so widely spread particles cost nothing extra.
pub struct Grid {
    cell_size: f64,
    cells: HashMap<IVec3, Vec<usize>>, // particle indices
    grid_origin: DVec3,
}

impl Grid {
    pub fn new(cell_size: f64, origin: DVec3) -> Self {
        Self {
            cell_size,
            cells: HashMap::new(),
            grid_origin: origin,
        }
    }

    /// Grid anchored at the lowest particle corner, with cells wide enough for
    /// the largest contact distance plus `skin`.
    pub fn covering(particles: &Particles, skin: f64) -> Self {
        let origin = particles
            .x
            .iter()
            .copied()
            .reduce(DVec3::min)
            .unwrap_or(DVec3::ZERO);
        let max_radius = particles.radius.iter().copied().fold(0.0, f64::max);
        let cell_size = (2.0 * max_radius + skin).max(f64::EPSILON);
        Self::new(cell_size, origin)
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Number of occupied cells.
    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }

    fn get_cell_coords(&self, position: DVec3) -> IVec3 {
        ((position - self.grid_origin) / self.cell_size)
            .floor()
            .as_ivec3()
            .clamp(IVec3::splat(-MAX_CELL_COORD), IVec3::splat(MAX_CELL_COORD))
    }

    pub fn insert(&mut self, index: usize, position: DVec3) {
        let coords = self.get_cell_coords(position);
        self.cells.entry(coords).or_default().push(index);
    }

    /// Indices in the 3x3x3 block of cells around `position`.
    pub fn get_potential_collisions(&self, position: DVec3) -> Vec<usize> {
        let mut neighbors = Vec::new();
        let center_coords = self.get_cell_coords(position);

        for z in -1..=1 {
            for y in -1..=1 {
                for x in -1..=1 {
                    let neighbor_coords = center_coords + IVec3::new(x, y, z);
                    if let Some(cell) = self.cells.get(&neighbor_coords) {
                        neighbors.extend_from_slice(cell);
                    }
                }
            }
        }
        neighbors
    }

    /// Builds a half neighbor list for the owned particles.
    ///
    /// A pair is listed when the surfaces are closer than `skin`. Owned pairs
    /// are listed once, under the lower index. Pairs with a ghost are listed
    /// on every partition without `newton_pair`; with it only the partition
    /// whose particle precedes the ghost in (z, y, x) order keeps the pair.
    ///
    /// Touch words and history of pairs also present in `previous` are carried
    /// over. Particle indices must be stable between the two builds.
    pub fn build_neighbor_list(
        particles: &Particles,
        skin: f64,
        newton_pair: bool,
        dnum: usize,
        previous: Option<&NeighborList>,
    ) -> NeighborList {
        let mut grid = Self::covering(particles, skin);
        for (index, &position) in particles.x.iter().enumerate() {
            grid.insert(index, position);
        }

        let carried: DashMap<(usize, usize), (u32, Vec<f64>)> = DashMap::new();
        if let Some(previous) = previous.filter(|p| p.dnum() == dnum) {
            previous.ilist().par_iter().for_each(|&i| {
                for (jj, &j) in previous.neighbors(i).iter().enumerate() {
                    let touch = previous.touch(i)[jj];
                    if touch != 0 {
                        let history = previous.history(i)[jj * dnum..(jj + 1) * dnum].to_vec();
                        carried.insert((i, j), (touch, history));
                    }
                }
            });
        }

        let nlocal = particles.nlocal();
        let rows: Vec<(Vec<usize>, Vec<u32>, Vec<f64>)> = (0..nlocal)
            .into_par_iter()
            .map(|i| {
                let xi = particles.x[i];
                let radi = particles.radius[i];

                let mut neighbors: Vec<usize> = grid
                    .get_potential_collisions(xi)
                    .into_iter()
                    .filter(|&j| {
                        if j == i {
                            return false;
                        }
                        if j < nlocal {
                            if j < i {
                                return false;
                            }
                        } else if newton_pair && !precedes(xi, particles.x[j]) {
                            return false;
                        }
                        let cut = radi + particles.radius[j] + skin;
                        xi.distance_squared(particles.x[j]) < cut * cut
                    })
                    .collect();
                neighbors.sort_unstable();

                let mut touch = vec![0; neighbors.len()];
                let mut history = vec![0.0; neighbors.len() * dnum];
                for (jj, &j) in neighbors.iter().enumerate() {
                    if let Some(state) = carried.get(&(i, j)) {
                        touch[jj] = state.0;
                        history[jj * dnum..(jj + 1) * dnum].copy_from_slice(&state.1);
                    }
                }
                (neighbors, touch, history)
            })
            .collect();

        let mut list = NeighborList::new(dnum);
        for (i, (neighbors, touch, history)) in rows.into_iter().enumerate() {
            list.push_row_with_state(i, neighbors, touch, history);
        }
        info!(
            nlocal,
            nghost = particles.nghost(),
            npairs = list.npairs(),
            carried = carried.len(),
            "rebuilt neighbor list"
        );
        list
    }
}

/// Whether an owned particle at `xi` keeps its pair with a ghost at `xj`.
fn precedes(xi: DVec3, xj: DVec3) -> bool {
    if xj.z != xi.z {
        return xj.z > xi.z;
    }
    if xj.y != xi.y {
        return xj.y > xi.y;
    }
    xj.x > xi.x
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::Particle;

    fn row_of_three() -> Particles {
        let mut particles = Particles::new();
        particles.add(Particle::new(DVec3::new(0.0, 0.0, 0.0), 0.5, 1.0));
        particles.add(Particle::new(DVec3::new(0.9, 0.0, 0.0), 0.5, 1.0));
        particles.add(Particle::new(DVec3::new(5.0, 0.0, 0.0), 0.5, 1.0));
        particles
    }

    #[test]
    fn test_half_list_lists_each_pair_once() {
        let list = Grid::build_neighbor_list(&row_of_three(), 0.1, true, 0, None);
        assert_eq!(list.inum(), 3);
        assert_eq!(list.neighbors(0), &[1]);
        assert!(list.neighbors(1).is_empty());
        assert_eq!(list.npairs(), 1);
    }

    #[test]
    fn test_ghost_pairs_follow_newton_setting() {
        let mut particles = row_of_three();
        particles.add_ghost(Particle::new(DVec3::new(0.0, 0.0, -0.9), 0.5, 1.0));
        particles.add_ghost(Particle::new(DVec3::new(0.0, 0.0, 0.9), 0.5, 1.0));

        let with_newton = Grid::build_neighbor_list(&particles, 0.1, true, 0, None);
        assert_eq!(with_newton.neighbors(0), &[1, 4]);

        let without = Grid::build_neighbor_list(&particles, 0.1, false, 0, None);
        assert_eq!(without.neighbors(0), &[1, 3, 4]);
    }

    #[test]
    fn test_touched_history_is_carried_over() {
        let particles = row_of_three();
        let mut first = Grid::build_neighbor_list(&particles, 0.1, true, 2, None);
        {
            let (_, touch, history) = first.row_mut(0);
            touch[0] = 0b10;
            history.copy_from_slice(&[0.3, 0.7]);
        }

        let second = Grid::build_neighbor_list(&particles, 0.1, true, 2, Some(&first));
        assert_eq!(second.find(0, 1), Some((0b10, &[0.3, 0.7][..])));

        // untouched state is not carried
        first.row_mut(0).1[0] = 0;
        let third = Grid::build_neighbor_list(&particles, 0.1, true, 2, Some(&first));
        assert_eq!(third.find(0, 1), Some((0, &[0.0, 0.0][..])));
    }

    #[test]
    fn test_widely_spread_particles_use_few_cells() {
        let mut particles = Particles::new();
        particles.add(Particle::new(DVec3::ZERO, 0.5, 1.0));
        particles.add(Particle::new(DVec3::splat(2000.0), 0.5, 1.0));
        particles.add(Particle::new(DVec3::splat(2000.5), 0.5, 1.0));
        particles.add(Particle::new(DVec3::new(1e300, -1e300, 0.0), 0.5, 1.0));

        let list = Grid::build_neighbor_list(&particles, 0.0, true, 1, None);
        assert!(list.neighbors(0).is_empty());
        assert_eq!(list.neighbors(1), &[2]);
        assert!(list.neighbors(3).is_empty());

        let mut grid = Grid::covering(&particles, 0.0);
        for (index, &position) in particles.x.iter().enumerate() {
            grid.insert(index, position);
        }
        // 1 and 2 share a cell
        assert_eq!(grid.occupied_cells(), 3);
    }
}
