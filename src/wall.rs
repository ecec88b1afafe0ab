//! Particle contacts with planar primitive walls.

use glam::DVec3;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::contact::{CollisionData, ForceData, TouchFlags};
use crate::error::{GranularError, Result};
use crate::history::WallContactHistorySetup;
use crate::model::{Capabilities, ContactLaw};
use crate::pair::PassOptions;
use crate::particle::Particles;
use crate::properties::PropertyRegistry;
use crate::settings::Settings;

/// Infinite plane. Particles live on the side the normal points to.
#[derive(Clone, Copy, Debug)]
pub struct PlaneWall {
    pub point: DVec3,
    /// Unit normal.
    pub normal: DVec3,
    pub velocity: DVec3,
    /// Scales the normal force of every contact with this wall.
    pub area_ratio: f64,
}

impl PlaneWall {
    pub fn new(point: DVec3, normal: DVec3) -> Self {
        Self {
            point,
            normal: normal.normalize(),
            velocity: DVec3::ZERO,
            area_ratio: 1.0,
        }
    }

    pub fn with_velocity(mut self, velocity: DVec3) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_area_ratio(mut self, area_ratio: f64) -> Self {
        self.area_ratio = area_ratio;
        self
    }

    /// Signed distance of `x` from the plane.
    #[inline]
    pub fn distance(&self, x: DVec3) -> f64 {
        (x - self.point).dot(self.normal)
    }
}

/// Touch words and history blocks of every particle-wall contact, indexed by
/// owned particle then wall.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WallHistory {
    pub dnum: usize,
    pub nwalls: usize,
    pub touch: Vec<Vec<u32>>,
    pub history: Vec<Vec<f64>>,
}

/// Evaluates particle-wall contacts with its own instance of a contact model.
pub struct WallGranular<M> {
    model: M,
    dnum: usize,
    walls: Vec<PlaneWall>,
    /// Material type the walls are made of.
    wall_type: usize,
    settings: Settings,
    // per owned particle, one entry per wall
    touch: Vec<Vec<u32>>,
    history: Vec<Vec<f64>>,
    cdata: Box<CollisionData>,
    i_forces: Box<ForceData>,
    j_forces: Box<ForceData>,
    ntypes: Option<usize>,
}

impl<M: ContactLaw> WallGranular<M> {
    pub fn new(walls: Vec<PlaneWall>, wall_type: usize) -> Self {
        let mut hsetup = WallContactHistorySetup::new();
        let model = M::new(&mut hsetup);
        let dnum = hsetup.dnum();

        let mut settings = Settings::new();
        if M::CAPABILITIES.contains(Capabilities::REGISTER_SETTINGS) {
            model.register_settings(&mut settings);
        }
        debug!(nwalls = walls.len(), dnum, wall_type, "created granular walls");

        Self {
            model,
            dnum,
            walls,
            wall_type,
            settings,
            touch: Vec::new(),
            history: Vec::new(),
            cdata: Box::new(CollisionData::with_history(dnum)),
            i_forces: Box::default(),
            j_forces: Box::default(),
            ntypes: None,
        }
    }

    pub fn settings<S: AsRef<str>>(&mut self, args: &[S]) -> Result<()> {
        self.settings.parse_arguments(args)?;
        self.model.load_settings(&self.settings)
    }

    pub fn init_granular(&mut self, registry: &mut PropertyRegistry) -> Result<()> {
        let ntypes = registry.ntypes();
        if self.wall_type == 0 || self.wall_type > ntypes {
            return Err(GranularError::TypeOutOfRange {
                index: self.wall_type,
                ntypes,
            });
        }
        if M::CAPABILITIES.contains(Capabilities::CONNECT_TO_PROPERTIES) {
            self.model.connect_to_properties(registry)?;
        }
        self.ntypes = Some(ntypes);
        Ok(())
    }

    pub fn walls(&self) -> &[PlaneWall] {
        &self.walls
    }

    pub fn dnum(&self) -> usize {
        self.dnum
    }

    /// Touch word and history of particle `i` against wall `w`.
    pub fn contact_state(&self, i: usize, w: usize) -> Option<(u32, &[f64])> {
        let touch = *self.touch.get(i)?.get(w)?;
        let history = &self.history[i][w * self.dnum..(w + 1) * self.dnum];
        Some((touch, history))
    }

    /// Copy of the contact memory, for restart snapshots.
    pub fn history(&self) -> WallHistory {
        WallHistory {
            dnum: self.dnum,
            nwalls: self.walls.len(),
            touch: self.touch.clone(),
            history: self.history.clone(),
        }
    }

    /// Replaces the contact memory with a restored one.
    pub fn restore_history(&mut self, state: WallHistory) -> Result<()> {
        if state.dnum != self.dnum {
            return Err(GranularError::StrideMismatch {
                expected: self.dnum,
                found: state.dnum,
            });
        }
        let nwalls = self.walls.len();
        if state.nwalls != nwalls {
            return Err(GranularError::layout_mismatch(format!(
                "{nwalls} walls configured, restart holds {}",
                state.nwalls
            )));
        }
        let well_formed = state.touch.len() == state.history.len()
            && state.touch.iter().all(|t| t.len() == nwalls)
            && state.history.iter().all(|h| h.len() == nwalls * self.dnum);
        if !well_formed {
            return Err(GranularError::layout_mismatch("ragged wall contact history"));
        }
        self.touch = state.touch;
        self.history = state.history;
        Ok(())
    }

    fn ensure_storage(&mut self, nlocal: usize) {
        let nwalls = self.walls.len();
        let dnum = self.dnum;
        if self.touch.len() < nlocal {
            self.touch.resize_with(nlocal, || vec![0; nwalls]);
            self.history.resize_with(nlocal, || vec![0.0; nwalls * dnum]);
        }
    }

    /// Evaluates every owned particle against every wall.
    pub fn compute_wall_force(&mut self, world: &mut Particles, pass: &PassOptions) -> Result<()> {
        if let Some(ntypes) = self.ntypes {
            world.check_types(ntypes)?;
        }
        let nlocal = world.nlocal();
        self.ensure_storage(nlocal);

        let dnum = self.dnum;
        let wall_type = self.wall_type;
        let tracks_separation = M::CAPABILITIES.contains(Capabilities::NO_COLLISION);
        let Self {
            model,
            walls,
            touch,
            history,
            cdata,
            i_forces,
            j_forces,
            ..
        } = self;
        let cdata = &mut **cdata;
        let i_forces = &mut **i_forces;
        let j_forces = &mut **j_forces;

        cdata.reset();
        cdata.is_wall = true;
        cdata.compute = pass.compute;
        cdata.shear_update = pass.shear_update;
        cdata.dt = pass.dt;
        model.begin_pass(cdata, i_forces, j_forces);

        let mut ncontacts = 0;
        for i in 0..nlocal {
            let radi = world.radius[i];
            for (w, wall) in walls.iter().enumerate() {
                let dist = wall.distance(world.x[i]);
                let delta = dist * wall.normal;

                cdata.i = i;
                cdata.j = w;
                cdata.radi = radi;
                cdata.radj = 0.0;
                cdata.radsum = radi;
                cdata.delta = delta;
                cdata.rsq = dist * dist;
                cdata.touch = TouchFlags::from_bits_retain(touch[i][w]);
                let slot = &mut history[i][w * dnum..(w + 1) * dnum];
                cdata.contact.contact_history.copy_from_slice(slot);

                i_forces.reset();
                j_forces.reset();

                let has_force_update = if dist < radi {
                    let mi = world.rigid_mass(i).unwrap_or_else(|| world.mass(i));
                    cdata.itype = world.type_ids[i];
                    cdata.jtype = wall_type;
                    cdata.r = dist;
                    cdata.rinv = 1.0 / dist;
                    cdata.en = wall.normal;
                    cdata.mi = mi;
                    cdata.mj = 0.0;
                    cdata.meff = mi;
                    cdata.area_ratio = wall.area_ratio;
                    cdata.v_i = world.v[i];
                    cdata.v_j = wall.velocity;
                    cdata.omega_i = world.omega[i];
                    cdata.omega_j = DVec3::ZERO;

                    model.collision(cdata, i_forces, j_forces);
                    ncontacts += 1;
                    true
                } else {
                    if tracks_separation {
                        model.no_collision(&mut cdata.contact, i_forces, j_forces);
                    }
                    false
                };

                touch[i][w] = cdata.touch.bits();
                slot.copy_from_slice(&cdata.contact.contact_history);

                if has_force_update && pass.compute {
                    world.f[i] += i_forces.delta_f;
                    world.torque[i] += i_forces.delta_torque;
                }
            }
        }

        model.end_pass(cdata, i_forces, j_forces);
        debug!(contacts = ncontacts, "evaluated granular wall forces");
        Ok(())
    }
}
