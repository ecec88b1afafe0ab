//! Pairwise evaluation loop for particle-particle contacts.
//!
//! [`PairGranular`] walks a half neighbor list, resolves the geometry and
//! effective mass of each overlapping pair, hands it to the composed contact
//! model and accumulates the returned force and torque deltas.

use std::io::{Read, Write};

use glam::DVec3;
use tracing::{debug, info};

use crate::contact::{CollisionData, ForceData, TouchFlags};
use crate::error::{GranularError, Result};
use crate::history::{HistoryLayout, PairContactHistorySetup};
use crate::model::{Capabilities, ContactLaw};
use crate::neighbor::NeighborList;
use crate::particle::Particles;
use crate::properties::PropertyRegistry;
use crate::settings::Settings;

/// Pair-style options that do not belong to any contact law.
#[derive(Clone, Copy, Debug)]
pub struct PairConfig {
    /// Reactions on ghost particles are accumulated here and sent to their owner.
    pub newton_pair: bool,
    /// Group bit of frozen particles; `0` disables the frozen-group rule.
    pub freeze_group_bit: u32,
}

impl Default for PairConfig {
    fn default() -> Self {
        Self {
            newton_pair: true,
            freeze_group_bit: 0,
        }
    }
}

/// Per-pass switches.
#[derive(Clone, Copy, Debug)]
pub struct PassOptions {
    /// Tally per-pair energy/virial contributions.
    pub energy: bool,
    pub virial: bool,
    /// Report each force-producing pair to the coupling hook.
    pub coupling: bool,
    /// Accumulate forces into the particle arrays.
    pub compute: bool,
    /// Let contact laws advance their tangential history.
    pub shear_update: bool,
    pub dt: f64,
}

impl PassOptions {
    pub fn new(dt: f64) -> Self {
        Self {
            energy: false,
            virial: false,
            coupling: false,
            compute: true,
            shear_update: true,
            dt,
        }
    }
}

/// Receives the contact data of every force-producing pair, e.g. to exchange
/// forces with a coupled fluid solver.
pub trait PairCoupling {
    fn add_pair(&mut self, cdata: &CollisionData, i_forces: &ForceData);
}

pub struct PairGranular<M> {
    config: PairConfig,
    model: M,
    layout: HistoryLayout,
    settings: Settings,
    cdata: Box<CollisionData>,
    i_forces: Box<ForceData>,
    j_forces: Box<ForceData>,
    virial: [f64; 6],
    ncontacts: usize,
    /// Number of material types, known once connected.
    ntypes: Option<usize>,
}

impl<M: ContactLaw> PairGranular<M> {
    /// Builds the model and freezes its history layout.
    pub fn new(config: PairConfig) -> Self {
        let mut layout = HistoryLayout::new();
        let model = M::new(&mut PairContactHistorySetup::new(&mut layout));

        let mut settings = Settings::new();
        if M::CAPABILITIES.contains(Capabilities::REGISTER_SETTINGS) {
            model.register_settings(&mut settings);
        }
        debug!(
            style = M::NAME,
            dnum = layout.dnum(),
            values = ?layout.values().iter().map(|v| v.name.as_str()).collect::<Vec<_>>(),
            "froze contact history layout"
        );

        let dnum = layout.dnum();
        Self {
            config,
            model,
            layout,
            settings,
            cdata: Box::new(CollisionData::with_history(dnum)),
            i_forces: Box::default(),
            j_forces: Box::default(),
            virial: [0.0; 6],
            ncontacts: 0,
            ntypes: None,
        }
    }

    /// Parses keyword/value tokens and hands the options to the model.
    pub fn settings<S: AsRef<str>>(&mut self, args: &[S]) -> Result<()> {
        self.settings.parse_arguments(args)?;
        self.model.load_settings(&self.settings)
    }

    /// Connects the model to its coefficient tables.
    pub fn init_granular(&mut self, registry: &mut PropertyRegistry) -> Result<()> {
        if M::CAPABILITIES.contains(Capabilities::CONNECT_TO_PROPERTIES) {
            self.model.connect_to_properties(registry)?;
        }
        self.ntypes = Some(registry.ntypes());
        debug!(style = M::NAME, ntypes = registry.ntypes(), "connected contact properties");
        Ok(())
    }

    pub fn config(&self) -> &PairConfig {
        &self.config
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn layout(&self) -> &HistoryLayout {
        &self.layout
    }

    /// History values per contact.
    pub fn dnum(&self) -> usize {
        self.layout.dnum()
    }

    /// Restart validation tag of this contact-law configuration.
    pub fn hashcode(&self) -> i64 {
        M::ID
    }

    /// Virial of the last tallied pass: `xx, yy, zz, xy, xz, yz`.
    pub fn virial(&self) -> [f64; 6] {
        self.virial
    }

    /// Overlapping pairs found in the last pass.
    pub fn ncontacts(&self) -> usize {
        self.ncontacts
    }

    /// An empty neighbor list with this style's history stride.
    pub fn new_neighbor_list(&self) -> NeighborList {
        NeighborList::new(self.dnum())
    }

    /// Evaluates every pair of `list` and accumulates forces into `world`.
    pub fn compute_force(
        &mut self,
        world: &mut Particles,
        list: &mut NeighborList,
        pass: &PassOptions,
        mut coupling: Option<&mut dyn PairCoupling>,
    ) -> Result<()> {
        let dnum = self.layout.dnum();
        if list.dnum() != dnum {
            return Err(GranularError::StrideMismatch {
                expected: dnum,
                found: list.dnum(),
            });
        }
        if let Some(ntypes) = self.ntypes {
            world.check_types(ntypes)?;
        }

        let evflag = pass.energy || pass.virial;
        if evflag {
            self.virial = [0.0; 6];
        }

        let nlocal = world.nlocal();
        let newton_pair = self.config.newton_pair;
        let freeze_group_bit = self.config.freeze_group_bit;
        let tracks_separation = M::CAPABILITIES.contains(Capabilities::NO_COLLISION);

        let Self {
            model,
            cdata,
            i_forces,
            j_forces,
            virial,
            ncontacts,
            ..
        } = self;
        let cdata = &mut **cdata;
        let i_forces = &mut **i_forces;
        let j_forces = &mut **j_forces;

        cdata.reset();
        i_forces.reset();
        j_forces.reset();
        cdata.is_wall = false;
        cdata.compute = pass.compute;
        cdata.shear_update = pass.shear_update;
        cdata.dt = pass.dt;
        *ncontacts = 0;

        model.begin_pass(cdata, i_forces, j_forces);

        for ii in 0..list.inum() {
            let i = list.ilist()[ii];
            let xi = world.x[i];
            let radi = world.radius[i];
            let (jlist, touch, history) = list.row_mut(i);

            cdata.i = i;
            cdata.radi = radi;

            for (jj, &j) in jlist.iter().enumerate() {
                let delta = xi - world.x[j];
                let rsq = delta.length_squared();
                let radj = world.radius[j];
                let radsum = radi + radj;

                cdata.j = j;
                cdata.delta = delta;
                cdata.rsq = rsq;
                cdata.radj = radj;
                cdata.radsum = radsum;
                cdata.touch = TouchFlags::from_bits_retain(touch[jj]);
                let slot = &mut history[jj * dnum..(jj + 1) * dnum];
                cdata.contact.contact_history.copy_from_slice(slot);

                i_forces.reset();
                j_forces.reset();

                let has_force_update = if rsq < radsum * radsum {
                    let r = rsq.sqrt();
                    let rinv = 1.0 / r;

                    // rigid bodies collide with their whole mass; frozen
                    // particles leave the whole pair mass to the other one
                    let itype = world.type_ids[i];
                    let jtype = world.type_ids[j];
                    let mi = world.rigid_mass(i).unwrap_or_else(|| world.mass(i));
                    let mj = world.rigid_mass(j).unwrap_or_else(|| world.mass(j));
                    let mut meff = mi * mj / (mi + mj);
                    if world.mask[i] & freeze_group_bit != 0 {
                        meff = mj;
                    }
                    if world.mask[j] & freeze_group_bit != 0 {
                        meff = mi;
                    }

                    cdata.itype = itype;
                    cdata.jtype = jtype;
                    cdata.r = r;
                    cdata.rinv = rinv;
                    cdata.meff = meff;
                    cdata.mi = mi;
                    cdata.mj = mj;
                    cdata.en = delta * rinv;
                    cdata.v_i = world.v[i];
                    cdata.v_j = world.v[j];
                    cdata.omega_i = world.omega[i];
                    cdata.omega_j = world.omega[j];

                    model.collision(cdata, i_forces, j_forces);
                    *ncontacts += 1;
                    true
                } else {
                    if tracks_separation {
                        model.no_collision(&mut cdata.contact, i_forces, j_forces);
                    }
                    false
                };

                touch[jj] = cdata.touch.bits();
                slot.copy_from_slice(&cdata.contact.contact_history);

                if has_force_update {
                    if pass.compute {
                        world.f[i] += i_forces.delta_f;
                        world.torque[i] += i_forces.delta_torque;

                        if newton_pair || j < nlocal {
                            world.f[j] += j_forces.delta_f;
                            world.torque[j] += j_forces.delta_torque;
                        }
                    }

                    if pass.coupling {
                        if let Some(hook) = coupling.as_deref_mut() {
                            hook.add_pair(cdata, i_forces);
                        }
                    }

                    if evflag {
                        tally_virial(virial, i, j, nlocal, newton_pair, i_forces.delta_f, delta);
                    }
                }
            }
        }

        model.end_pass(cdata, i_forces, j_forces);
        debug!(
            pairs = list.npairs(),
            contacts = *ncontacts,
            "evaluated granular pair forces"
        );
        Ok(())
    }

    /// Writes the restart validation tag.
    pub fn write_restart_settings<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.hashcode().to_le_bytes())?;
        info!(style = M::NAME, hashcode = self.hashcode(), "wrote pair style restart tag");
        Ok(())
    }

    /// Reads the restart validation tag and checks it against this configuration.
    pub fn read_restart_settings<R: Read>(&self, reader: &mut R) -> Result<()> {
        let mut bytes = [0u8; 8];
        reader.read_exact(&mut bytes)?;
        check_hashcode(self.hashcode(), i64::from_le_bytes(bytes))?;
        info!(style = M::NAME, hashcode = self.hashcode(), "read pair style restart tag");
        Ok(())
    }
}

pub(crate) fn check_hashcode(expected: i64, found: i64) -> Result<()> {
    if expected != found {
        return Err(GranularError::WrongPairStyle { expected, found });
    }
    Ok(())
}

/// Adds the virial of one pair. Without `newton_pair` each owned partner
/// takes half, since the pair is also evaluated by the ghost's owner.
fn tally_virial(
    virial: &mut [f64; 6],
    i: usize,
    j: usize,
    nlocal: usize,
    newton_pair: bool,
    f: DVec3,
    del: DVec3,
) {
    let v = [
        del.x * f.x,
        del.y * f.y,
        del.z * f.z,
        del.x * f.y,
        del.x * f.z,
        del.y * f.z,
    ];

    let scale = if newton_pair {
        1.0
    } else {
        let mut s = 0.0;
        if i < nlocal {
            s += 0.5;
        }
        if j < nlocal {
            s += 0.5;
        }
        s
    };

    for (acc, value) in virial.iter_mut().zip(v) {
        *acc += scale * value;
    }
}
