//! Elastic-plastic normal law with loading/unloading hysteresis.
//!
//! Loading follows the linear Hooke stiffness `kn`. Unloading and reloading
//! follow a stiffer branch `k2` that grows with the largest overlap seen so far
//! (`deltaMax`), down to an adhesive floor `-kc * deltan`. Settings, property
//! plumbing and the `kn`/damping derivation are delegated to the wrapped
//! [`NormalHooke`].

use std::sync::Arc;

use crate::contact::{CollisionData, ContactData, ForceData, TouchFlags};
use crate::error::Result;
use crate::history::HistorySetup;
use crate::material;
use crate::model::{Capabilities, ContactLaw};
use crate::physics::{apply_normal_force, NormalHooke};
use crate::properties::{PairTable, PropertyRegistry};
use crate::settings::Settings;

/// Unloading stiffness `k2` for a contact that has reached `delta_max`.
///
/// Interpolates linearly from `kn` to `k2_max` until `delta_max` reaches the
/// plastic limit `k2_max / (k2_max - kn) * phi_f * 2 * reff`.
pub fn unloading_stiffness(kn: f64, k2_max: f64, phi_f: f64, reff: f64, delta_max: f64) -> f64 {
    let delta_max_lim = (k2_max / (k2_max - kn)) * phi_f * 2.0 * reff;
    if delta_max >= delta_max_lim {
        k2_max
    } else {
        kn + (k2_max - kn) * delta_max / delta_max_lim
    }
}

/// Elastic part of the hysteretic normal force.
pub fn hysteretic_force(kn: f64, k2: f64, kc: f64, deltan: f64, delta_max: f64) -> f64 {
    let f_tmp = k2 * (deltan - delta_max) + kn * delta_max;
    if f_tmp >= kn * deltan {
        kn * deltan
    } else if f_tmp > -kc * deltan {
        f_tmp
    } else {
        -kc * deltan
    }
}

#[derive(Debug)]
pub struct NormalHookeHysteresis {
    base: NormalHooke,
    kn2k2_max: Arc<PairTable>,
    kn2kc: Arc<PairTable>,
    phi_f: Arc<PairTable>,
    history_offset: usize,
}

impl NormalHookeHysteresis {
    /// The wrapped baseline law.
    pub fn base(&self) -> &NormalHooke {
        &self.base
    }

    /// Offset of `deltaMax` in the contact history block.
    pub fn history_offset(&self) -> usize {
        self.history_offset
    }
}

impl ContactLaw for NormalHookeHysteresis {
    const CAPABILITIES: Capabilities = Capabilities::REGISTER_SETTINGS
        .union(Capabilities::CONNECT_TO_PROPERTIES)
        .union(Capabilities::COLLISION)
        .union(Capabilities::NO_COLLISION);
    const ID: i64 = 2;
    const NAME: &'static str = "hooke/hysteresis";

    fn new(hsetup: &mut dyn HistorySetup) -> Self {
        let base = NormalHooke::new(hsetup);
        let history_offset = hsetup.add_value("deltaMax", true);
        Self {
            base,
            kn2k2_max: Arc::default(),
            kn2kc: Arc::default(),
            phi_f: Arc::default(),
            history_offset,
        }
    }

    fn register_settings(&self, settings: &mut Settings) {
        self.base.register_settings(settings);
    }

    fn load_settings(&mut self, settings: &Settings) -> Result<()> {
        self.base.load_settings(settings)
    }

    fn connect_to_properties(&mut self, registry: &mut PropertyRegistry) -> Result<()> {
        self.base.connect_to_properties(registry)?;

        registry.register_property("kn2kcMax", material::create_coeff_max_elastic_stiffness)?;
        registry.register_property("kn2kc", material::create_coeff_adhesion_stiffness)?;
        registry.register_property("phiF", material::create_coeff_plasticity_depth)?;

        self.kn2k2_max = registry.connect_matrix("kn2kcMax")?;
        self.kn2kc = registry.connect_matrix("kn2kc")?;
        self.phi_f = registry.connect_matrix("phiF")?;
        Ok(())
    }

    #[inline]
    fn collision(
        &mut self,
        cdata: &mut CollisionData,
        i_forces: &mut ForceData,
        j_forces: &mut ForceData,
    ) {
        let (itype, jtype) = (cdata.itype, cdata.jtype);
        let deltan = cdata.deltan;
        let c = self.base.coefficients(cdata);
        let kn = c.kn;

        cdata.touch |= TouchFlags::NORMAL_MODEL;
        let slot = &mut cdata.contact.contact_history[self.history_offset];
        if deltan > *slot {
            *slot = deltan;
        }
        let delta_max = *slot;

        let k2_max = kn * self.kn2k2_max.get(itype, jtype);
        let kc = kn * self.kn2kc.get(itype, jtype);
        let k2 = unloading_stiffness(kn, k2_max, self.phi_f.get(itype, jtype), c.reff, delta_max);
        let f_hys = hysteretic_force(kn, k2, kc, deltan, delta_max);

        let fn_damping = -c.gamman * cdata.vn;
        let fn_mag = f_hys + fn_damping;

        cdata.normal_force = fn_mag;
        NormalHooke::store_coefficients(cdata, &c);
        apply_normal_force(cdata, fn_mag, i_forces, j_forces);
    }

    fn no_collision(&mut self, cdata: &mut ContactData, _: &mut ForceData, _: &mut ForceData) {
        cdata.touch.remove(TouchFlags::NORMAL_MODEL);
        cdata.contact_history[self.history_offset] = 0.0;
    }
}
