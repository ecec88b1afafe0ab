//! Tangential (friction) laws.

use std::sync::Arc;

use glam::DVec3;

use crate::contact::{CollisionData, ContactData, ForceData, TouchFlags};
use crate::error::Result;
use crate::history::HistorySetup;
use crate::material;
use crate::model::{Capabilities, ContactLaw};
use crate::properties::{PairTable, PropertyRegistry};

/// Adds the tangential force and its torque to both particles.
#[inline]
fn apply_tangential_force(
    cdata: &mut CollisionData,
    ft: DVec3,
    i_forces: &mut ForceData,
    j_forces: &mut ForceData,
) {
    let tor = cdata.en.cross(ft);
    cdata.tangential_force = ft.length();

    i_forces.delta_f += ft;
    i_forces.delta_torque = -cdata.cri * tor;

    if !cdata.is_wall {
        j_forces.delta_f -= ft;
        j_forces.delta_torque = -cdata.crj * tor;
    }
}

fn connect_friction(registry: &mut PropertyRegistry) -> Result<Arc<PairTable>> {
    registry.register_property("coeffFrict", material::create_coeff_frict)?;
    registry.connect_matrix("coeffFrict")
}

/// Viscous tangential damping capped by Coulomb friction. Keeps no history.
#[derive(Debug)]
pub struct TangentialNoHistory {
    coeff_frict: Arc<PairTable>,
}

impl ContactLaw for TangentialNoHistory {
    const CAPABILITIES: Capabilities =
        Capabilities::CONNECT_TO_PROPERTIES.union(Capabilities::COLLISION);
    const ID: i64 = 0;
    const NAME: &'static str = "no_history";

    fn new(_hsetup: &mut dyn HistorySetup) -> Self {
        Self {
            coeff_frict: Arc::default(),
        }
    }

    fn connect_to_properties(&mut self, registry: &mut PropertyRegistry) -> Result<()> {
        self.coeff_frict = connect_friction(registry)?;
        Ok(())
    }

    #[inline]
    fn collision(
        &mut self,
        cdata: &mut CollisionData,
        i_forces: &mut ForceData,
        j_forces: &mut ForceData,
    ) {
        let xmu = self.coeff_frict.get(cdata.itype, cdata.jtype);
        let ft_friction = xmu * cdata.normal_force.abs();

        let mut ft = -cdata.gammat * cdata.vtr;
        let ft_damping = ft.length();
        if ft_damping > ft_friction {
            ft *= ft_friction / ft_damping;
        }
        apply_tangential_force(cdata, ft, i_forces, j_forces);
    }
}

/// Elastic shear spring with Coulomb sliding, remembering the accumulated
/// tangential displacement of each contact.
#[derive(Debug)]
pub struct TangentialHistory {
    coeff_frict: Arc<PairTable>,
    history_offset: usize,
}

impl TangentialHistory {
    /// Offset of `shearx`; `sheary` and `shearz` follow it.
    pub fn history_offset(&self) -> usize {
        self.history_offset
    }
}

impl ContactLaw for TangentialHistory {
    const CAPABILITIES: Capabilities = Capabilities::CONNECT_TO_PROPERTIES
        .union(Capabilities::COLLISION)
        .union(Capabilities::NO_COLLISION);
    const ID: i64 = 1;
    const NAME: &'static str = "history";

    fn new(hsetup: &mut dyn HistorySetup) -> Self {
        let history_offset = hsetup.add_value("shearx", true);
        hsetup.add_value("sheary", true);
        hsetup.add_value("shearz", true);
        Self {
            coeff_frict: Arc::default(),
            history_offset,
        }
    }

    fn connect_to_properties(&mut self, registry: &mut PropertyRegistry) -> Result<()> {
        self.coeff_frict = connect_friction(registry)?;
        Ok(())
    }

    #[inline]
    fn collision(
        &mut self,
        cdata: &mut CollisionData,
        i_forces: &mut ForceData,
        j_forces: &mut ForceData,
    ) {
        let en = cdata.en;
        let vtr = cdata.vtr;
        let kt = cdata.kt;
        let gammat = cdata.gammat;
        let xmu = self.coeff_frict.get(cdata.itype, cdata.jtype);
        let offset = self.history_offset;

        cdata.touch |= TouchFlags::TANGENTIAL_MODEL;
        let stored = &cdata.contact.contact_history[offset..offset + 3];
        let mut shear = DVec3::new(stored[0], stored[1], stored[2]);

        if cdata.shear_update && cdata.compute {
            shear += vtr * cdata.dt;
            // keep the spring in the current tangent plane
            shear -= shear.dot(en) * en;
        }

        let shrmag = shear.length();
        let mut ft = -kt * shear;
        let ft_shear = kt * shrmag;
        let ft_friction = xmu * cdata.normal_force.abs();

        if ft_shear > ft_friction {
            if shrmag != 0.0 {
                ft *= ft_friction / ft_shear;
                shear = -ft / kt;
            } else {
                ft = DVec3::ZERO;
            }
        } else {
            ft -= gammat * vtr;
        }

        cdata.contact.contact_history[offset..offset + 3].copy_from_slice(&shear.to_array());
        apply_tangential_force(cdata, ft, i_forces, j_forces);
    }

    fn no_collision(&mut self, cdata: &mut ContactData, _: &mut ForceData, _: &mut ForceData) {
        cdata.touch.remove(TouchFlags::TANGENTIAL_MODEL);
        let offset = self.history_offset;
        cdata.contact_history[offset..offset + 3].fill(0.0);
    }
}
