//! Contact-point kinematics for smooth spheres.

use crate::contact::{CollisionData, ForceData};
use crate::history::HistorySetup;
use crate::model::{Capabilities, ContactLaw};

/// Resolves normal/tangential relative velocities and the overlap of a collision.
///
/// Always evaluated first, so the force laws can rely on `vn`, `deltan`,
/// `cri`/`crj`, `wr` and `vtr` being populated.
#[derive(Debug, Default)]
pub struct SurfaceDefault;

impl ContactLaw for SurfaceDefault {
    const CAPABILITIES: Capabilities = Capabilities::COLLISION;
    const ID: i64 = 0;
    const NAME: &'static str = "default";

    fn new(_hsetup: &mut dyn HistorySetup) -> Self {
        Self
    }

    #[inline]
    fn collision(&mut self, cdata: &mut CollisionData, _: &mut ForceData, _: &mut ForceData) {
        let en = cdata.en;

        let vr = cdata.v_i - cdata.v_j;
        let vn = vr.dot(en);
        let vt = vr - vn * en;

        let cri = cdata.radi;
        let crj = cdata.radj;
        let wr = cri * cdata.omega_i + crj * cdata.omega_j;

        cdata.vn = vn;
        cdata.deltan = cdata.radsum - cdata.r;
        cdata.cri = cri;
        cdata.crj = crj;
        cdata.wr = wr;
        // surface velocity of i relative to j at the contact point
        cdata.vtr = vt - wr.cross(en);
    }
}
