use std::f64::consts::PI;
use std::sync::Arc;

use crate::contact::{CollisionData, ContactData, ForceData, TouchFlags};
use crate::error::Result;
use crate::history::HistorySetup;
use crate::material;
use crate::model::{Capabilities, ContactLaw};
use crate::properties::{PairTable, PropertyRegistry};
use crate::settings::Settings;

/// Linearised Hertzian normal stiffness (pressure units).
///
/// `kn = 16/15 * sqrt(reff) * Yeff * (15 * meff * charVel^2 / (16 * sqrt(reff) * Yeff))^(1/5)`
///
/// # Arguments
///
/// * `reff` - Effective radius.
/// * `meff` - Effective mass.
/// * `yeff` - Effective Young's modulus.
/// * `char_vel` - Characteristic impact velocity.
pub fn hooke_stiffness(reff: f64, meff: f64, yeff: f64, char_vel: f64) -> f64 {
    let sqrtval = reff.sqrt();
    16.0 / 15.0
        * sqrtval
        * yeff
        * (15.0 * meff * char_vel * char_vel / (16.0 * sqrtval * yeff)).powf(0.2)
}

/// Normal damping coefficient reproducing the restitution `e = exp(log_e)`.
pub fn normal_damping(meff: f64, kn: f64, log_e: f64) -> f64 {
    (4.0 * meff * kn / (1.0 + (PI / log_e) * (PI / log_e))).sqrt()
}

/// Velocity-dependent restitution in a viscous fluid.
///
/// Stokes number after Schmeeckle (2001), restitution correction after
/// Legendre (2006). A vanishing `vn` makes the Stokes number vanish and the
/// correction unbounded; the result is returned as computed.
///
/// # Arguments
///
/// * `meff` - Effective mass.
/// * `vn` - Relative normal velocity.
/// * `viscosity` - Interstitial fluid viscosity.
/// * `reff` - Effective radius.
/// * `rest_max` - Restitution at infinite Stokes number.
/// * `critical_stokes` - Critical Stokes number.
pub fn viscous_restitution_log(
    meff: f64,
    vn: f64,
    viscosity: f64,
    reff: f64,
    rest_max: f64,
    critical_stokes: f64,
) -> f64 {
    let stokes = meff * vn / (6.0 * PI * viscosity * reff * reff);
    rest_max.ln() + critical_stokes / stokes
}

/// Stiffness and damping of one collision, already converted to force units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalCoefficients {
    pub reff: f64,
    pub kn: f64,
    pub kt: f64,
    pub gamman: f64,
    pub gammat: f64,
}

/// Writes a normal force of magnitude `fn_mag` along the contact normal.
///
/// Wall contacts are scaled by the area ratio and only act on the particle;
/// particle pairs receive the exact negation on j.
#[inline]
pub(crate) fn apply_normal_force(
    cdata: &CollisionData,
    fn_mag: f64,
    i_forces: &mut ForceData,
    j_forces: &mut ForceData,
) {
    if cdata.is_wall {
        i_forces.delta_f = fn_mag * cdata.area_ratio * cdata.en;
    } else {
        i_forces.delta_f = fn_mag * cdata.en;
        j_forces.delta_f = -i_forces.delta_f;
    }
}

/// Linear spring-dashpot normal law with Hertz-derived stiffness.
#[derive(Debug)]
pub struct NormalHooke {
    tangential_damping: bool,
    limit_force: bool,
    viscous: bool,
    yeff: Arc<PairTable>,
    char_vel: f64,
    coeff_rest_log: Arc<PairTable>,
    coeff_mu: Arc<PairTable>,
    coeff_rest_max: Arc<PairTable>,
    coeff_stc: Arc<PairTable>,
    nktv2p: f64,
}

impl NormalHooke {
    pub fn viscous(&self) -> bool {
        self.viscous
    }

    pub fn tangential_damping(&self) -> bool {
        self.tangential_damping
    }

    pub fn limit_force(&self) -> bool {
        self.limit_force
    }

    pub fn yeff(&self) -> &PairTable {
        &self.yeff
    }

    pub fn char_vel(&self) -> f64 {
        self.char_vel
    }

    /// Effective radius; a wall behaves like a sphere of infinite radius.
    #[inline]
    pub fn effective_radius(cdata: &CollisionData) -> f64 {
        if cdata.is_wall {
            cdata.radi
        } else {
            cdata.radi * cdata.radj / (cdata.radi + cdata.radj)
        }
    }

    /// Natural log of the restitution coefficient applied to this collision.
    #[inline]
    pub fn restitution_log(&self, cdata: &CollisionData, reff: f64) -> f64 {
        let (itype, jtype) = (cdata.itype, cdata.jtype);
        if self.viscous {
            viscous_restitution_log(
                cdata.meff,
                cdata.vn,
                self.coeff_mu.get(itype, jtype),
                reff,
                self.coeff_rest_max.get(itype, jtype),
                self.coeff_stc.get(itype, jtype),
            )
        } else {
            self.coeff_rest_log.get(itype, jtype)
        }
    }

    /// Stiffness and damping for a collision; shared with laws layered on top.
    #[inline]
    pub fn coefficients(&self, cdata: &CollisionData) -> NormalCoefficients {
        let reff = Self::effective_radius(cdata);
        let log_e = self.restitution_log(cdata, reff);

        let kn = hooke_stiffness(
            reff,
            cdata.meff,
            self.yeff.get(cdata.itype, cdata.jtype),
            self.char_vel,
        );
        let gamman = normal_damping(cdata.meff, kn, log_e);
        let gammat = if self.tangential_damping { gamman } else { 0.0 };

        // pressure units to force/distance^2
        NormalCoefficients {
            reff,
            kn: kn / self.nktv2p,
            kt: kn / self.nktv2p,
            gamman,
            gammat,
        }
    }

    pub(crate) fn store_coefficients(cdata: &mut CollisionData, c: &NormalCoefficients) {
        cdata.kn = c.kn;
        cdata.kt = c.kt;
        cdata.gamman = c.gamman;
        cdata.gammat = c.gammat;
    }
}

impl ContactLaw for NormalHooke {
    const CAPABILITIES: Capabilities = Capabilities::REGISTER_SETTINGS
        .union(Capabilities::CONNECT_TO_PROPERTIES)
        .union(Capabilities::COLLISION)
        .union(Capabilities::NO_COLLISION);
    const ID: i64 = 0;
    const NAME: &'static str = "hooke";

    fn new(_hsetup: &mut dyn HistorySetup) -> Self {
        Self {
            tangential_damping: true,
            limit_force: false,
            viscous: false,
            yeff: Arc::default(),
            char_vel: 0.0,
            coeff_rest_log: Arc::default(),
            coeff_mu: Arc::default(),
            coeff_rest_max: Arc::default(),
            coeff_stc: Arc::default(),
            nktv2p: 1.0,
        }
    }

    fn register_settings(&self, settings: &mut Settings) {
        settings.register_on_off("tangential_damping", true);
        settings.register_on_off("limitForce", false);
        settings.register_on_off("viscous", false);
    }

    fn load_settings(&mut self, settings: &Settings) -> Result<()> {
        self.tangential_damping = settings.on_off("tangential_damping")?;
        self.limit_force = settings.on_off("limitForce")?;
        self.viscous = settings.on_off("viscous")?;
        Ok(())
    }

    fn connect_to_properties(&mut self, registry: &mut PropertyRegistry) -> Result<()> {
        registry.register_property("Yeff", material::create_yeff)?;
        registry.register_property("charVel", material::create_char_vel)?;

        self.yeff = registry.connect_matrix("Yeff")?;
        self.char_vel = registry.connect_scalar("charVel")?;
        self.nktv2p = registry.nktv2p();

        if self.viscous {
            registry.register_property("coeffMu", material::create_coeff_mu)?;
            registry.register_property("coeffRestMax", material::create_coeff_rest_max)?;
            registry.register_property("coeffStc", material::create_coeff_stc)?;

            self.coeff_mu = registry.connect_matrix("coeffMu")?;
            self.coeff_rest_max = registry.connect_matrix("coeffRestMax")?;
            self.coeff_stc = registry.connect_matrix("coeffStc")?;
        } else {
            registry.register_property("coeffRestLog", material::create_coeff_rest_log)?;
            self.coeff_rest_log = registry.connect_matrix("coeffRestLog")?;
        }
        Ok(())
    }

    #[inline]
    fn collision(
        &mut self,
        cdata: &mut CollisionData,
        i_forces: &mut ForceData,
        j_forces: &mut ForceData,
    ) {
        let c = self.coefficients(cdata);

        let fn_damping = -c.gamman * cdata.vn;
        let fn_contact = c.kn * cdata.deltan;
        let mut fn_mag = fn_contact + fn_damping;
        if self.limit_force && fn_mag < 0.0 {
            fn_mag = 0.0;
        }

        cdata.touch |= TouchFlags::NORMAL_MODEL;
        cdata.normal_force = fn_mag;
        Self::store_coefficients(cdata, &c);
        apply_normal_force(cdata, fn_mag, i_forces, j_forces);
    }

    fn no_collision(&mut self, cdata: &mut ContactData, _: &mut ForceData, _: &mut ForceData) {
        cdata.touch.remove(TouchFlags::NORMAL_MODEL);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::history::WallContactHistorySetup;
    use crate::material::MaterialDatabase;
    use approx::assert_relative_eq;
    use glam::DVec3;

    /// One particle type with `Yeff = 1e6`, `charVel = 1` and `ln(e) = -1`.
    pub(crate) fn unit_materials() -> MaterialDatabase {
        let mut db = MaterialDatabase::new(1);
        db.set_per_type("youngsModulus", vec![2e6]).unwrap();
        db.set_per_type("poissonsRatio", vec![0.0]).unwrap();
        db.set_uniform_pair("coefficientRestitution", (-1.0f64).exp());
        db.set_uniform_pair("coefficientFriction", 0.5);
        db.set_scalar("characteristicVelocity", 1.0);
        db
    }

    /// Two spheres of radius 2 (reff = 1) and mass 2 (meff = 1) overlapping by `deltan`.
    pub(crate) fn unit_collision(deltan: f64, vn_approach: f64) -> CollisionData {
        let mut cdata = CollisionData::default();
        cdata.radi = 2.0;
        cdata.radj = 2.0;
        cdata.radsum = 4.0;
        cdata.r = 4.0 - deltan;
        cdata.rinv = 1.0 / cdata.r;
        cdata.en = DVec3::Z;
        cdata.mi = 2.0;
        cdata.mj = 2.0;
        cdata.meff = 1.0;
        cdata.itype = 1;
        cdata.jtype = 1;
        cdata.deltan = deltan;
        cdata.vn = -vn_approach;
        cdata
    }

    fn connected_hooke(args: &[&str]) -> NormalHooke {
        connected_hooke_with(args, unit_materials())
    }

    fn connected_hooke_with(args: &[&str], db: MaterialDatabase) -> NormalHooke {
        let mut law = NormalHooke::new(&mut WallContactHistorySetup::new());
        let mut settings = Settings::new();
        law.register_settings(&mut settings);
        settings.parse_arguments(args).unwrap();
        law.load_settings(&settings).unwrap();
        let mut registry = PropertyRegistry::new(db);
        law.connect_to_properties(&mut registry).unwrap();
        law
    }

    #[test]
    fn test_stiffness_closed_form() {
        let kn = hooke_stiffness(1.0, 1.0, 1e6, 1.0);
        let expected = 16.0 / 15.0 * 1e6 * (15.0 / 16.0 / 1e6f64).powf(0.2);
        assert_relative_eq!(kn, expected, max_relative = 1e-14);

        let gamman = normal_damping(1.0, kn, -1.0);
        assert_relative_eq!(gamman, (4.0 * kn / (1.0 + PI * PI)).sqrt(), max_relative = 1e-14);
    }

    #[test]
    fn test_hooke_force_is_spring_plus_dashpot() {
        let mut law = connected_hooke(&[]);
        assert!(law.tangential_damping() && !law.limit_force() && !law.viscous());
        assert_relative_eq!(law.yeff().get(1, 1), 1e6, max_relative = 1e-12);
        assert_eq!(law.char_vel(), 1.0);

        let mut cdata = unit_collision(0.01, 0.5);
        let (mut fi, mut fj) = (ForceData::default(), ForceData::default());
        law.collision(&mut cdata, &mut fi, &mut fj);
        assert!(cdata.touch.contains(TouchFlags::NORMAL_MODEL));

        let kn = hooke_stiffness(1.0, 1.0, 1e6, 1.0);
        let gamman = normal_damping(1.0, kn, -1.0);
        assert_relative_eq!(cdata.normal_force, kn * 0.01 + gamman * 0.5, max_relative = 1e-12);
        assert_relative_eq!(cdata.kt, cdata.kn);
        assert_relative_eq!(cdata.gammat, cdata.gamman);
        assert_eq!(fj.delta_f, -fi.delta_f);
        assert_relative_eq!(fi.delta_f.z, cdata.normal_force);
    }

    #[test]
    fn test_limit_force_clamps_attraction() {
        let mut law = connected_hooke(&["limitForce", "on", "tangential_damping", "off"]);
        assert!(law.limit_force() && !law.tangential_damping());
        let mut cdata = unit_collision(1e-6, -100.0);
        let (mut fi, mut fj) = (ForceData::default(), ForceData::default());
        law.collision(&mut cdata, &mut fi, &mut fj);
        assert_eq!(cdata.normal_force, 0.0);
        assert_eq!(cdata.gammat, 0.0);
        assert_eq!(fi.delta_f, DVec3::ZERO);
    }

    #[test]
    fn test_wall_contact_scales_by_area_and_skips_j() {
        let mut law = connected_hooke(&[]);
        let mut cdata = unit_collision(0.01, 0.0);
        cdata.is_wall = true;
        cdata.radi = 1.0;
        cdata.radj = 0.0;
        cdata.area_ratio = 0.5;
        let (mut fi, mut fj) = (ForceData::default(), ForceData::default());
        law.collision(&mut cdata, &mut fi, &mut fj);

        let kn = hooke_stiffness(1.0, 1.0, 1e6, 1.0);
        assert_relative_eq!(fi.delta_f.z, 0.5 * kn * 0.01, max_relative = 1e-12);
        assert_eq!(fj.delta_f, DVec3::ZERO);
    }

    #[test]
    fn test_viscous_restitution_from_stokes_number() {
        let log_e = viscous_restitution_log(1.0, -2.0, 1e-3, 0.5, 0.9, 10.0);
        let stokes = -2.0 / (6.0 * PI * 1e-3 * 0.25);
        assert_relative_eq!(log_e, 0.9f64.ln() + 10.0 / stokes);
    }

    #[test]
    fn test_viscous_zero_velocity_is_unguarded() {
        // St = 0: Stc / St = inf, the damping collapses to its critical value
        let log_e = viscous_restitution_log(1.0, 0.0, 1e-3, 0.5, 0.9, 10.0);
        assert!(log_e.is_infinite());
        assert_relative_eq!(normal_damping(1.0, 4.0, log_e), 4.0);

        // 0 / 0 propagates as NaN
        let log_e = viscous_restitution_log(1.0, 0.0, 1e-3, 0.5, 0.9, 0.0);
        assert!(log_e.is_nan());
        assert!(normal_damping(1.0, 4.0, log_e).is_nan());
    }

    #[test]
    fn test_viscous_damping_reads_fluid_tables() {
        let mut db = unit_materials();
        db.set_uniform_pair("FluidViscosity", 1e-3);
        db.set_uniform_pair("MaximumRestitution", 0.9);
        db.set_uniform_pair("CriticalStokes", 10.0);
        let mut law = connected_hooke_with(&["viscous", "on"], db);
        assert!(law.viscous());

        let mut cdata = unit_collision(0.01, 0.5);
        let (mut fi, mut fj) = (ForceData::default(), ForceData::default());
        law.collision(&mut cdata, &mut fi, &mut fj);

        let kn = hooke_stiffness(1.0, 1.0, 1e6, 1.0);
        let log_e = viscous_restitution_log(1.0, -0.5, 1e-3, 1.0, 0.9, 10.0);
        let gamman = normal_damping(1.0, kn, log_e);
        assert_relative_eq!(cdata.gamman, gamman, max_relative = 1e-12);
        assert_relative_eq!(cdata.normal_force, kn * 0.01 + gamman * 0.5, max_relative = 1e-12);
        // differs from the constant restitution of the same materials
        assert!((gamman - normal_damping(1.0, kn, -1.0)).abs() > 1e-6 * gamman);
    }

    #[test]
    fn test_viscous_without_fluid_tables_fails_to_connect() {
        let mut law = NormalHooke::new(&mut WallContactHistorySetup::new());
        let mut settings = Settings::new();
        law.register_settings(&mut settings);
        settings.parse_arguments(&["viscous", "on"]).unwrap();
        law.load_settings(&settings).unwrap();
        let err = law
            .connect_to_properties(&mut PropertyRegistry::new(unit_materials()))
            .unwrap_err();
        assert!(matches!(err, crate::error::GranularError::MissingMaterial(_)));
    }

    #[test]
    fn test_separation_clears_touch_bit() {
        let mut law = connected_hooke(&[]);
        let mut cdata = unit_collision(0.01, 0.0);
        cdata.touch = TouchFlags::NORMAL_MODEL | TouchFlags::TANGENTIAL_MODEL;
        let (mut fi, mut fj) = (ForceData::default(), ForceData::default());
        law.no_collision(&mut cdata.contact, &mut fi, &mut fj);
        assert_eq!(cdata.touch, TouchFlags::TANGENTIAL_MODEL);
    }
}
