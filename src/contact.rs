use std::ops::{Deref, DerefMut};

use bitflags::bitflags;
use glam::DVec3;

bitflags! {
    /// Per-contact touch word. Each contact-law component claims one bit to
    /// record that it contributed to this contact on its last evaluation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TouchFlags: u32 {
        /// Surface kinematics law.
        const SURFACE_MODEL = 1 << 0;
        /// Normal force law.
        const NORMAL_MODEL = 1 << 1;
        /// Tangential force law.
        const TANGENTIAL_MODEL = 1 << 2;
    }
}

/// One candidate contact, filled fresh by the evaluation loop for every pair.
///
/// `touch` and `contact_history` are working copies of the persistent slot in
/// the neighbor list (or wall history); the loop loads them before calling a
/// contact law and stores them back afterwards.
#[derive(Clone, Debug, Default)]
pub struct ContactData {
    pub radi: f64,
    pub radj: f64,
    pub radsum: f64,
    /// Squared center-to-center distance.
    pub rsq: f64,
    /// Displacement from particle j (or the wall) to particle i.
    pub delta: DVec3,
    pub i: usize,
    pub j: usize,
    pub is_wall: bool,
    pub touch: TouchFlags,
    /// History block of this contact, `dnum` values long (empty when no law keeps history).
    pub contact_history: Vec<f64>,
}

impl ContactData {
    /// Creates contact data with a history block of `dnum` zeroed values.
    pub fn with_history(dnum: usize) -> Self {
        Self {
            contact_history: vec![0.0; dnum],
            ..Self::default()
        }
    }

    /// Whether a persistent history block is attached.
    pub fn has_history(&self) -> bool {
        !self.contact_history.is_empty()
    }
}

/// Contact data resolved once geometric overlap is confirmed.
///
/// Aligned to 32 bytes; the evaluation loop allocates one instance per pair
/// style and reuses it for every contact.
#[derive(Clone, Debug)]
#[repr(C, align(32))]
pub struct CollisionData {
    pub contact: ContactData,

    pub r: f64,
    pub rinv: f64,
    /// Unit contact normal, pointing from j to i.
    pub en: DVec3,
    pub v_i: DVec3,
    pub v_j: DVec3,
    pub omega_i: DVec3,
    pub omega_j: DVec3,

    pub kt: f64,
    pub kn: f64,
    pub gammat: f64,
    pub gamman: f64,

    /// Normal force magnitude (positive is repulsive).
    pub normal_force: f64,
    /// Tangential force magnitude.
    pub tangential_force: f64,

    /// Relative normal velocity `(v_i - v_j) . en`, negative when approaching.
    pub vn: f64,
    /// Normal overlap.
    pub deltan: f64,
    /// Contact-point radius of i.
    pub cri: f64,
    /// Contact-point radius of j.
    pub crj: f64,
    /// Radius-weighted angular velocity sum.
    pub wr: DVec3,
    /// Relative tangential velocity at the contact point.
    pub vtr: DVec3,

    pub mi: f64,
    pub mj: f64,
    pub meff: f64,

    /// Contact-area scaling for wall contacts.
    pub area_ratio: f64,

    /// Forces may be accumulated this pass.
    pub compute: bool,
    /// Persistent tangential history may advance this pass.
    pub shear_update: bool,
    pub itype: usize,
    pub jtype: usize,
    /// Timestep size.
    pub dt: f64,
}

impl Default for CollisionData {
    fn default() -> Self {
        Self {
            contact: ContactData::default(),
            r: 0.0,
            rinv: 0.0,
            en: DVec3::ZERO,
            v_i: DVec3::ZERO,
            v_j: DVec3::ZERO,
            omega_i: DVec3::ZERO,
            omega_j: DVec3::ZERO,
            kt: 0.0,
            kn: 0.0,
            gammat: 0.0,
            gamman: 0.0,
            normal_force: 0.0,
            tangential_force: 0.0,
            vn: 0.0,
            deltan: 0.0,
            cri: 0.0,
            crj: 0.0,
            wr: DVec3::ZERO,
            vtr: DVec3::ZERO,
            mi: 0.0,
            mj: 0.0,
            meff: 0.0,
            area_ratio: 1.0,
            compute: true,
            shear_update: true,
            itype: 0,
            jtype: 0,
            dt: 0.0,
        }
    }
}

impl CollisionData {
    /// Scratch instance with a history block of `dnum` values.
    pub fn with_history(dnum: usize) -> Self {
        Self {
            contact: ContactData::with_history(dnum),
            ..Self::default()
        }
    }

    /// Clears every resolved quantity back to its default, keeping the history allocation.
    pub fn reset(&mut self) {
        let mut history = std::mem::take(&mut self.contact.contact_history);
        history.fill(0.0);
        *self = Self::default();
        self.contact.contact_history = history;
    }
}

impl Deref for CollisionData {
    type Target = ContactData;

    fn deref(&self) -> &ContactData {
        &self.contact
    }
}

impl DerefMut for CollisionData {
    fn deref_mut(&mut self) -> &mut ContactData {
        &mut self.contact
    }
}

/// Force and torque deltas produced for one particle of a contact.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[repr(C, align(32))]
pub struct ForceData {
    pub delta_f: DVec3,
    pub delta_torque: DVec3,
}

impl ForceData {
    pub fn reset(&mut self) {
        self.delta_f = DVec3::ZERO;
        self.delta_torque = DVec3::ZERO;
    }
}
