use glam::DVec3;

use crate::error::{GranularError, Result};

/// Description of one particle to be added to a [`Particles`] store.
#[derive(Clone, Copy, Debug)]
pub struct Particle {
    pub position: DVec3,
    pub velocity: DVec3,
    pub angular_velocity: DVec3,
    pub radius: f64,
    pub mass: f64,
    /// 1-based material type.
    pub type_id: usize,
    /// Group membership bits.
    pub mask: u32,
    /// Mass of the rigid body this particle belongs to, if any.
    pub rigid_mass: Option<f64>,
}

impl Particle {
    pub fn new(position: DVec3, radius: f64, mass: f64) -> Self {
        Self {
            position,
            velocity: DVec3::ZERO,
            angular_velocity: DVec3::ZERO,
            radius,
            mass,
            type_id: 1,
            mask: 1,
            rigid_mass: None,
        }
    }

    pub fn with_velocity(mut self, velocity: DVec3) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_angular_velocity(mut self, angular_velocity: DVec3) -> Self {
        self.angular_velocity = angular_velocity;
        self
    }

    pub fn with_type(mut self, type_id: usize) -> Self {
        self.type_id = type_id;
        self
    }

    pub fn with_mask(mut self, mask: u32) -> Self {
        self.mask = mask;
        self
    }

    pub fn with_rigid_mass(mut self, rigid_mass: f64) -> Self {
        self.rigid_mass = Some(rigid_mass);
        self
    }
}

/// Attribute arrays of every particle known to this partition.
///
/// The first `nlocal` entries are owned here; the rest are ghost images of
/// particles owned elsewhere. Ghosts take part in contacts but their forces
/// are only accumulated when Newton's third law is applied across partitions.
#[derive(Clone, Debug, Default)]
pub struct Particles {
    pub x: Vec<DVec3>,
    pub v: Vec<DVec3>,
    pub omega: Vec<DVec3>,
    pub f: Vec<DVec3>,
    pub torque: Vec<DVec3>,
    pub radius: Vec<f64>,
    pub rmass: Vec<f64>,
    /// Per-type masses; when set they take precedence over `rmass`.
    pub type_mass: Option<Vec<f64>>,
    pub type_ids: Vec<usize>,
    pub mask: Vec<u32>,
    /// Rigid-body masses; entries `<= 0` mark free particles.
    pub mass_rigid: Option<Vec<f64>>,
    nlocal: usize,
}

impl Particles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            x: Vec::with_capacity(capacity),
            v: Vec::with_capacity(capacity),
            omega: Vec::with_capacity(capacity),
            f: Vec::with_capacity(capacity),
            torque: Vec::with_capacity(capacity),
            radius: Vec::with_capacity(capacity),
            rmass: Vec::with_capacity(capacity),
            type_ids: Vec::with_capacity(capacity),
            mask: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Number of owned particles.
    pub fn nlocal(&self) -> usize {
        self.nlocal
    }

    /// Number of owned and ghost particles.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn nghost(&self) -> usize {
        self.len() - self.nlocal
    }

    /// Adds an owned particle, placed ahead of any ghosts. Returns its index.
    pub fn add(&mut self, particle: Particle) -> usize {
        let index = self.nlocal;
        self.insert(index, particle);
        self.nlocal += 1;
        index
    }

    /// Appends a ghost image. Returns its index.
    pub fn add_ghost(&mut self, particle: Particle) -> usize {
        let index = self.len();
        self.insert(index, particle);
        index
    }

    fn insert(&mut self, index: usize, p: Particle) {
        self.x.insert(index, p.position);
        self.v.insert(index, p.velocity);
        self.omega.insert(index, p.angular_velocity);
        self.f.insert(index, DVec3::ZERO);
        self.torque.insert(index, DVec3::ZERO);
        self.radius.insert(index, p.radius);
        self.rmass.insert(index, p.mass);
        self.type_ids.insert(index, p.type_id);
        self.mask.insert(index, p.mask);

        match (&mut self.mass_rigid, p.rigid_mass) {
            (Some(rigid), m) => rigid.insert(index, m.unwrap_or(0.0)),
            (None, Some(m)) => {
                let mut rigid = vec![0.0; self.x.len() - 1];
                rigid.insert(index, m);
                self.mass_rigid = Some(rigid);
            }
            (None, None) => {}
        }
    }

    /// Drops every ghost image.
    pub fn clear_ghosts(&mut self) {
        let n = self.nlocal;
        self.x.truncate(n);
        self.v.truncate(n);
        self.omega.truncate(n);
        self.f.truncate(n);
        self.torque.truncate(n);
        self.radius.truncate(n);
        self.rmass.truncate(n);
        self.type_ids.truncate(n);
        self.mask.truncate(n);
        if let Some(rigid) = &mut self.mass_rigid {
            rigid.truncate(n);
        }
    }

    /// Switches to per-type masses, indexed by 1-based type id.
    pub fn set_type_mass(&mut self, masses: Vec<f64>) {
        self.type_mass = Some(masses);
    }

    /// Checks every type id, ghosts included, against `ntypes` and the
    /// per-type mass table.
    pub fn check_types(&self, ntypes: usize) -> Result<()> {
        let limit = match &self.type_mass {
            Some(masses) => ntypes.min(masses.len()),
            None => ntypes,
        };
        match self.type_ids.iter().find(|&&t| t == 0 || t > limit) {
            Some(&index) => Err(GranularError::TypeOutOfRange { index, ntypes: limit }),
            None => Ok(()),
        }
    }

    /// Mass of particle `i`, per-type or per-particle.
    #[inline]
    pub fn mass(&self, i: usize) -> f64 {
        match &self.type_mass {
            Some(masses) => masses[self.type_ids[i] - 1],
            None => self.rmass[i],
        }
    }

    /// Rigid-body mass of particle `i` when it belongs to a body.
    #[inline]
    pub fn rigid_mass(&self, i: usize) -> Option<f64> {
        self.mass_rigid
            .as_ref()
            .map(|rigid| rigid[i])
            .filter(|&m| m > 0.0)
    }

    /// Zeroes the force and torque accumulators.
    pub fn clear_forces(&mut self) {
        self.f.fill(DVec3::ZERO);
        self.torque.fill(DVec3::ZERO);
    }

    /// Copies every attribute of particle `i` into a [`Particle`] description.
    pub fn get(&self, i: usize) -> Particle {
        Particle {
            position: self.x[i],
            velocity: self.v[i],
            angular_velocity: self.omega[i],
            radius: self.radius[i],
            mass: self.mass(i),
            type_id: self.type_ids[i],
            mask: self.mask[i],
            rigid_mass: self.rigid_mass(i),
        }
    }
}
