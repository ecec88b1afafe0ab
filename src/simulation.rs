use glam::DVec3;
use rayon::prelude::*;
use tracing::info;

use crate::error::Result;
use crate::grid::Grid;
use crate::model::ContactLaw;
use crate::neighbor::NeighborList;
use crate::pair::{PairConfig, PairGranular, PassOptions};
use crate::particle::{Particle, Particles};
use crate::properties::PropertyRegistry;
use crate::restart::RestartSnapshot;
use crate::wall::{PlaneWall, WallGranular};

/// Driver options.
#[derive(Clone, Debug)]
pub struct SimulationConfig {
    pub dt: f64,
    pub gravity: DVec3,
    /// Extra distance beyond contact at which pairs are listed.
    pub skin: f64,
    pub pair: PairConfig,
    pub walls: Vec<PlaneWall>,
    /// Material type of the walls.
    pub wall_type: usize,
    /// Contact-law keyword/value tokens.
    pub settings: Vec<String>,
}

impl SimulationConfig {
    pub fn new(dt: f64) -> Self {
        Self {
            dt,
            gravity: DVec3::new(0.0, 0.0, -9.81),
            skin: 0.0,
            pair: PairConfig::default(),
            walls: Vec::new(),
            wall_type: 1,
            settings: Vec::new(),
        }
    }

    pub fn gravity(mut self, gravity: DVec3) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn skin(mut self, skin: f64) -> Self {
        self.skin = skin;
        self
    }

    pub fn pair(mut self, pair: PairConfig) -> Self {
        self.pair = pair;
        self
    }

    pub fn wall(mut self, wall: PlaneWall) -> Self {
        self.walls.push(wall);
        self
    }

    pub fn wall_type(mut self, wall_type: usize) -> Self {
        self.wall_type = wall_type;
        self
    }

    pub fn settings<S: AsRef<str>>(mut self, tokens: &[S]) -> Self {
        self.settings = tokens.iter().map(|t| t.as_ref().to_string()).collect();
        self
    }
}

/// Velocity-Verlet integration of spheres interacting through contact model `M`.
pub struct Simulation<M> {
    pub particles: Particles,
    pub pair: PairGranular<M>,
    pub walls: Option<WallGranular<M>>,
    pub list: NeighborList,
    config: SimulationConfig,
    steps: u64,
}

impl<M: ContactLaw> Simulation<M> {
    pub fn new(config: SimulationConfig, registry: &mut PropertyRegistry) -> Result<Self> {
        let mut pair = PairGranular::<M>::new(config.pair);
        pair.settings(&config.settings)?;
        pair.init_granular(registry)?;

        let walls = if config.walls.is_empty() {
            None
        } else {
            let mut walls = WallGranular::<M>::new(config.walls.clone(), config.wall_type);
            walls.settings(&config.settings)?;
            walls.init_granular(registry)?;
            Some(walls)
        };

        info!(
            dt = config.dt,
            nwalls = config.walls.len(),
            hashcode = pair.hashcode(),
            "initialized simulation"
        );
        let list = pair.new_neighbor_list();
        Ok(Self {
            particles: Particles::new(),
            pair,
            walls,
            list,
            config,
            steps: 0,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn add_particle(&mut self, particle: Particle) -> usize {
        self.particles.add(particle)
    }

    /// Advances by one timestep.
    pub fn step(&mut self) -> Result<()> {
        let dt = self.config.dt;
        let nlocal = self.particles.nlocal();
        let freeze_bit = self.config.pair.freeze_group_bit;
        let masses: Vec<f64> = (0..nlocal).map(|i| self.particles.mass(i)).collect();
        let moving: Vec<bool> = self.particles.mask[..nlocal]
            .iter()
            .map(|&m| m & freeze_bit == 0)
            .collect();

        if self.steps == 0 {
            // setup evaluation, contact history stays put
            let setup = PassOptions {
                shear_update: false,
                ..PassOptions::new(dt)
            };
            self.compute_forces(&masses, &setup)?;
        }

        // v(t + dt/2), x(t + dt)
        self.half_kick(&masses, &moving);
        let p = &mut self.particles;
        p.x[..nlocal]
            .par_iter_mut()
            .zip(p.v[..nlocal].par_iter())
            .zip(moving.par_iter())
            .for_each(|((x, v), &moving)| {
                if moving {
                    *x += *v * dt;
                }
            });

        self.compute_forces(&masses, &PassOptions::new(dt))?;

        // v(t + dt)
        self.half_kick(&masses, &moving);
        self.steps += 1;
        Ok(())
    }

    /// Rebuilds the neighbor list and accumulates gravity and contact forces.
    fn compute_forces(&mut self, masses: &[f64], pass: &PassOptions) -> Result<()> {
        self.list = Grid::build_neighbor_list(
            &self.particles,
            self.config.skin,
            self.config.pair.newton_pair,
            self.pair.dnum(),
            Some(&self.list),
        );

        let gravity = self.config.gravity;
        let nlocal = masses.len();
        let p = &mut self.particles;
        p.torque.fill(DVec3::ZERO);
        p.f.par_iter_mut()
            .enumerate()
            .for_each(|(i, f)| *f = if i < nlocal { masses[i] * gravity } else { DVec3::ZERO });

        self.pair
            .compute_force(&mut self.particles, &mut self.list, pass, None)?;
        if let Some(walls) = &mut self.walls {
            walls.compute_wall_force(&mut self.particles, pass)?;
        }
        Ok(())
    }

    fn half_kick(&mut self, masses: &[f64], moving: &[bool]) {
        let half_dt = 0.5 * self.config.dt;
        let nlocal = masses.len();
        let p = &mut self.particles;
        let radius = &p.radius[..nlocal];

        p.v[..nlocal]
            .par_iter_mut()
            .zip(p.omega[..nlocal].par_iter_mut())
            .zip(p.f[..nlocal].par_iter().zip(p.torque[..nlocal].par_iter()))
            .enumerate()
            .for_each(|(i, ((v, omega), (f, torque)))| {
                if !moving[i] {
                    return;
                }
                // solid sphere
                let inertia = 0.4 * masses[i] * radius[i] * radius[i];
                *v += *f / masses[i] * half_dt;
                *omega += *torque / inertia * half_dt;
            });
    }

    /// Contact memory of particle pairs and walls.
    pub fn snapshot(&self) -> RestartSnapshot {
        let snapshot = RestartSnapshot::capture(&self.pair, &self.list);
        match &self.walls {
            Some(walls) => snapshot.with_walls(walls),
            None => snapshot,
        }
    }

    /// Resumes from `snapshot`. Particles must be re-added in their original order.
    pub fn restore(&mut self, snapshot: RestartSnapshot) -> Result<()> {
        if let Some(walls) = &mut self.walls {
            snapshot.restore_walls(walls)?;
        }
        self.list = snapshot.restore(&self.pair)?;
        Ok(())
    }

    /// Total translational kinetic energy of the owned particles.
    pub fn kinetic_energy(&self) -> f64 {
        let p = &self.particles;
        (0..p.nlocal())
            .map(|i| 0.5 * p.mass(i) * p.v[i].length_squared())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hysteresis::NormalHookeHysteresis;
    use crate::material::{Material, MaterialDatabase};
    use crate::model::GranularModel;
    use crate::tangential::TangentialHistory;
    use approx::assert_relative_eq;

    type Model = GranularModel<NormalHookeHysteresis, TangentialHistory>;

    fn registry() -> PropertyRegistry {
        let mut db = MaterialDatabase::from_materials(&[Material::new(1e7, 0.3, 2500.0, 0.5, 0.5)], 1.0);
        db.set_uniform_pair("coefficientMaxElasticStiffness", 2.0);
        db.set_uniform_pair("coefficientAdhesionStiffness", 0.0);
        db.set_uniform_pair("coefficientPlasticityDepth", 0.5);
        PropertyRegistry::new(db)
    }

    #[test]
    fn test_free_fall_matches_kinematics() {
        let config = SimulationConfig::new(1e-3);
        let mut sim = Simulation::<Model>::new(config, &mut registry()).unwrap();
        sim.add_particle(Particle::new(DVec3::new(0.0, 0.0, 10.0), 0.1, 1.0));

        for _ in 0..100 {
            sim.step().unwrap();
        }
        assert_eq!(sim.steps(), 100);
        assert_relative_eq!(sim.particles.v[0].z, -9.81 * 0.1, max_relative = 1e-9);
        assert_relative_eq!(sim.particles.x[0].z, 10.0 - 0.5 * 9.81 * 0.01, max_relative = 1e-9);
    }

    #[test]
    fn test_particle_settles_on_floor() {
        let config = SimulationConfig::new(1e-5)
            .wall(PlaneWall::new(DVec3::ZERO, DVec3::Z));
        let mut sim = Simulation::<Model>::new(config, &mut registry()).unwrap();
        let radius = 0.01;
        let mass = Material::new(1e7, 0.3, 2500.0, 0.5, 0.5).sphere_mass(radius);
        sim.add_particle(Particle::new(DVec3::new(0.0, 0.0, 0.0105), radius, mass));

        for _ in 0..20_000 {
            sim.step().unwrap();
        }
        let z = sim.particles.x[0].z;
        assert!(z > 0.0 && z < 0.0105, "z = {z}");
        assert!(sim.particles.v[0].z.abs() < 0.05);
    }

    #[test]
    fn test_first_step_advances_shear_once() {
        let dt = 1e-6;
        let config = SimulationConfig::new(dt).gravity(DVec3::ZERO);
        let mut sim = Simulation::<Model>::new(config, &mut registry()).unwrap();
        sim.add_particle(Particle::new(DVec3::ZERO, 1.0, 1.0).with_velocity(DVec3::new(0.1, 0.0, 0.0)));
        sim.add_particle(Particle::new(DVec3::new(0.0, 0.0, 1.9), 1.0, 1.0));

        sim.step().unwrap();
        let offset = sim.pair.layout().offset_of("shearx").unwrap();
        let (_, history) = sim.list.find(0, 1).unwrap();
        assert_relative_eq!(history[offset], 0.1 * dt, max_relative = 1e-3);
    }

    #[test]
    fn test_restore_brings_back_wall_memory() {
        let config = || SimulationConfig::new(1e-5).wall(PlaneWall::new(DVec3::ZERO, DVec3::Z));
        let radius = 0.01;
        let mass = Material::new(1e7, 0.3, 2500.0, 0.5, 0.5).sphere_mass(radius);
        let particle = Particle::new(DVec3::new(0.0, 0.0, 0.00999), radius, mass)
            .with_velocity(DVec3::new(0.01, 0.0, 0.0));

        let mut sim = Simulation::<Model>::new(config(), &mut registry()).unwrap();
        sim.add_particle(particle);
        for _ in 0..50 {
            sim.step().unwrap();
        }
        let bytes = sim.snapshot().to_bytes().unwrap();
        let before = sim.walls.as_ref().unwrap().history();
        assert_ne!(before.touch[0][0], 0);

        let mut resumed = Simulation::<Model>::new(config(), &mut registry()).unwrap();
        resumed.add_particle(particle);
        resumed
            .restore(RestartSnapshot::from_bytes(&bytes).unwrap())
            .unwrap();
        assert_eq!(resumed.walls.as_ref().unwrap().history(), before);
    }
}
