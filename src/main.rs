use std::fs;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use glam::DVec3;
use granular_contact::hysteresis::NormalHookeHysteresis;
use granular_contact::material::{Material, MaterialDatabase};
use granular_contact::model::{ContactLaw, GranularModel};
use granular_contact::particle::Particle;
use granular_contact::physics::NormalHooke;
use granular_contact::properties::PropertyRegistry;
use granular_contact::simulation::{Simulation, SimulationConfig};
use granular_contact::tangential::{TangentialHistory, TangentialNoHistory};
use granular_contact::vtk::write_vtk;
use granular_contact::wall::PlaneWall;
use granular_contact::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum NormalModel {
    Hooke,
    #[value(name = "hooke/hysteresis")]
    HookeHysteresis,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TangentialModel {
    History,
    #[value(name = "no_history")]
    NoHistory,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Settle a column of spheres into a box", long_about = None)]
struct Args {
    /// Normal contact law
    #[arg(long, value_enum, default_value_t = NormalModel::HookeHysteresis)]
    model: NormalModel,

    /// Tangential contact law
    #[arg(long, value_enum, default_value_t = TangentialModel::History)]
    tangential: TangentialModel,

    /// Contact-law keyword/value tokens, e.g. `--settings limitForce on`
    #[arg(long, num_args = 1.., allow_hyphen_values = true)]
    settings: Vec<String>,

    /// Number of particles
    #[arg(short, long, default_value_t = 500)]
    count: usize,

    /// Number of timesteps
    #[arg(long, default_value_t = 20_000)]
    steps: usize,

    /// Timestep size (s)
    #[arg(long, default_value_t = 1e-5)]
    dt: f64,

    /// Steps between VTK frames
    #[arg(long, default_value_t = 200)]
    output_interval: usize,

    /// Output directory for VTK frames
    #[arg(short, long, default_value = "output")]
    output: PathBuf,
}

fn materials() -> MaterialDatabase {
    let particle = Material::new(5e6, 0.45, 2500.0, 0.5, 0.9);
    let wall = Material::new(5e6, 0.45, 7800.0, 0.5, 0.9);
    let mut db = MaterialDatabase::from_materials(&[particle, wall], 1.0);
    db.set_uniform_pair("coefficientMaxElasticStiffness", 2.0);
    db.set_uniform_pair("coefficientAdhesionStiffness", 0.0);
    db.set_uniform_pair("coefficientPlasticityDepth", 0.1);
    db
}

fn run<M: ContactLaw>(args: &Args) -> Result<()> {
    let half_width = 0.05;
    let config = SimulationConfig::new(args.dt)
        .skin(0.001)
        .settings(&args.settings)
        .wall(PlaneWall::new(DVec3::ZERO, DVec3::Z))
        .wall(PlaneWall::new(DVec3::new(-half_width, 0.0, 0.0), DVec3::X))
        .wall(PlaneWall::new(DVec3::new(half_width, 0.0, 0.0), -DVec3::X))
        .wall(PlaneWall::new(DVec3::new(0.0, -half_width, 0.0), DVec3::Y))
        .wall(PlaneWall::new(DVec3::new(0.0, half_width, 0.0), -DVec3::Y))
        .wall_type(2);

    let mut registry = PropertyRegistry::new(materials());
    let mut sim = Simulation::<M>::new(config, &mut registry)?;

    // Initialize particles: drop them in a column
    let particle_material = Material::new(5e6, 0.45, 2500.0, 0.5, 0.9);
    let mut rng = fastrand::Rng::new();
    let spacing = 0.0065;
    let per_layer = ((2.0 * (half_width - spacing)) / spacing) as usize + 1;
    for n in 0..args.count {
        let layer = n / (per_layer * per_layer);
        let k = n % (per_layer * per_layer);
        let mut jitter = || (rng.f64() - 0.5) * 0.0005;
        let x = -half_width + spacing + (k % per_layer) as f64 * spacing + jitter();
        let y = -half_width + spacing + (k / per_layer) as f64 * spacing + jitter();
        let z = 0.01 + layer as f64 * spacing;
        let radius = 0.0025 + rng.f64() * 0.0005;
        let mass = particle_material.sphere_mass(radius);
        sim.add_particle(Particle::new(DVec3::new(x, y, z), radius, mass));
    }

    fs::create_dir_all(&args.output)?;

    info!(
        count = args.count,
        steps = args.steps,
        normal = ?args.model,
        tangential = ?args.tangential,
        "starting simulation"
    );
    let bar = ProgressBar::new(args.steps as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
    {
        bar.set_style(style.progress_chars("#>-"));
    }

    for step in 0..args.steps {
        sim.step()?;

        if step % args.output_interval.max(1) == 0 {
            let filename = args.output.join(format!("step_{:06}.vtk", step));
            write_vtk(&filename, &sim.particles)?;
        }
        bar.inc(1);
    }
    bar.finish_with_message("Simulation complete");
    info!(
        kinetic_energy = sim.kinetic_energy(),
        contacts = sim.pair.ncontacts(),
        "simulation complete"
    );
    Ok(())
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let result = match (args.model, args.tangential) {
        (NormalModel::Hooke, TangentialModel::History) => {
            run::<GranularModel<NormalHooke, TangentialHistory>>(&args)
        }
        (NormalModel::Hooke, TangentialModel::NoHistory) => {
            run::<GranularModel<NormalHooke, TangentialNoHistory>>(&args)
        }
        (NormalModel::HookeHysteresis, TangentialModel::History) => {
            run::<GranularModel<NormalHookeHysteresis, TangentialHistory>>(&args)
        }
        (NormalModel::HookeHysteresis, TangentialModel::NoHistory) => {
            run::<GranularModel<NormalHookeHysteresis, TangentialNoHistory>>(&args)
        }
    };

    if let Err(e) = result {
        error!("{e}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
