use approx::assert_relative_eq;
use glam::DVec3;
use granular_contact::grid::Grid;
use granular_contact::hysteresis::NormalHookeHysteresis;
use granular_contact::material::MaterialDatabase;
use granular_contact::physics::NormalHooke;
use granular_contact::properties::PropertyRegistry;
use granular_contact::tangential::{TangentialHistory, TangentialNoHistory};
use granular_contact::{
    ContactLaw, GranularModel, NeighborList, PairConfig, PairGranular, Particle, Particles,
    PassOptions, RestartSnapshot, TouchFlags,
};

type Hysteretic = GranularModel<NormalHookeHysteresis, TangentialHistory>;

fn registry(k2_ratio: f64, kc_ratio: f64) -> PropertyRegistry {
    let mut db = MaterialDatabase::new(2);
    db.set_per_type("youngsModulus", vec![2e6, 5e6]).unwrap();
    db.set_per_type("poissonsRatio", vec![0.0, 0.3]).unwrap();
    db.set_uniform_pair("coefficientRestitution", 0.6);
    db.set_uniform_pair("coefficientFriction", 0.4);
    db.set_uniform_pair("coefficientMaxElasticStiffness", k2_ratio);
    db.set_uniform_pair("coefficientAdhesionStiffness", kc_ratio);
    db.set_uniform_pair("coefficientPlasticityDepth", 0.5);
    db.set_scalar("characteristicVelocity", 1.0);
    PropertyRegistry::new(db)
}

fn pair_style<M: ContactLaw>(config: PairConfig, registry: &mut PropertyRegistry) -> PairGranular<M> {
    let mut pair = PairGranular::<M>::new(config);
    pair.settings(&["tangential_damping", "on"]).unwrap();
    pair.init_granular(registry).unwrap();
    pair
}

fn two_spheres(separation: f64) -> Particles {
    let mut world = Particles::new();
    world.add(Particle::new(DVec3::ZERO, 1.0, 1.0).with_velocity(DVec3::new(0.2, 0.0, 0.0)));
    world.add(
        Particle::new(DVec3::new(0.0, 0.0, separation), 1.0, 1.5)
            .with_type(2)
            .with_angular_velocity(DVec3::new(0.0, 0.5, 0.0)),
    );
    world
}

fn single_pair_list(dnum: usize) -> NeighborList {
    let mut list = NeighborList::new(dnum);
    list.push_row(0, vec![1]);
    list.push_row(1, vec![]);
    list
}

/// Separation along z at `step` of an approach-then-retreat trajectory.
fn separation(step: usize) -> f64 {
    let s = step as f64;
    if step < 20 {
        2.0 - 0.002 * s
    } else {
        1.96 + 0.003 * (s - 20.0)
    }
}

fn step_pair<M: ContactLaw>(
    pair: &mut PairGranular<M>,
    world: &mut Particles,
    list: &mut NeighborList,
    step: usize,
) -> DVec3 {
    world.x[1].z = separation(step);
    world.v[1].z = if step < 20 { -0.2 } else { 0.3 };
    world.clear_forces();
    pair.compute_force(world, list, &PassOptions::new(1e-2), None)
        .unwrap();
    world.f[0]
}

#[test]
fn reaction_is_exact_negation() {
    let mut registry = registry(2.0, 0.1);
    let mut pair = pair_style::<Hysteretic>(PairConfig::default(), &mut registry);

    let mut world = Particles::new();
    let mut rng = fastrand::Rng::with_seed(7);
    for _ in 0..40 {
        let x = DVec3::new(rng.f64(), rng.f64(), rng.f64()) * 0.6;
        let v = DVec3::new(rng.f64() - 0.5, rng.f64() - 0.5, rng.f64() - 0.5);
        world.add(Particle::new(x, 0.08 + 0.04 * rng.f64(), 1.0 + rng.f64()).with_velocity(v));
    }
    let mut list = Grid::build_neighbor_list(&world, 0.0, true, pair.dnum(), None);
    let pass = PassOptions::new(1e-3);

    for _ in 0..3 {
        world.clear_forces();
        pair.compute_force(&mut world, &mut list, &pass, None).unwrap();
        assert!(pair.ncontacts() > 0);
        let total: DVec3 = world.f.iter().copied().sum();
        assert!(total.length() < 1e-9 * world.f.iter().map(|f| f.length()).sum::<f64>());
    }

    // pair by pair
    for (i, j, _, _) in list.pairs().collect::<Vec<_>>() {
        let mut alone = Particles::new();
        alone.add(world.get(i));
        alone.add(world.get(j));
        let mut one = single_pair_list(pair.dnum());
        pair.compute_force(&mut alone, &mut one, &pass, None).unwrap();
        assert_eq!(alone.f[1], -alone.f[0]);
    }
}

#[test]
fn delta_max_grows_then_resets_on_separation() {
    let mut registry = registry(2.0, 0.0);
    let mut pair = pair_style::<Hysteretic>(PairConfig::default(), &mut registry);
    let offset = pair.layout().offset_of("deltaMax").unwrap();
    let mut world = two_spheres(2.0);
    let mut list = single_pair_list(pair.dnum());

    let mut last = 0.0;
    let mut separated = false;
    for step in 0..60 {
        let f = step_pair(&mut pair, &mut world, &mut list, step);
        let (touch, history) = list.find(0, 1).unwrap();
        let delta_max = history[offset];
        let touch = TouchFlags::from_bits_retain(touch);

        if separation(step) < 2.0 {
            assert!(delta_max >= last, "step {step}: {delta_max} < {last}");
            assert!(touch.contains(TouchFlags::NORMAL_MODEL));
            last = delta_max;
        } else {
            // no force, memory cleared on the same step
            assert_eq!(f, DVec3::ZERO);
            assert_eq!(delta_max, 0.0);
            assert!(touch.is_empty());
            assert!(history.iter().all(|&h| h == 0.0));
            if step > 20 {
                separated = true;
            }
        }
    }
    assert!(separated);
    assert_relative_eq!(last, 0.04, max_relative = 1e-9);
}

#[test]
fn without_adhesion_loading_matches_linear_law() {
    let mut registry = registry(3.0, 0.0);
    let mut hysteretic = pair_style::<GranularModel<NormalHookeHysteresis, TangentialNoHistory>>(
        PairConfig::default(),
        &mut registry,
    );
    let mut linear = pair_style::<GranularModel<NormalHooke, TangentialNoHistory>>(
        PairConfig::default(),
        &mut registry,
    );

    let mut world_a = two_spheres(2.0);
    let mut world_b = two_spheres(2.0);
    let mut list_a = single_pair_list(hysteretic.dnum());
    let mut list_b = single_pair_list(linear.dnum());

    for step in 0..20 {
        let fa = step_pair(&mut hysteretic, &mut world_a, &mut list_a, step);
        let fb = step_pair(&mut linear, &mut world_b, &mut list_b, step);
        assert_relative_eq!(fa.z, fb.z, max_relative = 1e-12);
        assert_relative_eq!(fa.x, fb.x, max_relative = 1e-12);
    }

    // on unloading the stiffer branch releases the force faster
    let fa = step_pair(&mut hysteretic, &mut world_a, &mut list_a, 21);
    let fb = step_pair(&mut linear, &mut world_b, &mut list_b, 21);
    assert!(fa.z.abs() < fb.z.abs());
}

#[test]
fn ghost_reactions_follow_locality_rule() {
    let mut registry = registry(2.0, 0.0);
    for newton_pair in [true, false] {
        let config = PairConfig {
            newton_pair,
            ..PairConfig::default()
        };
        let mut pair = pair_style::<Hysteretic>(config, &mut registry);

        let mut world = Particles::new();
        world.add(Particle::new(DVec3::ZERO, 1.0, 1.0));
        world.add_ghost(Particle::new(DVec3::new(0.0, 0.0, 1.95), 1.0, 1.0));
        let mut list = single_pair_list(pair.dnum());
        let pass = PassOptions {
            virial: true,
            ..PassOptions::new(1e-3)
        };
        pair.compute_force(&mut world, &mut list, &pass, None).unwrap();

        assert!(world.f[0].z < 0.0);
        if newton_pair {
            assert_eq!(world.f[1], -world.f[0]);
        } else {
            assert_eq!(world.f[1], DVec3::ZERO);
        }

        let full = 1.95 * world.f[0].z.abs();
        let expected = if newton_pair { full } else { 0.5 * full };
        assert_relative_eq!(pair.virial()[2], expected, max_relative = 1e-12);
    }
}

#[test]
fn restored_history_reproduces_forces_bit_for_bit() {
    let mut registry = registry(2.0, 0.2);
    let mut pair = pair_style::<Hysteretic>(PairConfig::default(), &mut registry);
    let mut world = two_spheres(2.0);
    let mut list = single_pair_list(pair.dnum());

    let mut reference = Vec::new();
    let mut snapshot = Vec::new();
    for step in 0..40 {
        if step == 25 {
            RestartSnapshot::capture(&pair, &list)
                .write_to(&mut snapshot)
                .unwrap();
        }
        let f = step_pair(&mut pair, &mut world, &mut list, step);
        reference.push((f, world.torque[0]));
    }

    let mut resumed = pair_style::<Hysteretic>(PairConfig::default(), &mut registry);
    let mut tag = Vec::new();
    pair.write_restart_settings(&mut tag).unwrap();
    resumed.read_restart_settings(&mut tag.as_slice()).unwrap();
    let mut list = RestartSnapshot::read_from(&mut snapshot.as_slice())
        .unwrap()
        .restore(&resumed)
        .unwrap();
    let mut world = two_spheres(2.0);
    for step in 25..40 {
        let f = step_pair(&mut resumed, &mut world, &mut list, step);
        let (f_ref, t_ref) = reference[step];
        assert_eq!(f.to_array().map(f64::to_bits), f_ref.to_array().map(f64::to_bits));
        assert_eq!(
            world.torque[0].to_array().map(f64::to_bits),
            t_ref.to_array().map(f64::to_bits)
        );
    }
}

#[test]
fn restart_from_other_configuration_is_fatal() {
    let mut registry = registry(2.0, 0.0);
    let writer = pair_style::<Hysteretic>(PairConfig::default(), &mut registry);
    let reader = pair_style::<GranularModel<NormalHookeHysteresis, TangentialNoHistory>>(
        PairConfig::default(),
        &mut registry,
    );

    let mut tag = Vec::new();
    writer.write_restart_settings(&mut tag).unwrap();
    let err = reader.read_restart_settings(&mut tag.as_slice()).unwrap_err();
    assert!(err.is_restart_error());
    assert!(err.to_string().contains("wrong pair style loaded"));
}

#[test]
fn stiffness_ratio_of_one_is_a_configuration_error() {
    let mut registry = registry(1.0, 0.0);
    let mut pair = PairGranular::<Hysteretic>::new(PairConfig::default());
    pair.settings::<&str>(&[]).unwrap();
    let err = pair.init_granular(&mut registry).unwrap_err();
    assert!(err.is_config_error());

    let err = pair.settings(&["no_such_option", "on"]).unwrap_err();
    assert!(err.is_config_error());
}
