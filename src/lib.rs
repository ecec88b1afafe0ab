//! Pairwise contact-force evaluation for discrete-element granular simulations.
//!
//! A contact model is composed from a surface kinematics law, a normal force
//! law and a tangential force law ([`model::GranularModel`]). The pair style
//! ([`pair::PairGranular`]) drives it over a neighbor list, keeping each
//! contact's persistent history between timesteps.

pub mod contact;
pub mod error;
pub mod grid;
pub mod history;
pub mod hysteresis;
pub mod material;
pub mod model;
pub mod neighbor;
pub mod pair;
pub mod particle;
pub mod physics;
pub mod properties;
pub mod restart;
pub mod settings;
pub mod simulation;
pub mod surface;
pub mod tangential;
pub mod vtk;
pub mod wall;

pub use contact::{CollisionData, ContactData, ForceData, TouchFlags};
pub use error::{GranularError, Result};
pub use history::{HistoryLayout, HistorySetup};
pub use model::{Capabilities, ContactLaw, GranularModel};
pub use neighbor::NeighborList;
pub use pair::{PairConfig, PairCoupling, PairGranular, PassOptions};
pub use particle::{Particle, Particles};
pub use restart::RestartSnapshot;
