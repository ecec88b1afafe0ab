use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::error::{GranularError, Result};
use crate::properties::{PairTable, Property};

/// Bulk properties of one particle type.
#[derive(Clone, Copy, Debug)]
pub struct Material {
    pub youngs_modulus: f64,         // E
    pub poissons_ratio: f64,         // nu
    pub density: f64,                // rho
    pub friction_coefficient: f64,   // mu
    pub restitution_coefficient: f64, // e
}

impl Material {
    pub fn new(
        youngs_modulus: f64,
        poissons_ratio: f64,
        density: f64,
        friction_coefficient: f64,
        restitution_coefficient: f64,
    ) -> Self {
        Self {
            youngs_modulus,
            poissons_ratio,
            density,
            friction_coefficient,
            restitution_coefficient,
        }
    }

    /// Mass of a solid sphere of this material.
    pub fn sphere_mass(&self, radius: f64) -> f64 {
        4.0 / 3.0 * std::f64::consts::PI * radius.powi(3) * self.density
    }
}

/// A named global property as the user supplied it.
#[derive(Clone, Debug, PartialEq)]
pub enum GlobalProperty {
    Scalar(f64),
    PerType(Vec<f64>),
    /// Row-major `ntypes * ntypes` values.
    PerTypePair(Vec<f64>),
}

/// User-supplied material constants, keyed by the names the property factories read.
#[derive(Clone, Debug)]
pub struct MaterialDatabase {
    ntypes: usize,
    properties: HashMap<String, GlobalProperty>,
}

impl MaterialDatabase {
    pub fn new(ntypes: usize) -> Self {
        Self {
            ntypes,
            properties: HashMap::new(),
        }
    }

    /// Fills the database from one [`Material`] per type.
    ///
    /// Pairwise restitution and friction are the arithmetic mean of the two types.
    pub fn from_materials(materials: &[Material], characteristic_velocity: f64) -> Self {
        let ntypes = materials.len();
        let pair = |f: fn(&Material) -> f64| {
            let mut values = Vec::with_capacity(ntypes * ntypes);
            for a in materials {
                for b in materials {
                    values.push(0.5 * (f(a) + f(b)));
                }
            }
            GlobalProperty::PerTypePair(values)
        };

        let mut db = Self::new(ntypes);
        db.insert(
            "youngsModulus",
            GlobalProperty::PerType(materials.iter().map(|m| m.youngs_modulus).collect()),
        );
        db.insert(
            "poissonsRatio",
            GlobalProperty::PerType(materials.iter().map(|m| m.poissons_ratio).collect()),
        );
        db.insert("coefficientRestitution", pair(|m| m.restitution_coefficient));
        db.insert("coefficientFriction", pair(|m| m.friction_coefficient));
        db.set_scalar("characteristicVelocity", characteristic_velocity);
        db
    }

    pub fn ntypes(&self) -> usize {
        self.ntypes
    }

    fn insert(&mut self, name: &str, property: GlobalProperty) {
        self.properties.insert(name.to_string(), property);
    }

    pub fn set_scalar(&mut self, name: &str, value: f64) {
        self.insert(name, GlobalProperty::Scalar(value));
    }

    pub fn set_per_type(&mut self, name: &str, values: Vec<f64>) -> Result<()> {
        self.check_len(name, self.ntypes, values.len())?;
        self.insert(name, GlobalProperty::PerType(values));
        Ok(())
    }

    /// Stores a row-major `ntypes * ntypes` matrix.
    pub fn set_per_type_pair(&mut self, name: &str, values: Vec<f64>) -> Result<()> {
        self.check_len(name, self.ntypes * self.ntypes, values.len())?;
        self.insert(name, GlobalProperty::PerTypePair(values));
        Ok(())
    }

    /// Stores the same value for every type pair.
    pub fn set_uniform_pair(&mut self, name: &str, value: f64) {
        self.insert(
            name,
            GlobalProperty::PerTypePair(vec![value; self.ntypes * self.ntypes]),
        );
    }

    fn check_len(&self, name: &str, expected: usize, found: usize) -> Result<()> {
        if expected != found {
            return Err(GranularError::MaterialShape {
                name: name.to_string(),
                expected,
                found,
            });
        }
        Ok(())
    }

    fn get(&self, name: &str) -> Result<&GlobalProperty> {
        self.properties
            .get(name)
            .ok_or_else(|| GranularError::MissingMaterial(name.to_string()))
    }

    pub fn scalar(&self, name: &str) -> Result<f64> {
        match self.get(name)? {
            GlobalProperty::Scalar(v) => Ok(*v),
            _ => Err(GranularError::PropertyKind {
                name: name.to_string(),
                expected: "scalar",
            }),
        }
    }

    pub fn per_type(&self, name: &str) -> Result<&[f64]> {
        match self.get(name)? {
            GlobalProperty::PerType(v) => Ok(v),
            _ => Err(GranularError::PropertyKind {
                name: name.to_string(),
                expected: "per-type",
            }),
        }
    }

    pub fn pair_table(&self, name: &str) -> Result<PairTable> {
        match self.get(name)? {
            GlobalProperty::PerTypePair(v) => PairTable::from_row_major(self.ntypes, v.clone())
                .ok_or_else(|| GranularError::MaterialShape {
                    name: name.to_string(),
                    expected: self.ntypes * self.ntypes,
                    found: v.len(),
                }),
            _ => Err(GranularError::PropertyKind {
                name: name.to_string(),
                expected: "per-type-pair",
            }),
        }
    }
}

fn check_table(
    name: &str,
    table: &PairTable,
    reason: &'static str,
    ok: impl Fn(f64) -> bool,
) -> Result<()> {
    match table.iter().find(|&(_, _, v)| !ok(v)) {
        Some((itype, jtype, value)) => Err(GranularError::InvalidCoefficient {
            name: name.to_string(),
            itype,
            jtype,
            value,
            reason,
        }),
        None => Ok(()),
    }
}

fn validated(
    name: &str,
    table: PairTable,
    reason: &'static str,
    ok: impl Fn(f64) -> bool,
) -> Result<Property> {
    check_table(name, &table, reason, ok)?;
    Ok(Property::Matrix(Arc::new(table)))
}

fn elastic_tables(db: &MaterialDatabase) -> Result<(&[f64], &[f64])> {
    let e = db.per_type("youngsModulus")?;
    let nu = db.per_type("poissonsRatio")?;
    for (k, (&e, &nu)) in e.iter().zip(nu).enumerate() {
        if e <= 0.0 {
            return Err(GranularError::InvalidCoefficient {
                name: "youngsModulus".to_string(),
                itype: k + 1,
                jtype: k + 1,
                value: e,
                reason: "must be positive",
            });
        }
        if !(-1.0..=0.5).contains(&nu) {
            return Err(GranularError::InvalidCoefficient {
                name: "poissonsRatio".to_string(),
                itype: k + 1,
                jtype: k + 1,
                value: nu,
                reason: "must lie in [-1, 0.5]",
            });
        }
    }
    Ok((e, nu))
}

/// `Yeff`: effective Young's modulus per type pair,
/// `1 / ((1 - nu_i^2) / E_i + (1 - nu_j^2) / E_j)`.
pub fn create_yeff(db: &MaterialDatabase) -> Result<Property> {
    let (e, nu) = elastic_tables(db)?;
    let compliance = |k: usize| (1.0 - nu[k - 1] * nu[k - 1]) / e[k - 1];
    let table = PairTable::from_fn(db.ntypes(), |i, j| 1.0 / (compliance(i) + compliance(j)));
    Ok(Property::Matrix(Arc::new(table)))
}

/// `coeffRestLog`: natural log of the restitution coefficient.
pub fn create_coeff_rest_log(db: &MaterialDatabase) -> Result<Property> {
    let rest = db.pair_table("coefficientRestitution")?;
    check_table("coefficientRestitution", &rest, "must lie in (0, 1]", |e| {
        e > 0.0 && e <= 1.0
    })?;
    if rest.iter().any(|(_, _, e)| e == 1.0) {
        warn!("coefficientRestitution of 1 disables normal damping");
    }
    let table = PairTable::from_fn(db.ntypes(), |i, j| rest.get(i, j).ln());
    Ok(Property::Matrix(Arc::new(table)))
}

/// `coeffRestMax`: restitution at infinite Stokes number (viscous damping).
pub fn create_coeff_rest_max(db: &MaterialDatabase) -> Result<Property> {
    validated(
        "MaximumRestitution",
        db.pair_table("MaximumRestitution")?,
        "must lie in (0, 1]",
        |e| e > 0.0 && e <= 1.0,
    )
}

/// `coeffStc`: critical Stokes number (viscous damping).
pub fn create_coeff_stc(db: &MaterialDatabase) -> Result<Property> {
    validated(
        "CriticalStokes",
        db.pair_table("CriticalStokes")?,
        "must be non-negative",
        |st| st >= 0.0,
    )
}

/// `coeffMu`: interstitial fluid viscosity (viscous damping).
pub fn create_coeff_mu(db: &MaterialDatabase) -> Result<Property> {
    validated(
        "FluidViscosity",
        db.pair_table("FluidViscosity")?,
        "must be positive",
        |mu| mu > 0.0,
    )
}

/// `coeffFrict`: Coulomb friction coefficient.
pub fn create_coeff_frict(db: &MaterialDatabase) -> Result<Property> {
    validated(
        "coefficientFriction",
        db.pair_table("coefficientFriction")?,
        "must be non-negative",
        |mu| mu >= 0.0,
    )
}

/// `charVel`: characteristic impact velocity used to linearise Hertzian stiffness.
pub fn create_char_vel(db: &MaterialDatabase) -> Result<Property> {
    Ok(Property::Scalar(db.scalar("characteristicVelocity")?))
}

/// `kn2kcMax`: ratio of the maximum unloading stiffness to the loading stiffness.
pub fn create_coeff_max_elastic_stiffness(db: &MaterialDatabase) -> Result<Property> {
    validated(
        "coefficientMaxElasticStiffness",
        db.pair_table("coefficientMaxElasticStiffness")?,
        "must exceed 1 (k2Max must be stiffer than kn)",
        |ratio| ratio > 1.0,
    )
}

/// `kn2kc`: ratio of the adhesion stiffness to the loading stiffness.
pub fn create_coeff_adhesion_stiffness(db: &MaterialDatabase) -> Result<Property> {
    validated(
        "coefficientAdhesionStiffness",
        db.pair_table("coefficientAdhesionStiffness")?,
        "must be non-negative",
        |ratio| ratio >= 0.0,
    )
}

/// `phiF`: plasticity depth as a fraction of the effective diameter.
pub fn create_coeff_plasticity_depth(db: &MaterialDatabase) -> Result<Property> {
    validated(
        "coefficientPlasticityDepth",
        db.pair_table("coefficientPlasticityDepth")?,
        "must be positive",
        |phi| phi > 0.0,
    )
}
