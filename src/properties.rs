//! Registry of derived per-type-pair coefficient tables.
//!
//! Contact laws register the coefficients they need by name together with a
//! factory that derives them from the [`MaterialDatabase`], then connect to the
//! shared result. Each property is built once per registry, so laws layered on
//! top of each other can request the same table without recomputing it.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::{GranularError, Result};
use crate::material::MaterialDatabase;

/// Dense coefficient table indexed by two 1-based type ids.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PairTable {
    ntypes: usize,
    values: Vec<f64>,
}

impl PairTable {
    /// Builds a table by evaluating `f(itype, jtype)` for every pair of 1-based type ids.
    pub fn from_fn(ntypes: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let mut values = Vec::with_capacity(ntypes * ntypes);
        for itype in 1..=ntypes {
            for jtype in 1..=ntypes {
                values.push(f(itype, jtype));
            }
        }
        Self { ntypes, values }
    }

    /// Builds a table from row-major values, `ntypes * ntypes` long.
    pub fn from_row_major(ntypes: usize, values: Vec<f64>) -> Option<Self> {
        (values.len() == ntypes * ntypes).then_some(Self { ntypes, values })
    }

    pub fn ntypes(&self) -> usize {
        self.ntypes
    }

    /// Coefficient for the type pair. Type ids are 1-based.
    #[inline]
    pub fn get(&self, itype: usize, jtype: usize) -> f64 {
        debug_assert!(itype >= 1 && itype <= self.ntypes);
        debug_assert!(jtype >= 1 && jtype <= self.ntypes);
        self.values[(itype - 1) * self.ntypes + (jtype - 1)]
    }

    /// Checked lookup.
    pub fn try_get(&self, itype: usize, jtype: usize) -> Result<f64> {
        for index in [itype, jtype] {
            if index == 0 || index > self.ntypes {
                return Err(GranularError::TypeOutOfRange {
                    index,
                    ntypes: self.ntypes,
                });
            }
        }
        Ok(self.get(itype, jtype))
    }

    /// Iterates `(itype, jtype, value)` over all pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(move |(k, &v)| (k / self.ntypes + 1, k % self.ntypes + 1, v))
    }
}

/// A derived property.
#[derive(Clone, Debug)]
pub enum Property {
    Scalar(f64),
    Matrix(Arc<PairTable>),
}

/// Derives a property from the global material database.
pub type PropertyFactory = fn(&MaterialDatabase) -> Result<Property>;

pub struct PropertyRegistry {
    materials: MaterialDatabase,
    nktv2p: f64,
    properties: HashMap<String, Property>,
}

impl PropertyRegistry {
    /// Registry in SI units (`nktv2p = 1`).
    pub fn new(materials: MaterialDatabase) -> Self {
        Self::with_unit_conversion(materials, 1.0)
    }

    /// Registry with an explicit pressure-to-force conversion constant.
    pub fn with_unit_conversion(materials: MaterialDatabase, nktv2p: f64) -> Self {
        Self {
            materials,
            nktv2p,
            properties: HashMap::new(),
        }
    }

    pub fn materials(&self) -> &MaterialDatabase {
        &self.materials
    }

    pub fn ntypes(&self) -> usize {
        self.materials.ntypes()
    }

    /// Pressure-to-force/area² conversion constant.
    pub fn nktv2p(&self) -> f64 {
        self.nktv2p
    }

    /// Builds the property on first registration; later registrations are no-ops.
    pub fn register_property(&mut self, name: &str, factory: PropertyFactory) -> Result<()> {
        if self.properties.contains_key(name) {
            return Ok(());
        }
        let property = factory(&self.materials)?;
        debug!(name, "registered contact property");
        self.properties.insert(name.to_string(), property);
        Ok(())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Shared handle to a registered per-type-pair table.
    pub fn connect_matrix(&self, name: &str) -> Result<Arc<PairTable>> {
        match self.properties.get(name) {
            Some(Property::Matrix(table)) => Ok(Arc::clone(table)),
            Some(Property::Scalar(_)) => Err(GranularError::PropertyKind {
                name: name.to_string(),
                expected: "per-type-pair",
            }),
            None => Err(GranularError::UnknownProperty(name.to_string())),
        }
    }

    /// Value of a registered scalar property.
    pub fn connect_scalar(&self, name: &str) -> Result<f64> {
        match self.properties.get(name) {
            Some(Property::Scalar(value)) => Ok(*value),
            Some(Property::Matrix(_)) => Err(GranularError::PropertyKind {
                name: name.to_string(),
                expected: "scalar",
            }),
            None => Err(GranularError::UnknownProperty(name.to_string())),
        }
    }
}
