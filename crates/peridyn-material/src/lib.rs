//! # peridyn-material
//!
//! Material parameters and bond kernels.
//!
//! ## Design
//!
//! A [`MaterialSpec`] holds the user-facing inputs (horizon, density,
//! Young's modulus, fracture criterion). It is resolved once into
//! [`PointParameters`], which carries every derived constant the kernels
//! need. A chunk sees its parameters through a [`ParameterSet`]: either one
//! shared parameter block or a per-point table, decided once at chunk
//! construction.
//!
//! The [`BondModel`] trait is the per-bond constitutive law; [`BondBased`]
//! is the prototype microelastic brittle material.

pub mod bond_based;
pub mod database;
pub mod parameters;
pub mod properties;
pub mod traits;

pub use bond_based::BondBased;
pub use database::MaterialDatabase;
pub use parameters::{ParameterSet, PerPointParameterTable};
pub use properties::{Fracture, MaterialSpec, PointParameters};
pub use traits::BondModel;
