#![deny(missing_docs)]
#![doc = "Spatial domain model for the MESA engine: habitat, deme graph, observed data."]

pub mod data;
pub mod graph;
pub mod habitat;

pub use data::ObservedData;
pub use graph::DemeGraph;
pub use habitat::Habitat;
