#![deny(missing_docs)]
#![doc = "Core error and randomness types shared by the MESA crates."]

pub mod errors;
pub mod rng;

pub use errors::{ErrorInfo, MesaError};
pub use rng::{derive_substream_seed, RngHandle};
