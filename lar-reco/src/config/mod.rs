//! Process configuration.
//!
//! `Parameters` is read once from a JSON file and stays immutable for the
//! lifetime of the process.

mod parameters;
mod reco_option;

pub use parameters::{Parameters, StageToggles};
pub use reco_option::RecoOption;
