pub mod address_log;
pub mod artifact;
pub mod config;
pub mod core;
pub mod deployer;
pub mod error;
pub mod log;
pub mod sequencer;

pub use address_log::{AddressEntry, AddressLog};
pub use error::{DeploymentFailure, Error, PlanError, Result};
pub use sequencer::{Sequencer, SequencerEvent};
