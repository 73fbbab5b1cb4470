pub mod api;
pub mod config;
pub mod discovery;
pub mod error;
pub mod flight;
pub mod heartbeat;
pub mod link;
pub mod mission_exec;
pub mod modes;
pub mod registry;
pub mod telemetry;

#[cfg(test)]
mod testutil;

pub use api::GroundControl;
pub use config::GcsConfig;
pub use error::CoreError;
pub use registry::{LinkStatus, MissionPhase, MissionStatus, Registry, UavRecord};
