//! Launcher adapters.

pub mod composite;
pub mod docker;
pub mod mock;
pub mod process;

pub use composite::CompositeLauncher;
pub use docker::DockerLauncher;
pub use mock::{LaunchLog, MockBehavior, MockLauncher};
pub use process::ProcessLauncher;
