//! On-disk catalog of machines and runtimes

pub mod machines;
pub mod paths;
pub mod runtimes;
pub mod schema;

pub use machines::MachineStore;
pub use paths::AavmPaths;
pub use runtimes::{RuntimeRegistry, RuntimeStore};
