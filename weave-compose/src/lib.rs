//! Loads infrastructure files and applies compiled deployment plans to a
//! cluster backend.

pub mod backends;
pub mod controller;
pub mod frontends;
pub mod models;
pub mod services;

pub use backends::MemoryBackend;
pub use controller::{ContainerOperation, Controller};
pub use frontends::{find_infrastructure_file, YamlFrontend};
pub use models::{BuildPolicy, PullPolicy};
pub use services::{ClusterBackend, InfrastructureFrontend};
