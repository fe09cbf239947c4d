//! Declarative deployment descriptions.
//!
//! Services are built from an [`Image`] and a [`Container`], registered with a
//! [`Deployment`] either one by one or through an [`InfrastructureGraph`], and
//! compiled into a [`DeploymentPlan`] that a cluster runtime can execute.
//!
//! ```
//! use weave::{Container, Deployment, Image, Service};
//!
//! let deployment = Deployment::new();
//! let image = Image::build("custom", "FROM alpine\n");
//! let service = Service::new("foo", Container::new(image, vec!["tail", "-f", "/dev/null"]))
//!     .replicate(2)?;
//! deployment.deploy(service);
//!
//! let plan = deployment.compile()?;
//! assert_eq!(plan.builds.len(), 1);
//! assert_eq!(plan.total_replicas(), 2);
//! # Ok::<(), weave::Error>(())
//! ```

pub mod compiler;
pub mod deployment;
pub mod error;
pub mod hasher;
pub mod infrastructure;
pub mod models;
pub mod plan;

pub use deployment::Deployment;
pub use error::{Error, Result};
pub use infrastructure::{InfrastructureGraph, Resource, Value};
pub use models::{Container, Image, ImageName, Service, ServiceName};
pub use plan::{DeploymentPlan, ImageBuild, PlanEntry};
