use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap as Map, fmt, num::NonZeroU32};

use crate::error::{Error, Result};

#[derive(Clone, Debug, Hash, PartialOrd, Ord, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageName(pub String);

impl fmt::Display for ImageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Hash, PartialOrd, Ord, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceName(pub String);

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A container image, either a reference to an existing image or an inline
/// Dockerfile that has to be built under `name`.
///
/// Two images are equal when their names and build sources are equal, so
/// plain references compare by name alone.
#[derive(Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    name: ImageName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    build_source: Option<String>,
}

impl Image {
    pub fn reference<N: Into<String>>(name: N) -> Image {
        Image {
            name: ImageName(name.into()),
            build_source: None,
        }
    }

    pub fn build<N, S>(name: N, dockerfile: S) -> Image
    where
        N: Into<String>,
        S: Into<String>,
    {
        Image {
            name: ImageName(name.into()),
            build_source: Some(dockerfile.into()),
        }
    }

    pub fn name(&self) -> &ImageName {
        &self.name
    }

    pub fn build_source(&self) -> Option<&str> {
        self.build_source.as_deref()
    }

    pub fn is_built(&self) -> bool {
        self.build_source.is_some()
    }

    /// A name resolves to exactly one build source, or to none at all for a
    /// reference. Anything else is ambiguous.
    pub fn conflicts_with(&self, other: &Image) -> bool {
        self.name == other.name && self.build_source != other.build_source
    }

    pub fn source_digest(&self) -> Option<String> {
        self.build_source
            .as_ref()
            .map(|source| blake3::hash(source.as_bytes()).to_hex().to_string())
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct Container {
    image: Image,
    command: Vec<String>,
    env: Map<String, String>,
}

impl Container {
    /// An empty `command` runs the image's default entrypoint.
    pub fn new<I, S>(image: Image, command: I) -> Container
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Container {
            image,
            command: command.into_iter().map(Into::into).collect(),
            env: Map::new(),
        }
    }

    pub fn with_env<K, V>(mut self, key: K, value: V) -> Container
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn image(&self) -> &Image {
        &self.image
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }

    pub fn env(&self) -> &Map<String, String> {
        &self.env
    }
}

/// A named, replicated container.
///
/// `replicate` consumes the service and hands back the updated value, so a
/// service is configured fully before it is handed to a
/// [`Deployment`](crate::Deployment), which then owns it.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct Service {
    name: ServiceName,
    container: Container,
    replicas: NonZeroU32,
}

impl Service {
    pub fn new<N: Into<String>>(name: N, container: Container) -> Service {
        Service {
            name: ServiceName(name.into()),
            container,
            replicas: NonZeroU32::MIN,
        }
    }

    pub fn replicate(mut self, replicas: u32) -> Result<Service> {
        self.replicas = NonZeroU32::new(replicas).ok_or_else(|| {
            Error::validation(
                format!("replica count for service {}", self.name),
                format!("expected at least 1, got {}", replicas),
            )
        })?;

        Ok(self)
    }

    pub fn name(&self) -> &ServiceName {
        &self.name
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn image(&self) -> &Image {
        self.container.image()
    }

    pub fn replicas(&self) -> u32 {
        self.replicas.get()
    }
}
