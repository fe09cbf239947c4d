use std::collections::BTreeMap as Map;

use weave::ImageName;

#[derive(Clone, Debug, Hash, PartialOrd, Ord, PartialEq, Eq)]
pub struct ImageId(pub String);

#[derive(Clone, Debug)]
pub struct Image {
    pub id: ImageId,
    pub labels: Map<String, String>,
}

#[derive(Clone, Debug, Hash, PartialOrd, Ord, PartialEq, Eq)]
pub struct ContainerId(pub String);

#[derive(Clone, Debug, Hash, PartialOrd, Ord, PartialEq, Eq)]
pub struct ContainerName(pub String);

#[derive(Clone, Debug, Hash)]
pub struct Container {
    pub id: ContainerId,
    pub name: ContainerName,
    pub status: ContainerStatus,
    pub labels: Map<String, String>,
}

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub enum ContainerStatus {
    Configured,
    Running,
    Exited,
    Unknown,
}

/// One replica of a planned service, as handed to the backend.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: ContainerName,
    pub service_name: String,
    pub image_name: ImageName,
    /// Source digest of a built image; a changed Dockerfile changes the spec.
    pub image_digest: Option<String>,
    pub command: Vec<String>,
    pub env: Map<String, String>,
    pub labels: Map<String, String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BuildPolicy {
    Always,
    IfChanged,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PullPolicy {
    Always,
    IfNotPresent,
}
