use anyhow::Result;
use std::{collections::BTreeMap as Map, path::Path};

use weave::{ImageBuild, ImageName, InfrastructureGraph};

use crate::models::{Container, ContainerId, ContainerName, ContainerSpec, Image, ImageId};

pub trait InfrastructureFrontend {
    fn infrastructure(
        &mut self,
        project_name: &str,
        infrastructure_file_path: &Path,
    ) -> Result<InfrastructureGraph>;
}

/// The cluster runtime a plan is applied to.
pub trait ClusterBackend {
    fn get_image(&mut self, name: &ImageName) -> Result<Option<Image>>;

    fn pull_image(&mut self, name: &ImageName) -> Result<ImageId>;

    fn build_image(&mut self, build: &ImageBuild, labels: Map<String, String>) -> Result<ImageId>;

    fn list_containers(
        &mut self,
        labels: Vec<(&str, &str)>,
    ) -> Result<Map<ContainerName, Container>>;

    fn create_container(&mut self, container_spec: ContainerSpec) -> Result<ContainerId>;

    fn start_container(&mut self, name: &str) -> Result<ContainerId>;

    fn stop_container(&mut self, name: &str, timeout: u32) -> Result<ContainerId>;

    fn remove_container(&mut self, name: &str, remove_volumes: bool) -> Result<ContainerId>;
}
