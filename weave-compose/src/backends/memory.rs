use anyhow::{anyhow, Result};
use log::debug;
use std::{
    collections::BTreeMap as Map,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use weave::{ImageBuild, ImageName};

use crate::{
    models::{
        Container, ContainerId, ContainerName, ContainerSpec, ContainerStatus, Image, ImageId,
    },
    services::ClusterBackend,
};

#[derive(Debug, Default)]
struct State {
    images: Map<ImageName, Image>,
    containers: Map<ContainerName, Container>,
    specs: Map<ContainerName, ContainerSpec>,
    builds: Vec<ImageName>,
    pulls: Vec<ImageName>,
    next_id: u64,
}

impl State {
    fn find(&mut self, name: &str) -> Result<&mut Container> {
        self.containers
            .values_mut()
            .find(|container| container.id.0 == name || container.name.0 == name)
            .ok_or_else(|| anyhow!("no such container: {:?}", name))
    }
}

/// A backend that keeps images and containers in memory and records what
/// was built and pulled. Clones share the same state, so a handle kept
/// outside a [`Controller`](crate::Controller) sees everything it did.
#[derive(Clone, Debug, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
}

impl MemoryBackend {
    pub fn new() -> MemoryBackend {
        MemoryBackend::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every image built so far, in build order.
    pub fn builds(&self) -> Vec<ImageName> {
        self.state().builds.clone()
    }

    pub fn pulls(&self) -> Vec<ImageName> {
        self.state().pulls.clone()
    }

    pub fn containers(&self) -> Vec<Container> {
        self.state().containers.values().cloned().collect()
    }

    pub fn container(&self, name: &str) -> Option<Container> {
        self.state().containers.get(&ContainerName(name.into())).cloned()
    }

    pub fn container_spec(&self, name: &str) -> Option<ContainerSpec> {
        self.state().specs.get(&ContainerName(name.into())).cloned()
    }
}

impl ClusterBackend for MemoryBackend {
    fn get_image(&mut self, name: &ImageName) -> Result<Option<Image>> {
        Ok(self.state().images.get(name).cloned())
    }

    fn pull_image(&mut self, name: &ImageName) -> Result<ImageId> {
        let mut state = self.state();
        let id = ImageId(format!("pulled:{}", name));

        state.images.insert(
            name.clone(),
            Image {
                id: id.clone(),
                labels: Map::new(),
            },
        );
        state.pulls.push(name.clone());
        debug!("pulled image {}", name);

        Ok(id)
    }

    fn build_image(&mut self, build: &ImageBuild, labels: Map<String, String>) -> Result<ImageId> {
        let mut state = self.state();
        let id = ImageId(format!("blake3:{}", build.digest));

        state.images.insert(
            build.name.clone(),
            Image {
                id: id.clone(),
                labels,
            },
        );
        state.builds.push(build.name.clone());
        debug!("built image {}", build.name);

        Ok(id)
    }

    fn list_containers(
        &mut self,
        labels: Vec<(&str, &str)>,
    ) -> Result<Map<ContainerName, Container>> {
        let containers = self
            .state()
            .containers
            .values()
            .filter(|container| {
                labels.iter().all(|(label, value)| {
                    container.labels.get(*label).map(|s| s.as_str()) == Some(*value)
                })
            })
            .map(|container| (container.name.clone(), container.clone()))
            .collect();

        Ok(containers)
    }

    fn create_container(&mut self, spec: ContainerSpec) -> Result<ContainerId> {
        let mut state = self.state();

        if state.containers.contains_key(&spec.name) {
            return Err(anyhow!("container {:?} already exists", spec.name.0));
        }

        if !state.images.contains_key(&spec.image_name) {
            return Err(anyhow!("image {} is not present", spec.image_name));
        }

        state.next_id += 1;
        let id = ContainerId(format!("{:012x}", state.next_id));

        let container = Container {
            id: id.clone(),
            name: spec.name.clone(),
            status: ContainerStatus::Configured,
            labels: spec.labels.clone(),
        };
        state.containers.insert(spec.name.clone(), container);
        state.specs.insert(spec.name.clone(), spec);

        Ok(id)
    }

    fn start_container(&mut self, name: &str) -> Result<ContainerId> {
        let mut state = self.state();
        let container = state.find(name)?;
        container.status = ContainerStatus::Running;

        Ok(container.id.clone())
    }

    fn stop_container(&mut self, name: &str, _timeout: u32) -> Result<ContainerId> {
        let mut state = self.state();
        let container = state.find(name)?;
        container.status = ContainerStatus::Exited;

        Ok(container.id.clone())
    }

    fn remove_container(&mut self, name: &str, _remove_volumes: bool) -> Result<ContainerId> {
        let mut state = self.state();
        let container_name = state.find(name)?.name.clone();

        state.specs.remove(&container_name);
        let container = state
            .containers
            .remove(&container_name)
            .ok_or_else(|| anyhow!("no such container: {:?}", name))?;

        Ok(container.id)
    }
}
