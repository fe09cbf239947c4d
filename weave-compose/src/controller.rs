use anyhow::{anyhow, Result};
use log::{debug, info};
use std::collections::{BTreeMap as Map, BTreeSet as Set};

use weave::{hasher, DeploymentPlan, ImageName};

use crate::{
    models::{
        BuildPolicy, Container, ContainerId, ContainerName, ContainerSpec, ContainerStatus,
        PullPolicy,
    },
    services::ClusterBackend,
};

const LABEL_PROJECT: &str = "io.weave.project";
const LABEL_SERVICE: &str = "io.weave.service";
const LABEL_HASH: &str = "io.weave.hash";
const LABEL_SOURCE: &str = "io.weave.source";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ContainerOperation {
    Create,
    Recreate,
    Start,
    Stop,
    Remove,
}

/// Applies a [`DeploymentPlan`] to a [`ClusterBackend`].
pub struct Controller {
    backend: Box<dyn ClusterBackend>,
    plan: DeploymentPlan,
    desired: Vec<ContainerSpec>,
    containers: Map<ContainerName, Container>,
    project_name: String,
}

impl Controller {
    pub fn init<B, P>(project_name: P, backend: B, plan: DeploymentPlan) -> Result<Controller>
    where
        B: 'static + ClusterBackend,
        P: Into<String>,
    {
        let project_name = project_name.into();
        let mut backend = Box::new(backend);
        let containers = backend.list_containers(vec![(LABEL_PROJECT, project_name.as_str())])?;
        let desired = desired_containers(&project_name, &plan);

        Ok(Controller {
            backend,
            plan,
            desired,
            containers,
            project_name,
        })
    }

    pub fn plan(&self) -> &DeploymentPlan {
        &self.plan
    }

    /// The replicas the plan asks for, one spec per container.
    pub fn desired_containers(&self) -> &[ContainerSpec] {
        &self.desired
    }

    /// Re-reads the project's containers from the backend.
    pub fn refresh(&mut self) -> Result<()> {
        self.containers = self
            .backend
            .list_containers(vec![(LABEL_PROJECT, self.project_name.as_str())])?;

        Ok(())
    }

    pub fn pull_images(&mut self, pull_policy: PullPolicy) -> Result<Vec<ImageName>> {
        let mut pulled = Vec::new();

        for name in self.plan.pulls.iter() {
            let image = self.backend.get_image(name)?;

            match (pull_policy, image) {
                (PullPolicy::IfNotPresent, None) | (PullPolicy::Always, _) => {
                    self.backend.pull_image(name)?;
                    pulled.push(name.clone());
                }
                _ => debug!("image {} is present", name),
            }
        }

        Ok(pulled)
    }

    /// Builds every image the plan declares, at most once per call. With
    /// `IfChanged` an image whose source label matches is left alone.
    pub fn build_images(&mut self, build_policy: BuildPolicy) -> Result<Vec<ImageName>> {
        let mut built = Vec::new();
        let mut seen = Set::new();

        for build in self.plan.builds.iter() {
            if !seen.insert(&build.name) {
                continue;
            }

            if build_policy == BuildPolicy::IfChanged {
                let image = self.backend.get_image(&build.name)?;
                let unchanged = image
                    .as_ref()
                    .and_then(|image| image.labels.get(LABEL_SOURCE))
                    .map(|digest| *digest == build.digest)
                    .unwrap_or(false);

                if unchanged {
                    debug!("image {} is up to date", build.name);
                    continue;
                }
            }

            let mut labels = Map::new();
            labels.insert(LABEL_PROJECT.to_string(), self.project_name.clone());
            labels.insert(LABEL_SOURCE.to_string(), build.digest.clone());

            info!("building image {}", build.name);
            self.backend.build_image(build, labels)?;
            built.push(build.name.clone());
        }

        Ok(built)
    }

    /// Finds containers with a project label that is the same as the current
    /// project but belong to no service of the plan.
    pub fn find_orphans(&mut self) -> Result<Vec<ContainerName>> {
        let services = self.planned_services();
        info!("found services: {:?}", services);

        let orphans: Vec<ContainerName> = self
            .containers
            .iter()
            .filter_map(|(container_name, container)| {
                let service = container.labels.get(LABEL_SERVICE);
                match service {
                    Some(service) if services.contains(service) => None,
                    _ => Some(container_name.clone()),
                }
            })
            .collect();

        info!("found orphans: {:?}", orphans);

        Ok(orphans)
    }

    pub fn start_containers_diff(&mut self) -> Result<Vec<(ContainerName, ContainerOperation)>> {
        let diff = self.desired.iter().filter_map(|spec| {
            let spec_hash = spec_hash(spec);

            let container = match self.containers.get(&spec.name) {
                Some(container) => container,
                None => return Some((spec.name.clone(), ContainerOperation::Create)),
            };

            let container_hash = container.labels.get(LABEL_HASH);
            if container_hash.map(|h| *h == spec_hash).unwrap_or(false) {
                let operation = match container.status {
                    ContainerStatus::Configured => Some(ContainerOperation::Start),
                    ContainerStatus::Running => None,
                    ContainerStatus::Exited => Some(ContainerOperation::Start),
                    ContainerStatus::Unknown => Some(ContainerOperation::Recreate),
                };

                operation.map(|operation| (spec.name.clone(), operation))
            } else {
                Some((spec.name.clone(), ContainerOperation::Recreate))
            }
        });

        let services = self.planned_services();

        // Replicas left over from a larger replica count, but not orphans.
        let scaled_down_containers =
            self.containers
                .iter()
                .filter_map(|(container_name, container)| {
                    let container_should_exist = self
                        .desired
                        .iter()
                        .any(|container_spec| container_spec.name == *container_name);

                    let service = container.labels.get(LABEL_SERVICE);
                    match service {
                        Some(service) if services.contains(service) && !container_should_exist => {
                            Some((container_name.clone(), ContainerOperation::Remove))
                        }
                        _ => None,
                    }
                });

        let diff = diff.chain(scaled_down_containers).collect();

        Ok(diff)
    }

    pub fn stop_containers_diff(&mut self) -> Result<Vec<(ContainerName, ContainerOperation)>> {
        let diff = self
            .desired
            .iter()
            .filter_map(|spec| match self.containers.get(&spec.name) {
                Some(container) if container.status == ContainerStatus::Running => {
                    Some((spec.name.clone(), ContainerOperation::Stop))
                }
                _ => None,
            })
            .collect();

        Ok(diff)
    }

    pub fn remove_containers_diff(&mut self) -> Result<Vec<(ContainerName, ContainerOperation)>> {
        let diff = self
            .desired
            .iter()
            .filter(|spec| self.containers.contains_key(&spec.name))
            .map(|spec| (spec.name.clone(), ContainerOperation::Remove))
            .collect();

        Ok(diff)
    }

    pub fn container_apply(
        &mut self,
        name: &ContainerName,
        operation: ContainerOperation,
        timeout: u32,
    ) -> Result<()> {
        let container_spec = || -> Result<ContainerSpec> {
            self.desired
                .iter()
                .find(|spec| spec.name == *name)
                .cloned()
                .ok_or_else(|| anyhow!("unknown container name: {:?}", name))
        };

        let existing = |containers: &Map<ContainerName, Container>| -> Result<Container> {
            containers
                .get(name)
                .cloned()
                .ok_or_else(|| anyhow!("could not find container {:?}", name))
        };

        debug!("{:?} {:?}", operation, name);

        match operation {
            ContainerOperation::Create => {
                let container_spec = container_spec()?;
                let container_id = self.container_create(container_spec)?;
                self.backend.start_container(&container_id.0)?;
            }
            ContainerOperation::Recreate => {
                let container_spec = container_spec()?;
                let container = existing(&self.containers)?;

                if container.status == ContainerStatus::Running {
                    self.backend.stop_container(&container.id.0, timeout)?;
                }
                self.backend.remove_container(&container.id.0, false)?;
                let container_id = self.container_create(container_spec)?;
                self.backend.start_container(&container_id.0)?;
            }
            ContainerOperation::Start => {
                let container = existing(&self.containers)?;
                self.backend.start_container(&container.id.0)?;
            }
            ContainerOperation::Stop => {
                let container = existing(&self.containers)?;
                self.backend.stop_container(&container.id.0, timeout)?;
            }
            ContainerOperation::Remove => {
                let container = existing(&self.containers)?;

                if container.status == ContainerStatus::Running {
                    self.backend.stop_container(&container.id.0, timeout)?;
                }
                self.backend.remove_container(&container.id.0, false)?;
            }
        }

        Ok(())
    }

    /// Applies a whole diff and refreshes the known containers afterwards.
    pub fn apply(
        &mut self,
        operations: Vec<(ContainerName, ContainerOperation)>,
        timeout: u32,
    ) -> Result<()> {
        for (container_name, operation) in operations {
            self.container_apply(&container_name, operation, timeout)?;
        }

        self.refresh()
    }

    pub fn container_create(&mut self, mut spec: ContainerSpec) -> Result<ContainerId> {
        let hash = spec_hash(&spec);

        spec.labels
            .insert(LABEL_PROJECT.into(), self.project_name.clone());
        spec.labels
            .insert(LABEL_SERVICE.into(), spec.service_name.clone());
        spec.labels.insert(LABEL_HASH.into(), hash);

        let id = self.backend.create_container(spec)?;

        Ok(id)
    }

    fn planned_services(&self) -> Set<String> {
        self.plan
            .entries
            .iter()
            .map(|entry| entry.service.0.clone())
            .collect()
    }
}

fn spec_hash(spec: &ContainerSpec) -> String {
    hasher::digest(spec)
}

/// Expands plan entries into one container spec per replica, named
/// `{project}_{service}_{n}` with `n` counting across all entries of a service.
fn desired_containers(project_name: &str, plan: &DeploymentPlan) -> Vec<ContainerSpec> {
    let mut counters: Map<&str, u32> = Map::new();
    let mut desired = Vec::new();

    for entry in plan.entries.iter() {
        let counter = counters.entry(entry.service.0.as_str()).or_insert(0);

        for _ in 0..entry.replicas {
            desired.push(ContainerSpec {
                name: ContainerName(format!("{}_{}_{}", project_name, entry.service, counter)),
                service_name: entry.service.0.clone(),
                image_name: entry.image.name().clone(),
                image_digest: entry.image.source_digest(),
                command: entry.command.clone(),
                env: entry.env.clone(),
                labels: Default::default(),
            });
            *counter += 1;
        }
    }

    desired
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MemoryBackend;
    use weave::{Container as ServiceContainer, Deployment, Image, Service};

    fn plan(replicas: u32) -> DeploymentPlan {
        let deployment = Deployment::new();
        for worker in 0..2 {
            let image = Image::build(
                format!("test-custom-image{}", worker),
                format!("FROM alpine\nRUN echo {} > /dockerfile-id\n", worker),
            );
            let service = Service::new("foo", ServiceContainer::new(image, vec!["tail", "-f", "/dev/null"]))
                .replicate(replicas)
                .unwrap();
            deployment.deploy(service);
        }
        deployment.compile().unwrap()
    }

    #[test]
    fn replicas_are_numbered_across_entries() {
        let names: Vec<_> = desired_containers("demo", &plan(2))
            .into_iter()
            .map(|spec| spec.name.0)
            .collect();

        assert_eq!(names, vec!["demo_foo_0", "demo_foo_1", "demo_foo_2", "demo_foo_3"]);
    }

    #[test]
    fn spec_hash_follows_content() {
        let specs = desired_containers("demo", &plan(1));
        assert_ne!(spec_hash(&specs[0]), spec_hash(&specs[1]));

        let mut relabeled = specs[0].clone();
        relabeled.labels.insert("x".into(), "y".into());
        assert_ne!(spec_hash(&relabeled), spec_hash(&specs[0]));
    }

    #[test]
    fn unknown_container_is_an_error() {
        let mut controller = Controller::init("demo", MemoryBackend::new(), plan(1)).unwrap();

        let err = controller
            .container_apply(&ContainerName("demo_bar_0".into()), ContainerOperation::Create, 5)
            .unwrap_err();

        assert!(err.to_string().contains("demo_bar_0"));
    }
}
