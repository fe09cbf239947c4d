use anyhow::{anyhow, Result};
use log::debug;
use serde::Deserialize;
use serde_yaml;
use std::{
    collections::BTreeMap as Map,
    fs::File,
    path::{Path, PathBuf},
};

use weave::{Container, Image, InfrastructureGraph, Service, Value};

use crate::services::InfrastructureFrontend;

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct InfrastructureFile {
    #[serde(default)]
    parameters: Map<String, Value>,

    #[serde(default)]
    services: Map<String, ServiceEntry>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ServiceEntry {
    /// Logical service name, defaults to the resource name.
    name: Option<String>,

    image: Option<String>,

    build: Option<Build>,

    #[serde(default)]
    command: Vec<String>,

    #[serde(default)]
    env: MapList,

    replicas: Option<u32>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Build {
    /// Built image name, defaults to `{project}_{resource}`.
    name: Option<String>,

    /// Inline Dockerfile.
    dockerfile: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
enum MapList {
    Map(Map<String, String>),
    List(Vec<String>),
}

impl Default for MapList {
    fn default() -> Self {
        MapList::List(Vec::new())
    }
}

impl MapList {
    pub fn to_map(self) -> Map<String, String> {
        match self {
            MapList::Map(map) => map,
            MapList::List(list) => list.into_iter().map(MapList::split_value).collect(),
        }
    }

    fn split_value(value: String) -> (String, String) {
        match value.find('=') {
            Some(split_index) => (
                value[..split_index].into(),
                value[split_index + 1..].into(),
            ),
            None => (value, "".into()),
        }
    }
}

pub struct YamlFrontend;

impl YamlFrontend {
    pub fn new() -> YamlFrontend {
        YamlFrontend
    }

    pub fn parse(&self, project_name: &str, contents: &str) -> Result<InfrastructureGraph> {
        let file: InfrastructureFile = serde_yaml::from_str(contents)?;
        infrastructure_graph(project_name, file)
    }
}

impl Default for YamlFrontend {
    fn default() -> Self {
        YamlFrontend::new()
    }
}

impl InfrastructureFrontend for YamlFrontend {
    fn infrastructure(
        &mut self,
        project_name: &str,
        infrastructure_file_path: &Path,
    ) -> Result<InfrastructureGraph> {
        let infrastructure_file = File::open(infrastructure_file_path)?;
        let file: InfrastructureFile = serde_yaml::from_reader(infrastructure_file)?;

        infrastructure_graph(project_name, file)
    }
}

fn infrastructure_graph(project_name: &str, file: InfrastructureFile) -> Result<InfrastructureGraph> {
    let mut builder = InfrastructureGraph::builder();

    for (name, value) in file.parameters.iter() {
        builder = builder.parameter(name.as_str(), value.clone());
    }

    for (resource_name, entry) in file.services {
        if file.parameters.contains_key(&resource_name) {
            return Err(anyhow!(
                "{:?} is declared both as a parameter and as a service",
                resource_name
            ));
        }

        let image = match (entry.image, entry.build) {
            (Some(image_name), None) => Image::reference(image_name),
            (None, Some(build)) => {
                let image_name = build
                    .name
                    .unwrap_or_else(|| format!("{}_{}", project_name, resource_name));
                Image::build(image_name, build.dockerfile)
            }
            (Some(_), Some(_)) => {
                return Err(anyhow!(
                    "service {:?} declares both an image and a build",
                    resource_name
                ))
            }
            (None, None) => {
                return Err(anyhow!(
                    "service {:?} needs an image or a build",
                    resource_name
                ))
            }
        };

        let mut container = Container::new(image, entry.command);
        for (key, value) in entry.env.to_map() {
            container = container.with_env(key, value);
        }

        let name = entry.name.unwrap_or_else(|| resource_name.clone());
        let service = Service::new(name, container).replicate(entry.replicas.unwrap_or(1))?;
        debug!("declared service {:?}", resource_name);

        builder = builder.service(resource_name, service);
    }

    Ok(builder.build())
}

/// Looks for an infrastructure file in `path` and each of its ancestors.
pub fn find_infrastructure_file<P: AsRef<Path>>(path: P) -> Option<PathBuf> {
    for path in path.as_ref().ancestors() {
        let infrastructure_file_path = path.join("infrastructure.yml");
        if infrastructure_file_path.exists() {
            return Some(infrastructure_file_path);
        }

        let infrastructure_file_path = path.join("infrastructure.yaml");
        if infrastructure_file_path.exists() {
            return Some(infrastructure_file_path);
        }
    }

    None
}
