use serde::{Deserialize, Serialize};
use std::collections::BTreeMap as Map;

use crate::{
    infrastructure::Value,
    models::{Image, ImageName, Service, ServiceName},
};

/// An image the runtime has to build, recorded once per distinct source.
#[derive(Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageBuild {
    pub name: ImageName,
    pub source: String,
    pub digest: String,
}

/// One deployed service. Replicas stay a count, the runtime expands them.
#[derive(Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub service: ServiceName,
    pub image: Image,
    pub command: Vec<String>,
    #[serde(default)]
    pub env: Map<String, String>,
    pub replicas: u32,
}

impl PlanEntry {
    pub(crate) fn resolve(service: &Service, image: &Image) -> PlanEntry {
        let container = service.container();

        PlanEntry {
            service: service.name().clone(),
            image: image.clone(),
            command: container.command().to_vec(),
            env: container.env().clone(),
            replicas: service.replicas(),
        }
    }
}

#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentPlan {
    #[serde(default)]
    pub parameters: Map<String, Value>,
    pub builds: Vec<ImageBuild>,
    pub pulls: Vec<ImageName>,
    pub entries: Vec<PlanEntry>,
}

impl DeploymentPlan {
    /// blake3 over the bytes of [`to_json`](DeploymentPlan::to_json), so equal
    /// plans share a digest on every host.
    pub fn digest(&self) -> serde_json::Result<String> {
        let json = self.to_json()?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn build(&self, name: &ImageName) -> Option<&ImageBuild> {
        self.builds.iter().find(|build| build.name == *name)
    }

    pub fn entries_named<'a>(&'a self, service: &'a str) -> impl Iterator<Item = &'a PlanEntry> {
        self.entries
            .iter()
            .filter(move |entry| entry.service.0 == service)
    }

    pub fn total_replicas(&self) -> u64 {
        self.entries
            .iter()
            .map(|entry| u64::from(entry.replicas))
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Container;

    fn plan() -> DeploymentPlan {
        let image = Image::build("custom", "FROM alpine\n");
        let service = Service::new("foo", Container::new(image.clone(), vec!["sh"]))
            .replicate(2)
            .unwrap();

        DeploymentPlan {
            parameters: Default::default(),
            builds: vec![ImageBuild {
                name: image.name().clone(),
                source: "FROM alpine\n".into(),
                digest: image.source_digest().unwrap(),
            }],
            pulls: vec![],
            entries: vec![
                PlanEntry::resolve(&service, &image),
                PlanEntry::resolve(&service, &image),
            ],
        }
    }

    #[test]
    fn lookups() {
        let plan = plan();

        assert_eq!(plan.total_replicas(), 4);
        assert_eq!(plan.entries_named("foo").count(), 2);
        assert_eq!(plan.entries_named("bar").count(), 0);
        assert!(plan.build(&ImageName("custom".into())).is_some());
        assert!(!plan.is_empty());
    }

    #[test]
    fn digest_is_blake3_of_the_json_rendering() {
        let plan = plan();
        let json = plan.to_json().unwrap();

        assert_eq!(
            plan.digest().unwrap(),
            blake3::hash(json.as_bytes()).to_hex().to_string()
        );
    }

    #[test]
    fn json_round_trips_and_digest_follows_content() {
        let plan = plan();
        let json = plan.to_json().unwrap();
        let parsed: DeploymentPlan = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, plan);
        assert_eq!(parsed.digest().unwrap(), plan.digest().unwrap());

        let mut changed = plan.clone();
        changed.entries[1].replicas = 3;
        assert_ne!(changed.digest().unwrap(), plan.digest().unwrap());
    }
}
