use log::{debug, info};
use std::{
    collections::BTreeMap as Map,
    sync::{Mutex, MutexGuard, PoisonError},
};

use crate::{
    compiler,
    error::Result,
    infrastructure::{InfrastructureGraph, Value},
    models::Service,
    plan::DeploymentPlan,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Origin {
    Direct,
    Infrastructure,
}

#[derive(Clone, Debug)]
struct Registration {
    service: Service,
    origin: Origin,
}

#[derive(Debug, Default)]
struct Registry {
    registrations: Vec<Registration>,
    parameters: Map<String, Value>,
}

impl Registry {
    /// Same-name registrations from the same kind of source coexist. Across
    /// the infrastructure boundary the later one wins and takes over the slot
    /// of the first registration it replaces.
    fn register(&mut self, service: Service, origin: Origin) {
        let name = service.name().clone();
        let supersedes = |existing: &Registration| {
            existing.service.name() == &name
                && (origin == Origin::Infrastructure || existing.origin == Origin::Infrastructure)
        };

        match self.registrations.iter().position(|r| supersedes(r)) {
            Some(slot) => {
                let mut index = 0;
                self.registrations.retain(|existing| {
                    let keep = index <= slot || !supersedes(existing);
                    index += 1;
                    keep
                });

                debug!("service {} replaces an earlier registration", name);
                self.registrations[slot] = Registration { service, origin };
            }
            None => {
                debug!("registered service {}", name);
                self.registrations.push(Registration { service, origin });
            }
        }
    }
}

/// Collects services and infrastructures and compiles them into a
/// [`DeploymentPlan`].
///
/// Registration takes `&self`: every `deploy` call holds the registry lock for
/// its whole duration, so a deployment can be shared between configuration
/// loaders running on several threads and still has one registration order.
#[derive(Debug, Default)]
pub struct Deployment {
    registry: Mutex<Registry>,
}

impl Deployment {
    pub fn new() -> Deployment {
        Deployment::default()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        // The registry is plain data, a panicking holder cannot leave it
        // half-updated in a way later readers would care about.
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn deploy(&self, service: Service) {
        self.registry().register(service, Origin::Direct);
    }

    /// Merges every parameter and service the infrastructure declares.
    pub fn deploy_infrastructure(&self, infrastructure: &InfrastructureGraph) {
        let mut registry = self.registry();

        for (name, value) in infrastructure.parameters() {
            registry.parameters.insert(name.into(), value.clone());
        }

        for service in infrastructure.services() {
            registry.register(service.clone(), Origin::Infrastructure);
        }

        info!(
            "merged infrastructure with {} resources",
            infrastructure.len()
        );
    }

    pub fn services(&self) -> Vec<Service> {
        self.registry()
            .registrations
            .iter()
            .map(|registration| registration.service.clone())
            .collect()
    }

    pub fn parameters(&self) -> Map<String, Value> {
        self.registry().parameters.clone()
    }

    pub fn len(&self) -> usize {
        self.registry().registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry().registrations.is_empty()
    }

    pub fn compile(&self) -> Result<DeploymentPlan> {
        let registry = self.registry();
        let services = registry
            .registrations
            .iter()
            .map(|registration| &registration.service);

        compiler::compile(services, &registry.parameters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Container, Image};
    use std::{sync::Arc, thread};

    fn service(name: &str, image: &str) -> Service {
        Service::new(name, Container::new(Image::reference(image), vec!["sh"]))
    }

    fn images(deployment: &Deployment) -> Vec<(String, String)> {
        deployment
            .services()
            .iter()
            .map(|s| (s.name().0.clone(), s.image().name().0.clone()))
            .collect()
    }

    fn pair(service: &str, image: &str) -> (String, String) {
        (service.into(), image.into())
    }

    #[test]
    fn direct_registrations_of_one_name_coexist() {
        let deployment = Deployment::new();
        deployment.deploy(service("foo", "a"));
        deployment.deploy(service("foo", "b"));

        assert_eq!(images(&deployment), vec![pair("foo", "a"), pair("foo", "b")]);
    }

    #[test]
    fn direct_registration_replaces_infrastructure_service_in_place() {
        let graph = InfrastructureGraph::builder()
            .service("db", service("db", "postgres"))
            .service("web", service("web", "nginx"))
            .build();

        let deployment = Deployment::new();
        deployment.deploy_infrastructure(&graph);
        deployment.deploy(service("db", "mysql"));

        assert_eq!(images(&deployment), vec![pair("db", "mysql"), pair("web", "nginx")]);
    }

    #[test]
    fn second_direct_registration_after_replacement_is_appended() {
        let graph = InfrastructureGraph::builder()
            .service("foo", service("foo", "declared"))
            .build();

        let deployment = Deployment::new();
        deployment.deploy_infrastructure(&graph);
        deployment.deploy(service("foo", "a"));
        deployment.deploy(service("foo", "b"));

        assert_eq!(images(&deployment), vec![pair("foo", "a"), pair("foo", "b")]);
    }

    #[test]
    fn infrastructure_service_replaces_earlier_registrations() {
        let deployment = Deployment::new();
        deployment.deploy(service("foo", "a"));
        deployment.deploy(service("bar", "b"));
        deployment.deploy(service("foo", "c"));

        let graph = InfrastructureGraph::builder()
            .service("foo", service("foo", "declared"))
            .build();
        deployment.deploy_infrastructure(&graph);

        assert_eq!(
            images(&deployment),
            vec![pair("foo", "declared"), pair("bar", "b")]
        );
    }

    #[test]
    fn parameters_merge_last_write_wins() {
        let deployment = Deployment::new();
        deployment.deploy_infrastructure(
            &InfrastructureGraph::builder()
                .parameter("nWorker", 1)
                .parameter("zone", "a")
                .build(),
        );
        deployment.deploy_infrastructure(
            &InfrastructureGraph::builder().parameter("nWorker", 3).build(),
        );

        let parameters = deployment.parameters();
        assert_eq!(parameters.get("nWorker"), Some(&Value::Integer(3)));
        assert_eq!(parameters.get("zone"), Some(&Value::Text("a".into())));
    }

    #[test]
    fn concurrent_registrations_are_all_kept() {
        let deployment = Arc::new(Deployment::new());

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let deployment = Arc::clone(&deployment);
                thread::spawn(move || {
                    for index in 0..16 {
                        deployment.deploy(service(&format!("w{}-{}", worker, index), "alpine"));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(deployment.len(), 8 * 16);
        let plan = deployment.compile().unwrap();
        assert_eq!(plan.entries.len(), 8 * 16);
        assert_eq!(plan.pulls.len(), 1);
    }

    #[test]
    fn compile_does_not_consume_registrations() {
        let deployment = Deployment::new();
        assert!(deployment.is_empty());
        deployment.deploy(service("foo", "alpine"));

        let first = deployment.compile().unwrap();
        let second = deployment.compile().unwrap();

        assert_eq!(first, second);
        assert_eq!(deployment.len(), 1);
    }
}
