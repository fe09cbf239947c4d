use log::{debug, info};
use std::collections::BTreeMap as Map;

use crate::{
    error::{Error, Result},
    infrastructure::Value,
    models::{Image, ImageName, Service},
    plan::{DeploymentPlan, ImageBuild, PlanEntry},
};

/// Compiles registered services into a plan.
///
/// Entries keep the order of `services`. Every distinct image is recorded
/// once, in the order it is first seen: built images under `builds`,
/// references under `pulls`. An image name that resolves to two different
/// build sources aborts the compile and no plan is produced.
pub fn compile<'a, I>(services: I, parameters: &Map<String, Value>) -> Result<DeploymentPlan>
where
    I: IntoIterator<Item = &'a Service>,
{
    let mut images: Map<ImageName, &'a Image> = Map::new();
    let mut plan = DeploymentPlan {
        parameters: parameters.clone(),
        ..Default::default()
    };

    for service in services {
        let image = service.image();

        let resolved = match images.get(image.name()) {
            Some(known) if known.conflicts_with(image) => {
                return Err(Error::Conflict {
                    name: image.name().clone(),
                    first: known.build_source().map(Into::into),
                    second: image.build_source().map(Into::into),
                });
            }
            Some(known) => {
                debug!("image {} already recorded, reused by {}", image.name(), service.name());
                *known
            }
            None => {
                record_image(&mut plan, image);
                images.insert(image.name().clone(), image);
                image
            }
        };

        plan.entries.push(PlanEntry::resolve(service, resolved));
    }

    info!(
        "compiled {} services, {} builds, {} pulls",
        plan.entries.len(),
        plan.builds.len(),
        plan.pulls.len()
    );

    Ok(plan)
}

fn record_image(plan: &mut DeploymentPlan, image: &Image) {
    match (image.build_source(), image.source_digest()) {
        (Some(source), Some(digest)) => {
            debug!("recording build of {} ({})", image.name(), digest);
            plan.builds.push(ImageBuild {
                name: image.name().clone(),
                source: source.into(),
                digest,
            });
        }
        _ => {
            debug!("recording pull of {}", image.name());
            plan.pulls.push(image.name().clone());
        }
    }
}
