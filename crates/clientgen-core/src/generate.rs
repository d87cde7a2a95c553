//! Code generation functionality for clientgen.
//!
//! A [`Generator`] turns every service of a schema into one [`Artifact`]:
//! descriptors are built, sections planned against a
//! [`DeduplicationRegistry`] and the plan rendered by the
//! [`ArtifactAssembler`]. Services are processed on the blocking pool, at
//! most `workers` at a time, and outcomes are reported in schema order. A
//! failing service does not stop the others.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::task;

use crate::{
    assembler::{Artifact, ArtifactAssembler, AssemblyOptions},
    builders::{target_for, BodyDescriptorBuilder},
    config::Config,
    descriptors::ServiceDescriptors,
    emit,
    error::{Error, Result},
    planner::{self, Plan, SectionKind},
    registry::{DeduplicationRegistry, RegistryScope},
    schema::{SchemaModel, ServiceDef},
    templates::TemplateManager,
    utils::service_slug,
};

/// Outcome of generating one service
#[derive(Debug)]
pub struct ServiceOutcome {
    pub service: String,
    pub result: Result<Artifact>,
}

/// Per-service outcomes of a run, in schema order
#[derive(Debug, Default)]
pub struct GenerationReport {
    pub outcomes: Vec<ServiceOutcome>,
}

impl GenerationReport {
    pub fn artifacts(&self) -> impl Iterator<Item = &Artifact> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &Error)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.service.as_str(), e)))
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }
}

#[derive(Debug, Clone)]
pub struct Generator {
    config: Arc<Config>,
    schema: Arc<SchemaModel>,
    assembler: Arc<ArtifactAssembler>,
}

impl Generator {
    /// Create a generator for an already loaded schema
    pub async fn new(config: Config, schema: SchemaModel) -> Result<Self> {
        let templates = TemplateManager::new(config.template_kind, config.template_path()).await?;
        let options = AssemblyOptions {
            output_dir: config.output_path(),
            transport: config.transport.clone(),
            genpkg: config.genpkg.clone(),
            runtime: config.runtime.clone(),
        };
        Ok(Self {
            config: Arc::new(config),
            schema: Arc::new(schema),
            assembler: Arc::new(ArtifactAssembler::new(Arc::new(templates), options)),
        })
    }

    /// Load the schema named by the configuration and create a generator
    pub async fn from_config(config: Config) -> Result<Self> {
        let schema = SchemaModel::from_file_or_url(&config.schema).await?;
        Self::new(config, schema).await
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn schema(&self) -> &SchemaModel {
        &self.schema
    }

    /// Build the descriptors of one service
    pub fn describe(&self, service: &ServiceDef) -> Result<ServiceDescriptors> {
        let target = target_for(
            self.config.template_kind,
            &self.config.runtime,
            &service_slug(&service.name),
        );
        BodyDescriptorBuilder::new(&self.schema, service, target.as_ref()).build()
    }

    /// Artifacts live in a directory named by the service slug, which must
    /// be non-empty and unique within the schema.
    fn check_slug(&self, index: usize) -> Result<()> {
        let services = &self.schema.services;
        let name = &services[index].name;
        let slug = service_slug(name);
        let reason = if slug.is_empty() || !name.is_ascii() {
            format!("service name '{name}' does not form a module name")
        } else if let Some(other) = services[..index].iter().find(|s| service_slug(&s.name) == slug) {
            format!("service '{}' already generates into '{slug}'", other.name)
        } else {
            return Ok(());
        };
        Err(Error::inconsistency(name, "", "name", reason))
    }

    fn stage(&self, index: usize, registry: &DeduplicationRegistry) -> Result<(ServiceDescriptors, Plan)> {
        self.check_slug(index)?;
        let service = &self.schema.services[index];
        let descriptors = self.describe(service)?;
        let plan = planner::plan(&descriptors, &self.schema, registry)?;
        Ok((descriptors, plan))
    }

    /// Plans of every service (or of the one named `only`), using the
    /// configured registry scope. Planning is sequential.
    pub fn plans(&self, only: Option<&str>) -> Result<Vec<(String, Result<Plan>)>> {
        if let Some(name) = only {
            if self.schema.service(name).is_none() {
                return Err(Error::config(format!("Unknown service '{name}'")));
            }
        }
        let shared = DeduplicationRegistry::new();
        let mut plans = Vec::new();
        for (index, service) in self.schema.services.iter().enumerate() {
            let fresh;
            let registry = match self.config.registry_scope {
                RegistryScope::PerRun => &shared,
                RegistryScope::PerService => {
                    fresh = DeduplicationRegistry::new();
                    &fresh
                }
            };
            let result = self.stage(index, registry).map(|(_, plan)| plan);
            if only.map_or(true, |name| name == service.name) {
                plans.push((service.name.clone(), result));
            }
        }
        Ok(plans)
    }

    /// Generate the artifacts of every service without writing them.
    pub async fn run(&self) -> Result<GenerationReport> {
        let workers = self.config.worker_count();
        log::info!(
            "Generating {} services with {} workers ({} registry)",
            self.schema.services.len(),
            workers,
            self.config.registry_scope
        );
        let outcomes = match self.config.registry_scope {
            RegistryScope::PerService => self.run_per_service(workers).await,
            RegistryScope::PerRun => self.run_per_run(workers).await?,
        };
        let report = GenerationReport { outcomes };
        for (service, err) in report.failures() {
            log::warn!("Service '{}' failed: {}", service, err);
        }
        Ok(report)
    }

    async fn run_per_service(&self, workers: usize) -> Vec<ServiceOutcome> {
        let results: Vec<Result<Artifact>> = stream::iter(0..self.schema.services.len())
            .map(|index| {
                let generator = self.clone();
                async move {
                    task::spawn_blocking(move || {
                        let registry = DeduplicationRegistry::new();
                        let (descriptors, plan) = generator.stage(index, &registry)?;
                        generator.assembler.assemble(&descriptors, &plan)
                    })
                    .await
                    .unwrap_or_else(|e| Err(Error::worker(e.to_string())))
                }
            })
            .buffered(workers)
            .collect()
            .await;
        self.outcomes(results)
    }

    /// Stage the services in schema order against one registry, leaving out
    /// the ones in `skip`.
    fn stage_run(&self, skip: &BTreeSet<usize>) -> Vec<Option<Result<(ServiceDescriptors, Plan)>>> {
        let registry = DeduplicationRegistry::new();
        (0..self.schema.services.len())
            .map(|index| (!skip.contains(&index)).then(|| self.stage(index, &registry)))
            .collect()
    }

    /// Build and plan in schema order against one registry, then render in
    /// parallel. A service that fails to render after claiming declarations
    /// is dropped and the run planned again, so every claimed declaration
    /// ends up in a written artifact.
    async fn run_per_run(&self, workers: usize) -> Result<Vec<ServiceOutcome>> {
        let mut dropped: BTreeMap<usize, Error> = BTreeMap::new();
        loop {
            let generator = self.clone();
            let skip: BTreeSet<usize> = dropped.keys().copied().collect();
            let staged = task::spawn_blocking(move || generator.stage_run(&skip))
                .await
                .map_err(|e| Error::worker(e.to_string()))?;
            let declaring: Vec<bool> = staged
                .iter()
                .map(|s| matches!(s, Some(Ok((_, plan))) if plan.count(SectionKind::TypeDeclaration) > 0))
                .collect();

            let mut results: Vec<Option<Result<Artifact>>> = stream::iter(staged)
                .map(|staged| {
                    let assembler = Arc::clone(&self.assembler);
                    async move {
                        let Some(staged) = staged else {
                            return None;
                        };
                        let result = match staged {
                            Ok((descriptors, plan)) => {
                                task::spawn_blocking(move || assembler.assemble(&descriptors, &plan))
                                    .await
                                    .unwrap_or_else(|e| Err(Error::worker(e.to_string())))
                            }
                            Err(e) => Err(e),
                        };
                        Some(result)
                    }
                })
                .buffered(workers)
                .collect()
                .await;

            let mut replan = false;
            for (index, result) in results.iter_mut().enumerate() {
                if !declaring[index] || !matches!(result, Some(Err(_))) {
                    continue;
                }
                if let Some(Err(err)) = result.take() {
                    log::warn!(
                        "Service '{}' failed to render, planning again without its declarations",
                        self.schema.services[index].name
                    );
                    dropped.insert(index, err);
                    replan = true;
                }
            }
            if replan {
                continue;
            }

            let mut outcomes = Vec::with_capacity(results.len());
            for (index, result) in results.into_iter().enumerate() {
                outcomes.push(match result {
                    Some(result) => result,
                    None => Err(dropped
                        .remove(&index)
                        .unwrap_or_else(|| Error::worker("service was not generated"))),
                });
            }
            return Ok(self.outcomes(outcomes));
        }
    }

    fn outcomes(&self, results: Vec<Result<Artifact>>) -> Vec<ServiceOutcome> {
        self.schema
            .services
            .iter()
            .zip(results)
            .map(|(service, result)| ServiceOutcome {
                service: service.name.clone(),
                result,
            })
            .collect()
    }
}

/// Main entry point for code generation: loads the schema, generates every
/// service and writes the successful artifacts.
pub async fn generate(config: Config) -> Result<GenerationReport> {
    let generator = Generator::from_config(config).await?;
    let report = generator.run().await?;
    let written = emit::write_artifacts(report.artifacts()).await?;
    log::info!("Wrote {} artifacts", written);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"
types:
  - name: Payload
    fields:
      - { name: id, type: string, required: true }
  - name: Pet
    fields:
      - { name: id, type: string, required: true }
      - { name: owner, type: Owner }
  - name: Owner
    fields:
      - { name: name, type: string }
services:
  - name: pets
    endpoints:
      - { name: show, payload: Payload, result: Pet }
  - name: broken
    endpoints:
      - { name: show, payload: Missing }
  - name: owners
    endpoints:
      - { name: find, payload: Payload, result: Pet }
"#;

    async fn generator(scope: RegistryScope) -> Generator {
        let mut config = Config::new("inline", "gen");
        config.registry_scope = scope;
        config.workers = Some(2);
        let schema = SchemaModel::parse_content(SCHEMA).expect("schema");
        Generator::new(config, schema).await.expect("generator")
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        for scope in [RegistryScope::PerService, RegistryScope::PerRun] {
            let report = generator(scope).await.run().await.expect("report");
            let services: Vec<_> = report.outcomes.iter().map(|o| o.service.as_str()).collect();
            assert_eq!(services, ["pets", "broken", "owners"]);
            assert!(!report.is_success());
            assert_eq!(report.artifacts().count(), 2);

            let failures: Vec<_> = report.failures().collect();
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].0, "broken");
            assert_eq!(failures[0].1.kind(), "SchemaInconsistency");
        }
    }

    #[tokio::test]
    async fn test_per_run_scope_declares_once() {
        let report = generator(RegistryScope::PerRun).await.run().await.expect("report");
        let artifacts: Vec<_> = report.artifacts().collect();
        assert!(artifacts[0].text.contains("pub struct OwnerResponseBody"));
        assert!(!artifacts[1].text.contains("pub struct OwnerResponseBody"));
        assert!(artifacts[1].text.contains("pub struct FindRequestBody"));

        let report = generator(RegistryScope::PerService).await.run().await.expect("report");
        for artifact in report.artifacts() {
            assert!(artifact.text.contains("pub struct OwnerResponseBody"));
        }
    }

    #[tokio::test]
    async fn test_per_run_scope_keeps_endpoint_bodies_per_service() {
        let schema = SchemaModel::parse_content(
            r#"
types:
  - name: A
    fields:
      - { name: id, type: string, required: true }
  - name: B
    fields:
      - { name: count, type: int64, required: true }
      - { name: label, type: string }
services:
  - name: alpha
    endpoints:
      - { name: show, payload: A }
  - name: beta
    endpoints:
      - { name: show, payload: B }
"#,
        )
        .expect("schema");
        let mut config = Config::new("inline", "gen");
        config.registry_scope = RegistryScope::PerRun;
        let report = Generator::new(config, schema)
            .await
            .expect("generator")
            .run()
            .await
            .expect("report");

        let artifacts: Vec<_> = report.artifacts().collect();
        assert_eq!(artifacts.len(), 2);
        for artifact in &artifacts {
            assert!(artifact.text.contains("pub struct ShowRequestBody {"), "{}", artifact.service);
        }
        assert!(artifacts[0].text.contains("    pub id: String,"));
        assert!(artifacts[1].text.contains("    pub count: i64,"));
        assert!(artifacts[1].text.contains("    pub label: Option<String>,"));
    }

    #[tokio::test]
    async fn test_service_slugs_must_be_distinct() {
        let schema = SchemaModel::parse_content(
            r#"
types:
  - name: Payload
    fields:
      - { name: id, type: string, required: true }
services:
  - name: pet store
    endpoints:
      - { name: show, payload: Payload }
  - name: PetStore
    endpoints:
      - { name: show, payload: Payload }
  - name: "ペット"
    endpoints:
      - { name: show, payload: Payload }
"#,
        )
        .expect("schema");
        let report = Generator::new(Config::new("inline", "gen"), schema)
            .await
            .expect("generator")
            .run()
            .await
            .expect("report");

        let generated: Vec<_> = report.artifacts().map(|a| a.path.clone()).collect();
        assert_eq!(generated, [std::path::PathBuf::from("gen/http/pet_store/client/types.rs")]);

        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].0, "PetStore");
        assert_eq!(failures[0].1.kind(), "SchemaInconsistency");
        assert!(failures[0].1.to_string().contains("pet store"));
        assert_eq!(failures[1].0, "ペット");
        assert_eq!(failures[1].1.kind(), "SchemaInconsistency");
    }

    #[tokio::test]
    async fn test_plans_for_one_service() {
        let generator = generator(RegistryScope::PerService).await;
        let plans = generator.plans(Some("owners")).expect("plans");
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].0, "owners");
        assert!(plans[0].1.is_ok());

        assert!(generator.plans(Some("nope")).is_err());
    }
}
