//! clientgen Core Library
//!
//! This library generates the transport-layer types of HTTP client bindings
//! from a service schema: request, response and error bodies, their
//! constructors and validators, expanded result types with their views, and
//! the helpers converting between service types and body types.

pub mod assembler;
pub mod builders;
pub mod config;
pub mod descriptors;
pub mod emit;
pub mod error;
pub mod generate;
pub mod manifest;
pub mod planner;
pub mod policy;
pub mod registry;
pub mod schema;
pub mod templates;
pub mod utils;

pub use crate::{
    assembler::{Artifact, ArtifactAssembler},
    config::Config,
    error::{Error, Result},
    generate::{generate, GenerationReport, Generator, ServiceOutcome},
    planner::Plan,
    registry::{DeduplicationRegistry, RegistryScope},
    schema::SchemaModel,
    templates::{TemplateKind, TemplateManager},
};
