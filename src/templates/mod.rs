//! # Template Engine
//!
//! Reusable checklist/step hierarchies and their instantiation into tasks.
//!
//! - [`definition`] - Authoring payloads and validation
//! - [`mapping`] - Field-whitelisting copies that always mint new identities
//! - [`engine`] - Transactional operations, audit and notifications

pub mod definition;
pub mod engine;
pub mod mapping;

pub use definition::{
    ChecklistDefinition, InstantiateOptions, NewTask, NewTaskTemplate, StepDefinition,
    TemplateUpdate,
};
pub use engine::TemplateEngine;
