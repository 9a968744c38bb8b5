//! Core building blocks shared by every Medley crate: layered settings,
//! the module trait and registry, and collaborator interfaces.

pub mod mail;
pub mod module;
pub mod registry;
pub mod settings;

pub use mail::Mailer;
pub use module::{AppCtx, Migration, Module};
pub use registry::ModuleRegistry;
pub use settings::Settings;
