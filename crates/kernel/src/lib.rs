//! Core traits, settings, and module lifecycle shared by the bookshelf crates.

pub mod health;
pub mod module;
pub mod registry;
pub mod settings;

pub use health::ReadinessProbe;
pub use module::{InitCtx, Migration, Module};
pub use registry::ModuleRegistry;
