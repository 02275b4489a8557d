//! Proxmox Commander NLU — library crate for natural-language command
//! resolution.
//!
//! Exposes every pipeline stage so the binary (`main.rs`) and external
//! crates (e.g. `pc-e2e-tests`) can drive the `Resolver` or exercise a
//! single stage such as `EntityExtractor` on its own.

pub mod config;
pub mod context;
pub mod entities;
pub mod error;
pub mod inference;
pub mod intents;
pub mod orchestrator;
pub mod preprocess;

pub use config::NluConfig;
pub use error::{LlmError, NluError, NluResult};
pub use orchestrator::Resolver;
