//! Shared test utilities for the stage-sync workspace.
//!
//! This crate is a dev-dependency only and is never published.
//!
//! # Modules
//!
//! - [`project`]: [`TestProject`](project::TestProject), a temporary project
//!   with a deploy root
//! - [`stage`]: [`InMemoryStage`](stage::InMemoryStage), a scriptable
//!   in-memory `RemoteStage`

pub mod project;
pub mod stage;

pub use project::TestProject;
pub use stage::{HashMode, InMemoryStage, StageCall};
