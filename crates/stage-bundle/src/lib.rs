//! Artifact path mapping for stage-sync
//!
//! Turns declared source → destination rules into a validated mapping
//! between project-relative sources and deploy-root-relative destinations,
//! and materializes the deploy root from it.
//!
//! # Example
//!
//! ```no_run
//! use stage_bundle::{MappingOptions, PathMappingResolver, build_bundle};
//!
//! # fn example() -> stage_bundle::Result<()> {
//! let mut resolver = PathMappingResolver::new("/work/project", "/work/project/output/deploy")?;
//! resolver.add_rule("app", Some("deployed"))?;
//! resolver.add_rule("src/**/*.py", Some("python/"))?;
//!
//! for pair in resolver.all_mappings(MappingOptions::expanded()) {
//!     let (source, destination) = pair?;
//!     println!("{} -> {}", source.display(), destination.display());
//! }
//! build_bundle(&resolver)?;
//! # Ok(())
//! # }
//! ```

pub mod bundle;
pub mod error;
pub mod resolver;
pub mod rules;

pub use bundle::{build_bundle, clean_deploy_root};
pub use error::{Error, Result};
pub use resolver::{MappingOptions, PathMappingResolver};
pub use rules::{ArtifactPair, ArtifactsConfig, EntryKind, PathRule, ResolvedRule, RuleKind};
