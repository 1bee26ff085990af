//! `bones_core` is the core library for the `bones` tool. It keeps a
//! project's generated boilerplate — CI scripts, packaging metadata,
//! license and contributing text, tool configuration — synchronized with a
//! single declarative `.nengobones.yml` document.
//!
//! ## Processing Pipeline
//!
//! ```text
//! .nengobones.yml
//!   → Loader (ordered YAML mapping)
//!   → Validator (mandatory keys, list shapes, cross-section rules)
//!   → Defaults engine (set-if-absent cascade, derived license values)
//!   → Section registry (per-section render-data adapters)
//!   → Template renderer (override tier → bundled tier, writes artifacts)
//!   → Drift detector (re-renders read-only, diffs against disk)
//! ```
//!
//! ## Modules
//!
//! - [`config`] — Config discovery, loading, validation, and cascading
//!   defaults.
//! - [`sections`] — Section-key canonicalization and the render-data
//!   adapter registry.
//! - [`templates`] — Two-tier template resolution and rendering, including
//!   the external formatting toolchain for Python outputs.
//! - [`check`] — The drift detector.
//! - [`notice`] — The license-notice scan over project source files.
//!
//! ## Key Types
//!
//! - [`SectionRegistry`] — Immutable map from section name to its ordered,
//!   pure render-data adapters.
//! - [`BonesTemplate`] — One templated output file, with its section key
//!   and template name derived from the output path.
//! - [`CheckReport`] — Accumulated per-artifact drift results.
//! - [`BonesError`] — The error taxonomy shared across the pipeline.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use bones_core::check_artifacts;
//! use bones_core::generate_all;
//! use bones_core::load_config;
//! use bones_core::sections::SectionRegistry;
//! use bones_core::templates::load_env;
//!
//! let config = load_config(None).unwrap();
//! let registry = SectionRegistry::builtin();
//! let env = load_env(Path::new("."));
//!
//! // Render all configured sections.
//! let summary = generate_all(&env, &registry, &config, Path::new(".")).unwrap();
//! println!("wrote {} file(s)", summary.written.len());
//!
//! // Verify nothing has drifted.
//! let report = check_artifacts(Path::new("."), &env, &registry, &config).unwrap();
//! assert!(report.is_ok());
//! ```

pub use check::*;
pub use config::*;
pub use error::*;
pub use notice::*;
pub use sections::*;
pub use templates::*;

pub mod check;
pub mod config;
mod error;
pub mod notice;
pub mod sections;
pub mod templates;
