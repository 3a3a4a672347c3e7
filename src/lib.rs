// src/lib.rs

//! Pessimist
//!
//! Checks that a Python project still works across the whole range of
//! dependency versions its requirements allow.
//!
//! # Architecture
//!
//! - Requirements: pip-passthrough lines, fixed and variable requirements
//! - Resolver: per-package candidate versions from the package index,
//!   filtered by `requires_python` and the declared specifiers
//! - Plans: "max", "min" and one single-dimension plan per older candidate,
//!   never the cross product
//! - Engine: worker threads, each with its own virtualenv, fed through
//!   channels and stopped with a shared cancellation flag
//! - Aggregator: single-writer result state, final confirmation run and
//!   narrowing suggestions

pub mod aggregate;
pub mod checker;
pub mod config;
pub mod engine;
mod error;
pub mod index;
pub mod interpreter;
pub mod marker;
pub mod plan;
pub mod requirement;
pub mod resolver;
pub mod venv;
pub mod version;

pub use aggregate::{AggregateState, Aggregator, Verdict};
pub use checker::{CheckOptions, Checker};
pub use config::Config;
pub use engine::{CancelToken, Failure, Outcome, WorkerPool, WorkerSettings};
pub use error::{Error, Result};
pub use index::{MemoryIndex, PackageIndex, PypiIndex};
pub use interpreter::Interpreter;
pub use marker::{Marker, MarkerEnvironment};
pub use plan::{Plan, Target};
pub use requirement::{ClassifiedRequirements, Requirement, canonicalize_name};
pub use resolver::{Candidates, ResolveOptions, resolve};
pub use venv::{Environment, Provisioner, VenvProvisioner};
pub use version::{Specifier, SpecifierSet, Version};
