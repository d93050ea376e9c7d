//! # Resource & Tag Policy Decision Engine
//!
//! A resource-level authorization engine that combines two independent
//! policy families — resource policies (keyed on the resource being
//! accessed) and tag policies (keyed on tags attached to that resource) —
//! into a single combined verdict.
//!
//! ## Pipeline
//!
//! 1. [`PolicyEngine::enrich_context`] runs context enrichers (tag
//!    enrichers first) over a request's context map.
//! 2. [`PolicyEngine::is_access_allowed`] runs the tag stage first — a
//!    determined tag verdict wins outright — then the resource stage,
//!    short-circuiting as soon as both the access and audit decisions are
//!    determined.
//!
//! Policy loading, policy-evaluator internals (pattern matching, condition
//! languages, membership tests), context-enricher implementations, and
//! audit sinks are all external collaborators: the engine only consumes
//! the [`evaluator::PolicyEvaluator`] / [`evaluator::ContextEnricher`] /
//! [`evaluator::AccessResultProcessor`] interfaces.
//!
//! ## Example
//!
//! ```
//! use authz_engine::{
//!     AccessRequest, AccessResource, PolicyEngine, PolicyEngineOptions, ServicePolicies,
//! };
//! use authz_engine::testkit::GlobPolicyEvaluator;
//! use authz_engine::Policy;
//! use std::collections::HashSet;
//! use std::sync::Arc;
//!
//! let allow_reads = GlobPolicyEvaluator::new(
//!     Policy::new("allow-reads", "allow reads", AccessResource::single("database", "*")),
//!     "read",
//!     "read",
//!     true,
//! );
//!
//! let policies = ServicePolicies {
//!     service_name: "hive".to_string(),
//!     service_def: Arc::new(authz_engine::ServiceDef::new("hive", vec!["database".into()])),
//!     policy_version: 1,
//!     policies: vec![Arc::new(allow_reads)],
//!     enrichers: vec![],
//!     tag_policies: None,
//! };
//!
//! let engine = PolicyEngine::new(policies, PolicyEngineOptions::default()).unwrap();
//!
//! let request = AccessRequest::new(
//!     AccessResource::single("database", "sales"),
//!     "alice",
//!     HashSet::new(),
//!     "read",
//!     "read",
//! );
//!
//! let decision = engine.is_access_allowed(&request, None);
//! assert!(decision.is_allowed);
//! ```

pub mod audit;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod repository;
pub mod request;
pub mod result;
pub mod testkit;
pub mod types;

pub use audit::{TagAuditEvent, TagAuditSink};
pub use config::{PolicyEngineOptions, ServicePolicies, TagServicePolicies};
pub use engine::PolicyEngine;
pub use error::{AuthzError, Result};
pub use evaluator::{AccessResultProcessor, ContextEnricher, PolicyEvaluator};
pub use repository::PolicyRepository;
pub use request::{tag_access_request, AccessRequest, CONTEXT_TAGS, CONTEXT_TAG_OBJECT};
pub use result::AccessResult;
pub use types::{AccessResource, Policy, ResourceTag, ServiceDef};

/// Crate version, exposed for hosts that want to report it (e.g. in a
/// health check or startup log line).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
