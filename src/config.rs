//! Construction-time inputs: the already-built policy set an engine is
//! constructed from, and the engine's (small, closed) configuration
//! surface.

use std::sync::Arc;

use crate::evaluator::{ContextEnricher, PolicyEvaluator};
use crate::types::ServiceDef;

/// One policy family's already-built evaluator set, as handed to the
/// engine by the (out-of-scope) policy-loading collaborator. "Already
/// built" means `policies` holds constructed evaluators, not raw
/// definitions still to be compiled — compiling a policy definition into
/// an evaluator is exactly the policy-loading/parsing responsibility the
/// core spec keeps external.
pub struct ServicePolicies {
    pub service_name: String,
    pub service_def: Arc<ServiceDef>,
    pub policy_version: i64,
    pub policies: Vec<Arc<dyn PolicyEvaluator>>,
    pub enrichers: Vec<Arc<dyn ContextEnricher>>,
    pub tag_policies: Option<TagServicePolicies>,
}

/// The tag-family counterpart of [`ServicePolicies`].
pub struct TagServicePolicies {
    pub service_name: String,
    pub service_def: Arc<ServiceDef>,
    pub policy_version: i64,
    pub policies: Vec<Arc<dyn PolicyEvaluator>>,
    pub enrichers: Vec<Arc<dyn ContextEnricher>>,
}

/// Recognised engine options. The struct is closed — there is nowhere for
/// an unrecognised option to be passed — so "unknown options are ignored"
/// holds trivially.
#[derive(Debug, Clone)]
pub struct PolicyEngineOptions {
    /// Skip the tag stage entirely even if tag policies were supplied.
    pub disable_tag_policy_evaluation: bool,

    /// Capacity of each repository's audit cache. `0` disables caching.
    pub audit_cache_size: usize,
}

impl Default for PolicyEngineOptions {
    fn default() -> Self {
        Self {
            disable_tag_policy_evaluation: false,
            audit_cache_size: 10_000,
        }
    }
}
