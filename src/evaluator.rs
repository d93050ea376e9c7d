//! Evaluator, enricher and processor contracts — the engine's only
//! boundary with externally-supplied policy logic.

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::error;

use crate::request::AccessRequest;
use crate::result::AccessResult;
use crate::types::{AccessResource, Policy};

/// One policy's decision logic. Implementations are opaque to the engine:
/// resource-pattern matching, condition evaluation, and membership tests
/// are entirely up to the evaluator. Ordering among evaluators in a
/// repository is established once at construction time and never changes.
pub trait PolicyEvaluator: Send + Sync {
    /// Inspect `request` and, if this policy matches, set any of
    /// `result`'s decision fields (`is_allowed`, `is_access_determined`,
    /// `is_audited`, `is_audited_determined`, `policy_id`, `reason`).
    /// Evaluators that don't match leave `result` untouched.
    fn evaluate(&self, request: &AccessRequest, result: &mut AccessResult);

    /// Direct predicate used by the "which policies allow X" queries.
    /// Must not mutate any shared state.
    fn is_access_allowed(
        &self,
        resource: &AccessResource,
        user: &str,
        groups: &std::collections::HashSet<String>,
        access_type: &str,
    ) -> bool;

    /// True iff this policy covers exactly `resource` and nothing broader
    /// (used by `getExactMatchPolicy`).
    fn is_single_and_exact_match(&self, resource: &AccessResource) -> bool;

    /// True if this evaluator always terminates the per-tag loop after it
    /// runs, regardless of whether it left the result determined. Default
    /// `false` — most evaluators are not final deciders.
    fn is_final_decider(&self) -> bool {
        false
    }

    /// The underlying policy descriptor.
    fn policy(&self) -> &Policy;
}

/// A context enricher mutates a request's context map in place — tag
/// retrieval, user-attribute lookup, and similar total, side-effecting
/// lookups. Enrichers are expected not to fail; if one panics the engine
/// logs it and moves on to the next (see [`run_enricher`]).
pub trait ContextEnricher: Send + Sync {
    fn enrich(&self, request: &AccessRequest);
}

/// Invoked after a decision is made; a pure auditing side effect that must
/// never roll back or alter the decision already returned to the caller.
pub trait AccessResultProcessor: Send + Sync {
    fn process_result(&self, result: &AccessResult);

    fn process_results(&self, results: &[AccessResult]) {
        for result in results {
            self.process_result(result);
        }
    }
}

/// Invoke a possibly-misbehaving evaluator, catching panics so that one
/// buggy policy can't deny service to every other request. A caught panic
/// is logged and treated as "this evaluator produced no determination" —
/// `result` is left exactly as it was before the call.
pub fn run_evaluator(
    evaluator: &dyn PolicyEvaluator,
    request: &AccessRequest,
    result: &mut AccessResult,
) {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        evaluator.evaluate(request, result);
    }));
    if let Err(panic) = outcome {
        error!(
            policy_id = %evaluator.policy().id,
            panic = %panic_message(&panic),
            "policy evaluator panicked; continuing without its determination",
        );
    }
}

/// Invoke an enricher, catching panics so one failing enricher doesn't
/// abort the enrichment chain for the ones after it.
pub fn run_enricher(enricher: &dyn ContextEnricher, request: &AccessRequest) {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        enricher.enrich(request);
    }));
    if let Err(panic) = outcome {
        error!(
            panic = %panic_message(&panic),
            "context enricher panicked; continuing with the next enricher",
        );
    }
}

/// Invoke an evaluator's direct predicate (`isAccessAllowed`), catching a
/// panic the same way [`run_evaluator`] does so a misbehaving evaluator
/// can't silently masquerade as a legitimate `false` anywhere this predicate
/// is consulted (`PolicyEngine::is_access_allowed_direct`, and transitively
/// `PolicyEngine::allowed_policies`).
pub fn run_direct_predicate(
    evaluator: &dyn PolicyEvaluator,
    resource: &AccessResource,
    user: &str,
    groups: &std::collections::HashSet<String>,
    access_type: &str,
) -> bool {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        evaluator.is_access_allowed(resource, user, groups, access_type)
    }));
    match outcome {
        Ok(allowed) => allowed,
        Err(panic) => {
            error!(
                policy_id = %evaluator.policy().id,
                panic = %panic_message(&panic),
                "policy evaluator panicked in its direct predicate; treating as not allowed",
            );
            false
        }
    }
}

/// Invoke a result processor, catching panics — an audit failure must
/// never roll back or hide the decision already computed.
pub fn run_processor(processor: &dyn AccessResultProcessor, result: &AccessResult) {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        processor.process_result(result);
    }));
    if let Err(panic) = outcome {
        error!(
            panic = %panic_message(&panic),
            "access result processor panicked; decision already returned to caller",
        );
    }
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
