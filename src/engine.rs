//! The top-level orchestrator: context enrichment, the two-stage
//! tag-then-resource evaluation, combination, and audit-cache bookkeeping.

use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::audit::{TagAuditEvent, TagAuditSink};
use crate::config::{PolicyEngineOptions, ServicePolicies};
use crate::error::{AuthzError, Result};
use crate::evaluator::{
    run_direct_predicate, run_enricher, run_evaluator, run_processor, AccessResultProcessor, ContextEnricher,
};
use crate::repository::PolicyRepository;
use crate::request::{tag_access_request, AccessRequest};
use crate::result::AccessResult;
use crate::types::{AccessResource, Policy, ServiceDef};

/// The two-repository engine: one resource repository (required), one tag
/// repository (optional). Ownership is exclusive — a repository is never
/// shared across two engines — and everything here is immutable after
/// construction, so an `Arc<PolicyEngine>` can be shared across as many
/// threads as a host likes.
pub struct PolicyEngine {
    resource_repo: PolicyRepository,
    tag_repo: Option<PolicyRepository>,
    /// Tag enrichers first, then resource enrichers, so resource enrichers
    /// may observe tags a tag enricher placed in the context.
    enrichers: Vec<Arc<dyn ContextEnricher>>,
    options: PolicyEngineOptions,
    tag_audit_sink: Option<Arc<dyn TagAuditSink>>,
}

impl PolicyEngine {
    /// Build an engine from an already-built resource policy set (and,
    /// embedded in it, an optional already-built tag policy set). Fails
    /// outright on a malformed input — there is no partially-built engine.
    pub fn new(resource_policies: ServicePolicies, options: PolicyEngineOptions) -> Result<Self> {
        if resource_policies.service_name.trim().is_empty() {
            return Err(AuthzError::Configuration(
                "resource policies require a non-empty service name".to_string(),
            ));
        }

        let tag_policies = resource_policies.tag_policies;
        let mut enrichers = Vec::new();
        let mut tag_repo = None;

        if let Some(tags) = tag_policies {
            if tags.service_name.trim().is_empty() {
                return Err(AuthzError::Configuration(
                    "tag policies require a non-empty service name".to_string(),
                ));
            }
            enrichers.extend(tags.enrichers.iter().cloned());
            if !options.disable_tag_policy_evaluation {
                tag_repo = Some(PolicyRepository::new(
                    tags.service_name,
                    tags.service_def,
                    tags.policy_version,
                    tags.policies,
                    Vec::new(), // enrichers live on the engine's combined list
                    options.audit_cache_size,
                ));
            }
        }

        enrichers.extend(resource_policies.enrichers.iter().cloned());

        let resource_repo = PolicyRepository::new(
            resource_policies.service_name,
            resource_policies.service_def,
            resource_policies.policy_version,
            resource_policies.policies,
            Vec::new(),
            options.audit_cache_size,
        );

        Ok(Self {
            resource_repo,
            tag_repo,
            enrichers,
            options,
            tag_audit_sink: None,
        })
    }

    pub fn with_tag_audit_sink(mut self, sink: Arc<dyn TagAuditSink>) -> Self {
        self.tag_audit_sink = Some(sink);
        self
    }

    pub fn service_name(&self) -> &str {
        &self.resource_repo.service_name
    }

    pub fn service_def(&self) -> &Arc<ServiceDef> {
        &self.resource_repo.service_def
    }

    pub fn policy_version(&self) -> i64 {
        self.resource_repo.policy_version
    }

    pub fn create_access_result(&self, _request: &AccessRequest) -> AccessResult {
        AccessResult::new(
            self.resource_repo.service_name.clone(),
            Arc::clone(&self.resource_repo.service_def),
        )
    }

    /// Run every enricher, tag enrichers first, mutating `request.context`
    /// in place. A panicking enricher is caught, logged, and skipped —
    /// enrichers are expected to be total, but one bug shouldn't deny
    /// every request that follows it in the list.
    pub fn enrich_context(&self, request: &AccessRequest) {
        for enricher in &self.enrichers {
            run_enricher(enricher.as_ref(), request);
        }
    }

    pub fn enrich_context_batch(&self, requests: &[AccessRequest]) {
        for request in requests {
            self.enrich_context(request);
        }
    }

    /// The main entry point: tag stage, then resource stage, combined per
    /// the rules in the core spec.
    pub fn is_access_allowed(
        &self,
        request: &AccessRequest,
        processor: Option<&dyn AccessResultProcessor>,
    ) -> AccessResult {
        let mut result = self.create_access_result(request);

        // Step 2: tag stage. A determined access decision there wins
        // outright; a determined *audit* decision there is authoritative
        // even when access wasn't determined, and is applied after the
        // resource stage runs below.
        let mut authoritative_tag_audit: Option<(bool, bool)> = None;
        if let Some(tag_repo) = &self.tag_repo {
            let tag_result = self.evaluate_tag_policies(tag_repo, request);
            if tag_result.is_access_determined {
                if let Some(processor) = processor {
                    run_processor(processor, &tag_result);
                }
                return tag_result;
            }
            if tag_result.is_audited_determined {
                authoritative_tag_audit = Some((tag_result.is_audited, tag_result.is_audited_determined));
            }
        }

        // Step 3: resource stage.
        let resource = request.resource.clone();
        let cache_hit = self
            .resource_repo
            .set_audit_enabled_from_cache(&resource, &mut result);

        for evaluator in self.resource_repo.evaluators() {
            run_evaluator(evaluator.as_ref(), request, &mut result);
            if result.is_fully_determined() {
                break;
            }
        }

        if !cache_hit {
            self.resource_repo
                .store_audit_enabled_in_cache(&resource, &result);
        }

        if let Some((audited, determined)) = authoritative_tag_audit {
            result.is_audited = audited;
            result.is_audited_determined = determined;
        }

        if let Some(processor) = processor {
            run_processor(processor, &result);
        }

        result
    }

    /// Batch form: evaluate each request independently, then invoke the
    /// processor once with the full collection.
    pub fn is_access_allowed_batch(
        &self,
        requests: &[AccessRequest],
        processor: Option<&dyn AccessResultProcessor>,
    ) -> Vec<AccessResult> {
        let results: Vec<AccessResult> = requests.iter().map(|r| self.is_access_allowed(r, None)).collect();

        if let Some(processor) = processor {
            let outcome = catch_unwind(AssertUnwindSafe(|| processor.process_results(&results)));
            if outcome.is_err() {
                warn!("access result processor panicked while processing a batch; decisions already computed");
            }
        }

        results
    }

    /// Batch form tolerant of absent entries: a `None` request is skipped
    /// (left as `None` in the output) rather than evaluated.
    pub fn is_access_allowed_batch_optional(
        &self,
        requests: &[Option<AccessRequest>],
        processor: Option<&dyn AccessResultProcessor>,
    ) -> Vec<Option<AccessResult>> {
        let results: Vec<Option<AccessResult>> = requests
            .iter()
            .map(|request| request.as_ref().map(|r| self.is_access_allowed(r, None)))
            .collect();

        if let Some(processor) = processor {
            let present: Vec<AccessResult> = results.iter().flatten().cloned().collect();
            let outcome = catch_unwind(AssertUnwindSafe(|| processor.process_results(&present)));
            if outcome.is_err() {
                warn!("access result processor panicked while processing a batch; decisions already computed");
            }
        }

        results
    }

    /// Simple short-circuiting predicate: does *any* resource evaluator
    /// directly allow this (resource, user, groups, access_type) tuple?
    /// Does not consult tag policies and does not touch audit state.
    pub fn is_access_allowed_direct(
        &self,
        resource: &AccessResource,
        user: &str,
        groups: &HashSet<String>,
        access_type: &str,
    ) -> bool {
        self.resource_repo
            .evaluators()
            .iter()
            .any(|evaluator| run_direct_predicate(evaluator.as_ref(), resource, user, groups, access_type))
    }

    pub fn exact_match_policy(&self, resource: &AccessResource) -> Option<Policy> {
        self.resource_repo
            .evaluators()
            .iter()
            .find(|evaluator| evaluator.is_single_and_exact_match(resource))
            .map(|evaluator| evaluator.policy().clone())
    }

    /// For each resource evaluator, re-query its policy's own resource
    /// spec against the direct predicate; collect the policies that pass,
    /// in evaluator order.
    pub fn allowed_policies(&self, user: &str, groups: &HashSet<String>, access_type: &str) -> Vec<Policy> {
        self.resource_repo
            .evaluators()
            .iter()
            .filter_map(|evaluator| {
                let policy = evaluator.policy();
                if self.is_access_allowed_direct(&policy.resource, user, groups, access_type) {
                    Some(policy.clone())
                } else {
                    None
                }
            })
            .collect()
    }

    /// Evaluate the tag stage for one request: §4.2 of the core spec.
    /// Returns an undetermined result when there's no tag repository or
    /// the request carries no `CONTEXT_TAGS`.
    fn evaluate_tag_policies(&self, tag_repo: &PolicyRepository, request: &AccessRequest) -> AccessResult {
        let mut combined = AccessResult::new(
            tag_repo.service_name.clone(),
            Arc::clone(&tag_repo.service_def),
        );

        let Some(tags) = request.context_tags() else {
            return combined;
        };
        if tags.is_empty() {
            return combined;
        }

        let mut any_tag_allowed = false;
        let mut any_tag_denied = false;
        let mut any_tag_required_audit = false;
        let mut allowed_result: Option<AccessResult> = None;
        let mut denied_result: Option<AccessResult> = None;
        let mut events: Vec<TagAuditEvent> = Vec::new();

        for tag in &tags {
            let tag_request = tag_access_request(request, tag, &self.resource_repo.service_name);
            let mut tag_result = AccessResult::new(
                tag_repo.service_name.clone(),
                Arc::clone(&tag_repo.service_def),
            );

            for evaluator in tag_repo.evaluators() {
                run_evaluator(evaluator.as_ref(), &tag_request, &mut tag_result);
                if evaluator.is_final_decider() || tag_result.is_fully_determined() {
                    break;
                }
            }

            debug!(
                tag = %tag.name,
                allowed = tag_result.is_allowed,
                access_determined = tag_result.is_access_determined,
                "tag policy evaluated"
            );

            if tag_result.is_audited_determined {
                any_tag_required_audit = true;
                if tag_result.is_access_determined {
                    events.push(TagAuditEvent::new(tag.name.clone(), tag_result.clone()));
                }
            }

            if tag_result.is_access_determined {
                if tag_result.is_allowed {
                    any_tag_allowed = true;
                    allowed_result = Some(tag_result);
                } else {
                    any_tag_denied = true;
                    denied_result = Some(tag_result);
                }
            }
        }

        // Deny-overrides: a single determined deny beats any number of
        // allows, regardless of tag order.
        if any_tag_denied {
            combined.copy_from(denied_result.as_ref().expect("any_tag_denied implies denied_result"));
        } else if any_tag_allowed {
            combined.copy_from(allowed_result.as_ref().expect("any_tag_allowed implies allowed_result"));
        }

        if any_tag_required_audit {
            combined.is_audited = true;
            combined.is_audited_determined = true;
            TagAuditEvent::reduce(&mut events, any_tag_denied);
            if let Some(sink) = &self.tag_audit_sink {
                sink.collect(&events);
            }
        }

        combined
    }
}
