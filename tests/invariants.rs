//! Property- and example-based coverage for the nine decision invariants.

mod common;

use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use proptest::prelude::*;

use authz_engine::testkit::GlobPolicyEvaluator;
use authz_engine::{
    AccessRequest, AccessResource, Policy, PolicyEngine, PolicyEngineOptions, ResourceTag,
    ServiceDef, ServicePolicies, TagServicePolicies,
};

use common::{allow, deny, CountingEvaluator};

fn service_def(name: &str) -> Arc<ServiceDef> {
    Arc::new(ServiceDef::new(name, vec!["db".into(), "table".into()]))
}

fn resource_only(evaluators: Vec<Arc<dyn authz_engine::PolicyEvaluator>>) -> ServicePolicies {
    ServicePolicies {
        service_name: "hive".to_string(),
        service_def: service_def("hive"),
        policy_version: 1,
        policies: evaluators,
        enrichers: vec![],
        tag_policies: None,
    }
}

fn with_tags(
    mut policies: ServicePolicies,
    tag_evaluators: Vec<Arc<dyn authz_engine::PolicyEvaluator>>,
) -> ServicePolicies {
    policies.tag_policies = Some(TagServicePolicies {
        service_name: "hive-tags".to_string(),
        service_def: service_def("hive-tags"),
        policy_version: 1,
        policies: tag_evaluators,
        enrichers: vec![],
    });
    policies
}

fn request(user: &str, action: &str) -> AccessRequest {
    AccessRequest::new(AccessResource::single("db", "sales"), user, HashSet::new(), action, action)
}

/// Invariant 1: determinism. Repeated calls against the same engine and
/// request produce identical decision fields.
#[test]
fn determinism_repeated_calls_are_identical() {
    proptest!(|(user in "[a-z]{3,8}", action in "read|write|delete")| {
        let engine = PolicyEngine::new(
            resource_only(vec![Arc::new(allow("p1", AccessResource::single("db", "sales"), "*"))]),
            PolicyEngineOptions::default(),
        )
        .unwrap();

        let req = request(&user, &action);
        let first = engine.is_access_allowed(&req, None);
        let second = engine.is_access_allowed(&req, None);

        prop_assert_eq!(first.is_allowed, second.is_allowed);
        prop_assert_eq!(first.is_access_determined, second.is_access_determined);
        prop_assert_eq!(first.is_audited, second.is_audited);
        prop_assert_eq!(first.is_audited_determined, second.is_audited_determined);
        prop_assert_eq!(first.policy_id, second.policy_id);
    });
}

/// Invariant 2: tag precedence. A tag-stage-determined result wins
/// outright, byte-for-byte (field-for-field), and the resource stage is
/// never consulted.
#[test]
fn tag_precedence_short_circuits_resource_stage_entirely() {
    let tag_deny: Arc<dyn authz_engine::PolicyEvaluator> =
        Arc::new(deny("E1", AccessResource::single("tag", "PII"), "hive:read").with_audit(true));

    let (resource_counter, calls) = CountingEvaluator::new(allow(
        "E2",
        AccessResource::single("db", "sales"),
        "read",
    ));

    let policies = with_tags(resource_only(vec![resource_counter]), vec![tag_deny]);
    let engine = PolicyEngine::new(policies, PolicyEngineOptions::default()).unwrap();

    let req = request("alice", "read");
    req.set_context_tags(&[ResourceTag::new("PII")]);

    let result = engine.is_access_allowed(&req, None);

    assert!(!result.is_allowed);
    assert_eq!(result.policy_id.as_deref(), Some("E1"));
    assert_eq!(calls.load(Ordering::SeqCst), 0, "resource stage must not run once the tag stage determined access");
}

/// Invariant 3: deny-overrides. Any number of allowing tags cannot beat a
/// single determined deny.
#[test]
fn deny_overrides_any_number_of_allows() {
    proptest!(|(allow_count in 0usize..6)| {
        let mut tag_evaluators: Vec<Arc<dyn authz_engine::PolicyEvaluator>> = Vec::new();
        for i in 0..allow_count {
            tag_evaluators.push(Arc::new(allow(
                &format!("allow-{i}"),
                AccessResource::single("tag", format!("TAG{i}")),
                "hive:read",
            )));
        }
        tag_evaluators.push(Arc::new(
            deny("E1", AccessResource::single("tag", "PII"), "hive:read").with_audit(true),
        ));

        let policies = with_tags(
            resource_only(vec![Arc::new(allow("E2", AccessResource::single("db", "sales"), "read"))]),
            tag_evaluators,
        );
        let engine = PolicyEngine::new(policies, PolicyEngineOptions::default()).unwrap();

        let mut tags: Vec<ResourceTag> = (0..allow_count).map(|i| ResourceTag::new(format!("TAG{i}"))).collect();
        tags.push(ResourceTag::new("PII"));

        let req = request("alice", "read");
        req.set_context_tags(&tags);

        let result = engine.is_access_allowed(&req, None);
        prop_assert!(!result.is_allowed);
    });
}

/// Invariant 4: audit monotonicity. If any tag sets `isAuditedDetermined`,
/// the combined result's `isAudited` is true, even when no tag determines
/// access.
#[test]
fn audit_monotonicity_survives_undetermined_access() {
    let audit_only: Arc<dyn authz_engine::PolicyEvaluator> =
        Arc::new(authz_engine::testkit::AuditOnlyEvaluator::new(Policy::new(
            "AE-tag",
            "tag audit",
            AccessResource::default(),
        )));

    let policies = with_tags(
        resource_only(vec![Arc::new(allow("E2", AccessResource::single("db", "sales"), "read"))]),
        vec![audit_only],
    );
    let engine = PolicyEngine::new(policies, PolicyEngineOptions::default()).unwrap();

    let req = request("alice", "read");
    req.set_context_tags(&[ResourceTag::new("ANY")]);

    let result = engine.is_access_allowed(&req, None);

    assert!(result.is_allowed, "tag stage never determined access, so the resource stage should still decide");
    assert!(result.is_audited, "the tag stage's determined audit flag must carry through");
}

/// Invariant 5: audit-event pruning. After reduction with a denied final
/// verdict, no retained event allowed access.
#[test]
fn audit_event_pruning_drops_allow_events_on_deny() {
    use authz_engine::{TagAuditEvent, TagAuditSink};
    use std::sync::Mutex;

    struct CapturingSink(Mutex<Vec<TagAuditEvent>>);
    impl TagAuditSink for CapturingSink {
        fn collect(&self, events: &[TagAuditEvent]) {
            self.0.lock().unwrap().extend_from_slice(events);
        }
    }

    let allow_tag: Arc<dyn authz_engine::PolicyEvaluator> =
        Arc::new(allow("allow-pub", AccessResource::single("tag", "PUBLIC"), "hive:read").with_audit(true));
    let deny_tag: Arc<dyn authz_engine::PolicyEvaluator> =
        Arc::new(deny("E1", AccessResource::single("tag", "PII"), "hive:read").with_audit(true));

    let sink = Arc::new(CapturingSink(Mutex::new(Vec::new())));
    let policies = with_tags(
        resource_only(vec![Arc::new(allow("E2", AccessResource::single("db", "sales"), "read"))]),
        vec![allow_tag, deny_tag],
    );
    let engine = PolicyEngine::new(policies, PolicyEngineOptions::default())
        .unwrap()
        .with_tag_audit_sink(sink.clone() as Arc<dyn TagAuditSink>);

    let req = request("alice", "read");
    req.set_context_tags(&[ResourceTag::new("PUBLIC"), ResourceTag::new("PII")]);

    engine.is_access_allowed(&req, None);

    let captured = sink.0.lock().unwrap();
    assert!(captured.iter().all(|event| !event.result.is_allowed));
}

/// Invariant 6: cache transparency. A size-0 (disabled) audit cache
/// produces exactly the same decision fields as an enabled one.
#[test]
fn cache_transparency_disabled_cache_matches_enabled() {
    fn build(cache_size: usize) -> PolicyEngine {
        let policies = resource_only(vec![
            Arc::new(allow("E2", AccessResource::single("db", "sales"), "read")),
            Arc::new(authz_engine::testkit::AuditOnlyEvaluator::new(Policy::new(
                "AE",
                "audit all",
                AccessResource::default(),
            ))),
        ]);
        PolicyEngine::new(
            policies,
            PolicyEngineOptions {
                audit_cache_size: cache_size,
                ..Default::default()
            },
        )
        .unwrap()
    }

    let req = request("alice", "read");
    let disabled = build(0).is_access_allowed(&req, None);
    let enabled = build(128).is_access_allowed(&req, None);

    assert_eq!(disabled.is_allowed, enabled.is_allowed);
    assert_eq!(disabled.is_access_determined, enabled.is_access_determined);
    assert_eq!(disabled.is_audited, enabled.is_audited);
    assert_eq!(disabled.is_audited_determined, enabled.is_audited_determined);
    assert_eq!(disabled.policy_id, enabled.policy_id);
}

/// Invariant 7: final-decider. An evaluator reporting `isFinalDecider`
/// stops the per-tag loop even though it left the tag result undetermined.
#[test]
fn final_decider_stops_subsequent_tag_evaluators() {
    let final_decider: Arc<dyn authz_engine::PolicyEvaluator> = Arc::new(
        GlobPolicyEvaluator::new(
            Policy::new("halts", "final but undetermined", AccessResource::single("tag", "WONT_MATCH")),
            "hive:read",
            "read",
            true,
        )
        .with_final_decider(true),
    );

    let (counted_next, calls) = CountingEvaluator::new(deny("never-reached", AccessResource::single("tag", "PII"), "hive:read"));

    let policies = with_tags(
        resource_only(vec![Arc::new(allow("E2", AccessResource::single("db", "sales"), "read"))]),
        vec![final_decider, counted_next],
    );
    let engine = PolicyEngine::new(policies, PolicyEngineOptions::default()).unwrap();

    let req = request("alice", "read");
    req.set_context_tags(&[ResourceTag::new("PII")]);

    engine.is_access_allowed(&req, None);

    assert_eq!(calls.load(Ordering::SeqCst), 0, "a final decider must stop the tag's evaluator loop even without a determination");
}

/// Invariant 8: short-circuit. In the resource stage, once both the
/// access and audit decisions are determined, no later evaluator runs.
#[test]
fn short_circuit_stops_resource_stage_once_fully_determined() {
    let deciding: Arc<dyn authz_engine::PolicyEvaluator> =
        Arc::new(allow("E2", AccessResource::single("db", "sales"), "read").with_audit(true));

    let (never_reached, calls) = CountingEvaluator::new(deny("should-not-run", AccessResource::single("db", "sales"), "read"));

    let policies = resource_only(vec![deciding, never_reached]);
    let engine = PolicyEngine::new(policies, PolicyEngineOptions::default()).unwrap();

    let req = request("alice", "read");
    engine.is_access_allowed(&req, None);

    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

/// Invariant 9: context sharing. The tag-synthesised request and the
/// original request share the same mutable context map, end to end
/// through a full `isAccessAllowed` call.
#[test]
fn context_sharing_visible_through_full_pipeline() {
    struct ContextWritingEvaluator {
        policy: Policy,
    }
    impl authz_engine::PolicyEvaluator for ContextWritingEvaluator {
        fn evaluate(&self, request: &AccessRequest, _result: &mut authz_engine::AccessResult) {
            request
                .context
                .write()
                .insert("tag_stage_marker".to_string(), serde_json::json!(true));
        }
        fn is_access_allowed(
            &self,
            _resource: &AccessResource,
            _user: &str,
            _groups: &HashSet<String>,
            _access_type: &str,
        ) -> bool {
            false
        }
        fn is_single_and_exact_match(&self, _resource: &AccessResource) -> bool {
            false
        }
        fn policy(&self) -> &Policy {
            &self.policy
        }
    }

    let writer: Arc<dyn authz_engine::PolicyEvaluator> = Arc::new(ContextWritingEvaluator {
        policy: Policy::new("writer", "writes a context marker", AccessResource::default()),
    });

    let policies = with_tags(
        resource_only(vec![Arc::new(allow("E2", AccessResource::single("db", "sales"), "read"))]),
        vec![writer],
    );
    let engine = PolicyEngine::new(policies, PolicyEngineOptions::default()).unwrap();

    let req = request("alice", "read");
    req.set_context_tags(&[ResourceTag::new("ANY")]);

    engine.is_access_allowed(&req, None);

    assert_eq!(
        req.context.read().get("tag_stage_marker"),
        Some(&serde_json::json!(true)),
        "a write made through the synthetic tag request must be visible on the original"
    );
}
