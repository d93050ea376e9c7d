//! Access requests and the tag-request adapter.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use crate::types::{AccessResource, ResourceTag};

/// Well-known context key under which the tag stage expects an ordered list
/// of [`ResourceTag`] (serialized as a JSON array) to have been placed by an
/// enricher.
pub const CONTEXT_TAGS: &str = "CONTEXT_TAGS";

/// Well-known context key set only on a synthetic tag request, holding the
/// single [`ResourceTag`] it was built from.
pub const CONTEXT_TAG_OBJECT: &str = "CONTEXT_TAG_OBJECT";

/// Context map shared by reference between an original request and any
/// tag requests derived from it (see `tag_access_request`).
pub type ContextMap = Arc<RwLock<HashMap<String, Value>>>;

/// An access request: who, what resource, what action, plus the mutable
/// context map enrichers attach derived facts to.
#[derive(Debug, Clone)]
pub struct AccessRequest {
    pub resource: AccessResource,
    pub user: String,
    pub user_groups: HashSet<String>,
    pub action: String,
    pub access_type: String,
    pub timestamp: u64,
    pub client_type: Option<String>,
    pub client_address: Option<String>,
    pub session_id: Option<String>,
    pub request_data: Option<String>,
    pub context: ContextMap,
}

impl AccessRequest {
    pub fn new(
        resource: AccessResource,
        user: impl Into<String>,
        user_groups: HashSet<String>,
        action: impl Into<String>,
        access_type: impl Into<String>,
    ) -> Self {
        Self {
            resource,
            user: user.into(),
            user_groups,
            action: action.into(),
            access_type: access_type.into(),
            timestamp: 0,
            client_type: None,
            client_address: None,
            session_id: None,
            request_data: None,
            context: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Read the ordered tag list an enricher placed under
    /// [`CONTEXT_TAGS`], if any.
    pub fn context_tags(&self) -> Option<Vec<ResourceTag>> {
        let ctx = self.context.read();
        let value = ctx.get(CONTEXT_TAGS)?;
        serde_json::from_value(value.clone()).ok()
    }

    /// Set the ordered tag list under [`CONTEXT_TAGS`]; used by context
    /// enrichers that derive tags for a resource.
    pub fn set_context_tags(&self, tags: &[ResourceTag]) {
        let mut ctx = self.context.write();
        ctx.insert(CONTEXT_TAGS.to_string(), serde_json::json!(tags));
    }
}

/// Build the synthetic per-tag request used to drive the tag policy stage
/// through the same [`crate::evaluator::PolicyEvaluator`] contract as
/// resource policies.
///
/// This is a constructor, not a subtype: primitive fields are copied, the
/// context map is reused by `Arc` clone (so a write through either request
/// is visible to the other), and the access-type string is namespaced by
/// `component_name` so the synthetic request can't collide with the
/// original resource's own action space.
pub fn tag_access_request(
    original: &AccessRequest,
    tag: &ResourceTag,
    component_name: &str,
) -> AccessRequest {
    let resource = AccessResource::single("tag", tag.name.clone());

    {
        let mut ctx = original.context.write();
        ctx.insert(
            CONTEXT_TAG_OBJECT.to_string(),
            serde_json::to_value(tag).unwrap_or(Value::Null),
        );
    }

    AccessRequest {
        resource,
        user: original.user.clone(),
        user_groups: original.user_groups.clone(),
        action: original.action.clone(),
        access_type: format!("{}:{}", component_name, original.access_type),
        timestamp: original.timestamp,
        client_type: original.client_type.clone(),
        client_address: original.client_address.clone(),
        session_id: original.session_id.clone(),
        request_data: original.request_data.clone(),
        context: Arc::clone(&original.context),
    }
}
