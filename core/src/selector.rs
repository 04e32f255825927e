//! Selector: immutable snapshot of "what is being invoked".
//!
//! A [`Selector`] is built once per invocation by the host runtime and then
//! only read. [`ResultSelector`] extends it with the value the action produced.

use crate::{ActionIdentity, ControllerDescriptor, ControllerIdentity};
use std::collections::HashMap;
use std::sync::Arc;

/// Request metadata visible to capability constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    method: String,
    headers: HashMap<String, String>,
}

impl RequestContext {
    /// Create a builder for `RequestContext`.
    #[must_use]
    pub fn builder() -> RequestContextBuilder {
        RequestContextBuilder::default()
    }

    /// The HTTP method (empty if the host did not supply one).
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Get a header value by name (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }
}

/// Builder for [`RequestContext`].
#[derive(Debug, Default)]
pub struct RequestContextBuilder {
    request: RequestContext,
}

impl RequestContextBuilder {
    /// Set the HTTP method.
    #[must_use]
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.request.method = method.into();
        self
    }

    /// Add a header (name is lowercased for case-insensitive lookup).
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request
            .headers
            .insert(name.into().to_lowercase(), value.into());
        self
    }

    /// Build the request context.
    #[must_use]
    pub fn build(self) -> RequestContext {
        self.request
    }
}

/// Snapshot of a single action invocation.
///
/// The action identity is always declared on the subject controller's own
/// identity, so a selector cannot name an action of some other controller.
#[derive(Debug, Clone)]
pub struct Selector {
    controller: ControllerDescriptor,
    action: ActionIdentity,
    request: RequestContext,
}

impl Selector {
    /// Create a selector for `action_name` invoked on `controller`.
    pub fn new(controller: impl Into<ControllerDescriptor>, action_name: impl Into<Arc<str>>) -> Self {
        let controller = controller.into();
        let action = ActionIdentity::new(controller.identity().clone(), action_name);
        Self {
            controller,
            action,
            request: RequestContext::default(),
        }
    }

    /// Attach request metadata (builder pattern).
    #[must_use]
    pub fn with_request(mut self, request: RequestContext) -> Self {
        self.request = request;
        self
    }

    /// The subject controller type.
    #[must_use]
    pub fn controller(&self) -> &ControllerDescriptor {
        &self.controller
    }

    /// The subject controller's identity.
    #[must_use]
    pub fn controller_identity(&self) -> &ControllerIdentity {
        self.controller.identity()
    }

    /// The invoked action.
    #[must_use]
    pub fn action(&self) -> &ActionIdentity {
        &self.action
    }

    /// Request metadata.
    #[must_use]
    pub fn request(&self) -> &RequestContext {
        &self.request
    }
}

/// The value an action returned.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnValue {
    value: serde_json::Value,
    type_name: Option<Arc<str>>,
}

impl ReturnValue {
    /// Wrap a produced value.
    #[must_use]
    pub fn new(value: serde_json::Value) -> Self {
        Self {
            value,
            type_name: None,
        }
    }

    /// Record the declared return type (builder pattern).
    #[must_use]
    pub fn with_type_name(mut self, type_name: impl Into<Arc<str>>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    /// The produced value.
    #[must_use]
    pub fn value(&self) -> &serde_json::Value {
        &self.value
    }

    /// The declared return type, if the host supplied one.
    #[must_use]
    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }
}

impl From<serde_json::Value> for ReturnValue {
    fn from(value: serde_json::Value) -> Self {
        Self::new(value)
    }
}

/// Selector for result resolution: the invocation plus its return value.
#[derive(Debug, Clone)]
pub struct ResultSelector {
    selector: Selector,
    return_value: ReturnValue,
}

impl ResultSelector {
    /// Create a result selector.
    pub fn new(selector: Selector, return_value: impl Into<ReturnValue>) -> Self {
        Self {
            selector,
            return_value: return_value.into(),
        }
    }

    /// The invocation this result belongs to.
    #[must_use]
    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    /// The value the action returned.
    #[must_use]
    pub fn return_value(&self) -> &ReturnValue {
        &self.return_value
    }
}

impl AsRef<Selector> for ResultSelector {
    fn as_ref(&self) -> &Selector {
        &self.selector
    }
}
