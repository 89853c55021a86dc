//! Resource types and the live instances their actions return.
//!
//! # Design
//! A [`ResourceType`] is the declared client: one URL template, default
//! parameters, a frozen [`ActionRegistry`] and a transport. Calling an action
//! returns a [`Resource`] immediately, in the `Pending` state, and spawns the
//! round-trip on the current tokio runtime. When the transport settles, the
//! same instance is updated in place and flipped to `Resolved`; only then does
//! the success or error callback run.
//!
//! A `Resource` is a handle: clones share one `tokio::sync::watch` cell, so
//! every holder observes the update, can `subscribe` to changes, and can
//! await [`Resource::settled`]. Identity is `Resource::ptr_eq`.
//!
//! The route and the action registry are shared read-only behind an `Arc`.
//! [`ResourceType::bind`] only swaps the default parameters.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::watch;

use crate::action::{
    extract_params, Action, ActionRegistry, ActionSpec, ParamDefault, ParamDefaults,
};
use crate::call::{resolve_instance_call, resolve_type_call, Arg, Callback, Outcome};
use crate::error::ApiError;
use crate::http::{parse_response, HttpRequest, Response};
use crate::template::{ParamValues, Template};
use crate::transport::HttpTransport;

/// Where an instance stands with respect to its latest call.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Built locally (or received as an element of a collection); no call of
    /// its own has been made.
    Detached,
    Pending,
    Resolved(Result<Response, ApiError>),
}

impl Resolution {
    pub fn outcome(&self) -> Option<&Result<Response, ApiError>> {
        match self {
            Resolution::Resolved(outcome) => Some(outcome),
            _ => None,
        }
    }
}

/// The data held by an instance.
#[derive(Debug, Clone)]
pub enum Content {
    Object(Map<String, Value>),
    /// Result of an array action, one instance per element.
    Collection(Vec<Resource>),
}

impl Content {
    fn to_value(&self) -> Value {
        match self {
            Content::Object(map) => Value::Object(map.clone()),
            Content::Collection(items) => Value::Array(items.iter().map(Resource::data).collect()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct State {
    pub content: Content,
    pub resolution: Resolution,
}

/// The value a settled call resolves to: the response plus the instance it
/// updated.
#[derive(Debug, Clone)]
pub struct Settled {
    pub response: Response,
    pub resource: Resource,
}

struct Shared {
    route: Template,
    actions: ActionRegistry,
    transport: Arc<dyn HttpTransport>,
}

/// A declared REST resource client.
#[derive(Clone)]
pub struct ResourceType {
    shared: Arc<Shared>,
    defaults: Arc<ParamDefaults>,
}

/// Declare a resource type from a URL template, default parameters and
/// action overrides.
pub fn create_resource_type(
    template: &str,
    defaults: ParamDefaults,
    actions: BTreeMap<String, ActionSpec>,
    transport: Arc<dyn HttpTransport>,
) -> ResourceType {
    ResourceType {
        shared: Arc::new(Shared {
            route: Template::compile(template),
            actions: ActionRegistry::new(&actions),
            transport,
        }),
        defaults: Arc::new(defaults),
    }
}

impl ResourceType {
    /// A resource type with the default actions and no default parameters.
    pub fn new(template: &str, transport: Arc<dyn HttpTransport>) -> Self {
        create_resource_type(template, ParamDefaults::new(), BTreeMap::new(), transport)
    }

    pub fn builder(template: &str, transport: Arc<dyn HttpTransport>) -> ResourceTypeBuilder {
        ResourceTypeBuilder {
            template: template.to_string(),
            defaults: ParamDefaults::new(),
            actions: BTreeMap::new(),
            transport,
        }
    }

    pub fn route(&self) -> &Template {
        &self.shared.route
    }

    pub fn defaults(&self) -> &ParamDefaults {
        &self.defaults
    }

    pub fn action(&self, name: &str) -> Result<&Action, ApiError> {
        self.shared
            .actions
            .get(name)
            .ok_or_else(|| ApiError::UnknownAction(name.to_string()))
    }

    pub fn action_names(&self) -> impl Iterator<Item = &str> {
        self.shared.actions.names()
    }

    /// A copy of this type whose defaults are overlaid with `extra`.
    ///
    /// Actions and the route are shared with `self`; only the defaults
    /// differ, and `self` is unaffected.
    pub fn bind(&self, extra: ParamDefaults) -> ResourceType {
        let mut defaults = (*self.defaults).clone();
        defaults.extend(extra);
        ResourceType {
            shared: self.shared.clone(),
            defaults: Arc::new(defaults),
        }
    }

    /// A detached instance holding `value`, typically to be sent with an
    /// instance-level `save`.
    pub fn instance(&self, value: Value) -> Resource {
        Resource::object(self.clone(), value, Resolution::Detached)
    }

    /// Shape the request an action would send, without sending it.
    pub fn build_request(
        &self,
        action: &str,
        params: &ParamValues,
        data: Option<&Value>,
    ) -> Result<HttpRequest, ApiError> {
        let action = self.action(action)?;
        Ok(self.request_for(action, params, data))
    }

    /// Invoke an action at type level with up to four positional arguments.
    pub fn call(
        &self,
        action: &str,
        args: impl IntoIterator<Item = Arg>,
    ) -> Result<Resource, ApiError> {
        let action = self.action(action)?;
        let call = resolve_type_call(args.into_iter().collect(), action.has_body)?;
        let target = if action.spec.is_array {
            let empty = Content::Collection(Vec::new());
            Resource::new(self.clone(), empty, Resolution::Pending)
        } else {
            let data = call.data.clone().unwrap_or(Value::Null);
            Resource::object(self.clone(), data, Resolution::Pending)
        };
        self.dispatch(
            action,
            &call.params,
            call.data,
            call.success,
            call.error,
            target,
        )
    }

    pub fn get(&self, args: impl IntoIterator<Item = Arg>) -> Result<Resource, ApiError> {
        self.call("get", args)
    }

    pub fn save(&self, args: impl IntoIterator<Item = Arg>) -> Result<Resource, ApiError> {
        self.call("save", args)
    }

    pub fn query(&self, args: impl IntoIterator<Item = Arg>) -> Result<Resource, ApiError> {
        self.call("query", args)
    }

    pub fn remove(&self, args: impl IntoIterator<Item = Arg>) -> Result<Resource, ApiError> {
        self.call("remove", args)
    }

    pub fn delete(&self, args: impl IntoIterator<Item = Arg>) -> Result<Resource, ApiError> {
        self.call("delete", args)
    }

    /// Type defaults resolved against an instance's data.
    fn params_from(&self, data: &Value) -> ParamValues {
        extract_params(&self.defaults, &ParamDefaults::new(), Some(data))
    }

    fn request_for(
        &self,
        action: &Action,
        params: &ParamValues,
        data: Option<&Value>,
    ) -> HttpRequest {
        let mut merged = extract_params(&self.defaults, &action.spec.params, data);
        merged.extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));

        let template = action.spec.url.as_ref().unwrap_or(&self.shared.route);
        let rendered = template.render(&merged);

        HttpRequest {
            method: action.spec.method,
            url: rendered.url,
            params: rendered.query,
            headers: action.spec.headers.clone(),
            data: data.cloned(),
        }
    }

    /// Send the request for `action` and settle `target` when it completes.
    fn dispatch(
        &self,
        action: &Action,
        params: &ParamValues,
        data: Option<Value>,
        success: Option<Callback>,
        error: Option<Callback>,
        target: Resource,
    ) -> Result<Resource, ApiError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ApiError::Runtime(e.to_string()))?;
        let request = self.request_for(action, params, data.as_ref());
        tracing::debug!(
            action = %action.name,
            method = %request.method,
            url = %request.url,
            "dispatching resource call"
        );

        target.cell.send_modify(|state| state.resolution = Resolution::Pending);

        let transport = self.shared.transport.clone();
        let is_array = action.spec.is_array;
        let resource = target.clone();
        runtime.spawn(async move {
            let outcome = match transport.send(request).await {
                Ok(raw) => parse_response(raw),
                Err(err) => Err(err),
            };
            resource.settle(outcome, is_array, success, error);
        });

        Ok(target)
    }
}

impl fmt::Debug for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceType")
            .field("template", &self.shared.route.source())
            .field("defaults", &self.defaults)
            .field("actions", &self.action_names().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder for [`ResourceType`].
pub struct ResourceTypeBuilder {
    template: String,
    defaults: ParamDefaults,
    actions: BTreeMap<String, ActionSpec>,
    transport: Arc<dyn HttpTransport>,
}

impl ResourceTypeBuilder {
    pub fn param(mut self, name: &str, default: impl Into<ParamDefault>) -> Self {
        self.defaults.insert(name.to_string(), default.into());
        self
    }

    pub fn action(mut self, name: &str, spec: ActionSpec) -> Self {
        self.actions.insert(name.to_string(), spec);
        self
    }

    pub fn build(self) -> ResourceType {
        create_resource_type(&self.template, self.defaults, self.actions, self.transport)
    }
}

/// A live, identity-stable resource instance.
#[derive(Clone)]
pub struct Resource {
    cell: Arc<watch::Sender<State>>,
    kind: ResourceType,
}

impl Resource {
    fn new(kind: ResourceType, content: Content, resolution: Resolution) -> Self {
        let (cell, _) = watch::channel(State {
            content,
            resolution,
        });
        Self {
            cell: Arc::new(cell),
            kind,
        }
    }

    fn object(kind: ResourceType, value: Value, resolution: Resolution) -> Self {
        let map = match value {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                tracing::debug!(%other, "non-object value does not populate a resource");
                Map::new()
            }
        };
        Self::new(kind, Content::Object(map), resolution)
    }

    pub fn ptr_eq(a: &Resource, b: &Resource) -> bool {
        Arc::ptr_eq(&a.cell, &b.cell)
    }

    pub fn resource_type(&self) -> &ResourceType {
        &self.kind
    }

    pub fn resolution(&self) -> Resolution {
        self.cell.borrow().resolution.clone()
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.cell.borrow().resolution, Resolution::Resolved(_))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.cell.borrow().resolution, Resolution::Pending)
    }

    pub fn is_collection(&self) -> bool {
        matches!(self.cell.borrow().content, Content::Collection(_))
    }

    /// Snapshot of the instance data as JSON.
    pub fn data(&self) -> Value {
        self.cell.borrow().content.to_value()
    }

    pub fn get(&self, field: &str) -> Option<Value> {
        match &self.cell.borrow().content {
            Content::Object(map) => map.get(field).cloned(),
            Content::Collection(_) => None,
        }
    }

    /// Set a field of an object instance. Collections have no fields; the
    /// call is ignored for them.
    pub fn set(&self, field: &str, value: impl Into<Value>) {
        let value = value.into();
        self.cell.send_if_modified(|state| match &mut state.content {
            Content::Object(map) => {
                map.insert(field.to_string(), value);
                true
            }
            Content::Collection(_) => {
                tracing::warn!(field, "cannot set a field on a collection");
                false
            }
        });
    }

    pub fn remove_field(&self, field: &str) -> Option<Value> {
        let mut removed = None;
        self.cell.send_if_modified(|state| match &mut state.content {
            Content::Object(map) => {
                removed = map.remove(field);
                removed.is_some()
            }
            Content::Collection(_) => false,
        });
        removed
    }

    /// Elements of a collection instance; empty for objects.
    pub fn items(&self) -> Vec<Resource> {
        match &self.cell.borrow().content {
            Content::Collection(items) => items.clone(),
            Content::Object(_) => Vec::new(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<State> {
        self.cell.subscribe()
    }

    /// Wait until the latest call on this instance settles.
    ///
    /// Resolves to the response with a back-reference to this instance, or
    /// to the error the call failed with. An instance that is already
    /// resolved answers immediately, and a detached one fails immediately
    /// with [`ApiError::NotDispatched`].
    pub async fn settled(&self) -> Result<Settled, ApiError> {
        let mut rx = self.cell.subscribe();
        loop {
            let current = match &rx.borrow_and_update().resolution {
                Resolution::Detached => return Err(ApiError::NotDispatched),
                Resolution::Pending => None,
                Resolution::Resolved(outcome) => Some(outcome.clone()),
            };
            if let Some(outcome) = current {
                return outcome.map(|response| Settled {
                    response,
                    resource: self.clone(),
                });
            }
            rx.changed()
                .await
                .map_err(|e| ApiError::Runtime(e.to_string()))?;
        }
    }

    /// Invoke an action on this instance with up to three positional
    /// arguments (`params, success, error`).
    ///
    /// Without explicit params the instance derives them from its own data
    /// through the type's defaults. Body actions send the instance data.
    pub fn invoke(
        &self,
        action: &str,
        args: impl IntoIterator<Item = Arg>,
    ) -> Result<Resource, ApiError> {
        let action = self.kind.action(action)?;
        let call = resolve_instance_call(args.into_iter().collect())?;
        let snapshot = self.data();
        let params = match call.params {
            Some(params) => params,
            None => self.kind.params_from(&snapshot),
        };
        let data = action.has_body.then_some(snapshot);
        self.kind.dispatch(
            action,
            &params,
            data,
            call.success,
            call.error,
            self.clone(),
        )
    }

    fn settle(
        &self,
        outcome: Result<Response, ApiError>,
        is_array: bool,
        success: Option<Callback>,
        error: Option<Callback>,
    ) {
        match outcome {
            Ok(response) => {
                self.cell.send_modify(|state| {
                    apply_response(&self.kind, &mut state.content, &response.data, is_array);
                    state.resolution = Resolution::Resolved(Ok(response.clone()));
                });
                tracing::debug!(status = response.status, "resource call resolved");
                if let Some(callback) = success {
                    callback.invoke(Outcome::Success {
                        resource: self,
                        response: &response,
                    });
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "resource call failed");
                let resolution = Resolution::Resolved(Err(err.clone()));
                self.cell.send_modify(|state| state.resolution = resolution);
                if let Some(callback) = error {
                    callback.invoke(Outcome::Failure(&err));
                }
            }
        }
    }
}

/// Copy a successful response into an instance's content in place.
fn apply_response(kind: &ResourceType, content: &mut Content, data: &Value, is_array: bool) {
    match (data, is_array) {
        (Value::Null, _) => {}
        (Value::Array(elements), true) => {
            let items = elements
                .iter()
                .map(|element| {
                    Resource::object(kind.clone(), element.clone(), Resolution::Detached)
                })
                .collect();
            *content = Content::Collection(items);
        }
        (Value::Object(fields), false) => *content = Content::Object(fields.clone()),
        (other, _) => {
            tracing::warn!(
                is_array,
                %other,
                "response shape does not match the action; instance left unchanged"
            );
        }
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.cell.borrow();
        f.debug_struct("Resource")
            .field("content", &state.content)
            .field("resolution", &state.resolution)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;
    use crate::mock::MockTransport;
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    fn users(mock: &MockTransport) -> ResourceType {
        ResourceType::builder("/users/:id", Arc::new(mock.clone()))
            .param("id", ParamDefault::field(|d| d.get("id").cloned()))
            .action("update", ActionSpec::new(HttpMethod::Put))
            .build()
    }

    fn params(value: Value) -> ParamValues {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn build_request_renders_url_and_query() {
        let mock = MockTransport::new();
        let req = users(&mock)
            .build_request("get", &params(json!({"id": 42, "verbose": true})), None)
            .unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "/users/42");
        assert_eq!(req.params, params(json!({"verbose": true})));
        assert!(req.data.is_none());
    }

    #[test]
    fn build_request_reads_field_defaults_from_data() {
        let mock = MockTransport::new();
        let data = json!({"id": 7, "name": "ada"});
        let req = users(&mock)
            .build_request("save", &ParamValues::new(), Some(&data))
            .unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "/users/7");
        assert_eq!(req.data, Some(data));
    }

    #[test]
    fn action_url_override_and_headers() {
        let mock = MockTransport::new();
        let kind = ResourceType::builder("/users/:id", Arc::new(mock))
            .action(
                "search",
                ActionSpec::new(HttpMethod::Get)
                    .url("/search/:term")
                    .array()
                    .header("Accept", "application/json"),
            )
            .build();
        let req = kind
            .build_request("search", &params(json!({"term": "a b", "limit": 5})), None)
            .unwrap();
        assert_eq!(req.url, "/search/a%20b");
        assert_eq!(req.full_url(), "/search/a%20b?limit=5");
        assert_eq!(
            req.headers,
            vec![("Accept".to_string(), "application/json".to_string())]
        );
    }

    #[test]
    fn unknown_action_is_an_error() {
        let mock = MockTransport::new();
        let err = users(&mock)
            .build_request("frobnicate", &ParamValues::new(), None)
            .unwrap_err();
        assert_eq!(err, ApiError::UnknownAction("frobnicate".to_string()));
    }

    #[test]
    fn call_without_runtime_fails_synchronously() {
        let mock = MockTransport::new();
        let err = users(&mock).get([json!({"id": 1}).into()]).unwrap_err();
        assert!(matches!(err, ApiError::Runtime(_)));
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn get_starts_pending_then_resolves_in_place() {
        let mock = MockTransport::new();
        let body = json!({"id": 1, "name": "ada"});
        mock.respond(HttpMethod::Get, "/users/1", 200, body);

        let user = users(&mock).get([json!({"id": 1}).into()]).unwrap();
        let observer = user.clone();
        assert!(user.is_pending());
        assert_eq!(user.data(), json!({}));

        let settled = user.settled().await.unwrap();
        assert!(Resource::ptr_eq(&settled.resource, &observer));
        assert!(observer.is_resolved());
        assert_eq!(observer.data(), json!({"id": 1, "name": "ada"}));
        assert_eq!(settled.response.status, 200);
    }

    #[tokio::test]
    async fn response_replaces_previous_fields() {
        let mock = MockTransport::new();
        let created = json!({"id": 5, "name": "ada"});
        mock.respond(HttpMethod::Post, "/users", 201, created);

        let draft = json!({"name": "ada", "draft": true});
        let user = users(&mock).save([draft.clone().into()]).unwrap();
        assert_eq!(user.get("draft"), Some(json!(true)));

        user.settled().await.unwrap();
        assert_eq!(user.data(), json!({"id": 5, "name": "ada"}));
        assert_eq!(mock.requests()[0].data, Some(draft));
    }

    #[tokio::test]
    async fn query_builds_one_instance_per_element_in_order() {
        let mock = MockTransport::new();
        let rows = json!([{"id": 1}, {"id": 2}, {"id": 3}]);
        mock.respond(HttpMethod::Get, "/users", 200, rows);

        let list = users(&mock).query([]).unwrap();
        assert!(list.is_collection());
        assert!(list.items().is_empty());

        list.settled().await.unwrap();
        let items = list.items();
        assert_eq!(items.len(), 3);
        let ids: Vec<Value> = items.iter().map(|item| item.get("id").unwrap()).collect();
        assert_eq!(ids, [json!(1), json!(2), json!(3)]);
        assert_eq!(items[0].resolution(), Resolution::Detached);
    }

    #[tokio::test]
    async fn requery_replaces_the_sequence() {
        let mock = MockTransport::new();
        mock.respond(HttpMethod::Get, "/users", 200, json!([{"id": 1}]));
        let kind = users(&mock);

        let list = kind.query([]).unwrap();
        list.settled().await.unwrap();
        assert_eq!(list.items().len(), 1);

        mock.respond(HttpMethod::Get, "/users", 200, json!([{"id": 1}, {"id": 2}]));
        list.invoke("query", []).unwrap();
        list.settled().await.unwrap();
        assert_eq!(list.items().len(), 2);
    }

    #[tokio::test]
    async fn detached_instances_do_not_wait() {
        let mock = MockTransport::new();
        mock.respond(HttpMethod::Get, "/users", 200, json!([{"id": 1}]));
        let kind = users(&mock);

        let local = kind.instance(json!({"id": 1}));
        let waited = tokio::time::timeout(Duration::from_millis(500), local.settled()).await;
        assert_eq!(waited.unwrap().unwrap_err(), ApiError::NotDispatched);

        let list = kind.query([]).unwrap();
        list.settled().await.unwrap();
        let element = list.items()[0].clone();
        let waited = tokio::time::timeout(Duration::from_millis(500), element.settled()).await;
        assert!(matches!(waited, Ok(Err(ApiError::NotDispatched))));
    }

    #[tokio::test]
    async fn failure_still_resolves_and_keeps_data() {
        let mock = MockTransport::new();
        mock.respond(HttpMethod::Get, "/users/9", 500, json!({"error": "boom"}));
        let handle: Arc<Mutex<Option<Resource>>> = Arc::default();
        let seen = Arc::new(Mutex::new(None));
        let (slot, sink) = (handle.clone(), seen.clone());

        let on_error = Callback::on_error(move |err| {
            let resolved = slot.lock().unwrap().as_ref().map(Resource::is_resolved);
            *sink.lock().unwrap() = Some((resolved, err.clone()));
        });
        let user = users(&mock)
            .get([
                json!({"id": 9}).into(),
                Callback::on_success(|_, _| panic!("success must not run")).into(),
                on_error.into(),
            ])
            .unwrap();
        *handle.lock().unwrap() = Some(user.clone());

        let err = user.settled().await.unwrap_err();
        assert!(matches!(err, ApiError::HttpError { status: 500, .. }));
        assert!(user.is_resolved());
        assert_eq!(user.data(), json!({}));
        assert_eq!(*seen.lock().unwrap(), Some((Some(true), err)));
    }

    #[tokio::test]
    async fn transport_failure_reaches_error_callback() {
        let mock = MockTransport::new();
        let refused = ApiError::Transport("connection refused".into());
        mock.fail(HttpMethod::Delete, "/users/3", refused);
        let seen = Arc::new(Mutex::new(false));
        let sink = seen.clone();

        let result = users(&mock)
            .remove([
                json!({"id": 3}).into(),
                Callback::on_success(|_, _| {}).into(),
                Callback::on_error(move |_| *sink.lock().unwrap() = true).into(),
            ])
            .unwrap();
        assert!(matches!(result.settled().await, Err(ApiError::Transport(_))));
        assert!(*seen.lock().unwrap());
    }

    #[tokio::test]
    async fn success_callback_sees_mutated_resolved_instance() {
        let mock = MockTransport::new();
        let body = json!({"id": 1, "name": "ada"});
        mock.respond(HttpMethod::Get, "/users/1", 200, body);
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();

        let user = users(&mock)
            .get([
                json!({"id": 1}).into(),
                Callback::on_success(move |resource, _| {
                    *sink.lock().unwrap() = Some((resource.is_resolved(), resource.get("name")));
                })
                .into(),
            ])
            .unwrap();
        user.settled().await.unwrap();
        tokio::task::yield_now().await;

        assert_eq!(*seen.lock().unwrap(), Some((true, Some(json!("ada")))));
    }

    #[tokio::test]
    async fn instance_save_sends_own_data_and_derives_params() {
        let mock = MockTransport::new();
        let updated = json!({"id": 4, "name": "grace", "v": 2});
        mock.respond(HttpMethod::Put, "/users/4", 200, updated);
        let kind = users(&mock);

        let user = kind.instance(json!({"id": 4, "name": "ada"}));
        assert_eq!(user.resolution(), Resolution::Detached);
        user.set("name", "grace");

        let same = user.invoke("update", []).unwrap();
        assert!(Resource::ptr_eq(&same, &user));
        assert!(user.is_pending());
        user.settled().await.unwrap();

        let sent = &mock.requests()[0];
        assert_eq!(sent.url, "/users/4");
        assert_eq!(sent.data, Some(json!({"id": 4, "name": "grace"})));
        assert_eq!(user.get("v"), Some(json!(2)));
    }

    #[tokio::test]
    async fn instance_delete_sends_no_body() {
        let mock = MockTransport::new();
        mock.respond(HttpMethod::Delete, "/users/4", 204, Value::Null);

        let user = users(&mock).instance(json!({"id": 4}));
        user.invoke("delete", []).unwrap();
        user.settled().await.unwrap();

        let sent = &mock.requests()[0];
        assert_eq!(sent.method, HttpMethod::Delete);
        assert!(sent.data.is_none());
        assert_eq!(user.data(), json!({"id": 4}));
    }

    #[tokio::test]
    async fn instance_call_with_explicit_params() {
        let mock = MockTransport::new();
        mock.respond(HttpMethod::Get, "/users/8", 200, json!({"id": 8}));

        let user = users(&mock).instance(json!({"id": 4}));
        user.invoke("get", [json!({"id": 8}).into()]).unwrap();
        user.settled().await.unwrap();
        assert_eq!(user.get("id"), Some(json!(8)));
    }

    #[tokio::test]
    async fn too_many_arguments_fail_before_dispatch() {
        let mock = MockTransport::new();
        let kind = users(&mock);
        let args: Vec<Arg> = (0..5).map(|_| Value::Null.into()).collect();
        let err = kind.get(args).unwrap_err();
        assert_eq!(
            err,
            ApiError::InvalidArgumentCount {
                received: 5,
                max: 4
            }
        );

        let user = kind.instance(json!({"id": 1}));
        let args: Vec<Arg> = (0..4).map(|_| Value::Null.into()).collect();
        assert!(user.invoke("get", args).is_err());
        assert_eq!(user.resolution(), Resolution::Detached);
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn lazy_defaults_are_evaluated_per_request() {
        let mock = MockTransport::new();
        let counter = Arc::new(AtomicU64::new(0));
        let next = counter.clone();
        let page = ParamDefault::lazy(move || json!(next.fetch_add(1, Ordering::SeqCst) + 1));
        let kind = ResourceType::builder("/pages/:page", Arc::new(mock.clone()))
            .param("page", page)
            .build();

        kind.get([]).unwrap().settled().await.unwrap_err();
        kind.get([]).unwrap().settled().await.unwrap_err();
        let urls: Vec<String> = mock.requests().into_iter().map(|r| r.url).collect();
        assert_eq!(urls, ["/pages/1", "/pages/2"]);

        let req = kind
            .build_request("get", &ParamValues::new(), None)
            .unwrap();
        assert_eq!(req.url, "/pages/3");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn bind_adds_defaults_without_touching_the_parent() {
        let mock = MockTransport::new();
        let kind = ResourceType::new("/:tenant/users/:id", Arc::new(mock.clone()));
        let tenant = ParamDefaults::from([("tenant".to_string(), ParamDefault::from("x"))]);
        let bound = kind.bind(tenant);

        let explicit = kind
            .build_request("get", &params(json!({"tenant": "x", "id": 1})), None)
            .unwrap();
        let implicit = bound
            .build_request("get", &params(json!({"id": 1})), None)
            .unwrap();
        assert_eq!(explicit.url, "/x/users/1");
        assert_eq!(implicit.url, explicit.url);

        let parent = kind
            .build_request("get", &params(json!({"id": 1})), None)
            .unwrap();
        assert_eq!(parent.url, "/users/1");
        assert!(bound.defaults().contains_key("tenant"));
        assert!(kind.defaults().is_empty());
    }

    #[tokio::test]
    async fn subscribers_observe_resolution() {
        let mock = MockTransport::new();
        mock.respond(HttpMethod::Get, "/users/2", 200, json!({"id": 2}));

        let user = users(&mock).get([json!({"id": 2}).into()]).unwrap();
        let mut rx = user.subscribe();
        rx.wait_for(|state| matches!(state.resolution, Resolution::Resolved(_)))
            .await
            .unwrap();
        assert_eq!(user.get("id"), Some(json!(2)));
    }
}
