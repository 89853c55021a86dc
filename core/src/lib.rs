//! Declarative REST resource clients.
//!
//! # Overview
//! A [`ResourceType`] is declared from a URL template such as
//! `/users/:id/:format`, default parameters, and named actions. Calling an
//! action returns a [`Resource`] right away; the instance is filled in place
//! when the HTTP round-trip completes.
//!
//! # Design
//! - `template` and `encoding` turn parameters into a URL; leftover
//!   parameters become the query string.
//! - `call` maps positional arguments onto params, body and callbacks once,
//!   before anything is sent.
//! - `http` describes requests and responses as plain data; an
//!   [`HttpTransport`] does the I/O (host-does-IO), so everything up to the
//!   transport is deterministic and testable without a network.
//! - `resource` owns the instance state machine
//!   (`Detached`/`Pending`/`Resolved`).

pub mod action;
pub mod call;
pub mod encoding;
pub mod error;
pub mod http;
pub mod mock;
pub mod resource;
pub mod template;
pub mod transport;

pub use action::{ActionSpec, ParamDefault, ParamDefaults};
pub use call::{Arg, Callback, Outcome};
pub use encoding::{encode_uri_query, encode_uri_segment, SpaceEncoding};
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse, Response};
pub use mock::MockTransport;
pub use resource::{create_resource_type, Resolution, Resource, ResourceType, Settled};
pub use template::{ParamValues, Template};
pub use transport::{HttpTransport, UreqTransport};
