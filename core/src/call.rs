//! Positional call arguments and their resolution into a call.
//!
//! # Design
//! An action accepts up to four positional arguments whose meaning depends
//! only on how many there are and which of them are callbacks. Resolution
//! happens once, up front, producing a [`ResolvedCall`]; nothing downstream
//! looks at positions again.
//!
//! Type-level calls:
//!
//! | args | interpretation |
//! |------|----------------|
//! | 0 | nothing |
//! | 1, callback | success |
//! | 1, value, body action | data |
//! | 1, value, other action | params |
//! | 2+, second is a callback, first is a callback | success, error |
//! | 2+, second is a callback, first is a value | first per the 1-arg row, then success, error |
//! | 2+, second is a value | params, data, success, error |
//!
//! Instance-level calls take at most three: `params, success, error`, where
//! a leading callback shifts to `success, error`.
//!
//! A `null` value in any slot means "not given". Callbacks where a value is
//! expected, and values where a callback is expected, are ignored with a
//! warning. So are arguments left over after the error callback.

use std::fmt;

use serde_json::Value;

use crate::error::ApiError;
use crate::http::Response;
use crate::resource::Resource;
use crate::template::ParamValues;

/// How a call settled, as seen by a callback.
#[derive(Debug)]
pub enum Outcome<'a> {
    Success {
        resource: &'a Resource,
        response: &'a Response,
    },
    Failure(&'a ApiError),
}

/// A success or error callback. Which one it is depends on its position.
pub struct Callback(Box<dyn FnOnce(Outcome<'_>) + Send>);

impl Callback {
    pub fn new(f: impl FnOnce(Outcome<'_>) + Send + 'static) -> Self {
        Callback(Box::new(f))
    }

    /// A callback that only reacts to success.
    pub fn on_success(f: impl FnOnce(&Resource, &Response) + Send + 'static) -> Self {
        Self::new(move |outcome| {
            if let Outcome::Success { resource, response } = outcome {
                f(resource, response);
            }
        })
    }

    /// A callback that only reacts to failure.
    pub fn on_error(f: impl FnOnce(&ApiError) + Send + 'static) -> Self {
        Self::new(move |outcome| {
            if let Outcome::Failure(err) = outcome {
                f(err);
            }
        })
    }

    pub fn invoke(self, outcome: Outcome<'_>) {
        (self.0)(outcome)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback(..)")
    }
}

/// One positional argument.
#[derive(Debug)]
pub enum Arg {
    Value(Value),
    Callback(Callback),
}

impl Arg {
    pub fn is_invokable(&self) -> bool {
        matches!(self, Arg::Callback(_))
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Arg::Value(value)
    }
}

impl From<Callback> for Arg {
    fn from(callback: Callback) -> Self {
        Arg::Callback(callback)
    }
}

impl From<ParamValues> for Arg {
    fn from(params: ParamValues) -> Self {
        Arg::Value(Value::Object(params.into_iter().collect()))
    }
}

/// A type-level call after argument resolution.
#[derive(Debug, Default)]
pub struct ResolvedCall {
    pub params: ParamValues,
    pub data: Option<Value>,
    pub success: Option<Callback>,
    pub error: Option<Callback>,
}

/// An instance-level call after argument resolution. `params` is `None`
/// when the caller gave none, in which case the instance supplies them.
#[derive(Debug, Default)]
pub struct InstanceCall {
    pub params: Option<ParamValues>,
    pub success: Option<Callback>,
    pub error: Option<Callback>,
}

const TYPE_CALL_MAX: usize = 4;
const INSTANCE_CALL_MAX: usize = 3;

/// Resolve the arguments of a type-level call.
pub fn resolve_type_call(args: Vec<Arg>, has_body: bool) -> Result<ResolvedCall, ApiError> {
    let received = args.len();
    if received > TYPE_CALL_MAX {
        return Err(ApiError::InvalidArgumentCount {
            received,
            max: TYPE_CALL_MAX,
        });
    }

    let mut args = args.into_iter();
    let (a1, a2, a3, a4) = (args.next(), args.next(), args.next(), args.next());
    let mut call = ResolvedCall::default();

    if received == 1 {
        fill_single(&mut call, a1, has_body);
    } else if received >= 2 {
        let first_invokable = a1.as_ref().is_some_and(Arg::is_invokable);
        let second_invokable = a2.as_ref().is_some_and(Arg::is_invokable);
        match (first_invokable, second_invokable) {
            (true, true) => {
                call.success = into_callback(a1, 1);
                call.error = into_callback(a2, 2);
                ignore_extra(a3, 3);
                ignore_extra(a4, 4);
            }
            (false, true) => {
                call.success = into_callback(a2, 2);
                call.error = into_callback(a3, 3);
                fill_single(&mut call, a1, has_body);
                ignore_extra(a4, 4);
            }
            (_, false) => {
                call.params = into_params(a1, 1);
                call.data = into_data(a2, 2);
                call.success = into_callback(a3, 3);
                call.error = into_callback(a4, 4);
            }
        }
    }

    Ok(call)
}

/// Resolve the arguments of an instance-level call.
pub fn resolve_instance_call(args: Vec<Arg>) -> Result<InstanceCall, ApiError> {
    let received = args.len();
    if received > INSTANCE_CALL_MAX {
        return Err(ApiError::InvalidArgumentCount {
            received,
            max: INSTANCE_CALL_MAX,
        });
    }

    let mut args = args.into_iter();
    let (a1, a2, a3) = (args.next(), args.next(), args.next());
    let mut call = InstanceCall::default();

    match received {
        3 => {
            call.params = Some(into_params(a1, 1));
            call.success = into_callback(a2, 2);
            call.error = into_callback(a3, 3);
        }
        1 | 2 if a1.as_ref().is_some_and(Arg::is_invokable) => {
            call.success = into_callback(a1, 1);
            call.error = into_callback(a2, 2);
        }
        1 | 2 => {
            call.params = Some(into_params(a1, 1));
            call.success = into_callback(a2, 2);
        }
        _ => {}
    }

    Ok(call)
}

fn fill_single(call: &mut ResolvedCall, arg: Option<Arg>, has_body: bool) {
    match arg {
        Some(Arg::Callback(callback)) => call.success = Some(callback),
        other if has_body => call.data = into_data(other, 1),
        other => call.params = into_params(other, 1),
    }
}

fn ignore_extra(arg: Option<Arg>, position: usize) {
    if let Some(arg) = arg {
        tracing::warn!(position, ?arg, "ignoring argument after the error callback");
    }
}

fn into_params(arg: Option<Arg>, position: usize) -> ParamValues {
    match arg {
        Some(Arg::Value(Value::Object(map))) => map.into_iter().collect(),
        None | Some(Arg::Value(Value::Null)) => ParamValues::new(),
        Some(other) => {
            tracing::warn!(position, ?other, "ignoring non-object params argument");
            ParamValues::new()
        }
    }
}

fn into_data(arg: Option<Arg>, position: usize) -> Option<Value> {
    match arg {
        Some(Arg::Value(Value::Null)) | None => None,
        Some(Arg::Value(value)) => Some(value),
        Some(Arg::Callback(_)) => {
            tracing::warn!(position, "ignoring callback passed as request data");
            None
        }
    }
}

fn into_callback(arg: Option<Arg>, position: usize) -> Option<Callback> {
    match arg {
        Some(Arg::Callback(callback)) => Some(callback),
        None | Some(Arg::Value(Value::Null)) => None,
        Some(Arg::Value(value)) => {
            tracing::warn!(position, %value, "ignoring value passed where a callback is expected");
            None
        }
    }
}
