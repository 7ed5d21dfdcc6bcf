//! Handler descriptors and the traits that expose methods to the registry.
//!
//! A handler source lists its callable methods as [`MethodDef`]s, each with an
//! explicit parameter shape. Instance sources bind every method to a shared
//! `Arc<Self>`; static sources expose free functions.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use super::codec::convert_structured;

/// Failure reported by a handler. Becomes a `-1` error response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    pub message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(error: serde_json::Error) -> Self {
        Self::new(error.to_string())
    }
}

/// Return type of every handler invocation.
pub type HandlerResult = Result<Value, HandlerError>;

/// Uniform callable stored in the registry.
pub type Invoker = Arc<dyn Fn(&Args) -> HandlerResult + Send + Sync>;

/// Declared type of a positional parameter.
#[derive(Debug, Clone)]
pub enum ParamType {
    /// Signed integer.
    Int,
    /// Unsigned integer.
    UInt,
    /// Floating point number.
    Float,
    Bool,
    String,
    /// Time span, serialized the way serde encodes `std::time::Duration`.
    Duration,
    /// Any JSON value, passed through untouched.
    Any,
    /// A serde type; arrays and objects are converted through it.
    Structured {
        type_name: &'static str,
        convert: fn(Value) -> Result<Value, serde_json::Error>,
    },
}

impl ParamType {
    /// Declares a parameter of serde type `T`.
    pub fn structured<T>() -> Self
    where
        T: DeserializeOwned + Serialize,
    {
        ParamType::Structured {
            type_name: short_type_name(std::any::type_name::<T>()),
            convert: convert_structured::<T>,
        }
    }

    /// Returns true if `value` already has the runtime shape of this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamType::Int => value.is_i64(),
            ParamType::UInt => value.is_u64(),
            ParamType::Float => value.is_f64(),
            ParamType::Bool => value.is_boolean(),
            ParamType::String => value.is_string(),
            ParamType::Duration => value.is_object(),
            ParamType::Any => true,
            ParamType::Structured { .. } => false,
        }
    }

    /// Returns true for the primitive types numbers and booleans convert into.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            ParamType::Int | ParamType::UInt | ParamType::Float | ParamType::Bool | ParamType::String
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            ParamType::Int => "int",
            ParamType::UInt => "uint",
            ParamType::Float => "float",
            ParamType::Bool => "bool",
            ParamType::String => "string",
            ParamType::Duration => "duration",
            ParamType::Any => "any",
            ParamType::Structured { type_name, .. } => type_name,
        }
    }
}

/// One entry of a method's parameter shape.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub ty: ParamType,
    /// Value used when the caller omits this (trailing) parameter.
    pub default: Option<Value>,
}

impl ParamSpec {
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

/// Whether a method answers with a result or only acknowledges the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnKind {
    Value,
    Void,
}

/// Positional arguments after fixup, as seen by a handler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    values: Vec<Value>,
}

impl Args {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the raw value at `index`, or `Null` when out of range.
    pub fn value(&self, index: usize) -> &Value {
        self.values.get(index).unwrap_or(&Value::Null)
    }

    /// Extracts the argument at `index` as `T`.
    pub fn get<T: DeserializeOwned>(&self, index: usize) -> Result<T, HandlerError> {
        serde_json::from_value(self.value(index).clone()).map_err(|e| {
            HandlerError::new(format!("invalid argument {}: {}", index, e))
        })
    }
}

/// Declares a method before it is bound into the registry.
pub struct MethodDef {
    pub(crate) name: String,
    pub(crate) params: Vec<ParamSpec>,
    pub(crate) returns: ReturnKind,
    pub(crate) invoker: Invoker,
}

impl MethodDef {
    /// Starts declaring a method called `name`.
    pub fn builder(name: impl Into<String>) -> MethodBuilder {
        MethodBuilder {
            name: name.into(),
            params: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDef")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("returns", &self.returns)
            .finish_non_exhaustive()
    }
}

/// Builder returned by [`MethodDef::builder`].
#[derive(Debug)]
pub struct MethodBuilder {
    name: String,
    params: Vec<ParamSpec>,
}

impl MethodBuilder {
    /// Appends a required parameter.
    pub fn param(mut self, ty: ParamType) -> Self {
        self.params.push(ParamSpec { ty, default: None });
        self
    }

    /// Appends a parameter that falls back to `default` when omitted.
    pub fn optional(mut self, ty: ParamType, default: impl Into<Value>) -> Self {
        self.params.push(ParamSpec {
            ty,
            default: Some(default.into()),
        });
        self
    }

    /// Finishes with a handler that returns a value.
    pub fn returns<F>(self, handler: F) -> MethodDef
    where
        F: Fn(&Args) -> HandlerResult + Send + Sync + 'static,
    {
        self.finish(ReturnKind::Value, Arc::new(handler))
    }

    /// Finishes with a handler that returns nothing.
    pub fn returns_void<F>(self, handler: F) -> MethodDef
    where
        F: Fn(&Args) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.finish(
            ReturnKind::Void,
            Arc::new(move |args| handler(args).map(|()| Value::Null)),
        )
    }

    /// Finishes with a value-returning method bound to `target`.
    pub fn bound<T>(self, target: &Arc<T>, method: fn(&T, &Args) -> HandlerResult) -> MethodDef
    where
        T: Send + Sync + 'static,
    {
        let target = Arc::clone(target);
        self.returns(move |args| method(&target, args))
    }

    /// Finishes with a void method bound to `target`.
    pub fn bound_void<T>(
        self,
        target: &Arc<T>,
        method: fn(&T, &Args) -> Result<(), HandlerError>,
    ) -> MethodDef
    where
        T: Send + Sync + 'static,
    {
        let target = Arc::clone(target);
        self.returns_void(move |args| method(&target, args))
    }

    fn finish(self, returns: ReturnKind, invoker: Invoker) -> MethodDef {
        MethodDef {
            name: self.name,
            params: self.params,
            returns,
            invoker,
        }
    }
}

/// An object whose methods are callable over RPC, bound to one instance.
pub trait HandlerSource: Send + Sync + 'static {
    /// Lists the methods to register, each bound to `self`.
    fn methods(self: Arc<Self>) -> Vec<MethodDef>;
}

/// A type whose associated functions are callable over RPC.
pub trait StaticHandlerSource: 'static {
    fn methods() -> Vec<MethodDef>;
}

/// The source a registered method came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOwner {
    /// Bound to an instance of the named type.
    Instance(&'static str),
    /// Associated function of the named type.
    Static(&'static str),
}

impl fmt::Display for HandlerOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerOwner::Instance(name) => write!(f, "the class {}", name),
            HandlerOwner::Static(name) => write!(f, "the static class {}", name),
        }
    }
}

/// Registry entry: a named, immutable binding plus its parameter shape.
pub struct HandlerDescriptor {
    pub name: String,
    pub owner: HandlerOwner,
    pub params: Vec<ParamSpec>,
    pub returns: ReturnKind,
    invoker: Invoker,
}

impl HandlerDescriptor {
    pub(crate) fn from_def(name: String, owner: HandlerOwner, def: MethodDef) -> Self {
        Self {
            name,
            owner,
            params: def.params,
            returns: def.returns,
            invoker: def.invoker,
        }
    }

    /// Number of parameters without a default value.
    pub fn required_count(&self) -> usize {
        self.params.iter().filter(|p| !p.has_default()).count()
    }

    /// Runs the handler. A panic inside it is reported as a handler error.
    pub fn invoke(&self, args: &Args) -> HandlerResult {
        match panic::catch_unwind(AssertUnwindSafe(|| (self.invoker)(args))) {
            Ok(result) => result,
            Err(payload) => Err(HandlerError::new(panic_message(payload.as_ref()))),
        }
    }
}

impl fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("name", &self.name)
            .field("owner", &self.owner)
            .field("params", &self.params)
            .field("returns", &self.returns)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}

/// Strips the module path from a `std::any::type_name` result.
pub(crate) fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    match base.rfind("::") {
        Some(pos) => &full[pos + 2..],
        None => full,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Counter {
        step: i64,
    }

    fn add_step(counter: &Counter, args: &Args) -> HandlerResult {
        let value: i64 = args.get(0)?;
        Ok(json!(value + counter.step))
    }

    #[test]
    fn required_count_ignores_defaults() {
        let def = MethodDef::builder("Scale")
            .param(ParamType::Float)
            .optional(ParamType::Float, 1.0)
            .returns(|_| Ok(Value::Null));
        let descriptor =
            HandlerDescriptor::from_def("Scale".into(), HandlerOwner::Static("Math"), def);
        assert_eq!(descriptor.required_count(), 1);
        assert_eq!(descriptor.params.len(), 2);
    }

    #[test]
    fn bound_method_sees_instance() {
        let counter = Arc::new(Counter { step: 10 });
        let def = MethodDef::builder("AddStep")
            .param(ParamType::Int)
            .bound(&counter, add_step);
        let descriptor =
            HandlerDescriptor::from_def("AddStep".into(), HandlerOwner::Instance("Counter"), def);
        let result = descriptor.invoke(&Args::new(vec![json!(5)])).unwrap();
        assert_eq!(result, json!(15));
    }

    #[test]
    fn void_method_reports_void() {
        let def = MethodDef::builder("Noop").returns_void(|_| Ok(()));
        assert_eq!(def.returns, ReturnKind::Void);
    }

    #[test]
    fn panic_becomes_handler_error() {
        let def = MethodDef::builder("Boom").returns(|_| panic!("kaboom"));
        let descriptor = HandlerDescriptor::from_def("Boom".into(), HandlerOwner::Static("X"), def);
        let err = descriptor.invoke(&Args::default()).unwrap_err();
        assert_eq!(err.message, "kaboom");
    }

    #[test]
    fn args_get_reports_index() {
        let args = Args::new(vec![json!("text")]);
        let err = args.get::<i64>(0).unwrap_err();
        assert!(err.message.starts_with("invalid argument 0"));
    }

    #[test]
    fn owner_display() {
        assert_eq!(HandlerOwner::Instance("Calculator").to_string(), "the class Calculator");
        assert_eq!(
            HandlerOwner::Static("Diagnostics").to_string(),
            "the static class Diagnostics"
        );
    }

    #[test]
    fn short_names() {
        assert_eq!(short_type_name("rpcline::rpc::methods::Calculator"), "Calculator");
        assert_eq!(short_type_name("Plain"), "Plain");
        assert_eq!(short_type_name("alloc::vec::Vec<f64>"), "Vec<f64>");
    }
}
