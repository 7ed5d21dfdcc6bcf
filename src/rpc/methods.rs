//! Built-in method sets served by the `rpcline` binary.
//!
//! `Calculator` is registered per instance under the configured prefix;
//! `Diagnostics` is registered statically under `rpc.`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use super::handler::{
    Args, HandlerError, HandlerResult, HandlerSource, MethodDef, ParamType, StaticHandlerSource,
};

/// Prefix the diagnostics methods are registered under.
pub const DIAGNOSTICS_PREFIX: &str = "rpc.";

/// Arithmetic over positional arguments, counting the operations it served.
#[derive(Debug, Default)]
pub struct Calculator {
    operations: AtomicU64,
}

impl Calculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Operations served since creation or the last reset.
    pub fn operations(&self) -> u64 {
        self.operations.load(Ordering::Relaxed)
    }

    fn tick(&self) {
        self.operations.fetch_add(1, Ordering::Relaxed);
    }

    fn add(&self, args: &Args) -> HandlerResult {
        let (a, b): (i64, i64) = (args.get(0)?, args.get(1)?);
        self.tick();
        a.checked_add(b)
            .map(|sum| json!(sum))
            .ok_or_else(|| HandlerError::new("Arithmetic operation resulted in an overflow."))
    }

    fn subtract(&self, args: &Args) -> HandlerResult {
        let (a, b): (i64, i64) = (args.get(0)?, args.get(1)?);
        self.tick();
        a.checked_sub(b)
            .map(|difference| json!(difference))
            .ok_or_else(|| HandlerError::new("Arithmetic operation resulted in an overflow."))
    }

    fn divide(&self, args: &Args) -> HandlerResult {
        let (a, b): (f64, f64) = (args.get(0)?, args.get(1)?);
        self.tick();
        if b == 0.0 {
            return Err(HandlerError::new("Attempted to divide by zero."));
        }
        Ok(json!(a / b))
    }

    fn scale(&self, args: &Args) -> HandlerResult {
        let (value, factor): (f64, f64) = (args.get(0)?, args.get(1)?);
        self.tick();
        Ok(json!(value * factor))
    }

    fn sum(&self, args: &Args) -> HandlerResult {
        let values: Vec<f64> = args.get(0)?;
        self.tick();
        Ok(json!(values.iter().sum::<f64>()))
    }

    fn reset(&self, _args: &Args) -> Result<(), HandlerError> {
        self.operations.store(0, Ordering::Relaxed);
        Ok(())
    }

    fn count(&self, _args: &Args) -> HandlerResult {
        Ok(json!(self.operations()))
    }
}

impl HandlerSource for Calculator {
    fn methods(self: Arc<Self>) -> Vec<MethodDef> {
        vec![
            MethodDef::builder("Add")
                .param(ParamType::Int)
                .param(ParamType::Int)
                .bound(&self, Calculator::add),
            MethodDef::builder("Subtract")
                .param(ParamType::Int)
                .param(ParamType::Int)
                .bound(&self, Calculator::subtract),
            MethodDef::builder("Divide")
                .param(ParamType::Float)
                .param(ParamType::Float)
                .bound(&self, Calculator::divide),
            MethodDef::builder("Scale")
                .param(ParamType::Float)
                .optional(ParamType::Float, 1.0)
                .bound(&self, Calculator::scale),
            MethodDef::builder("Sum")
                .param(ParamType::structured::<Vec<f64>>())
                .bound(&self, Calculator::sum),
            MethodDef::builder("Reset").bound_void(&self, Calculator::reset),
            MethodDef::builder("Count").bound(&self, Calculator::count),
        ]
    }
}

/// Stateless health and introspection calls.
#[derive(Debug)]
pub struct Diagnostics;

impl Diagnostics {
    fn ping(_args: &Args) -> HandlerResult {
        Ok(json!("pong"))
    }

    fn echo(args: &Args) -> HandlerResult {
        Ok(args.value(0).clone())
    }

    fn version(_args: &Args) -> HandlerResult {
        Ok(json!(env!("CARGO_PKG_VERSION")))
    }

    fn milliseconds(args: &Args) -> HandlerResult {
        let span: Duration = args.get(0)?;
        let millis = u64::try_from(span.as_millis()).unwrap_or(u64::MAX);
        Ok(json!(millis))
    }
}

impl StaticHandlerSource for Diagnostics {
    fn methods() -> Vec<MethodDef> {
        vec![
            MethodDef::builder("Ping").returns(Diagnostics::ping),
            MethodDef::builder("Echo")
                .param(ParamType::Any)
                .returns(Diagnostics::echo),
            MethodDef::builder("Version").returns(Diagnostics::version),
            MethodDef::builder("Milliseconds")
                .param(ParamType::Duration)
                .returns(Diagnostics::milliseconds),
        ]
    }
}
