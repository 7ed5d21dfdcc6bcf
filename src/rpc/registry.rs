//! Method registry: exact name to handler descriptor.
//!
//! Append-only per name. Lookups take a read lock and clone out an `Arc`, so
//! handlers never run while the lock is held.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::error::{Result, ServerError};

use super::handler::{
    short_type_name, HandlerDescriptor, HandlerOwner, HandlerSource, MethodDef,
    StaticHandlerSource,
};
use super::REGISTRY_TARGET;

/// Concurrent map from method name to its descriptor.
#[derive(Debug, Default)]
pub struct MethodRegistry {
    handlers: RwLock<HashMap<String, Arc<HandlerDescriptor>>>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every method of `target` under `prefix`, bound to the instance.
    ///
    /// Returns the number of methods added.
    pub fn register_instance<T: HandlerSource>(&self, target: Arc<T>, prefix: &str) -> Result<usize> {
        validate_prefix(prefix)?;
        let owner = HandlerOwner::Instance(short_type_name(std::any::type_name::<T>()));
        self.insert_all(owner, prefix, target.methods())
    }

    /// Registers the associated functions of `T` under `prefix`.
    pub fn register_static<T: StaticHandlerSource>(&self, prefix: &str) -> Result<usize> {
        validate_prefix(prefix)?;
        let owner = HandlerOwner::Static(short_type_name(std::any::type_name::<T>()));
        self.insert_all(owner, prefix, T::methods())
    }

    /// Resolves a method name.
    pub fn lookup(&self, name: &str) -> Option<Arc<HandlerDescriptor>> {
        self.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    fn insert_all(&self, owner: HandlerOwner, prefix: &str, methods: Vec<MethodDef>) -> Result<usize> {
        let mut handlers = self
            .handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // Check every name first so a failed call leaves the map untouched.
        let mut seen = HashSet::new();
        for def in &methods {
            let name = format!("{}{}", prefix, def.name());
            if let Some(existing) = handlers.get(&name) {
                return Err(ServerError::duplicate_handler(&name, existing.owner));
            }
            if !seen.insert(name.clone()) {
                return Err(ServerError::duplicate_handler(&name, owner));
            }
        }

        let count = methods.len();
        for def in methods {
            let name = format!("{}{}", prefix, def.name());
            debug!(
                target: REGISTRY_TARGET,
                method = %name,
                owner = %owner,
                params = def.params.len(),
                "added handler"
            );
            let descriptor = HandlerDescriptor::from_def(name.clone(), owner, def);
            handlers.insert(name, Arc::new(descriptor));
        }
        Ok(count)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<HandlerDescriptor>>> {
        self.handlers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.chars().any(char::is_whitespace) {
        return Err(ServerError::invalid_prefix(prefix));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::rpc::handler::{Args, HandlerResult, ParamType};
    use serde_json::json;

    struct Greeter;

    impl Greeter {
        fn hello(&self, _args: &Args) -> HandlerResult {
            Ok(json!("hello"))
        }
    }

    impl HandlerSource for Greeter {
        fn methods(self: Arc<Self>) -> Vec<MethodDef> {
            vec![MethodDef::builder("Hello").bound(&self, Greeter::hello)]
        }
    }

    struct OtherGreeter;

    impl StaticHandlerSource for OtherGreeter {
        fn methods() -> Vec<MethodDef> {
            vec![
                MethodDef::builder("Bye").returns(|_| Ok(json!("bye"))),
                MethodDef::builder("Hello")
                    .param(ParamType::String)
                    .returns(|args| Ok(args.value(0).clone())),
            ]
        }
    }

    struct Twice;

    impl StaticHandlerSource for Twice {
        fn methods() -> Vec<MethodDef> {
            vec![
                MethodDef::builder("Same").returns(|_| Ok(json!(1))),
                MethodDef::builder("Same").returns(|_| Ok(json!(2))),
            ]
        }
    }

    #[test]
    fn register_and_lookup() {
        let registry = MethodRegistry::new();
        assert_eq!(registry.register_instance(Arc::new(Greeter), "").unwrap(), 1);
        let descriptor = registry.lookup("Hello").unwrap();
        assert_eq!(descriptor.owner, HandlerOwner::Instance("Greeter"));
        assert!(registry.lookup("hello").is_none());
    }

    #[test]
    fn prefix_is_prepended() {
        let registry = MethodRegistry::new();
        registry.register_instance(Arc::new(Greeter), "greet.").unwrap();
        assert!(registry.contains("greet.Hello"));
        assert!(!registry.contains("Hello"));
    }

    #[test]
    fn whitespace_prefix_rejected() {
        let registry = MethodRegistry::new();
        for prefix in ["a b", "tab\t", "\n"] {
            let err = registry.register_instance(Arc::new(Greeter), prefix).unwrap_err();
            assert_eq!(err.code, ErrorCode::InvalidPrefix);
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn duplicate_names_first_owner_wins() {
        let registry = MethodRegistry::new();
        registry.register_instance(Arc::new(Greeter), "").unwrap();

        let err = registry.register_static::<OtherGreeter>("").unwrap_err();
        assert_eq!(err.code, ErrorCode::DuplicateHandler);
        assert!(err.message.contains("'Hello'"));
        assert!(err.message.contains("the class Greeter"));

        // Bye must not have slipped in before the conflict was found.
        assert_eq!(registry.names(), vec!["Hello".to_string()]);
        assert_eq!(
            registry.lookup("Hello").unwrap().owner,
            HandlerOwner::Instance("Greeter")
        );
    }

    #[test]
    fn duplicate_within_one_source() {
        let registry = MethodRegistry::new();
        let err = registry.register_static::<Twice>("").unwrap_err();
        assert_eq!(err.code, ErrorCode::DuplicateHandler);
        assert!(registry.is_empty());
    }

    #[test]
    fn same_source_under_two_prefixes() {
        let registry = MethodRegistry::new();
        registry.register_static::<OtherGreeter>("a.").unwrap();
        registry.register_static::<OtherGreeter>("b.").unwrap();
        assert_eq!(
            registry.names(),
            vec!["a.Bye", "a.Hello", "b.Bye", "b.Hello"]
        );
    }

    #[test]
    fn concurrent_registration_one_winner() {
        let registry = Arc::new(MethodRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.register_instance(Arc::new(Greeter), "").is_ok())
            })
            .collect();
        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(successes, 1);
        assert_eq!(registry.len(), 1);
    }
}
