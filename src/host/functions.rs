//! Script functions callable from expressions in the script

use crate::errors::CommandError;
use crate::types::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub type ScriptFunction = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;

struct RegisteredFunction {
    arity: usize,
    body: ScriptFunction,
}

/// Named functions the engine may call. Names are bound at most once.
#[derive(Default)]
pub struct FunctionLibrary {
    functions: RwLock<HashMap<String, RegisteredFunction>>,
}

impl FunctionLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, name: &str, arity: usize, body: F) -> Result<(), CommandError>
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        let mut functions = self
            .functions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if functions.contains_key(name) {
            let err = CommandError::duplicate(name);
            log::error!("cannot register function: {err}");
            return Err(err);
        }
        functions.insert(
            name.to_string(),
            RegisteredFunction {
                arity,
                body: Arc::new(body),
            },
        );
        Ok(())
    }

    pub fn unregister(&self, name: &str) {
        self.functions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(name);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(name)
    }

    /// Call `name`; `None` when it is unknown or the argument count is wrong
    pub fn call(&self, name: &str, args: &[Value]) -> Option<Value> {
        let (arity, body) = {
            let functions = self
                .functions
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let function = functions.get(name)?;
            (function.arity, function.body.clone())
        };
        if args.len() != arity {
            log::error!(
                "function '{name}' expects {arity} argument(s), got {}",
                args.len()
            );
            return None;
        }
        Some(body(args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_function_keeps_first_binding() {
        let library = FunctionLibrary::new();
        library
            .register("double", 1, |args| {
                Value::Number(args[0].as_number().unwrap_or(0.0) * 2.0)
            })
            .unwrap();

        let err = library
            .register("double", 1, |_| Value::Number(0.0))
            .unwrap_err();
        assert_eq!(err, CommandError::duplicate("double"));

        assert_eq!(
            library.call("double", &[Value::Number(4.0)]),
            Some(Value::Number(8.0))
        );
    }

    #[test]
    fn wrong_arity_is_not_called() {
        let library = FunctionLibrary::new();
        library.register("zero", 0, |_| Value::Number(0.0)).unwrap();
        assert_eq!(library.call("zero", &[Value::Bool(true)]), None);
        assert_eq!(library.call("missing", &[]), None);
    }

    #[test]
    fn unregistered_name_can_be_bound_again() {
        let library = FunctionLibrary::new();
        library.register("f", 0, |_| true.into()).unwrap();
        library.unregister("f");
        assert!(!library.contains("f"));
        assert!(library.register("f", 0, |_| false.into()).is_ok());
    }
}
