use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::interpreter::Value;

/// Host implementation of a native function. Failures carry only a message;
/// the interpreter attaches the call site's line.
pub type NativeFn = Arc<dyn Fn(&[Value]) -> std::result::Result<Value, String> + Send + Sync>;

#[derive(Clone)]
pub struct NativeFunction {
    pub name: String,
    pub arity: usize,
    pub func: NativeFn,
}

impl NativeFunction {
    pub fn call(&self, arguments: &[Value]) -> std::result::Result<Value, String> {
        (self.func)(arguments)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

// Registry to store native function implementations
#[derive(Default)]
pub struct NativeFunctionRegistry {
    functions: HashMap<String, NativeFunction>,
}

impl NativeFunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-ins every interpreter starts with.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("clock", 0, clock());
        registry
    }

    pub fn register<F>(&mut self, name: &str, arity: usize, f: F)
    where
        F: Fn(&[Value]) -> std::result::Result<Value, String> + 'static + Send + Sync,
    {
        self.functions.insert(
            name.to_string(),
            NativeFunction {
                name: name.to_string(),
                arity,
                func: Arc::new(f),
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&NativeFunction> {
        self.functions.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NativeFunction> {
        self.functions.values()
    }
}

/// Seconds since the Unix epoch. Readings never go backwards within a run
/// because they advance from one wall-clock sample by a monotonic delta.
fn clock() -> impl Fn(&[Value]) -> std::result::Result<Value, String> + Send + Sync {
    let base = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    let start = Instant::now();
    move |_| Ok(Value::Number(base + start.elapsed().as_secs_f64()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_include_clock() {
        let registry = NativeFunctionRegistry::with_defaults();
        let clock = registry.get("clock").unwrap();
        assert_eq!(clock.arity, 0);
        assert_eq!(registry.iter().count(), 1);
    }

    #[test]
    fn clock_is_monotonic() {
        let registry = NativeFunctionRegistry::with_defaults();
        let clock = registry.get("clock").unwrap();
        let read = || match clock.call(&[]) {
            Ok(Value::Number(n)) => n,
            other => panic!("clock returned {:?}", other),
        };
        let first = read();
        let second = read();
        assert!(first > 1.0e9);
        assert!(second >= first);
    }

    #[test]
    fn registered_function_is_callable() {
        let mut registry = NativeFunctionRegistry::new();
        registry.register("double", 1, |args| match args {
            [Value::Number(n)] => Ok(Value::Number(n * 2.0)),
            _ => Err("Argument must be a number.".to_string()),
        });
        let double = registry.get("double").unwrap();
        assert_eq!(double.call(&[Value::Number(4.0)]), Ok(Value::Number(8.0)));
        assert!(double.call(&[Value::Nil]).is_err());
    }
}
