use crate::program::expr::var;
use indexmap::IndexMap;
use serde_json::Value;

/// The state variable threaded through every routine.
pub const STATE_PARAM: &str = "tg";

/// Variables visible at a point of the program, mapped to the expression
/// that reads each one in the current routine.
///
/// Every generated routine declares one parameter per entry, and every call
/// into a generated routine forwards every entry, so a child routine can read
/// any value its ancestors computed. Entries are only added or rebound,
/// never removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgsRegistry {
    entries: IndexMap<String, Value>,
}

impl ArgsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to `reference`, replacing any previous binding.
    pub fn bind(&mut self, name: &str, reference: Value) {
        self.entries.insert(name.to_string(), reference);
    }

    /// Binds `name` to its own variable, the common case after a step
    /// assigned it.
    pub fn bind_variable(&mut self, name: &str) {
        self.bind(name, var(name));
    }

    /// Reserves `name` with an empty value unless it is already bound.
    pub fn reserve(&mut self, name: &str) {
        self.entries.entry(name.to_string()).or_insert(Value::Null);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    /// The expression reading `name` here, or a plain variable reference
    /// when the name is not registered.
    pub fn reference(&self, name: &str) -> Value {
        self.get(name).cloned().unwrap_or_else(|| var(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parameter list of a routine entered from this scope.
    pub fn params(&self) -> Vec<String> {
        std::iter::once(STATE_PARAM.to_string())
            .chain(self.entries.keys().cloned())
            .collect()
    }

    /// Arguments forwarded when calling a routine entered from this scope.
    pub fn call_args(&self) -> IndexMap<String, Value> {
        std::iter::once((STATE_PARAM.to_string(), var(STATE_PARAM)))
            .chain(self.entries.iter().map(|(k, v)| (k.clone(), v.clone())))
            .collect()
    }

    /// The registry as seen from inside a routine entered from this scope:
    /// every entry is now a parameter of the same name.
    pub fn rebased(&self) -> Self {
        Self {
            entries: self
                .entries
                .keys()
                .map(|name| (name.clone(), var(name)))
                .collect(),
        }
    }
}
