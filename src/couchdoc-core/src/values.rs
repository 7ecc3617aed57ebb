//! Registry of ambient values a JSON strategy may consult while mapping
//! documents, such as per-type field mappings.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// ValueKey identifies a registered value by explicit name or by type token
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKey {
    Name(String),
    Type(TypeId),
}

impl ValueKey {
    pub fn named(name: impl Into<String>) -> Self {
        ValueKey::Name(name.into())
    }

    pub fn of<T: 'static>() -> Self {
        ValueKey::Type(TypeId::of::<T>())
    }
}

/// ValueBag is an immutable-once-shared map of heterogeneous values
#[derive(Clone, Default)]
pub struct ValueBag {
    values: HashMap<ValueKey, Arc<dyn Any + Send + Sync>>,
}

impl ValueBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `value` under an explicit name
    pub fn insert_named<T: Any + Send + Sync>(&mut self, name: impl Into<String>, value: T) {
        self.values.insert(ValueKey::named(name), Arc::new(value));
    }

    /// Register `value` under its own type
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) {
        self.values.insert(ValueKey::of::<T>(), Arc::new(value));
    }

    pub fn with_named<T: Any + Send + Sync>(mut self, name: impl Into<String>, value: T) -> Self {
        self.insert_named(name, value);
        self
    }

    pub fn with<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.insert(value);
        self
    }

    pub fn has_value(&self, key: &ValueKey) -> bool {
        self.values.contains_key(key)
    }

    pub fn get_value(&self, key: &ValueKey) -> Option<&(dyn Any + Send + Sync)> {
        self.values.get(key).map(|v| v.as_ref())
    }

    /// Value registered under `name`, if it has type `T`
    pub fn get_named<T: Any>(&self, name: &str) -> Option<&T> {
        self.values
            .get(&ValueKey::Name(name.to_string()))
            .and_then(|v| v.downcast_ref::<T>())
    }

    /// Value registered under the type `T`
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.values
            .get(&ValueKey::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for ValueBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.values.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Clock(u64);

    #[test]
    fn test_lookup_by_name() {
        let bag = ValueBag::new().with_named("tenant", "acme".to_string());

        assert!(bag.has_value(&ValueKey::named("tenant")));
        assert_eq!(bag.get_named::<String>("tenant").map(String::as_str), Some("acme"));
        // Wrong type under the right name
        assert_eq!(bag.get_named::<u32>("tenant"), None);
        assert_eq!(bag.get_named::<String>("other"), None);
    }

    #[test]
    fn test_lookup_by_type() {
        let bag = ValueBag::new().with(Clock(42));

        assert!(bag.has_value(&ValueKey::of::<Clock>()));
        assert_eq!(bag.get::<Clock>(), Some(&Clock(42)));
        assert_eq!(bag.get::<String>(), None);
    }

    #[test]
    fn test_name_and_type_keys_are_distinct() {
        let bag = ValueBag::new().with(Clock(1)).with_named("clock", Clock(2));

        assert_eq!(bag.len(), 2);
        assert_eq!(bag.get::<Clock>(), Some(&Clock(1)));
        assert_eq!(bag.get_named::<Clock>("clock"), Some(&Clock(2)));
        assert!(bag
            .get_value(&ValueKey::named("clock"))
            .and_then(|v| v.downcast_ref::<Clock>())
            .is_some());
    }
}
