//! Per-type normalization handlers
//!
//! A [`CoercionRegistry`] maps a destination type to a handler that pre-normalizes a raw
//! value before the coercer classifies it. The map sits behind a `parking_lot::RwLock`:
//! lookups clone an `Arc` under the read lock, upserts hold the write lock for a single
//! insert, so a reader never observes a half-registered entry.

use super::value::DatabaseValue;
use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Normalization handler: raw value in, intermediate value out
pub type Handler = Arc<dyn Fn(DatabaseValue) -> DatabaseValue + Send + Sync>;

/// Registry key identifying a destination type
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Key for the type `T`
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Display name of the keyed type
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Thread-safe mapping from destination type to normalization handler
///
/// # Example
///
/// ```rust
/// use rust_data_reader::core::{CoercionRegistry, DatabaseValue, TypeKey};
/// use std::sync::Arc;
///
/// let registry = CoercionRegistry::with_defaults();
/// assert!(registry.contains(TypeKey::of::<bool>()));
///
/// registry.add_or_update(
///     TypeKey::of::<i64>(),
///     Arc::new(|value: DatabaseValue| match value {
///         DatabaseValue::String(s) => DatabaseValue::String(s.replace(',', "")),
///         other => other,
///     }),
/// );
/// assert_eq!(registry.len(), 3);
/// ```
pub struct CoercionRegistry {
    handlers: RwLock<HashMap<TypeKey, Handler>>,
}

impl CoercionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Create a registry holding the built-in boolean and string handlers
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.add_or_update(TypeKey::of::<bool>(), Arc::new(handle_boolean));
        registry.add_or_update(TypeKey::of::<String>(), Arc::new(handle_string));
        registry
    }

    /// Register `handler` for `key`, replacing any existing handler
    pub fn add_or_update(&self, key: TypeKey, handler: Handler) {
        tracing::trace!(destination = key.name(), "registering coercion handler");
        self.handlers.write().insert(key, handler);
    }

    /// Register a closure for the destination type `T`
    pub fn register<T, F>(&self, handler: F)
    where
        T: ?Sized + 'static,
        F: Fn(DatabaseValue) -> DatabaseValue + Send + Sync + 'static,
    {
        self.add_or_update(TypeKey::of::<T>(), Arc::new(handler));
    }

    /// Apply [`add_or_update`](Self::add_or_update) to every entry
    pub fn add_or_update_many<I>(&self, handlers: I)
    where
        I: IntoIterator<Item = (TypeKey, Handler)>,
    {
        for (key, handler) in handlers {
            self.add_or_update(key, handler);
        }
    }

    /// Look up the handler registered for `key`
    pub fn get(&self, key: TypeKey) -> Option<Handler> {
        self.handlers.read().get(&key).cloned()
    }

    /// Check whether a handler is registered for `key`
    pub fn contains(&self, key: TypeKey) -> bool {
        self.handlers.read().contains_key(&key)
    }

    /// Destination types that currently have a handler
    pub fn keys(&self) -> Vec<TypeKey> {
        self.handlers.read().keys().copied().collect()
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    /// True when no handler is registered
    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }

    /// Remove every handler
    pub fn clear(&self) {
        self.handlers.write().clear();
    }
}

impl Default for CoercionRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for CoercionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoercionRegistry")
            .field("destinations", &self.keys())
            .finish()
    }
}

/// Parse loosely formatted boolean text
///
/// Accepts `true`/`false`, then `t`, `yes`, `y` / `f`, `no`, `n` (case-insensitive,
/// surrounding whitespace ignored), then any 32-bit integer where nonzero is true.
/// Returns `None` when no boolean can be produced.
pub fn parse_bool(text: &str) -> Option<bool> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    match trimmed.to_ascii_uppercase().as_str() {
        "TRUE" | "T" | "YES" | "Y" => Some(true),
        "FALSE" | "F" | "NO" | "N" => Some(false),
        _ => trimmed.parse::<i32>().ok().map(|v| v != 0),
    }
}

/// Built-in boolean handler
///
/// Text that [`parse_bool`] understands becomes a boolean. Anything else is passed
/// through untouched so the generic conversion decides, and fails loudly, instead
/// of the handler inventing `false`. Floating and decimal values go through the
/// same text rules, so `0.5` is rejected rather than read as nonzero.
pub fn handle_boolean(value: DatabaseValue) -> DatabaseValue {
    match value {
        DatabaseValue::Null | DatabaseValue::Bool(_) => value,
        other => {
            let text = match &other {
                DatabaseValue::Decimal(v) => Some(v.normalize().to_string()),
                _ => other.to_text(),
            };
            let floating = matches!(
                other,
                DatabaseValue::Float(_) | DatabaseValue::Double(_) | DatabaseValue::Decimal(_)
            );
            match text.as_deref().and_then(parse_bool) {
                Some(parsed) => DatabaseValue::Bool(parsed),
                None => match text {
                    Some(text) if floating => DatabaseValue::String(text),
                    _ => other,
                },
            }
        }
    }
}

/// Built-in string handler: trims the value's text representation
///
/// Byte payloads are trimmed when they hold valid UTF-8 and passed through otherwise.
pub fn handle_string(value: DatabaseValue) -> DatabaseValue {
    match value {
        DatabaseValue::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(text) => DatabaseValue::String(text.trim().to_string()),
            Err(err) => DatabaseValue::Bytes(err.into_bytes()),
        },
        other => match other.to_text() {
            Some(text) => DatabaseValue::String(text.trim().to_string()),
            None => other,
        },
    }
}
