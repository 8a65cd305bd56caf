//! Key Derivation Module
//!
//! Maps an emitted value to the admission key used by the bounded store.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// Caller-supplied derivation function.
///
/// Returns None to signal "no key", which falls back to identity.
pub type KeyFn = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;

// == Key Deriver ==
/// Derivation strategy for admission keys.
///
/// The default is identity: the value itself is the key. A dotted path
/// walks the value's nested objects; a custom function takes precedence
/// over a path when both are configured (see [`KeyDeriver::from_parts`]).
///
/// A derivation that finds no key (absent path segment, JSON null, or a
/// custom function returning None) falls back to identity, so such values
/// are still admitted under the value itself as the key.
#[derive(Clone, Default)]
pub enum KeyDeriver {
    /// The value itself is the key
    #[default]
    Identity,
    /// Walk the value's nested objects by field name
    Path(Vec<String>),
    /// Caller-supplied derivation function
    Custom(KeyFn),
}

impl KeyDeriver {
    // == Constructors ==
    /// Creates a path deriver from a dotted path, e.g. `"meta.id"`.
    pub fn path(dotted: &str) -> Self {
        Self::Path(dotted.split('.').map(str::to_string).collect())
    }

    /// Creates a path deriver from an ordered sequence of field names.
    pub fn segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Path(segments.into_iter().map(Into::into).collect())
    }

    /// Creates a custom deriver from a function.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    /// Builds a deriver from optionally-configured parts.
    ///
    /// A custom function takes precedence over a path when both are given;
    /// with neither, the result is identity.
    pub fn from_parts(path: Option<&str>, custom: Option<KeyFn>) -> Self {
        match (custom, path) {
            (Some(f), _) => Self::Custom(f),
            (None, Some(p)) => Self::path(p),
            (None, None) => Self::Identity,
        }
    }

    // == Derive ==
    /// Derives the admission key for a value.
    ///
    /// Falls back to the value itself when the configured strategy finds
    /// no key.
    pub fn derive(&self, value: &Value) -> Value {
        match self {
            Self::Identity => value.clone(),
            Self::Path(segments) => match walk(value, segments) {
                Some(key) => key.clone(),
                None => value.clone(),
            },
            Self::Custom(f) => f(value).unwrap_or_else(|| value.clone()),
        }
    }

    /// Derives the admission key and renders it to the store's key space.
    pub fn derive_rendered(&self, value: &Value) -> String {
        render_key(&self.derive(value))
    }
}

impl fmt::Debug for KeyDeriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity => write!(f, "KeyDeriver::Identity"),
            Self::Path(segments) => write!(f, "KeyDeriver::Path({:?})", segments),
            Self::Custom(_) => write!(f, "KeyDeriver::Custom(..)"),
        }
    }
}

// == Path Walk ==
/// Walks nested objects by field name; None if any segment is absent or
/// the walk lands on JSON null.
fn walk<'a>(value: &'a Value, segments: &[String]) -> Option<&'a Value> {
    let found = segments
        .iter()
        .try_fold(value, |v, segment| v.get(segment.as_str()))?;
    if found.is_null() {
        None
    } else {
        Some(found)
    }
}

// == Key Rendering ==
/// Renders a derived key into the store's String key space.
///
/// String keys stay bare; other values render as compact JSON text.
pub fn render_key(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
