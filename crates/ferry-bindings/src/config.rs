//! Property-file configuration
//!
//! The format is the classic `.properties` layout:
//!
//! - leading whitespace is skipped; lines starting with `#` or `!` are comments
//! - the key runs up to the first `=`, `:` or line end
//! - values understand the escapes `\t`, `\r`, `\n`, `\f`; any other escaped
//!   character stands for itself
//! - a backslash at the end of a line continues the value on the next line
//! - keys and values are trimmed
//!
//! Saved files contain one `key: value` line per entry, sorted by key.
//!
//! [`ConfigObject`] exposes the dotted keys as a tree of objects, so
//! `app.window.width` is reachable with `get_ns("app.window.width")`.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use ferry_core::{BridgeError, BridgeResult, Object, Value};
use parking_lot::RwLock;
use tracing::debug;

/// Key/value pairs read from a property file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyFile {
    entries: BTreeMap<String, String>,
}

impl PropertyFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse property-file text. Parsing never fails; malformed lines become
    /// keys with empty values.
    pub fn parse(text: &str) -> Self {
        let mut file = Self::new();
        let mut chars = text.chars().peekable();
        loop {
            while chars.next_if(|c| c.is_whitespace()).is_some() {}
            let Some(first) = chars.next() else {
                break;
            };
            if first == '#' || first == '!' {
                while chars.next_if(|c| *c != '\n' && *c != '\r').is_some() {}
                continue;
            }

            let mut key = String::from(first);
            let mut separated = matches!(first, '=' | ':');
            if separated {
                key.clear();
            } else {
                while let Some(c) = chars.next_if(|c| *c != '\n' && *c != '\r') {
                    if c == '=' || c == ':' {
                        separated = true;
                        break;
                    }
                    key.push(c);
                }
            }

            let mut value = String::new();
            if separated {
                while let Some(c) = read_char(&mut chars) {
                    value.push(c);
                }
            }
            file.set(key.trim(), value.trim());
        }
        file
    }

    /// Read and parse the file at `path`
    pub fn load(path: impl AsRef<Path>) -> BridgeResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| BridgeError::Io(format!("{}: {}", path.display(), e)))?;
        let file = Self::parse(&text);
        debug!(path = %path.display(), entries = file.len(), "property file loaded");
        Ok(file)
    }

    /// Write `key: value` lines to `path`
    pub fn save(&self, path: impl AsRef<Path>) -> BridgeResult<()> {
        let path = path.as_ref();
        fs::write(path, self.to_text())
            .map_err(|e| BridgeError::Io(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), entries = self.len(), "property file saved");
        Ok(())
    }

    /// The saved representation
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.entries {
            let _ = writeln!(out, "{}: {}", key, value);
        }
        out
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Keys starting with `prefix`, in order
    pub fn keys_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> {
        self.entries
            .range::<str, _>((std::ops::Bound::Included(prefix), std::ops::Bound::Unbounded))
            .map(|(k, _)| k.as_str())
            .take_while(move |k| k.starts_with(prefix))
    }
}

/// Next value character, or `None` at the end of the line
fn read_char(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<char> {
    loop {
        match chars.next()? {
            '\\' => match chars.next()? {
                't' => return Some('\t'),
                'r' => return Some('\r'),
                'n' => return Some('\n'),
                'f' => return Some('\u{0c}'),
                '\r' => {
                    chars.next_if_eq(&'\n');
                }
                '\n' => {}
                other => return Some(other),
            },
            '\n' | '\r' => return None,
            c => return Some(c),
        }
    }
}

/// A property file seen as a tree of objects
///
/// Every view shares the same file; writes through any view are visible to
/// all of them.
#[derive(Clone)]
pub struct ConfigObject {
    file: Arc<RwLock<PropertyFile>>,
    prefix: String,
}

impl ConfigObject {
    pub fn new(file: PropertyFile) -> Self {
        Self {
            file: Arc::new(RwLock::new(file)),
            prefix: String::new(),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> BridgeResult<Self> {
        Ok(Self::new(PropertyFile::load(path)?))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> BridgeResult<()> {
        self.file.read().save(path)
    }

    /// Dotted prefix of this view, empty for the root
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// A copy of the underlying file
    pub fn snapshot(&self) -> PropertyFile {
        self.file.read().clone()
    }

    fn child(&self, key: String) -> Self {
        Self {
            file: self.file.clone(),
            prefix: key + ".",
        }
    }
}

impl Object for ConfigObject {
    fn type_name(&self) -> &str {
        "Config"
    }

    fn get(&self, name: &str) -> BridgeResult<Value> {
        let key = format!("{}{}", self.prefix, name);
        let file = self.file.read();
        if let Some(value) = file.get(&key) {
            return Ok(Value::string(value));
        }
        let nested = format!("{}.", key);
        if file.keys_with_prefix(&nested).next().is_some() {
            drop(file);
            return Ok(Value::Object(Arc::new(self.child(key))));
        }
        Ok(Value::Undefined)
    }

    fn set(&self, name: &str, value: Value) -> BridgeResult<()> {
        let text = match &value {
            Value::String(s) => s.to_string(),
            Value::Bool(_) | Value::Int(_) | Value::Double(_) | Value::Null => value.to_string(),
            other => {
                return Err(BridgeError::property_rejected(
                    self.type_name(),
                    name,
                    format!("cannot store a {} in a property file", other.value_type().name()),
                ));
            }
        };
        self.file
            .write()
            .set(format!("{}{}", self.prefix, name), text);
        Ok(())
    }

    fn property_names(&self) -> Vec<String> {
        let file = self.file.read();
        let names: BTreeSet<&str> = file
            .keys_with_prefix(&self.prefix)
            .map(|key| {
                let rest = &key[self.prefix.len()..];
                rest.split('.').next().unwrap_or(rest)
            })
            .collect();
        names.into_iter().map(String::from).collect()
    }

    fn has_property(&self, name: &str) -> bool {
        let key = format!("{}{}", self.prefix, name);
        let file = self.file.read();
        file.contains_key(&key) || file.keys_with_prefix(&format!("{}.", key)).next().is_some()
    }

    fn equals(&self, other: &dyn Object) -> bool {
        other
            .as_any()
            .and_then(|any| any.downcast_ref::<ConfigObject>())
            .is_some_and(|other| Arc::ptr_eq(&self.file, &other.file) && self.prefix == other.prefix)
    }

    fn as_any(&self) -> Option<&dyn Any> {
        Some(self)
    }
}
