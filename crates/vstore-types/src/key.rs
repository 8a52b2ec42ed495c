use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Separator used when a key is encoded as a single byte string.
const PATH_SEPARATOR: u8 = 0;

/// Separator of the dotted text form.
const DOT: char = '.';

/// Application-level key of one content entry.
///
/// A key is a non-empty sequence of non-empty elements, e.g. `["db",
/// "orders"]`, and displays as `db.orders`. Keys order element-wise, which
/// gives trees and diffs a stable order. Elements never contain `.`, so
/// the dotted form parses back to the same key.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Key {
    elements: Vec<String>,
}

impl Key {
    /// Build a key from its elements.
    pub fn new<I, S>(elements: I) -> Result<Self, TypeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let elements: Vec<String> = elements.into_iter().map(Into::into).collect();
        if elements.is_empty() {
            return Err(TypeError::InvalidKey("key must have at least one element".into()));
        }
        for element in &elements {
            if element.is_empty() {
                return Err(TypeError::InvalidKey("key elements must not be empty".into()));
            }
            if element.as_bytes().contains(&PATH_SEPARATOR) {
                return Err(TypeError::InvalidKey(format!(
                    "key element {element:?} contains a NUL byte"
                )));
            }
            if element.contains(DOT) {
                return Err(TypeError::InvalidKey(format!(
                    "key element {element:?} contains '.'"
                )));
            }
        }
        Ok(Self { elements })
    }

    /// The elements of this key.
    pub fn elements(&self) -> &[String] {
        &self.elements
    }

    /// The last element (e.g. the table name of `db.orders`).
    pub fn name(&self) -> &str {
        // Construction guarantees at least one element.
        self.elements.last().map(String::as_str).unwrap_or_default()
    }

    /// Encode the key as one byte string, elements joined by NUL.
    pub fn to_path_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (i, element) in self.elements.iter().enumerate() {
            if i > 0 {
                out.push(PATH_SEPARATOR);
            }
            out.extend_from_slice(element.as_bytes());
        }
        out
    }

    /// Decode a key produced by [`Key::to_path_bytes`].
    pub fn from_path_bytes(bytes: &[u8]) -> Result<Self, TypeError> {
        let elements = bytes
            .split(|b| *b == PATH_SEPARATOR)
            .map(|part| {
                String::from_utf8(part.to_vec())
                    .map_err(|e| TypeError::InvalidKey(format!("key is not UTF-8: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(elements)
    }
}

impl TryFrom<Vec<String>> for Key {
    type Error = TypeError;

    fn try_from(elements: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(elements)
    }
}

impl From<Key> for Vec<String> {
    fn from(key: Key) -> Self {
        key.elements
    }
}

/// Parses dotted notation: `"db.orders"` becomes `["db", "orders"]`.
impl FromStr for Key {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.split(DOT))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.elements.join("."))
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({self})")
    }
}
