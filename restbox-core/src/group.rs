//! Tagged result variants.
//!
//! A [`Group`] is a `(tag, value)` pair used as the universal result type:
//! the grouper produces one from a raw response, the classification rules
//! transform it, and callers match on [`Group::tag`] to decide what to do.
//!
//! ```
//! use restbox_core::{group, Group, SUCCESS};
//! use serde_json::json;
//!
//! let found: Group = group(SUCCESS, json!({"id": 7}));
//! assert!(found.is(SUCCESS));
//! assert_eq!(found.value()["id"], 7);
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smol_str::SmolStr;

/// Tag of a successful response. Mutation side effects fire on this tag.
pub const SUCCESS: &str = "success";

/// Tag of a connection failure (the transport never got a response).
pub const FAILED: &str = "failed";

/// Tag of a payload failure (the transport got a response it could not parse).
pub const UNACCEPTABLE_RESPONSE: &str = "unacceptableResponse";

/// Tag of a response whose value was rejected by a typed rule.
pub const INVALID_RESPONSE: &str = "invalidResponse";

/// A tagged variant: a non-empty string tag and an opaque JSON value.
///
/// The shape of the value is determined by the tag. Nothing enforces this
/// statically; use [`Group::decode`] to get a typed view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    #[serde(rename = "group")]
    tag: SmolStr,
    value: Value,
}

impl Group {
    /// Creates a group with the given tag and value.
    pub fn new(tag: impl Into<SmolStr>, value: impl Into<Value>) -> Self {
        let tag = tag.into();
        debug_assert!(!tag.is_empty(), "group tag must not be empty");
        Group {
            tag,
            value: value.into(),
        }
    }

    /// Returns the tag.
    #[inline]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Returns the value.
    #[inline]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Returns `true` if the tag equals `tag`.
    #[inline]
    pub fn is(&self, tag: &str) -> bool {
        self.tag == tag
    }

    /// Deserializes the value into `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.value)
    }

    /// Consumes the group and returns the value.
    pub fn into_value(self) -> Value {
        self.value
    }

    /// Consumes the group and returns the tag and value separately.
    pub fn into_parts(self) -> (SmolStr, Value) {
        (self.tag, self.value)
    }
}

/// Shorthand for [`Group::new`].
pub fn group(tag: impl Into<SmolStr>, value: impl Into<Value>) -> Group {
    Group::new(tag, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        id: u32,
        name: String,
    }

    #[test]
    fn decode_typed_value() {
        let g = group(SUCCESS, json!({"id": 1, "name": "ann"}));
        let user: User = g.decode().unwrap();
        assert_eq!(
            user,
            User {
                id: 1,
                name: "ann".into()
            }
        );
        assert!(g.decode::<Vec<u8>>().is_err());
    }

    #[test]
    fn serializes_with_group_field() {
        let g = group("notFound", Value::Null);
        assert_eq!(
            serde_json::to_value(&g).unwrap(),
            json!({"group": "notFound", "value": null})
        );
    }
}
