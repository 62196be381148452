//! Result classification rules.
//!
//! [`Matchers`] is an ordered list of rules. Each rule names the tag it
//! handles and a handler that turns the variant's value into the final
//! [`Group`]. Classification picks the **first** rule whose tag equals the
//! variant's tag; if none matches, it fails with [`ApiError::Unmatched`].
//!
//! ## Building rules
//!
//! Every builder method returns a new rule set and leaves the receiver
//! untouched, so a base set can be shared and extended per operation:
//!
//! ```
//! use restbox_core::{group, Matchers, ResponseData, SUCCESS};
//! use restbox_core::request::get;
//! use serde_json::json;
//!
//! let base = Matchers::new().on_success();
//! let with_missing = base.proxy_as("404", "notFound");
//!
//! let response = ResponseData::new(404, json!(null), get("/u/1"));
//! let classified = with_missing.classify(&response, group("404", json!(null))).unwrap();
//! assert_eq!(classified.tag(), "notFound");
//!
//! assert!(base.classify(&response, group("404", json!(null))).is_err());
//! ```
//!
//! ## Typed rules
//!
//! The `*_typed` variants check that the value deserializes into a given
//! type before passing it on. A rejected value yields
//! [`ApiError::Validation`].
//!
//! ## Catch-all
//!
//! [`Matchers::otherwise`] adds a rule that matches any tag. Since the first
//! matching rule wins, it is normally registered last.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use smol_str::SmolStr;

use crate::error::{BoxError, SharedError};
use crate::group::SUCCESS;
use crate::{ApiError, Group, ResponseData};

type Handler = Arc<dyn Fn(Group) -> Result<Group, SharedError> + Send + Sync>;

/// A single classification rule.
#[derive(Clone)]
pub struct Matcher {
    on: Option<SmolStr>,
    handler: Handler,
}

impl Matcher {
    /// Returns the tag this rule handles, or `None` for a catch-all.
    pub fn on(&self) -> Option<&str> {
        self.on.as_deref()
    }

    /// Returns `true` if this rule handles `tag`.
    #[inline]
    pub fn matches(&self, tag: &str) -> bool {
        self.on.as_deref().is_none_or(|on| on == tag)
    }

    fn apply(&self, group: Group) -> Result<Group, SharedError> {
        (self.handler)(group)
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matcher")
            .field("on", &self.on.as_deref().unwrap_or("*"))
            .finish()
    }
}

/// Ordered classification rules.
#[derive(Clone, Default)]
pub struct Matchers {
    items: Vec<Matcher>,
}

impl Matchers {
    /// Creates an empty rule set. Every variant is unmatched.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the rules in registration order.
    pub fn items(&self) -> &[Matcher] {
        &self.items
    }

    fn with(&self, on: Option<SmolStr>, handler: Handler) -> Self {
        let mut items = self.items.clone();
        items.push(Matcher { on, handler });
        Matchers { items }
    }

    /// Handles `tag` with an infallible handler.
    pub fn on<F>(&self, tag: impl Into<SmolStr>, handler: F) -> Self
    where
        F: Fn(Value) -> Group + Send + Sync + 'static,
    {
        self.with(Some(tag.into()), map_value(handler))
    }

    /// Handles `tag` with a handler that may reject the value.
    pub fn try_on<F, E>(&self, tag: impl Into<SmolStr>, handler: F) -> Self
    where
        F: Fn(Value) -> Result<Group, E> + Send + Sync + 'static,
        E: Into<BoxError> + 'static,
    {
        self.with(Some(tag.into()), try_map_value(handler))
    }

    /// Passes `success` through unchanged.
    pub fn on_success(&self) -> Self {
        self.proxy(SUCCESS)
    }

    /// Passes `success` through if its value deserializes into `T`.
    pub fn on_success_typed<T: DeserializeOwned + 'static>(&self) -> Self {
        self.proxy_typed::<T>(SUCCESS)
    }

    /// Passes `tag` through unchanged.
    pub fn proxy(&self, tag: impl Into<SmolStr>) -> Self {
        let tag = tag.into();
        self.proxy_as(tag.clone(), tag)
    }

    /// Passes `tag` through if its value deserializes into `T`.
    pub fn proxy_typed<T: DeserializeOwned + 'static>(&self, tag: impl Into<SmolStr>) -> Self {
        let tag = tag.into();
        self.proxy_as_typed::<T>(tag.clone(), tag)
    }

    /// Renames `from` to `to`, keeping the value.
    pub fn proxy_as(&self, from: impl Into<SmolStr>, to: impl Into<SmolStr>) -> Self {
        self.with(Some(from.into()), rename(to.into()))
    }

    /// Renames `from` to `to` if the value deserializes into `T`.
    pub fn proxy_as_typed<T: DeserializeOwned + 'static>(
        &self,
        from: impl Into<SmolStr>,
        to: impl Into<SmolStr>,
    ) -> Self {
        self.with(Some(from.into()), rename_typed::<T>(to.into()))
    }

    /// Handles any tag not matched by an earlier rule.
    ///
    /// The handler receives the whole variant so it can inspect the tag.
    pub fn otherwise<F>(&self, handler: F) -> Self
    where
        F: Fn(Group) -> Group + Send + Sync + 'static,
    {
        self.with(None, rule(move |group: Group| Ok(handler(group))))
    }

    /// Classifies `group`, produced from `response`.
    ///
    /// Returns [`ApiError::Unmatched`] if no rule handles the tag and
    /// [`ApiError::Validation`] if the matching rule rejects the value.
    pub fn classify(&self, response: &ResponseData, group: Group) -> Result<Group, ApiError> {
        let Some(matcher) = self.items.iter().find(|m| m.matches(group.tag())) else {
            return Err(ApiError::unmatched(response.clone(), group));
        };
        let tag = SmolStr::from(group.tag());
        matcher.apply(group).map_err(|source| ApiError::Validation {
            response: Box::new(response.clone()),
            tag,
            source,
        })
    }
}

impl fmt::Debug for Matchers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}

fn rule<F>(handler: F) -> Handler
where
    F: Fn(Group) -> Result<Group, SharedError> + Send + Sync + 'static,
{
    Arc::new(handler)
}

fn map_value<F>(handler: F) -> Handler
where
    F: Fn(Value) -> Group + Send + Sync + 'static,
{
    rule(move |group: Group| Ok(handler(group.into_value())))
}

fn try_map_value<F, E>(handler: F) -> Handler
where
    F: Fn(Value) -> Result<Group, E> + Send + Sync + 'static,
    E: Into<BoxError> + 'static,
{
    rule(move |group: Group| {
        handler(group.into_value()).map_err(|err| {
            let err: BoxError = err.into();
            SharedError::from(err)
        })
    })
}

fn rename(to: SmolStr) -> Handler {
    rule(move |group: Group| Ok(Group::new(to.clone(), group.into_value())))
}

fn rename_typed<T: DeserializeOwned + 'static>(to: SmolStr) -> Handler {
    rule(move |group: Group| {
        validate::<T>(group.value())?;
        Ok(Group::new(to.clone(), group.into_value()))
    })
}

fn validate<T: DeserializeOwned>(value: &Value) -> Result<(), SharedError> {
    T::deserialize(value)
        .map(drop)
        .map_err(|err| Arc::new(err) as SharedError)
}
