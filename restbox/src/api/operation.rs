use std::fmt;
use std::sync::Arc;

use restbox_core::{BoxError, Matchers, RequestData};
use smol_str::SmolStr;

use crate::store::QueryCache;

type RequestFn<P> = Arc<dyn Fn(P) -> RequestData + Send + Sync>;

/// Side effect run after a successful mutation.
pub type Effect = Arc<dyn Fn(&QueryCache) -> Result<(), BoxError> + Send + Sync>;

/// A named, cached read operation.
///
/// Definitions are independent of any [`Api`](crate::Api): declare them once
/// and run them against as many engines as needed.
///
/// ```
/// use restbox::Query;
/// use restbox::request::get;
/// use restbox_core::Matchers;
///
/// let user = Query::new("user", |id: u32| get(format!("/users/{id}")), Matchers::new().on_success());
/// assert_eq!(user.request(7).url(), "/users/7");
/// ```
pub struct Query<P> {
    name: SmolStr,
    request: RequestFn<P>,
    matchers: Matchers,
}

impl<P> Query<P> {
    /// Creates a query named `name` that builds its descriptor with
    /// `request` and classifies responses with `matchers`.
    pub fn new<F>(name: impl Into<SmolStr>, request: F, matchers: Matchers) -> Self
    where
        F: Fn(P) -> RequestData + Send + Sync + 'static,
    {
        Query {
            name: name.into(),
            request: Arc::new(request),
            matchers,
        }
    }

    /// Returns the operation name recorded in cache entries.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the classification rules.
    pub fn matchers(&self) -> &Matchers {
        &self.matchers
    }

    /// Builds the descriptor for `params`.
    pub fn request(&self, params: P) -> RequestData {
        (self.request)(params)
    }

    pub(crate) fn name_owned(&self) -> SmolStr {
        self.name.clone()
    }
}

impl<P> Clone for Query<P> {
    fn clone(&self) -> Self {
        Query {
            name: self.name.clone(),
            request: self.request.clone(),
            matchers: self.matchers.clone(),
        }
    }
}

impl<P> fmt::Debug for Query<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("name", &self.name)
            .field("matchers", &self.matchers)
            .finish()
    }
}

/// A named write operation.
///
/// Mutations always reach the fetcher and never touch the cache, except
/// through the optional [`effect_on_success`](Mutation::effect_on_success).
pub struct Mutation<P> {
    name: SmolStr,
    request: RequestFn<P>,
    matchers: Matchers,
    effect: Option<Effect>,
}

impl<P> Mutation<P> {
    /// Creates a mutation without side effect.
    pub fn new<F>(name: impl Into<SmolStr>, request: F, matchers: Matchers) -> Self
    where
        F: Fn(P) -> RequestData + Send + Sync + 'static,
    {
        Mutation {
            name: name.into(),
            request: Arc::new(request),
            matchers,
            effect: None,
        }
    }

    /// Runs `effect` once each time the grouper tags the response `success`
    /// and a rule accepts it, whatever tag that rule produces. A failing
    /// effect is logged, the mutation result is kept.
    pub fn effect_on_success<F>(self, effect: F) -> Self
    where
        F: Fn(&QueryCache) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Mutation {
            effect: Some(Arc::new(effect)),
            ..self
        }
    }

    /// Returns the operation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the classification rules.
    pub fn matchers(&self) -> &Matchers {
        &self.matchers
    }

    /// Builds the descriptor for `params`.
    pub fn request(&self, params: P) -> RequestData {
        (self.request)(params)
    }

    pub(crate) fn name_owned(&self) -> SmolStr {
        self.name.clone()
    }

    pub(crate) fn effect(&self) -> Option<Effect> {
        self.effect.clone()
    }
}

impl<P> Clone for Mutation<P> {
    fn clone(&self) -> Self {
        Mutation {
            name: self.name.clone(),
            request: self.request.clone(),
            matchers: self.matchers.clone(),
            effect: self.effect.clone(),
        }
    }
}

impl<P> fmt::Debug for Mutation<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutation")
            .field("name", &self.name)
            .field("matchers", &self.matchers)
            .field("effect", &self.effect.is_some())
            .finish()
    }
}
