//! Handler abstraction shared by built-in and custom routes.

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use axum::extract::Request;
use axum::http::Method;
use axum::response::{IntoResponse, Response};
use futures_util::future::BoxFuture;

use crate::routing::pattern::{PatternError, RoutePattern};

/// Future returned by [`RouteHandler::call`].
pub type HandlerFuture = BoxFuture<'static, Response>;

/// Anything that can answer a routed request.
///
/// Implemented for async closures taking the full request, so
/// `|_req: Request| async { "myfunc" }` is a valid handler.
pub trait RouteHandler: Send + Sync + 'static {
    fn call(&self, request: Request) -> HandlerFuture;
}

impl<F, Fut, R> RouteHandler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse,
{
    fn call(&self, request: Request) -> HandlerFuture {
        let fut = (self)(request);
        Box::pin(async move { fut.await.into_response() })
    }
}

/// Methods a route answers to. `Any` is the unset set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MethodSet {
    #[default]
    Any,
    Only(Vec<Method>),
}

impl MethodSet {
    pub fn any() -> Self {
        Self::Any
    }

    pub fn only(methods: impl IntoIterator<Item = Method>) -> Self {
        let mut list: Vec<Method> = Vec::new();
        for method in methods {
            if !list.contains(&method) {
                list.push(method);
            }
        }
        Self::Only(list)
    }

    /// Parse method names such as `["GET", "post"]`.
    pub fn parse<S: AsRef<str>>(names: &[S]) -> Result<Self, axum::http::method::InvalidMethod> {
        let methods = names
            .iter()
            .map(|name| Method::from_str(&name.as_ref().to_ascii_uppercase()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::only(methods))
    }

    pub fn contains(&self, method: &Method) -> bool {
        match self {
            Self::Any => true,
            Self::Only(list) => list.contains(method),
        }
    }
}

impl From<Method> for MethodSet {
    fn from(method: Method) -> Self {
        Self::Only(vec![method])
    }
}

impl From<Vec<Method>> for MethodSet {
    fn from(methods: Vec<Method>) -> Self {
        Self::only(methods)
    }
}

impl<const N: usize> From<[Method; N]> for MethodSet {
    fn from(methods: [Method; N]) -> Self {
        Self::only(methods)
    }
}

impl From<Option<Vec<Method>>> for MethodSet {
    fn from(methods: Option<Vec<Method>>) -> Self {
        methods.map_or(Self::Any, Self::only)
    }
}

/// A (pattern, methods, handler) triple.
///
/// Used both for the fixed built-in set and for caller-registered custom handlers.
#[derive(Clone)]
pub struct HandlerRoute {
    pattern: RoutePattern,
    methods: MethodSet,
    handler: Arc<dyn RouteHandler>,
}

impl HandlerRoute {
    pub fn new<H: RouteHandler>(
        pattern: &str,
        methods: impl Into<MethodSet>,
        handler: H,
    ) -> Result<Self, PatternError> {
        Ok(Self::from_parts(RoutePattern::parse(pattern)?, methods.into(), Arc::new(handler)))
    }

    pub fn from_parts(pattern: RoutePattern, methods: MethodSet, handler: Arc<dyn RouteHandler>) -> Self {
        Self {
            pattern,
            methods,
            handler,
        }
    }

    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    pub fn methods(&self) -> &MethodSet {
        &self.methods
    }

    pub fn handler(&self) -> &Arc<dyn RouteHandler> {
        &self.handler
    }
}

impl fmt::Debug for HandlerRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRoute")
            .field("pattern", &self.pattern)
            .field("methods", &self.methods)
            .finish_non_exhaustive()
    }
}
