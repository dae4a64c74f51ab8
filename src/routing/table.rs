//! Route table compilation and dispatch.
//!
//! # Responsibilities
//! - Flatten custom and built-in handler lists into one ordered route list
//! - Look up the first route matching a request's path and method
//! - Run the matched handler, or answer 404/405 explicitly
//!
//! # Design Decisions
//! - Immutable after compilation; a new table is built on every restart
//! - Custom handlers are registered newest first, ahead of every built-in
//! - First registration wins, so overlapping patterns resolve by order
//! - A route with an unset method set registers once for all methods,
//!   otherwise once per listed method

use std::sync::Arc;

use axum::extract::Request;
use axum::http::{Method, StatusCode};
use axum::response::Response;

use crate::http::response::plain_text;
use crate::routing::handler::{HandlerRoute, MethodSet, RouteHandler};
use crate::routing::pattern::{decode_path, PathParams, RoutePattern};

/// Where a compiled route came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOrigin {
    Custom,
    Builtin,
}

impl RouteOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteOrigin::Custom => "custom",
            RouteOrigin::Builtin => "builtin",
        }
    }
}

/// One registration in the routing engine.
pub struct CompiledRoute {
    pattern: RoutePattern,
    method: Option<Method>,
    handler: Arc<dyn RouteHandler>,
    origin: RouteOrigin,
}

impl CompiledRoute {
    pub fn template(&self) -> &str {
        self.pattern.template()
    }

    /// `None` means the route answers every method.
    pub fn method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    pub fn origin(&self) -> RouteOrigin {
        self.origin
    }
}

/// Result of looking up a request in the table.
pub enum RouteMatch<'a> {
    Matched {
        route: &'a CompiledRoute,
        params: PathParams,
    },
    /// Some pattern matched the path but none accepted the method.
    MethodNotAllowed,
    NotFound,
}

/// The concrete request-dispatch structure served by one server generation.
#[derive(Default)]
pub struct RoutingEngine {
    routes: Vec<CompiledRoute>,
}

impl RoutingEngine {
    /// Build the table: custom handlers in reverse registration order, then built-ins.
    pub fn compile(custom: &[HandlerRoute], builtin: &[HandlerRoute]) -> Self {
        let mut engine = Self::default();
        for route in custom.iter().rev() {
            engine.register(route, RouteOrigin::Custom);
        }
        for route in builtin {
            engine.register(route, RouteOrigin::Builtin);
        }

        tracing::debug!(
            custom = custom.len(),
            builtin = builtin.len(),
            registrations = engine.routes.len(),
            "Route table compiled"
        );
        engine
    }

    fn register(&mut self, route: &HandlerRoute, origin: RouteOrigin) {
        match route.methods() {
            MethodSet::Any => self.push(route, None, origin),
            MethodSet::Only(methods) => {
                for method in methods {
                    self.push(route, Some(method.clone()), origin);
                }
            }
        }
    }

    fn push(&mut self, route: &HandlerRoute, method: Option<Method>, origin: RouteOrigin) {
        self.routes.push(CompiledRoute {
            pattern: route.pattern().clone(),
            method,
            handler: Arc::clone(route.handler()),
            origin,
        });
    }

    pub fn routes(&self) -> &[CompiledRoute] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Find the first registration matching `method` and `path`.
    pub fn find(&self, method: &Method, path: &str) -> RouteMatch<'_> {
        let mut path_matched = false;
        for route in &self.routes {
            let Some(params) = route.pattern.captures(path) else {
                continue;
            };
            path_matched = true;
            if route.method.as_ref().map_or(true, |m| m == method) {
                return RouteMatch::Matched { route, params };
            }
        }

        if path_matched {
            RouteMatch::MethodNotAllowed
        } else {
            RouteMatch::NotFound
        }
    }

    /// Run the request through the matching handler.
    ///
    /// Matching uses the percent-decoded path.
    ///
    /// Returns the response and the origin of the route that produced it
    /// (`None` for the table's own 404/405 answers).
    pub async fn dispatch(&self, mut request: Request) -> (Response, Option<RouteOrigin>) {
        let path = decode_path(request.uri().path()).into_owned();
        match self.find(request.method(), &path) {
            RouteMatch::Matched { route, params } => {
                request.extensions_mut().insert(params);
                let response = route.handler.call(request).await;
                (response, Some(route.origin))
            }
            RouteMatch::MethodNotAllowed => (
                plain_text(StatusCode::METHOD_NOT_ALLOWED, "405 method not allowed"),
                None,
            ),
            RouteMatch::NotFound => (plain_text(StatusCode::NOT_FOUND, "404 page not found"), None),
        }
    }
}
