//! Built-in request handlers.
//!
//! # Handlers
//! - serve-message (GET, and POST unless POST is the update method):
//!   stored body + status + configured headers, or 404
//! - update-message (PUT by default): stores `{"message": ..., "status"?: ...}`
//!   when mutation is enabled
//! - CORS preflight (OPTIONS): allow-origin/allow-methods headers, no body
//!
//! All three share the catch-all pattern; the path variable is the registry key.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::http::response::{plain_text, stored_message, success};
use crate::registry::{normalize_path, HeaderSet, ResponseRegistry};
use crate::routing::{decode_path, HandlerFuture, HandlerRoute, MethodSet, PathParams, RouteHandler, RoutePattern};

/// Pattern every built-in is registered under.
pub const BUILTIN_PATTERN: &str = "/{path:.*}";

/// Name of the route variable carrying the registry key.
pub const PATH_VARIABLE: &str = "path";

/// Body limit applied to update requests unless configured otherwise.
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Knobs for the built-in set.
#[derive(Debug, Clone)]
pub struct BuiltinOptions {
    /// `PUT` or `POST`.
    pub update_method: Method,
    pub max_body_bytes: usize,
}

impl Default for BuiltinOptions {
    fn default() -> Self {
        Self {
            update_method: Method::PUT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Build the fixed (pattern, methods, handler) list, in registration order.
pub fn builtin_routes(
    registry: Arc<ResponseRegistry>,
    headers: Arc<HeaderSet>,
    options: &BuiltinOptions,
) -> Vec<HandlerRoute> {
    let serve_methods = if options.update_method == Method::POST {
        MethodSet::from(Method::GET)
    } else {
        MethodSet::from([Method::GET, Method::POST])
    };

    let serve = ServeMessage {
        registry: Arc::clone(&registry),
        headers,
    };
    let update = UpdateMessage {
        registry,
        max_body_bytes: options.max_body_bytes,
    };

    vec![
        builtin(serve_methods, serve),
        builtin(MethodSet::from(options.update_method.clone()), update),
        builtin(MethodSet::from(Method::OPTIONS), CorsPreflight),
    ]
}

fn builtin<H: RouteHandler>(methods: MethodSet, handler: H) -> HandlerRoute {
    let pattern = builtin_pattern();
    HandlerRoute::from_parts(pattern, methods, Arc::new(handler))
}

fn builtin_pattern() -> RoutePattern {
    match RoutePattern::parse(BUILTIN_PATTERN) {
        Ok(pattern) => pattern,
        Err(err) => unreachable!("built-in pattern is valid: {err}"),
    }
}

/// Registry key for the request: the route variable, else the decoded path.
fn registry_key(request: &Request) -> String {
    match request
        .extensions()
        .get::<PathParams>()
        .and_then(|params| params.get(PATH_VARIABLE))
    {
        Some(captured) => normalize_path(captured).to_string(),
        None => normalize_path(&decode_path(request.uri().path())).to_string(),
    }
}

/// Answers GET/POST with the stored message.
pub struct ServeMessage {
    registry: Arc<ResponseRegistry>,
    headers: Arc<HeaderSet>,
}

impl RouteHandler for ServeMessage {
    fn call(&self, request: Request) -> HandlerFuture {
        let key = registry_key(&request);
        let response = match self.registry.message(&key) {
            Some(entry) => stored_message(entry, &self.headers),
            None => {
                tracing::debug!(path = %key, "No message registered");
                plain_text(StatusCode::NOT_FOUND, "404 page not found")
            }
        };
        Box::pin(async move { response })
    }
}

/// Update body accepted by [`UpdateMessage`].
#[derive(Debug, Deserialize)]
struct MessageUpdate {
    message: Option<String>,
    status: Option<u16>,
}

/// Stores a message sent in the request body.
pub struct UpdateMessage {
    registry: Arc<ResponseRegistry>,
    max_body_bytes: usize,
}

impl RouteHandler for UpdateMessage {
    fn call(&self, request: Request) -> HandlerFuture {
        let registry = Arc::clone(&self.registry);
        let limit = self.max_body_bytes;
        Box::pin(async move {
            if !registry.mutation_enabled() {
                tracing::debug!(path = %request.uri().path(), "Mutation disabled, update ignored");
                return StatusCode::OK.into_response();
            }

            let key = registry_key(&request);
            match read_update(request.into_body(), limit).await {
                Ok((message, status)) => {
                    registry.set_message_with_status(&key, message, status);
                    success()
                }
                Err(reason) => {
                    tracing::warn!(path = %key, %reason, "Rejected message update");
                    plain_text(StatusCode::INTERNAL_SERVER_ERROR, &reason)
                }
            }
        })
    }
}

async fn read_update(body: Body, limit: usize) -> Result<(String, StatusCode), String> {
    let bytes = axum::body::to_bytes(body, limit)
        .await
        .map_err(|e| format!("Error reading body: {e}"))?;
    let update: MessageUpdate =
        serde_json::from_slice(&bytes).map_err(|e| format!("Error unmarshalling body: {e}"))?;
    let message = update
        .message
        .ok_or_else(|| "Error: message is empty".to_string())?;
    let status = match update.status {
        Some(code) => StatusCode::from_u16(code).map_err(|_| format!("Error: invalid status {code}"))?,
        None => StatusCode::OK,
    };
    Ok((message, status))
}

/// Answers browser preflight requests.
pub struct CorsPreflight;

impl RouteHandler for CorsPreflight {
    fn call(&self, _request: Request) -> HandlerFuture {
        let mut response = Response::new(Body::empty());
        let headers = response.headers_mut();
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, POST, PUT"),
        );
        Box::pin(async move { response })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::RoutingEngine;

    struct Fixture {
        registry: Arc<ResponseRegistry>,
        engine: RoutingEngine,
    }

    fn fixture(options: BuiltinOptions) -> Fixture {
        let registry = Arc::new(ResponseRegistry::new());
        let headers = Arc::new(HeaderSet::new());
        let routes = builtin_routes(Arc::clone(&registry), headers, &options);
        Fixture {
            registry,
            engine: RoutingEngine::compile(&[], &routes),
        }
    }

    async fn send(engine: &RoutingEngine, method: Method, uri: &str, body: &str) -> (StatusCode, String, Response) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::from(body.to_string()))
            .unwrap();
        let (response, _) = engine.dispatch(request).await;
        let (parts, body) = response.into_parts();
        let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        (parts.status, text, Response::from_parts(parts, Body::empty()))
    }

    #[tokio::test]
    async fn serve_returns_stored_message_with_headers() {
        let fx = fixture(BuiltinOptions::default());
        fx.registry
            .set_message_with_status("/teapot", "{\"short\":true}", StatusCode::IM_A_TEAPOT);

        for method in [Method::GET, Method::POST] {
            let (status, body, response) = send(&fx.engine, method, "/teapot?ignored=1", "").await;
            assert_eq!(status, StatusCode::IM_A_TEAPOT);
            assert_eq!(body, "{\"short\":true}");
            assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        }
    }

    #[tokio::test]
    async fn encoded_paths_share_keys_with_management_calls() {
        let fx = fixture(BuiltinOptions::default());
        fx.registry.set_message("hello world", "spaced");

        let (status, body, _) = send(&fx.engine, Method::GET, "/hello%20world", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "spaced");

        send(&fx.engine, Method::PUT, "/caf%C3%A9", r#"{"message":"crème"}"#).await;
        assert_eq!(fx.registry.message("café").unwrap().body(), "crème");
    }

    #[tokio::test]
    async fn serve_unknown_path_is_404() {
        let fx = fixture(BuiltinOptions::default());
        let (status, body, _) = send(&fx.engine, Method::GET, "/nothing/here", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "404 page not found\n");
    }

    #[tokio::test]
    async fn update_stores_message_and_status() {
        let fx = fixture(BuiltinOptions::default());
        let (status, body, _) = send(
            &fx.engine,
            Method::PUT,
            "/foo",
            r#"{"message":"hi","status":201}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "success");

        let entry = fx.registry.message("foo").unwrap();
        assert_eq!(entry.body(), "hi");
        assert_eq!(entry.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn update_defaults_status_to_200() {
        let fx = fixture(BuiltinOptions::default());
        send(&fx.engine, Method::PUT, "/nested/path", r#"{"message":"x"}"#).await;
        assert_eq!(fx.registry.message("nested/path").unwrap().status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn update_failures_are_500() {
        let fx = fixture(BuiltinOptions {
            max_body_bytes: 64,
            ..BuiltinOptions::default()
        });

        let cases = [
            ("not json", "Error unmarshalling body"),
            (r#"{"status":201}"#, "Error: message is empty"),
            (r#"{"message":null}"#, "Error: message is empty"),
            (r#"{"message":"x","status":7}"#, "Error: invalid status 7"),
            (r#"{"message":"x","status":-1}"#, "Error unmarshalling body"),
        ];
        for (payload, expected) in cases {
            let (status, body, _) = send(&fx.engine, Method::PUT, "/bad", payload).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{payload}");
            assert!(body.starts_with(expected), "{payload}: {body}");
        }

        let oversized = format!(r#"{{"message":"{}"}}"#, "x".repeat(128));
        let (status, body, _) = send(&fx.engine, Method::PUT, "/bad", &oversized).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.starts_with("Error reading body"));

        assert!(fx.registry.message("bad").is_none());
    }

    #[tokio::test]
    async fn disabled_mutation_is_silent_noop() {
        let fx = fixture(BuiltinOptions::default());
        fx.registry.set_message("foo", "original");
        fx.registry.disable_mutation();

        let (status, body, _) = send(&fx.engine, Method::PUT, "/foo", r#"{"message":"hi"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
        assert_eq!(fx.registry.message("foo").unwrap().body(), "original");
    }

    #[tokio::test]
    async fn preflight_sets_cors_headers() {
        let fx = fixture(BuiltinOptions::default());
        let (status, body, response) = send(&fx.engine, Method::OPTIONS, "/anything", "").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS],
            "GET, POST, PUT"
        );
    }

    #[tokio::test]
    async fn post_as_update_method() {
        let fx = fixture(BuiltinOptions {
            update_method: Method::POST,
            ..BuiltinOptions::default()
        });

        let (_, body, _) = send(&fx.engine, Method::POST, "/foo", r#"{"message":"via post"}"#).await;
        assert_eq!(body, "success");
        assert_eq!(fx.registry.message("foo").unwrap().body(), "via post");

        let (status, _, _) = send(&fx.engine, Method::PUT, "/foo", r#"{"message":"x"}"#).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }
}
