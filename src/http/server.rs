//! Mock server and its lifecycle.
//!
//! # Responsibilities
//! - Own the listener, the response registry and the custom handler list
//! - Build the Axum app for each serving generation around a compiled route table
//! - Start (background or current task), stop (graceful) and restart
//! - Expose the management surface used by the embedding program
//!
//! # Design Decisions
//! - Registry contents are live; route table changes need `restart`
//! - One lifecycle lock serializes start/stop/restart, so a restart is atomic
//!   for every other management caller
//! - Rebinds always target the address resolved by the first bind

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::StatusCode,
    response::Response,
    Router,
};
use futures_util::future::BoxFuture;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use crate::config::{MockConfig, MockSettings};
use crate::error::{RestartPhase, ServerError};
use crate::http::builtin::{builtin_routes, BuiltinOptions};
use crate::lifecycle::shutdown::DEFAULT_GRACE_PERIOD;
use crate::lifecycle::{ServerState, Shutdown};
use crate::net::{self, BindAddress, BindPolicy, Listener, TlsMaterial};
use crate::observability::metrics;
use crate::registry::{HeaderSet, ResponseEntry, ResponseRegistry};
use crate::routing::{HandlerRoute, MethodSet, RouteHandler, RoutingEngine};

/// Extra time granted to a serving task beyond its grace period before
/// `stop` stops waiting for it.
const DRAIN_SLACK: Duration = Duration::from_millis(500);

type ServeFuture = BoxFuture<'static, io::Result<()>>;

/// Construction-time settings of a [`MockServer`].
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Serve TLS with this certificate/key pair instead of plaintext.
    pub tls: Option<TlsMaterial>,
    pub bind_policy: BindPolicy,
    /// Drain time for in-flight requests on stop/restart.
    pub shutdown_grace: Duration,
    pub builtin: BuiltinOptions,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            tls: None,
            bind_policy: BindPolicy::default(),
            shutdown_grace: DEFAULT_GRACE_PERIOD,
            builtin: BuiltinOptions::default(),
        }
    }
}

impl ServerOptions {
    pub fn from_config(config: &MockConfig) -> Self {
        Self {
            tls: config
                .listener
                .tls
                .as_ref()
                .map(|tls| TlsMaterial::new(&tls.cert_path, &tls.key_path)),
            bind_policy: BindPolicy {
                attempts: config.listener.bind_attempts,
                delay: Duration::from_millis(config.listener.bind_retry_delay_ms),
            },
            shutdown_grace: Duration::from_millis(config.shutdown.grace_period_ms),
            builtin: BuiltinOptions {
                update_method: config.mock.update_method.method(),
                max_body_bytes: config.mock.max_body_bytes,
            },
        }
    }
}

/// One running generation of the serving engine.
struct Serving {
    generation: u64,
    shutdown: Shutdown,
    /// `None` when served from the caller's task.
    task: Option<JoinHandle<io::Result<()>>>,
}

struct Lifecycle {
    /// Socket reserved but not yet handed to a serving generation.
    listener: Option<Listener>,
    serving: Option<Serving>,
    /// Table attached by the next start; replaced on every restart.
    engine: Arc<RoutingEngine>,
    generation: u64,
}

/// A mock HTTP server whose responses and routes can change at runtime.
pub struct MockServer {
    address: BindAddress,
    local_addr: SocketAddr,
    options: ServerOptions,
    registry: Arc<ResponseRegistry>,
    headers: Arc<HeaderSet>,
    builtins: Vec<HandlerRoute>,
    custom: Mutex<Vec<HandlerRoute>>,
    lifecycle: tokio::sync::Mutex<Lifecycle>,
    state: watch::Sender<ServerState>,
}

impl MockServer {
    /// Bind a plaintext server to `address` (`":8080"`, `"127.0.0.1:0"`, `8080u16`, ...).
    pub async fn bind(address: impl Into<BindAddress>) -> Result<Self, ServerError> {
        Self::with_options(address, ServerOptions::default()).await
    }

    /// Bind a server that serves TLS with the given PEM files.
    pub async fn bind_tls(
        address: impl Into<BindAddress>,
        cert_path: impl Into<std::path::PathBuf>,
        key_path: impl Into<std::path::PathBuf>,
    ) -> Result<Self, ServerError> {
        let options = ServerOptions {
            tls: Some(TlsMaterial::new(cert_path, key_path)),
            ..ServerOptions::default()
        };
        Self::with_options(address, options).await
    }

    /// Build the server and reserve its listening socket. Nothing is served until `start`.
    pub async fn with_options(address: impl Into<BindAddress>, options: ServerOptions) -> Result<Self, ServerError> {
        let address = address.into();
        let listener = net::acquire(&address, &options.bind_policy).await?;
        let local_addr = listener.local_addr();

        let registry = Arc::new(ResponseRegistry::new());
        let headers = Arc::new(HeaderSet::new());
        let builtins = builtin_routes(Arc::clone(&registry), Arc::clone(&headers), &options.builtin);
        let engine = Arc::new(RoutingEngine::compile(&[], &builtins));
        let (state, _) = watch::channel(ServerState::Unbound);

        tracing::info!(
            address = %address,
            local_addr = %local_addr,
            tls = options.tls.is_some(),
            "Mock server created"
        );

        Ok(Self {
            address,
            local_addr,
            options,
            registry,
            headers,
            builtins,
            custom: Mutex::new(Vec::new()),
            lifecycle: tokio::sync::Mutex::new(Lifecycle {
                listener: Some(listener),
                serving: None,
                engine,
                generation: 0,
            }),
            state,
        })
    }

    /// Build a server from a validated configuration and apply its `[mock]` section.
    pub async fn from_config(config: &MockConfig) -> Result<Self, ServerError> {
        let server = Self::with_options(
            config.listener.bind_address.as_str(),
            ServerOptions::from_config(config),
        )
        .await?;
        server.apply_settings(&config.mock)?;
        Ok(server)
    }

    /// Address as requested at construction.
    pub fn address(&self) -> &BindAddress {
        &self.address
    }

    /// Address the listener is bound to (port `0` resolved).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_tls(&self) -> bool {
        self.options.tls.is_some()
    }

    pub fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    /// Resolves once the server is no longer listening.
    pub async fn wait_until_stopped(&self) {
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(|state| !state.is_listening()).await;
    }

    pub fn registry(&self) -> &ResponseRegistry {
        &self.registry
    }

    pub fn headers(&self) -> &HeaderSet {
        &self.headers
    }

    // --- response registry -------------------------------------------------

    pub fn set_message(&self, path: &str, body: impl Into<String>) {
        self.registry.set_message(path, body);
    }

    pub fn set_message_with_status(&self, path: &str, body: impl Into<String>, status: StatusCode) {
        self.registry.set_message_with_status(path, body, status);
    }

    pub fn delete_message(&self, path: &str) -> Option<ResponseEntry> {
        self.registry.delete_message(path)
    }

    pub fn message(&self, path: &str) -> Option<ResponseEntry> {
        self.registry.message(path)
    }

    pub fn set_header(&self, name: &str, value: &str) -> Result<(), ServerError> {
        Ok(self.headers.set(name, value)?)
    }

    pub fn delete_header(&self, name: &str) -> bool {
        self.headers.remove(name)
    }

    pub fn enable_mutation(&self) {
        self.registry.enable_mutation();
    }

    pub fn disable_mutation(&self) {
        self.registry.disable_mutation();
    }

    pub fn mutation_enabled(&self) -> bool {
        self.registry.mutation_enabled()
    }

    /// Re-apply the live part of a configuration: headers, mutation flag, seeded messages.
    ///
    /// Update method and body limit are fixed at construction.
    pub fn apply_settings(&self, settings: &MockSettings) -> Result<(), ServerError> {
        self.headers
            .replace_all(settings.headers.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;
        self.registry.set_mutation(settings.mutation_enabled);
        for seed in &settings.messages {
            match StatusCode::from_u16(seed.status) {
                Ok(status) => self
                    .registry
                    .set_message_with_status(&seed.path, seed.body.clone(), status),
                Err(_) => tracing::warn!(
                    path = %seed.path,
                    status = seed.status,
                    "Skipping seeded message with invalid status"
                ),
            }
        }
        Ok(())
    }

    // --- custom handlers ---------------------------------------------------

    fn custom(&self) -> MutexGuard<'_, Vec<HandlerRoute>> {
        self.custom.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a custom handler. Takes effect on the next restart.
    ///
    /// Newer registrations shadow older ones and every built-in.
    pub fn add_handler<H: RouteHandler>(
        &self,
        pattern: &str,
        methods: impl Into<MethodSet>,
        handler: H,
    ) -> Result<(), ServerError> {
        let route = HandlerRoute::new(pattern, methods, handler)?;
        tracing::info!(pattern, methods = ?route.methods(), "Custom handler registered");
        self.custom().push(route);
        Ok(())
    }

    pub async fn add_handler_and_restart<H: RouteHandler>(
        &self,
        pattern: &str,
        methods: impl Into<MethodSet>,
        handler: H,
    ) -> Result<(), ServerError> {
        self.add_handler(pattern, methods, handler)?;
        self.restart().await
    }

    /// Drop every custom handler registered under `pattern`. Takes effect on restart.
    pub fn remove_handlers(&self, pattern: &str) -> usize {
        let mut custom = self.custom();
        let before = custom.len();
        custom.retain(|route| route.pattern().template() != pattern);
        let removed = before - custom.len();
        tracing::info!(pattern, removed, "Custom handlers removed");
        removed
    }

    /// Drop every custom handler. Takes effect on restart.
    pub fn clear_handlers(&self) {
        let mut custom = self.custom();
        tracing::info!(removed = custom.len(), "Custom handlers cleared");
        custom.clear();
    }

    pub async fn clear_handlers_and_restart(&self) -> Result<(), ServerError> {
        self.clear_handlers();
        self.restart().await
    }

    pub fn handler_count(&self) -> usize {
        self.custom().len()
    }

    fn compile_routes(&self) -> RoutingEngine {
        let custom = self.custom();
        RoutingEngine::compile(&custom, &self.builtins)
    }

    // --- lifecycle ---------------------------------------------------------

    /// Start serving on a background task. No-op when already listening.
    ///
    /// Failures after the server is running are logged, not returned.
    pub async fn start(&self) -> Result<(), ServerError> {
        let mut lc = self.lifecycle.lock().await;
        self.ensure_listener(&mut lc).await?;
        self.spawn_serving(&mut lc).await
    }

    /// Serve from the calling task until the server is stopped.
    ///
    /// A restart issued meanwhile hands serving to a background generation;
    /// this call keeps waiting until the instance stops listening.
    pub async fn start_in_current_thread(&self) -> Result<(), ServerError> {
        let (future, generation) = {
            let mut lc = self.lifecycle.lock().await;
            self.ensure_listener(&mut lc).await?;
            match self.attach(&mut lc).await? {
                Some(future) => (future, lc.generation),
                None => {
                    drop(lc);
                    tracing::debug!("Server already listening, waiting for it to stop");
                    self.wait_until_stopped().await;
                    return Ok(());
                }
            }
        };

        let result = future.await;

        {
            let mut lc = self.lifecycle.lock().await;
            if lc.serving.as_ref().is_some_and(|s| s.generation == generation) {
                lc.serving = None;
                self.set_state(ServerState::Stopped);
            }
        }

        result.map_err(ServerError::Serve)?;
        self.wait_until_stopped().await;
        Ok(())
    }

    /// Stop serving and close the listener. Stopping a stopped server is a no-op.
    ///
    /// New connections are refused at once; in-flight requests get the grace period.
    pub async fn stop(&self) -> Result<(), ServerError> {
        let mut lc = self.lifecycle.lock().await;
        net::release(lc.listener.take());
        let result = self.stop_serving(&mut lc).await;
        self.set_state(ServerState::Stopped);
        result
    }

    /// Recompile the route table, stop the current generation and serve the
    /// new table on a freshly bound listener.
    ///
    /// On failure the instance is left `Stopped`; call `start` or `restart` again.
    pub async fn restart(&self) -> Result<(), ServerError> {
        let mut lc = self.lifecycle.lock().await;
        lc.engine = Arc::new(self.compile_routes());

        let result = async {
            self.stop_serving(&mut lc)
                .await
                .map_err(|e| e.during(RestartPhase::Stop))?;
            self.ensure_listener(&mut lc)
                .await
                .map_err(|e| e.during(RestartPhase::Bind))?;
            self.spawn_serving(&mut lc)
                .await
                .map_err(|e| e.during(RestartPhase::Serve))
        }
        .await;

        match &result {
            Ok(()) => {
                metrics::record_lifecycle("restart");
                tracing::info!(
                    generation = lc.generation,
                    routes = lc.engine.len(),
                    "Server restarted"
                );
            }
            Err(e) => {
                self.set_state(ServerState::Stopped);
                tracing::error!(error = %e, "Restart failed");
            }
        }
        result
    }

    fn set_state(&self, state: ServerState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!(from = %previous, to = %state, "Server state changed");
        }
    }

    fn rebind_address(&self) -> BindAddress {
        BindAddress::from(self.local_addr)
    }

    /// Make sure a socket is available for the next generation.
    async fn ensure_listener(&self, lc: &mut Lifecycle) -> Result<(), ServerError> {
        if lc.serving.is_none() && lc.listener.is_none() {
            lc.listener = Some(net::acquire(&self.rebind_address(), &self.options.bind_policy).await?);
        }
        Ok(())
    }

    /// Attach the current table to the held listener.
    ///
    /// Returns `None` when a generation is already serving. The listener stays
    /// held if TLS loading fails.
    async fn attach(&self, lc: &mut Lifecycle) -> Result<Option<ServeFuture>, ServerError> {
        if lc.serving.is_some() {
            return Ok(None);
        }

        let tls = match &self.options.tls {
            Some(material) => Some(material.load().await.map_err(ServerError::Tls)?),
            None => None,
        };
        let Some(listener) = lc.listener.take() else {
            return Err(ServerError::Serve(io::Error::new(
                io::ErrorKind::NotConnected,
                "no listener held",
            )));
        };

        let shutdown = Shutdown::new(self.options.shutdown_grace);
        let app = build_app(Arc::clone(&lc.engine)).into_make_service();
        let future: ServeFuture = match tls {
            Some(config) => Box::pin(
                axum_server::from_tcp_rustls(listener.into_std(), config)
                    .handle(shutdown.handle())
                    .serve(app),
            ),
            None => Box::pin(
                axum_server::from_tcp(listener.into_std())
                    .handle(shutdown.handle())
                    .serve(app),
            ),
        };

        lc.generation += 1;
        lc.serving = Some(Serving {
            generation: lc.generation,
            shutdown,
            task: None,
        });
        self.set_state(ServerState::Listening);
        metrics::record_lifecycle("start");

        tracing::info!(
            address = %self.local_addr,
            tls = self.is_tls(),
            generation = lc.generation,
            routes = lc.engine.len(),
            "Server listening"
        );
        Ok(Some(future))
    }

    async fn spawn_serving(&self, lc: &mut Lifecycle) -> Result<(), ServerError> {
        let Some(future) = self.attach(lc).await? else {
            tracing::debug!("Server already listening");
            return Ok(());
        };

        let generation = lc.generation;
        let task = tokio::spawn(log_failure(generation, future));
        if let Some(serving) = lc.serving.as_mut() {
            serving.task = Some(task);
        }
        Ok(())
    }

    /// Gracefully end the serving generation, if any.
    ///
    /// Callers publish `Stopped`; a successful restart stays `Listening` throughout.
    async fn stop_serving(&self, lc: &mut Lifecycle) -> Result<(), ServerError> {
        let Some(serving) = lc.serving.take() else {
            return Ok(());
        };

        tracing::info!(
            generation = serving.generation,
            in_flight = serving.shutdown.connection_count(),
            "Closing server"
        );
        serving.shutdown.trigger();
        metrics::record_lifecycle("stop");

        let Some(task) = serving.task else {
            return Ok(());
        };
        match tokio::time::timeout(serving.shutdown.grace() + DRAIN_SLACK, task).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(e))) => Err(ServerError::Shutdown(e.to_string())),
            Ok(Err(join_err)) => Err(ServerError::Shutdown(join_err.to_string())),
            Err(_) => {
                tracing::warn!(
                    generation = serving.generation,
                    "Server still draining after grace period"
                );
                Ok(())
            }
        }
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if let Some(serving) = self.lifecycle.get_mut().serving.take() {
            serving.shutdown.trigger();
        }
    }
}

fn log_failure(generation: u64, future: ServeFuture) -> impl Future<Output = io::Result<()>> {
    async move {
        let result = future.await;
        match &result {
            Ok(()) => tracing::debug!(generation, "Server task finished"),
            Err(e) => tracing::error!(generation, error = %e, "Server task failed"),
        }
        result
    }
}

/// Build the Axum app serving one compiled table.
pub fn build_app(engine: Arc<RoutingEngine>) -> Router {
    Router::new()
        .fallback(dispatch)
        .with_state(engine)
        .layer(TraceLayer::new_for_http())
}

async fn dispatch(State(engine): State<Arc<RoutingEngine>>, request: Request) -> Response {
    let start_time = Instant::now();
    let method = request.method().clone();

    let (response, origin) = engine.dispatch(request).await;

    metrics::record_request(method.as_str(), response.status().as_u16(), origin, start_time);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Method;
    use tower::ServiceExt;

    async fn call(app: Router, method: Method, uri: &str) -> (StatusCode, String) {
        let request = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn app_dispatches_through_table() {
        let registry = Arc::new(ResponseRegistry::new());
        registry.set_message("hello", "world");
        let builtins = builtin_routes(registry, Arc::new(HeaderSet::new()), &BuiltinOptions::default());
        let custom = vec![HandlerRoute::new("/myfunc", Method::GET, |_req: Request| async { "myfunc" }).unwrap()];
        let engine = Arc::new(RoutingEngine::compile(&custom, &builtins));

        assert_eq!(
            call(build_app(Arc::clone(&engine)), Method::GET, "/hello").await,
            (StatusCode::OK, "world".to_string())
        );
        assert_eq!(
            call(build_app(Arc::clone(&engine)), Method::GET, "/myfunc").await,
            (StatusCode::OK, "myfunc".to_string())
        );
        assert_eq!(
            call(build_app(engine), Method::DELETE, "/hello").await.0,
            StatusCode::METHOD_NOT_ALLOWED
        );
    }

    #[tokio::test]
    async fn construction_reserves_listener_without_serving() {
        let server = MockServer::bind("127.0.0.1:0").await.unwrap();
        assert_eq!(server.state(), ServerState::Unbound);
        assert_ne!(server.local_addr().port(), 0);

        server.stop().await.unwrap();
        assert_eq!(server.state(), ServerState::Stopped);
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn handler_registration_does_not_touch_live_table() {
        let server = MockServer::bind("127.0.0.1:0").await.unwrap();
        server
            .add_handler("/a", MethodSet::any(), |_req: Request| async { "a" })
            .unwrap();
        server
            .add_handler("/a", Method::POST, |_req: Request| async { "a2" })
            .unwrap();
        server
            .add_handler("/b", Method::GET, |_req: Request| async { "b" })
            .unwrap();
        assert_eq!(server.handler_count(), 3);

        // GET + POST serve, PUT update, OPTIONS preflight
        let live = server.lifecycle.lock().await.engine.len();
        assert_eq!(live, 4);

        assert_eq!(server.remove_handlers("/a"), 2);
        assert_eq!(server.remove_handlers("/missing"), 0);
        server.clear_handlers();
        assert_eq!(server.handler_count(), 0);
    }

    #[tokio::test]
    async fn malformed_pattern_is_rejected_at_registration() {
        let server = MockServer::bind("127.0.0.1:0").await.unwrap();
        let err = server
            .add_handler("missing-slash", MethodSet::any(), |_req: Request| async { "" })
            .unwrap_err();
        assert!(matches!(err, ServerError::Pattern(_)));
        assert_eq!(server.handler_count(), 0);
    }

    #[tokio::test]
    async fn apply_settings_replaces_live_state() {
        let server = MockServer::bind("127.0.0.1:0").await.unwrap();
        let mut config = MockConfig::default();
        config.mock.mutation_enabled = false;
        config.mock.headers.clear();
        config.mock.headers.insert("X-Mock".into(), "1".into());
        config.mock.messages.push(crate::config::MessageConfig {
            path: "/seeded".into(),
            body: "seed".into(),
            status: 202,
        });

        server.apply_settings(&config.mock).unwrap();

        assert!(!server.mutation_enabled());
        assert_eq!(server.headers().get("x-mock").as_deref(), Some("1"));
        assert!(server.headers().get("content-type").is_none());
        let entry = server.message("seeded").unwrap();
        assert_eq!(entry.status(), StatusCode::ACCEPTED);
    }
}
