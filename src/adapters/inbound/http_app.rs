//! HTTP Application
//!
//! Thin axum wrapper for services that announce their routes: every handler
//! added through [`App::add_handler`] is mounted on the router and, when
//! registration is enabled, queued as a frontend on the [`Registry`].
//! Requests are timed and reported to an injected [`RequestLogger`].

use crate::application::{Registry, RegistryError};
use crate::domain::entities::Middleware;
use crate::domain::ports::{RequestLogger, RequestRecord, TracingRequestLogger};
use crate::domain::services::routing::router_path;
use crate::domain::value_objects::CancelToken;
use axum::{
    extract::{Request, State},
    handler::Handler,
    http::{header::CONTENT_TYPE, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{on, MethodFilter},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Application settings.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Name the app registers its backend under
    pub name: String,
    pub listen_ip: String,
    pub listen_port: u16,
    /// Public host the proxy serves this app's frontends on
    pub api_host: String,
    /// Whether handlers are announced to the proxy at all
    pub register: bool,
}

/// Describes one handler: the methods and paths it serves, and how it is
/// announced to the proxy.
#[derive(Debug, Clone)]
pub struct HandlerSpec {
    pub methods: Vec<Method>,
    /// A separate route (and frontend) is created for each path
    pub paths: Vec<String>,
    /// Proxy middlewares; earlier entries execute first
    pub middlewares: Vec<Middleware>,
    /// Set to false to keep the handler private to the instance
    pub register: bool,
    /// Name reported with each request record
    pub metric_name: Option<String>,
}

impl HandlerSpec {
    pub fn new(methods: &[Method], paths: &[&str]) -> Self {
        Self {
            methods: methods.to_vec(),
            paths: paths.iter().map(|p| p.to_string()).collect(),
            middlewares: Vec::new(),
            register: true,
            metric_name: None,
        }
    }

    pub fn middlewares(mut self, middlewares: Vec<Middleware>) -> Self {
        self.middlewares = middlewares;
        self
    }

    pub fn metric_name(mut self, name: impl Into<String>) -> Self {
        self.metric_name = Some(name.into());
        self
    }

    pub fn private(mut self) -> Self {
        self.register = false;
        self
    }
}

/// Errors adding handlers to an [`App`].
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("handler spec has no methods")]
    NoMethods,
    #[error("handler spec has no paths")]
    NoPaths,
    #[error("unsupported method {0}")]
    UnsupportedMethod(Method),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Error a handler may return; rendered as `{"message": ...}`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let mut response = reply(self.status(), &serde_json::json!({ "message": message }));
        response.extensions_mut().insert(ErrorMessage(message));
        response
    }
}

/// Error text attached to a response so the request logger can report it.
#[derive(Debug, Clone)]
struct ErrorMessage(String);

/// Reply with `body` encoded as JSON.
///
/// `<`, `>` and `&` are written as-is. A body that fails to encode turns
/// into a 500 carrying the encoding error.
pub fn reply<T: Serialize + ?Sized>(status: StatusCode, body: &T) -> Response {
    match serde_json::to_vec(body) {
        Ok(bytes) => (status, [(CONTENT_TYPE, JSON_CONTENT_TYPE)], bytes).into_response(),
        Err(e) => {
            let message = format!("failed to marshal response: {}", e);
            let body = serde_json::json!({ "message": message }).to_string();
            let mut response = (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(CONTENT_TYPE, JSON_CONTENT_TYPE)],
                body,
            )
                .into_response();
            response.extensions_mut().insert(ErrorMessage(message));
            response
        }
    }
}

#[derive(Clone)]
struct RouteLogState {
    logger: Arc<dyn RequestLogger>,
    metric_name: Option<String>,
}

async fn log_requests(State(state): State<RouteLogState>, req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(req).await;

    state.logger.log_request(&RequestRecord {
        method,
        path,
        status: response.status().as_u16(),
        elapsed: start.elapsed(),
        metric_name: state.metric_name.clone(),
        error: response.extensions().get::<ErrorMessage>().map(|e| e.0.clone()),
    });
    response
}

/// An HTTP service that can announce its handlers to the proxy.
pub struct App {
    config: AppConfig,
    router: Router,
    registry: Option<Registry>,
    logger: Arc<dyn RequestLogger>,
}

impl App {
    /// Create an app. Pass a registry to announce handlers; it is ignored
    /// when `config.register` is false.
    pub fn new(config: AppConfig, registry: Option<Registry>) -> Self {
        let registry = if config.register { registry } else { None };
        Self {
            config,
            router: Router::new(),
            registry,
            logger: Arc::new(TracingRequestLogger),
        }
    }

    /// Replace the request logger (default: [`TracingRequestLogger`]).
    /// Applies to handlers added afterwards.
    pub fn with_logger(mut self, logger: Arc<dyn RequestLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> Option<&Registry> {
        self.registry.as_ref()
    }

    /// Mount `handler` for every method and path in `spec`.
    ///
    /// Panics, as axum does, if a method is mounted twice on the same path.
    pub fn add_handler<H, T>(&mut self, spec: HandlerSpec, handler: H) -> Result<(), AppError>
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        let filter = method_filter(&spec.methods)?;
        if spec.paths.is_empty() {
            return Err(AppError::NoPaths);
        }

        let log_state = RouteLogState {
            logger: self.logger.clone(),
            metric_name: spec.metric_name.clone(),
        };
        let methods: Vec<&str> = spec.methods.iter().map(|m| m.as_str()).collect();

        for path in &spec.paths {
            let route = on(filter, handler.clone())
                .layer(middleware::from_fn_with_state(log_state.clone(), log_requests));
            let router = std::mem::replace(&mut self.router, Router::new());
            self.router = router.route(&router_path(path), route);

            if spec.register {
                if let Some(registry) = self.registry.as_mut() {
                    let frontend = registry.add_frontend(
                        &self.config.api_host,
                        path,
                        &methods,
                        spec.middlewares.clone(),
                    )?;
                    tracing::info!("registered {}", frontend);
                }
            }
        }
        Ok(())
    }

    /// Router with every handler mounted.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Start the registry, serve until `shutdown` is cancelled, then stop
    /// the registry.
    #[cfg_attr(coverage_nightly, coverage(off))]
    pub async fn run(mut self, shutdown: CancelToken) -> anyhow::Result<()> {
        if let Some(registry) = self.registry.as_mut() {
            if let Err(e) = registry.start().await {
                registry.stop().await;
                return Err(e.into());
            }
        }

        let addr = format!("{}:{}", self.config.listen_ip, self.config.listen_port);
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!("{} listening on {}", self.config.name, addr);

        let router = self.router.clone().layer(TraceLayer::new_for_http());
        let served = axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await;

        if let Some(registry) = &self.registry {
            registry.stop().await;
        }
        tracing::info!("{} stopped", self.config.name);

        served?;
        Ok(())
    }
}

fn method_filter(methods: &[Method]) -> Result<MethodFilter, AppError> {
    let mut filters = methods.iter().map(|m| {
        MethodFilter::try_from(m.clone()).map_err(|_| AppError::UnsupportedMethod(m.clone()))
    });

    let first = filters.next().ok_or(AppError::NoMethods)??;
    filters.try_fold(first, |acc, f| Ok(acc.or(f?)))
}
