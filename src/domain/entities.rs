//! Domain Entities - Registration records
//!
//! These entities describe what an application instance announces to the
//! proxy control plane: its backend, the frontends routing to it and the
//! middlewares attached to those frontends. Construction is pure; nothing
//! here touches the network.

use crate::domain::services::routing::{convert_path, frontend_id, route_expression};
use crate::domain::value_objects::FrontendOptions;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Backend type written for every application.
const BACKEND_TYPE: &str = "http";

/// Rejected `(ip, port)` pair handed to [`BackendSpec::new`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidEndpoint {
    #[error("invalid IP address {ip:?}")]
    Ip { ip: String },
    #[error("port {port} out of range 1-65535")]
    Port { port: u32 },
}

/// One running instance of an application.
///
/// The ID is derived from the canonical `ip` and `port`, so the same endpoint
/// always maps to the same server key and distinct endpoints never collide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSpec {
    /// Logical service name
    pub app_name: String,
    /// Stable per-endpoint identifier
    pub id: String,
    pub ip: IpAddr,
    pub port: u16,
}

impl BackendSpec {
    /// Build a backend spec, validating the endpoint.
    pub fn new(app_name: impl Into<String>, ip: &str, port: u32) -> Result<Self, InvalidEndpoint> {
        let ip: IpAddr = ip.trim().parse().map_err(|_| InvalidEndpoint::Ip { ip: ip.to_string() })?;
        let port = u16::try_from(port)
            .ok()
            .filter(|p| *p != 0)
            .ok_or(InvalidEndpoint::Port { port })?;

        Ok(Self {
            app_name: app_name.into(),
            id: format!("{}_{}", ip, port),
            ip,
            port,
        })
    }

    /// Socket address this backend serves on.
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }

    /// URL the proxy forwards to; IPv6 addresses are bracketed.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr())
    }

    /// Backend-type document.
    pub fn type_spec(&self) -> serde_json::Result<String> {
        serde_json::to_string(&BackendTypeDocument { kind: BACKEND_TYPE })
    }

    /// Server document for this instance.
    pub fn server_spec(&self) -> serde_json::Result<String> {
        serde_json::to_string(&ServerDocument { url: self.url() })
    }
}

impl fmt::Display for BackendSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Backend(AppName={}, ID={}, URL={})",
            self.app_name,
            self.id,
            self.url()
        )
    }
}

#[derive(Serialize)]
struct BackendTypeDocument {
    #[serde(rename = "Type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ServerDocument {
    #[serde(rename = "URL")]
    url: String,
}

/// A proxy-side behavior attached to a frontend (rate limiter, auth filter...).
///
/// `priority` is overwritten with the middleware's position when the owning
/// [`FrontendSpec`] is built: earlier middlewares execute first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Middleware {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Priority")]
    pub priority: i32,
    /// Middleware-specific configuration, passed through untouched.
    #[serde(rename = "Middleware")]
    pub config: serde_json::Value,
}

impl Middleware {
    pub fn new(id: impl Into<String>, kind: impl Into<String>, config: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            priority: 0,
            config,
        }
    }

    /// Build a middleware from any serializable configuration type.
    pub fn from_config<T: Serialize>(
        id: impl Into<String>,
        kind: impl Into<String>,
        config: &T,
    ) -> serde_json::Result<Self> {
        Ok(Self::new(id, kind, serde_json::to_value(config)?))
    }

    /// Middleware document as stored under the middleware key.
    pub fn spec(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// One routing rule binding methods and a path under a public host to the
/// owning application's backend.
#[derive(Debug, Clone, PartialEq)]
pub struct FrontendSpec {
    /// Derived from methods and path, safe as a key segment
    pub id: String,
    pub host: String,
    /// Path in the proxy's pattern syntax
    pub path: String,
    pub methods: Vec<String>,
    /// Route-match expression
    pub route: String,
    /// Owning application name
    pub upstream: String,
    pub options: FrontendOptions,
    pub middlewares: Vec<Middleware>,
}

impl FrontendSpec {
    pub fn new<S: AsRef<str>>(
        upstream: impl Into<String>,
        host: impl Into<String>,
        path: &str,
        methods: &[S],
        middlewares: Vec<Middleware>,
    ) -> Self {
        let path = convert_path(path);
        let middlewares = middlewares
            .into_iter()
            .enumerate()
            .map(|(i, mut mw)| {
                mw.priority = i as i32;
                mw
            })
            .collect();

        Self {
            id: frontend_id(methods, &path),
            host: host.into(),
            route: route_expression(methods, &path),
            methods: methods.iter().map(|m| m.as_ref().to_string()).collect(),
            path,
            upstream: upstream.into(),
            options: FrontendOptions::default(),
            middlewares,
        }
    }

    /// Replace the failover options.
    pub fn with_options(mut self, options: FrontendOptions) -> Self {
        self.options = options;
        self
    }

    /// Frontend document as stored under the frontend key.
    pub fn spec(&self) -> serde_json::Result<String> {
        serde_json::to_string(&FrontendDocument {
            kind: BACKEND_TYPE,
            backend_id: &self.upstream,
            host: &self.host,
            route: &self.route,
            settings: &self.options,
        })
    }
}

impl fmt::Display for FrontendSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Frontend(ID={}, Host={}, Route={}, Upstream={}, Options={}, Middlewares={})",
            self.id,
            self.host,
            self.route,
            self.upstream,
            self.options,
            self.middlewares.len()
        )
    }
}

#[derive(Serialize)]
struct FrontendDocument<'a> {
    #[serde(rename = "Type")]
    kind: &'a str,
    #[serde(rename = "BackendId")]
    backend_id: &'a str,
    #[serde(rename = "Host")]
    host: &'a str,
    #[serde(rename = "Route")]
    route: &'a str,
    #[serde(rename = "Settings")]
    settings: &'a FrontendOptions,
}
