use crate::adapters::outbound::{EtcdConfig, LOCAL_ETCD_PROXY};
use crate::application::{RegistryConfig, DEFAULT_CHROOT};
use serde::Deserialize;
use std::time::Duration;

/// One route announced by the registrar: `GET,POST /resources/{id}`.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct RouteConfig {
    pub methods: Vec<String>,
    pub path: String,
}

impl RouteConfig {
    /// Parse `"GET,POST /resources/{id}"`.
    pub fn parse(entry: &str) -> anyhow::Result<Self> {
        let mut parts = entry.split_whitespace();
        let (methods, path) = match (parts.next(), parts.next(), parts.next()) {
            (Some(methods), Some(path), None) => (methods, path),
            _ => anyhow::bail!("invalid route {:?}, expected \"METHOD[,METHOD] /path\"", entry),
        };

        if !path.starts_with('/') {
            anyhow::bail!("invalid route {:?}, path must start with '/'", entry);
        }

        let methods: Vec<String> = methods
            .split(',')
            .map(|m| m.trim().to_uppercase())
            .filter(|m| !m.is_empty())
            .collect();
        if methods.is_empty() {
            anyhow::bail!("invalid route {:?}, no methods", entry);
        }

        Ok(Self {
            methods,
            path: path.to_string(),
        })
    }
}

/// Parse a `;`-separated route list, skipping empty entries.
pub fn parse_routes(value: &str) -> anyhow::Result<Vec<RouteConfig>> {
    value
        .split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(RouteConfig::parse)
        .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    // Announced backend
    pub app_name: String,
    pub listen_ip: String,
    pub listen_port: u32,
    pub api_host: String,
    pub routes: Vec<RouteConfig>,

    // Coordination store
    pub etcd_endpoints: Vec<String>,
    pub chroot: String,
    pub ttl_secs: u64,

    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "app".to_string(),
            listen_ip: "127.0.0.1".to_string(),
            listen_port: 8080,
            api_host: "localhost".to_string(),
            routes: Vec::new(),
            etcd_endpoints: vec![LOCAL_ETCD_PROXY.to_string()],
            chroot: DEFAULT_CHROOT.to_string(),
            ttl_secs: 30,
            debug: false,
        }
    }
}

impl Config {
    /// Registry settings derived from this configuration.
    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            etcd: EtcdConfig {
                endpoints: self.etcd_endpoints.clone(),
                ..EtcdConfig::default()
            },
            chroot: self.chroot.clone(),
            ttl: Duration::from_secs(self.ttl_secs),
        }
        .with_defaults()
    }
}

pub fn load_config() -> anyhow::Result<Config> {
    let app_name = std::env::var("REGISTRAR_APP_NAME")
        .unwrap_or_else(|_| "app".to_string());

    let listen_ip = std::env::var("REGISTRAR_LISTEN_IP")
        .unwrap_or_else(|_| "127.0.0.1".to_string());

    let listen_port = std::env::var("REGISTRAR_LISTEN_PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .unwrap_or(8080);

    let api_host = std::env::var("REGISTRAR_API_HOST")
        .unwrap_or_else(|_| "localhost".to_string());

    let routes = match std::env::var("REGISTRAR_ROUTES") {
        Ok(v) => parse_routes(&v)?,
        Err(_) => Vec::new(),
    };

    // Coordination store settings
    let etcd_endpoints = std::env::var("REGISTRAR_ETCD_ENDPOINTS")
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_else(|_| vec![LOCAL_ETCD_PROXY.to_string()]);

    let chroot = std::env::var("REGISTRAR_CHROOT")
        .unwrap_or_else(|_| DEFAULT_CHROOT.to_string());

    let ttl_secs = std::env::var("REGISTRAR_TTL_SECS")
        .unwrap_or_else(|_| "30".to_string())
        .parse()
        .unwrap_or(30);

    let debug = std::env::var("DEBUG").is_ok();

    Ok(Config {
        app_name,
        listen_ip,
        listen_port,
        api_host,
        routes,
        etcd_endpoints,
        chroot,
        ttl_secs,
        debug,
    })
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    // env vars are process-wide; tests touching them hold this lock
    static ENV_LOCK: parking_lot::Mutex<()> = parking_lot::Mutex::new(());

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.listen_port, 8080);
        assert_eq!(cfg.chroot, "/vulcand");
        assert_eq!(cfg.ttl_secs, 30);
        assert_eq!(cfg.etcd_endpoints, vec!["127.0.0.1:2379".to_string()]);
        assert!(cfg.routes.is_empty());
        assert!(!cfg.debug);
    }

    #[test]
    fn test_load_config_defaults() {
        let _guard = ENV_LOCK.lock();
        std::env::remove_var("REGISTRAR_APP_NAME");
        std::env::remove_var("REGISTRAR_ROUTES");
        std::env::remove_var("REGISTRAR_ETCD_ENDPOINTS");

        let cfg = load_config().unwrap();
        assert_eq!(cfg.app_name, "app");
        assert_eq!(cfg.etcd_endpoints, vec!["127.0.0.1:2379".to_string()]);
        assert!(cfg.routes.is_empty());
    }

    #[test]
    fn test_load_config_with_custom_backend() {
        let _guard = ENV_LOCK.lock();
        std::env::set_var("REGISTRAR_APP_NAME", "users");
        std::env::set_var("REGISTRAR_LISTEN_IP", "10.0.0.5");
        std::env::set_var("REGISTRAR_LISTEN_PORT", "9000");
        std::env::set_var("REGISTRAR_API_HOST", "api.example.com");
        let cfg = load_config().unwrap();
        assert_eq!(cfg.app_name, "users");
        assert_eq!(cfg.listen_ip, "10.0.0.5");
        assert_eq!(cfg.listen_port, 9000);
        assert_eq!(cfg.api_host, "api.example.com");
        std::env::remove_var("REGISTRAR_APP_NAME");
        std::env::remove_var("REGISTRAR_LISTEN_IP");
        std::env::remove_var("REGISTRAR_LISTEN_PORT");
        std::env::remove_var("REGISTRAR_API_HOST");
    }

    #[test]
    fn test_load_config_with_store_settings() {
        let _guard = ENV_LOCK.lock();
        std::env::set_var("REGISTRAR_ETCD_ENDPOINTS", "etcd-1:2379, etcd-2:2379");
        std::env::set_var("REGISTRAR_CHROOT", "/proxy");
        std::env::set_var("REGISTRAR_TTL_SECS", "10");
        let cfg = load_config().unwrap();
        assert_eq!(cfg.etcd_endpoints, vec!["etcd-1:2379", "etcd-2:2379"]);
        assert_eq!(cfg.chroot, "/proxy");
        assert_eq!(cfg.ttl_secs, 10);
        std::env::remove_var("REGISTRAR_ETCD_ENDPOINTS");
        std::env::remove_var("REGISTRAR_CHROOT");
        std::env::remove_var("REGISTRAR_TTL_SECS");
    }

    #[test]
    fn test_load_config_parse_error_uses_default() {
        let _guard = ENV_LOCK.lock();
        std::env::set_var("REGISTRAR_TTL_SECS", "not_a_number");
        let cfg = load_config().unwrap();
        assert_eq!(cfg.ttl_secs, 30); // default
        std::env::remove_var("REGISTRAR_TTL_SECS");
    }

    #[test]
    fn test_load_config_with_routes() {
        let _guard = ENV_LOCK.lock();
        std::env::set_var("REGISTRAR_ROUTES", "GET,POST /resources/{id}; get /hello;");
        let cfg = load_config().unwrap();
        assert_eq!(cfg.routes.len(), 2);
        assert_eq!(cfg.routes[0].methods, vec!["GET", "POST"]);
        assert_eq!(cfg.routes[0].path, "/resources/{id}");
        assert_eq!(cfg.routes[1].methods, vec!["GET"]);
        std::env::remove_var("REGISTRAR_ROUTES");
    }

    #[test]
    fn test_load_config_with_bad_routes_fails() {
        let _guard = ENV_LOCK.lock();
        std::env::set_var("REGISTRAR_ROUTES", "GET");
        assert!(load_config().is_err());
        std::env::remove_var("REGISTRAR_ROUTES");
    }

    #[test]
    fn test_load_config_with_debug() {
        let _guard = ENV_LOCK.lock();
        std::env::set_var("DEBUG", "1");
        let cfg = load_config().unwrap();
        assert!(cfg.debug);
        std::env::remove_var("DEBUG");
    }

    #[test]
    fn test_route_parse_rejects_relative_path() {
        assert!(RouteConfig::parse("GET hello").is_err());
        assert!(RouteConfig::parse(", /hello").is_err());
        assert!(RouteConfig::parse("GET /a /b").is_err());
    }

    #[test]
    fn test_route_parse_keeps_method_order() {
        let route = RouteConfig::parse("post,get /x").unwrap();
        assert_eq!(route.methods, vec!["POST", "GET"]);
    }

    #[test]
    fn test_registry_config_fills_defaults() {
        let cfg = Config {
            etcd_endpoints: Vec::new(),
            ttl_secs: 0,
            ..Config::default()
        };
        let registry = cfg.registry_config();
        assert_eq!(registry.ttl, Duration::from_secs(30));
        assert_eq!(registry.etcd.endpoints, vec!["127.0.0.1:2379".to_string()]);
        assert_eq!(registry.chroot, "/vulcand");
    }

    #[test]
    fn test_config_clone() {
        let cfg = Config::default();
        let cloned = cfg.clone();
        assert_eq!(cfg.app_name, cloned.app_name);
        assert_eq!(cfg.chroot, cloned.chroot);
    }
}
