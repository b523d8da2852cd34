//! Coordination store key layout.
//!
//! | Record     | Key                                          |
//! |------------|----------------------------------------------|
//! | backend    | `{root}/backends/{app}/backend`              |
//! | server     | `{root}/backends/{app}/servers/{backend_id}` |
//! | frontend   | `{root}/frontends/{host}.{id}/frontend`      |
//! | middleware | `{root}/frontends/{host}.{id}/middlewares/{mw}` |

/// Builds keys under a configurable root ("chroot") prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLayout {
    root: String,
}

impl KeyLayout {
    pub fn new(chroot: &str) -> Self {
        Self {
            root: chroot.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn backend(&self, app_name: &str) -> String {
        format!("{}/backends/{}/backend", self.root, app_name)
    }

    pub fn server(&self, app_name: &str, backend_id: &str) -> String {
        format!("{}/backends/{}/servers/{}", self.root, app_name, backend_id)
    }

    pub fn frontend(&self, host: &str, frontend_id: &str) -> String {
        format!("{}/frontends/{}.{}/frontend", self.root, host, frontend_id)
    }

    pub fn middleware(&self, host: &str, frontend_id: &str, middleware_id: &str) -> String {
        format!(
            "{}/frontends/{}.{}/middlewares/{}",
            self.root, host, frontend_id, middleware_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let keys = KeyLayout::new("/vulcand");
        assert_eq!(keys.backend("users"), "/vulcand/backends/users/backend");
        assert_eq!(
            keys.server("users", "10.0.0.1_8080"),
            "/vulcand/backends/users/servers/10.0.0.1_8080"
        );
        assert_eq!(
            keys.frontend("api.example.com", "get.hello"),
            "/vulcand/frontends/api.example.com.get.hello/frontend"
        );
        assert_eq!(
            keys.middleware("api.example.com", "get.hello", "rl1"),
            "/vulcand/frontends/api.example.com.get.hello/middlewares/rl1"
        );
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let keys = KeyLayout::new("/vulcand/");
        assert_eq!(keys.root(), "/vulcand");
        assert_eq!(keys.backend("a"), "/vulcand/backends/a/backend");
    }

    #[test]
    fn test_empty_root() {
        let keys = KeyLayout::new("");
        assert_eq!(keys.backend("a"), "/backends/a/backend");
    }
}
