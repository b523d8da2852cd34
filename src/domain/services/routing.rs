//! Route Normalization
//!
//! Pure functions that turn a router path and its method list into the
//! identifiers and match expressions understood by the proxy.
//!
//! Method lists are ordered, never sorted: the derived frontend ID and the
//! route expression both embed the caller's order, and existing deployments
//! key their records on it.

/// Convert a router path to the proxy's pattern syntax.
///
/// Curly-brace placeholders become angle-bracket placeholders:
/// `/resources/{id}` becomes `/resources/<id>`.
pub fn convert_path(path: &str) -> String {
    path.replace('{', "<").replace('}', ">")
}

/// Convert a router path to the colon-capture syntax used by the inbound
/// HTTP router: `/resources/{id}` becomes `/resources/:id`.
pub fn router_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        match c {
            '{' => out.push(':'),
            '}' => {}
            _ => out.push(c),
        }
    }
    out
}

/// Derive the frontend ID from a method list and an already converted path.
///
/// The result is safe to use as a single coordination-store path segment.
pub fn frontend_id<S: AsRef<str>>(methods: &[S], path: &str) -> String {
    let joined = methods
        .iter()
        .map(|m| m.as_ref())
        .collect::<Vec<_>>()
        .join(".");
    format!("{}{}", joined, path)
        .replace('/', ".")
        .to_lowercase()
}

/// Build the proxy route expression for a method list and a converted path.
///
/// `["GET", "POST"]` and `/hello` yield `TrieRoute("GET", "POST", "/hello")`.
pub fn route_expression<S: AsRef<str>>(methods: &[S], path: &str) -> String {
    let mut args: Vec<String> = methods
        .iter()
        .map(|m| format!("\"{}\"", m.as_ref()))
        .collect();
    args.push(format!("\"{}\"", path));
    format!("TrieRoute({})", args.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_path_rewrites_placeholders() {
        assert_eq!(convert_path("/resources/{id}"), "/resources/<id>");
        assert_eq!(
            convert_path("/a/{x}/b/{y}/c"),
            "/a/<x>/b/<y>/c"
        );
        assert_eq!(convert_path("/plain"), "/plain");
    }

    #[test]
    fn test_router_path_uses_colon_captures() {
        assert_eq!(router_path("/resources/{id}"), "/resources/:id");
        assert_eq!(router_path("/a/{x}/b/{y}"), "/a/:x/b/:y");
        assert_eq!(router_path("/"), "/");
    }

    #[test]
    fn test_frontend_id_exact_literal() {
        let path = convert_path("/resources/{id}");
        assert_eq!(path, "/resources/<id>");
        assert_eq!(frontend_id(&["GET", "POST"], &path), "get.post.resources.<id>");
    }

    #[test]
    fn test_frontend_id_preserves_method_order() {
        let a = frontend_id(&["GET", "POST"], "/x");
        let b = frontend_id(&["POST", "GET"], "/x");
        assert_eq!(a, "get.post.x");
        assert_eq!(b, "post.get.x");
        assert_ne!(a, b);
    }

    #[test]
    fn test_frontend_id_case_folds() {
        assert_eq!(frontend_id(&["Get"], "/Users/Me"), "get.users.me");
    }

    #[test]
    fn test_frontend_id_without_methods() {
        assert_eq!(frontend_id::<&str>(&[], "/hello"), ".hello");
    }

    #[test]
    fn test_route_expression_single_method() {
        assert_eq!(route_expression(&["GET"], "/hello"), r#"TrieRoute("GET", "/hello")"#);
    }

    #[test]
    fn test_route_expression_multiple_methods() {
        assert_eq!(
            route_expression(&["GET", "POST"], "/resources/<id>"),
            r#"TrieRoute("GET", "POST", "/resources/<id>")"#
        );
    }

    #[test]
    fn test_route_expression_accepts_owned_strings() {
        let methods = vec!["PUT".to_string()];
        assert_eq!(route_expression(&methods, "/a"), r#"TrieRoute("PUT", "/a")"#);
    }
}
