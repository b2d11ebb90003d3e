//! Route dispatch table
//!
//! Maps `(method, path)` to a registered handler. Pattern segments starting
//! with `:` bind named parameters; all other segments match literally.
//! Routes are tried in registration order and the first match wins.

use std::collections::HashMap;

use http::Method;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

#[derive(Debug, Clone)]
struct Route<H> {
    method: Method,
    pattern: String,
    segments: Vec<Segment>,
    handler: H,
}

/// A successful lookup: bound parameters and the handler to call.
#[derive(Debug, PartialEq, Eq)]
pub struct RouteMatch<'a, H> {
    pub params: HashMap<String, String>,
    pub handler: &'a H,
}

impl<H> RouteMatch<'_, H> {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct Router<H> {
    routes: Vec<Route<H>>,
}

impl<H> Default for Router<H> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

impl<H> Router<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, method: Method, pattern: &str, handler: H) -> &mut Self {
        let segments = split(pattern)
            .map(|s| match s.strip_prefix(':') {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Literal(s.to_string()),
            })
            .collect();
        self.routes.push(Route {
            method,
            pattern: pattern.to_string(),
            segments,
            handler,
        });
        self
    }

    pub fn get(&mut self, pattern: &str, handler: H) -> &mut Self {
        self.register(Method::GET, pattern, handler)
    }

    pub fn post(&mut self, pattern: &str, handler: H) -> &mut Self {
        self.register(Method::POST, pattern, handler)
    }

    pub fn put(&mut self, pattern: &str, handler: H) -> &mut Self {
        self.register(Method::PUT, pattern, handler)
    }

    pub fn delete(&mut self, pattern: &str, handler: H) -> &mut Self {
        self.register(Method::DELETE, pattern, handler)
    }

    pub fn patch(&mut self, pattern: &str, handler: H) -> &mut Self {
        self.register(Method::PATCH, pattern, handler)
    }

    /// Find the first route registered for `method` whose pattern matches `path`.
    pub fn match_route(&self, method: &Method, path: &str) -> Option<RouteMatch<'_, H>> {
        let parts: Vec<&str> = split(path).collect();

        self.routes
            .iter()
            .filter(|route| route.method == *method && route.segments.len() == parts.len())
            .find_map(|route| {
                let mut params = HashMap::new();
                for (segment, part) in route.segments.iter().zip(&parts) {
                    match segment {
                        Segment::Literal(lit) if lit == part => {}
                        Segment::Literal(_) => return None,
                        Segment::Param(name) => {
                            params.insert(name.clone(), part.to_string());
                        }
                    }
                }
                Some(RouteMatch {
                    params,
                    handler: &route.handler,
                })
            })
    }

    /// Registered `(method, pattern)` pairs, in registration order.
    pub fn routes(&self) -> impl Iterator<Item = (&Method, &str)> {
        self.routes.iter().map(|r| (&r.method, r.pattern.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn router() -> Router<&'static str> {
        let mut router = Router::new();
        router
            .get("/hello", "hello")
            .get("/dog", "list")
            .post("/dog", "add")
            .delete("/dog/:id", "delete");
        router
    }

    #[test]
    fn test_literal_match() {
        let r = router();
        let m = r.match_route(&Method::GET, "/dog").unwrap();
        assert_eq!(*m.handler, "list");
        assert!(m.params.is_empty());
    }

    #[test]
    fn test_method_selects_route() {
        let r = router();
        assert_eq!(*r.match_route(&Method::POST, "/dog").unwrap().handler, "add");
        assert!(r.match_route(&Method::PUT, "/dog").is_none());
    }

    #[test]
    fn test_param_binding() {
        let r = router();
        let m = r.match_route(&Method::DELETE, "/dog/42").unwrap();
        assert_eq!(*m.handler, "delete");
        assert_eq!(m.param("id"), Some("42"));
    }

    #[test]
    fn test_segment_count_must_match() {
        let r = router();
        assert!(r.match_route(&Method::DELETE, "/dog").is_none());
        assert!(r.match_route(&Method::DELETE, "/dog/1/2").is_none());
        assert!(r.match_route(&Method::GET, "/cat").is_none());
    }

    #[test]
    fn test_trailing_slash_ignored() {
        let r = router();
        assert_eq!(*r.match_route(&Method::GET, "/hello/").unwrap().handler, "hello");
    }

    #[test]
    fn test_first_registered_wins() {
        let mut r = Router::new();
        r.get("/dog/:id", "by-id").get("/dog/new", "new-form");
        let m = r.match_route(&Method::GET, "/dog/new").unwrap();
        assert_eq!(*m.handler, "by-id");
        assert_eq!(m.param("id"), Some("new"));
    }

    #[test]
    fn test_routes_listing() {
        let r = router();
        let listed: Vec<_> = r.routes().collect();
        assert_eq!(listed[3], (&Method::DELETE, "/dog/:id"));
        assert_eq!(listed.len(), 4);
    }
}
