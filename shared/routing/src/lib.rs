use std::collections::HashMap;

/// Key under which the remainder matched by a trailing `*` is stored.
pub const SPLAT_PARAM: &str = "*";

#[derive(Debug)]
enum PathSegment {
    Static(String),
    Param(String),
}

#[derive(Debug)]
struct Path {
    segments: Vec<PathSegment>,
    has_trailing_splat: bool,
}

impl Path {
    /// Parses a path pattern string into a Path struct
    /// Supports:
    /// - Static segments: "/api/stock"
    /// - Dynamic parameters: "/api/cms/{collection}"
    /// - Trailing splat: "/api/media/*"
    pub fn parse(path_str: &str) -> Self {
        // Trim slashes
        let mut normalized_path = path_str.trim().trim_matches('/');

        // Handle trailing splat
        let mut has_trailing_splat = false;
        if normalized_path == "*" {
            has_trailing_splat = true;
            normalized_path = "";
        } else if let Some(stripped) = normalized_path.strip_suffix("/*") {
            has_trailing_splat = true;
            normalized_path = stripped;
        }

        let segments: Vec<PathSegment> = if normalized_path.is_empty() {
            vec![]
        } else {
            normalized_path
                .split('/')
                .map(|s| {
                    if let Some(stripped) = s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                        PathSegment::Param(stripped.to_string())
                    } else {
                        PathSegment::Static(s.to_string())
                    }
                })
                .collect()
        };

        Path {
            segments,
            has_trailing_splat,
        }
    }

    /// Matches a request path against this path pattern
    /// Returns Some(params) if match succeeds, None otherwise
    fn matches<'a>(&self, request_path: &'a str) -> Option<HashMap<String, &'a str>> {
        let normalized_path = request_path.trim().trim_matches('/');

        let request_segments: Vec<&'a str> = if normalized_path.is_empty() {
            vec![]
        } else {
            normalized_path.split('/').collect()
        };

        let mut params = HashMap::new();
        let mut i_req = 0;
        // Byte offset of the first unconsumed segment in normalized_path
        let mut consumed = 0;

        for seg in self.segments.iter() {
            let req_segment = *request_segments.get(i_req)?;
            match seg {
                PathSegment::Static(s) => {
                    if req_segment != s {
                        return None;
                    }
                }
                PathSegment::Param(name) => {
                    params.insert(name.clone(), req_segment);
                }
            }
            i_req += 1;
            consumed += req_segment.len() + 1;
        }

        if self.has_trailing_splat {
            if i_req < request_segments.len() {
                params.insert(SPLAT_PARAM.to_string(), &normalized_path[consumed..]);
            }
            Some(params)
        } else if i_req == request_segments.len() {
            Some(params)
        } else {
            None
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct RouteMatch<'a, A> {
    pub params: HashMap<String, &'a str>,
    pub action: &'a A,
}

impl<A> RouteMatch<'_, A> {
    /// Path remainder captured by a trailing `*`, if any.
    pub fn splat(&self) -> Option<&str> {
        self.params.get(SPLAT_PARAM).copied()
    }
}

#[derive(Debug)]
pub struct Route<A> {
    path: Path,
    action: A,
}

impl<A> Route<A> {
    /// Creates a new Route with the given path pattern and action
    pub fn new(path: &str, action: A) -> Self {
        Self {
            path: Path::parse(path),
            action,
        }
    }

    /// Returns Some(RouteMatch) if the request path matches this route, None otherwise.
    /// Trailing slash normalization is applied to incoming requests.
    pub fn matches<'a>(&'a self, request_path: &'a str) -> Option<RouteMatch<'a, A>> {
        let params = self.path.matches(request_path)?;
        Some(RouteMatch {
            params,
            action: &self.action,
        })
    }
}

pub struct RouteTable<A> {
    routes: Vec<Route<A>>,
}

impl<A> RouteTable<A> {
    pub fn new(routes: Vec<Route<A>>) -> Self {
        Self { routes }
    }

    /// Matches the incoming request to a route, and returns the first matched route if any.
    /// If no matches are found, return none.
    pub fn resolve<'a, B>(&'a self, request: &'a http::Request<B>) -> Option<RouteMatch<'a, A>> {
        let path = request.uri().path();

        // Return the first matching route, if any
        self.routes.iter().find_map(|route| route.matches(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_path() {
        let route = Route::new("/api/stock/", "stock");
        assert!(route.matches("/api/stock").is_some(), "exact path");
        assert!(
            route.matches("/api/stock/").is_some(),
            "with trailing slash normalization"
        );
        assert!(
            route.matches("/api/stock/2").is_none(),
            "extra segment doesn't match"
        );
        assert!(route.matches("/api/").is_none(), "missing segment doesn't match");
    }

    #[test]
    fn test_trailing_splat() {
        let route = Route::new("/api/media/*", "media");

        let exact = route.matches("/api/media").unwrap();
        assert_eq!(exact.splat(), None);

        let nested = route.matches("/api/media/uploads/2024/report.pdf").unwrap();
        assert_eq!(nested.splat(), Some("uploads/2024/report.pdf"));

        assert!(route.matches("/api/").is_none(), "missing segment");
        assert!(route.matches("/api/other/x").is_none(), "different prefix");
    }

    #[test]
    fn test_root_splat() {
        let route = Route::new("/*", "all");
        assert_eq!(
            route.matches("/uploads/a.png").unwrap().splat(),
            Some("uploads/a.png")
        );
        assert_eq!(route.matches("/").unwrap().splat(), None);
    }

    #[test]
    fn test_dynamic_path() {
        let route = Route::new("/api/cms/{collection}", "cms");

        let route_match = route.matches("/api/cms/press-releases").unwrap();
        assert_eq!(
            route_match.params.get("collection").copied(),
            Some("press-releases")
        );
        assert_eq!(route_match.action, &"cms");
        assert!(route.matches("/api/cms").is_none());
    }

    #[test]
    fn test_resolve_first_match() {
        let table = RouteTable::new(vec![
            Route::new("/api/media/*", 1),
            Route::new("/api/stock", 2),
        ]);

        let req = http::Request::builder()
            .uri("http://localhost/api/stock?date=2024-01-01")
            .body(())
            .unwrap();
        assert_eq!(table.resolve(&req).map(|m| *m.action), Some(2));

        let req = http::Request::builder()
            .uri("/api/unknown")
            .body(())
            .unwrap();
        assert!(table.resolve(&req).is_none());
    }

    #[test]
    fn test_path_parsing() {
        let path = Path::parse("");
        assert_eq!(path.segments.len(), 0);
        assert!(!path.has_trailing_splat);

        let path = Path::parse("/api/stock");
        assert_eq!(path.segments.len(), 2);
        assert!(!path.has_trailing_splat);

        let path = Path::parse("/api/cms/{collection}");
        assert_eq!(path.segments.len(), 3);
        assert!(!path.has_trailing_splat);

        let path = Path::parse("/api/media/*");
        assert_eq!(path.segments.len(), 2);
        assert!(path.has_trailing_splat);
    }
}
