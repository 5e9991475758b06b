//! Reverse routing: resolve a named route plus parameters to a URL.
//!
//! The HTTP layer owns the actual routes; the storage engine only needs the
//! capability of turning a route name into a location it can hand back to
//! a caller (for example, where to upload content for a fresh record).

use std::collections::HashMap;

use crate::error::TypeError;

/// Capability for resolving a named route to a URL string.
pub trait RouteResolver: Send + Sync {
    /// Resolve `route`, substituting each `(name, value)` parameter.
    fn url_for_route(&self, route: &str, params: &[(&str, &str)]) -> Result<String, TypeError>;
}

/// Route templates keyed by name.
///
/// Templates use `{param}` placeholders, e.g. `/v1/blobs/byId/{id}/content`.
/// Resolved URLs are prefixed with the table's base URL.
#[derive(Clone, Debug, Default)]
pub struct RouteTable {
    base_url: String,
    templates: HashMap<String, String>,
}

impl RouteTable {
    /// Create an empty table. `base_url` may be empty for relative URLs.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            templates: HashMap::new(),
        }
    }

    /// Register a named route template (builder style).
    pub fn with_route(mut self, name: impl Into<String>, template: impl Into<String>) -> Self {
        self.templates.insert(name.into(), template.into());
        self
    }

    /// The base URL prepended to resolved routes.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl RouteResolver for RouteTable {
    fn url_for_route(&self, route: &str, params: &[(&str, &str)]) -> Result<String, TypeError> {
        let template = self
            .templates
            .get(route)
            .ok_or_else(|| TypeError::UnknownRoute(route.to_string()))?;

        let mut path = template.clone();
        for (name, value) in params {
            path = path.replace(&format!("{{{name}}}"), value);
        }

        if let Some(start) = path.find('{') {
            let end = path[start..].find('}').map(|e| start + e).unwrap_or(path.len());
            return Err(TypeError::MissingRouteParam {
                route: route.to_string(),
                param: path[start + 1..end].to_string(),
            });
        }

        Ok(format!("{}{}", self.base_url, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RouteTable {
        RouteTable::new("http://127.0.0.1:8000/")
            .with_route("content-upload", "/v1/blobs/byId/{id}/content")
            .with_route("static-content", "/static/{id}")
    }

    #[test]
    fn resolves_with_parameters() {
        let url = table().url_for_route("content-upload", &[("id", "12")]).unwrap();
        assert_eq!(url, "http://127.0.0.1:8000/v1/blobs/byId/12/content");
    }

    #[test]
    fn unknown_route_is_an_error() {
        let err = table().url_for_route("nope", &[]).unwrap_err();
        assert_eq!(err, TypeError::UnknownRoute("nope".into()));
    }

    #[test]
    fn unfilled_placeholder_is_reported() {
        let err = table().url_for_route("static-content", &[]).unwrap_err();
        assert_eq!(
            err,
            TypeError::MissingRouteParam { route: "static-content".into(), param: "id".into() }
        );
    }

    #[test]
    fn empty_base_gives_relative_urls() {
        let table = RouteTable::new("").with_route("static-content", "/static/{id}");
        assert_eq!(table.url_for_route("static-content", &[("id", "1")]).unwrap(), "/static/1");
    }
}
