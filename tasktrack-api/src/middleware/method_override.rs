/// HTML form method override
///
/// Browsers only submit GET and POST. A POST carrying `?_method=PUT`,
/// `PATCH` or `DELETE` is rewritten to that method before routing, so forms
/// can reach the update and destroy routes. Any other value is ignored.
///
/// Routing happens inside the [`axum::Router`], so this runs as a
/// `map_request` wrapped around the whole router rather than as a router
/// layer.

use axum::{
    extract::{Query, Request},
    http::Method,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct MethodParam {
    #[serde(rename = "_method")]
    method: Option<String>,
}

fn overridden(method: &str) -> Option<Method> {
    match method.to_ascii_uppercase().as_str() {
        "PUT" => Some(Method::PUT),
        "PATCH" => Some(Method::PATCH),
        "DELETE" => Some(Method::DELETE),
        _ => None,
    }
}

pub fn method_override(mut req: Request) -> Request {
    if req.method() != Method::POST {
        return req;
    }

    let requested = Query::<MethodParam>::try_from_uri(req.uri())
        .ok()
        .and_then(|Query(param)| param.method)
        .and_then(|m| overridden(&m));

    if let Some(method) = requested {
        *req.method_mut() = method;
    }

    req
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request(method: Method, uri: &str) -> Request {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_post_with_override() {
        let req = method_override(request(Method::POST, "/task/1/destroy?_method=DELETE"));
        assert_eq!(req.method(), Method::DELETE);

        let req = method_override(request(Method::POST, "/task/move/1?status=COMPLETED&_method=patch"));
        assert_eq!(req.method(), Method::PATCH);
    }

    #[test]
    fn test_unknown_override_ignored() {
        let req = method_override(request(Method::POST, "/task/store?_method=TRACE"));
        assert_eq!(req.method(), Method::POST);
    }

    #[test]
    fn test_only_post_is_rewritten() {
        let req = method_override(request(Method::GET, "/task?_method=DELETE"));
        assert_eq!(req.method(), Method::GET);
    }

    #[test]
    fn test_post_without_query() {
        let req = method_override(request(Method::POST, "/task/store"));
        assert_eq!(req.method(), Method::POST);
    }
}
