//! Permissive CORS for browser callers, applied per route.
//!
//! `CorsLayer` answers every `OPTIONS` itself and stamps the origin on the
//! rest. It only sends the method and header lists on preflights, so those
//! two are also set on ordinary responses that lack them.

use std::convert::Infallible;

use axum::http::header::{
    ACCEPT, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, CONTENT_TYPE,
};
use axum::http::{HeaderValue, Method};
use axum::routing::MethodRouter;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

/// Same rendering `CorsLayer` uses for its preflight answer.
const ALLOWED_HEADERS: &str = "content-type,accept";

/// Which methods a route advertises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allow {
    Post,
    Get,
}

impl Allow {
    fn methods(self) -> [Method; 2] {
        match self {
            Self::Post => [Method::POST, Method::OPTIONS],
            Self::Get => [Method::GET, Method::OPTIONS],
        }
    }

    const fn advertised(self) -> &'static str {
        match self {
            Self::Post => "POST,OPTIONS",
            Self::Get => "GET,OPTIONS",
        }
    }
}

/// Preflight and origin handling for a route.
pub fn cors_layer(allow: Allow) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(allow.methods())
        .allow_headers([CONTENT_TYPE, ACCEPT])
}

/// Wrap `route` so that every response, preflight or not, carries the policy.
pub fn with_cors<S>(route: MethodRouter<S>, allow: Allow) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    route
        .layer::<_, Infallible>(SetResponseHeaderLayer::if_not_present(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(allow.advertised()),
        ))
        .layer::<_, Infallible>(SetResponseHeaderLayer::if_not_present(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        ))
        .layer(cors_layer(allow))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::body::Body;
    use axum::http::header::ACCESS_CONTROL_ALLOW_ORIGIN;
    use axum::http::{Request, StatusCode};
    use axum::routing::any;
    use tower::ServiceExt;

    fn app(allow: Allow) -> Router {
        Router::new().route("/", with_cors(any(|| async { "handled" }), allow))
    }

    #[tokio::test]
    async fn test_preflight_is_answered_by_the_layer() {
        let response = app(Allow::Post)
            .oneshot(Request::builder().method("OPTIONS").uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert!(response.status().is_success());
        let headers = response.headers();
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_METHODS], "POST,OPTIONS");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_HEADERS], ALLOWED_HEADERS);
    }

    #[tokio::test]
    async fn test_ordinary_response_carries_full_policy() {
        let response = app(Allow::Get)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_METHODS], "GET,OPTIONS");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_HEADERS], ALLOWED_HEADERS);
    }
}
