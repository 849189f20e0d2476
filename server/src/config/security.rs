use std::sync::Arc;
use std::task::{Context, Poll};

use axum::http::{header, HeaderName, HeaderValue, Request, Response};
use tower::{Layer, Service};

use super::Config;

const CSP_API_VALUE: &str = "default-src 'none'; img-src 'self'; frame-ancestors 'none'";
const HSTS_VALUE: &str = "max-age=31536000; includeSubDomains";
const PERMISSIONS_POLICY: HeaderName = HeaderName::from_static("permissions-policy");

/// Adds a fixed set of security headers to every response.
///
/// The header list is built once per layer; HSTS is only included when the
/// service runs behind HTTPS in production.
#[derive(Clone)]
pub struct SecurityHeadersLayer {
    headers: Arc<Vec<(HeaderName, HeaderValue)>>,
}

impl SecurityHeadersLayer {
    pub fn new(include_hsts: bool) -> Self {
        let mut headers = vec![
            (header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
            (header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY")),
            (header::X_XSS_PROTECTION, HeaderValue::from_static("1; mode=block")),
            (header::CONTENT_SECURITY_POLICY, HeaderValue::from_static(CSP_API_VALUE)),
            (
                header::REFERRER_POLICY,
                HeaderValue::from_static("strict-origin-when-cross-origin"),
            ),
            (
                PERMISSIONS_POLICY,
                HeaderValue::from_static("geolocation=(), microphone=(), camera=()"),
            ),
        ];
        if include_hsts {
            headers.push((
                header::STRICT_TRANSPORT_SECURITY,
                HeaderValue::from_static(HSTS_VALUE),
            ));
        }

        Self {
            headers: Arc::new(headers),
        }
    }

    pub fn includes(&self, name: &HeaderName) -> bool {
        self.headers.iter().any(|(n, _)| n == name)
    }
}

impl<S> Layer<S> for SecurityHeadersLayer {
    type Service = SecurityHeadersService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SecurityHeadersService {
            inner,
            headers: Arc::clone(&self.headers),
        }
    }
}

#[derive(Clone)]
pub struct SecurityHeadersService<S> {
    inner: S,
    headers: Arc<Vec<(HeaderName, HeaderValue)>>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for SecurityHeadersService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = SecurityHeadersFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        SecurityHeadersFuture {
            future: self.inner.call(request),
            headers: Arc::clone(&self.headers),
        }
    }
}

#[pin_project::pin_project]
pub struct SecurityHeadersFuture<F> {
    #[pin]
    future: F,
    headers: Arc<Vec<(HeaderName, HeaderValue)>>,
}

impl<F, ResBody, E> std::future::Future for SecurityHeadersFuture<F>
where
    F: std::future::Future<Output = Result<Response<ResBody>, E>>,
{
    type Output = Result<Response<ResBody>, E>;

    fn poll(self: std::pin::Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        match this.future.poll(cx) {
            Poll::Ready(Ok(mut response)) => {
                let headers = response.headers_mut();
                for (name, value) in this.headers.iter() {
                    headers.insert(name.clone(), value.clone());
                }
                Poll::Ready(Ok(response))
            }
            other => other,
        }
    }
}

pub fn create_security_headers_layer(config: &Config) -> SecurityHeadersLayer {
    if config.is_production() {
        tracing::info!("Security: HSTS header enabled (production mode)");
    } else {
        tracing::info!("Security: HSTS header disabled (development mode)");
    }

    SecurityHeadersLayer::new(config.is_production())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use axum::{body::Body, routing::get, Router};
    use tower::ServiceExt;

    #[test]
    fn test_hsts_only_when_requested() {
        assert!(!SecurityHeadersLayer::new(false).includes(&header::STRICT_TRANSPORT_SECURITY));
        assert!(SecurityHeadersLayer::new(true).includes(&header::STRICT_TRANSPORT_SECURITY));
    }

    #[test]
    fn test_layer_follows_environment() {
        let config = Config {
            environment: Environment::Production,
            ..Config::default()
        };
        assert!(create_security_headers_layer(&config).includes(&header::STRICT_TRANSPORT_SECURITY));
        assert!(!create_security_headers_layer(&Config::default())
            .includes(&header::STRICT_TRANSPORT_SECURITY));
    }

    #[tokio::test]
    async fn test_headers_added_to_response() {
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(SecurityHeadersLayer::new(false));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.headers()[header::X_FRAME_OPTIONS], "DENY");
        assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert!(response.headers().get(header::STRICT_TRANSPORT_SECURITY).is_none());
    }
}
