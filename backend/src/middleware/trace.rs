//! Request tracing for sync runs.
//!
//! Every request is assigned a trace identifier held in task-local storage
//! so all log lines emitted during one sync run can be correlated. The id
//! is echoed back in a `Trace-Id` response header, and an invoking
//! scheduler may supply its own id in the same request header to stitch
//! the run into its own logs.
//!
//! Task-local values do not cross `tokio::spawn` boundaries; wrap spawned
//! work in [`TraceId::scope`] to carry the id along.

use std::future::Future;

use actix_web::Error;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready};
use actix_web::http::header::{HeaderName, HeaderValue};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use tokio::task_local;
use tracing::error;
use uuid::Uuid;

/// Header carrying the trace identifier in both directions.
pub const TRACE_ID_HEADER: &str = "trace-id";

task_local! {
    static TRACE_ID: TraceId;
}

/// Identifier correlating all work done for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceId(Uuid);

impl TraceId {
    /// The id in scope on the current task, if any.
    pub fn current() -> Option<Self> {
        TRACE_ID.try_with(|id| *id).ok()
    }

    /// Run `fut` with `trace_id` in scope.
    pub async fn scope<Fut>(trace_id: TraceId, fut: Fut) -> Fut::Output
    where
        Fut: Future,
    {
        TRACE_ID.scope(trace_id, fut).await
    }

    /// Reuse the caller's id when the request carries a well-formed one,
    /// otherwise mint a fresh id.
    fn for_request(request: &ServiceRequest) -> Self {
        request
            .headers()
            .get(TRACE_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_else(|| Self(Uuid::new_v4()))
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for TraceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// Middleware installing the per-request [`TraceId`].
#[derive(Clone)]
pub struct Trace;

impl<S, B> Transform<S, ServiceRequest> for Trace
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = TraceMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(TraceMiddleware { inner: service }))
    }
}

/// Service wrapper produced by [`Trace`].
pub struct TraceMiddleware<S> {
    inner: S,
}

impl<S, B> Service<ServiceRequest> for TraceMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(inner);

    fn call(&self, request: ServiceRequest) -> Self::Future {
        let trace_id = TraceId::for_request(&request);
        let inner = self.inner.call(request);
        Box::pin(TraceId::scope(trace_id, async move {
            let mut response = inner.await?;
            match HeaderValue::from_str(&trace_id.to_string()) {
                Ok(value) => {
                    response
                        .response_mut()
                        .headers_mut()
                        .insert(HeaderName::from_static(TRACE_ID_HEADER), value);
                }
                Err(encode_error) => {
                    // A UUID always encodes; log rather than fail the
                    // response if that ever stops holding.
                    error!(error = %encode_error, %trace_id, "trace id header not encodable");
                }
            }
            Ok(response)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, HttpResponse, test, web};

    fn traced_app_route() -> actix_web::Route {
        web::get().to(|| async move {
            let id = TraceId::current().expect("trace id in scope");
            HttpResponse::Ok().body(id.to_string())
        })
    }

    #[tokio::test]
    async fn current_reflects_scope() {
        let expected: TraceId = Uuid::nil().to_string().parse().expect("valid uuid");
        let observed = TraceId::scope(expected, async move { TraceId::current() }).await;
        assert_eq!(observed, Some(expected));
    }

    #[tokio::test]
    async fn current_is_none_outside_any_scope() {
        assert!(TraceId::current().is_none());
    }

    #[actix_web::test]
    async fn response_header_matches_what_the_handler_saw() {
        let app = test::init_service(App::new().wrap(Trace).route("/", traced_app_route())).await;

        let response = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;

        let header = response
            .headers()
            .get(TRACE_ID_HEADER)
            .expect("trace id header")
            .to_str()
            .expect("ascii header")
            .to_owned();
        Uuid::parse_str(&header).expect("header is a uuid");
        let body = test::read_body(response).await;
        assert_eq!(header.as_bytes(), &body[..]);
    }

    #[actix_web::test]
    async fn caller_supplied_trace_id_is_reused() {
        let app = test::init_service(App::new().wrap(Trace).route("/", traced_app_route())).await;
        let supplied = Uuid::new_v4().to_string();

        let request = test::TestRequest::get()
            .uri("/")
            .insert_header((TRACE_ID_HEADER, supplied.as_str()))
            .to_request();
        let response = test::call_service(&app, request).await;

        let header = response
            .headers()
            .get(TRACE_ID_HEADER)
            .expect("trace id header");
        assert_eq!(header.to_str().expect("ascii header"), supplied);
    }

    #[actix_web::test]
    async fn malformed_inbound_trace_id_is_replaced() {
        let app = test::init_service(App::new().wrap(Trace).route("/", traced_app_route())).await;

        let request = test::TestRequest::get()
            .uri("/")
            .insert_header((TRACE_ID_HEADER, "not-a-uuid"))
            .to_request();
        let response = test::call_service(&app, request).await;

        let header = response
            .headers()
            .get(TRACE_ID_HEADER)
            .expect("trace id header")
            .to_str()
            .expect("ascii header")
            .to_owned();
        assert_ne!(header, "not-a-uuid");
        Uuid::parse_str(&header).expect("replacement is a uuid");
    }
}
