//! Embedded HTTP server exposing `/metrics` in Prometheus text format
//!
//! Grounded on the teacher's `http-server` feature (built on `hyper`);
//! gated the same way behind a Cargo feature rather than being part of
//! the always-on registry.

use crate::registry::MetricRegistry;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Default port for the metrics exposition endpoint
pub const DEFAULT_PORT: u16 = 9090;

const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Serve `/metrics` on `addr` until the returned future is dropped or the
/// process is interrupted. Any path other than `/metrics` returns 404.
pub async fn serve(registry: Arc<MetricRegistry>, addr: SocketAddr) -> hyper::Result<()> {
    let make_svc = make_service_fn(move |_conn| {
        let registry = registry.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                let registry = registry.clone();
                async move { Ok::<_, Infallible>(handle(&registry, req)) }
            }))
        }
    });

    info!("metrics server listening on {}", addr);
    Server::bind(&addr).serve(make_svc).await
}

fn handle(registry: &MetricRegistry, req: Request<Body>) -> Response<Body> {
    if req.uri().path() == "/metrics" {
        Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", EXPOSITION_CONTENT_TYPE)
            .body(Body::from(registry.export_text()))
            .unwrap_or_else(|_| Response::new(Body::empty()))
    } else {
        Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Body::from("not found"))
            .unwrap_or_else(|_| Response::new(Body::empty()))
    }
}
