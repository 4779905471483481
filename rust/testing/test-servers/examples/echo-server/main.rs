//! A simple web server that echoes a POST body back, with a route that
//! always faults.
//!
//! Every request is traced as a segment, exported to a tracing server.

use std::env;
use std::net;

use axum::response::{IntoResponse, Response};
use http::StatusCode;
use segment_tracing::{
    close_segment, context, tracing, OpenSegmentLayer, RequestFault, SegmentConfig,
};
use test_servers::termination::wait_for_termination;

const DEFAULT_PORT: u16 = 9001;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let host = net::IpAddr::V6(net::Ipv6Addr::LOCALHOST);
    let port = env::var("PORT")
        .map(|s| s.parse())
        .unwrap_or(Ok(DEFAULT_PORT))?;
    let address = net::SocketAddr::new(host, port);

    let config = SegmentConfig::from_env(env!("CARGO_BIN_NAME"))?;
    let _global_tracing =
        segment_tracing::setup::init_tracing(&config, env!("CARGO_PKG_VERSION"), None)
            .map_err(|e| anyhow::anyhow!(e))?;

    let app = axum::Router::new()
        .route(
            "/echo",
            axum::routing::post(|body: String| async {
                tracing::info!(path = "/echo", body);
                body
            }),
        )
        .route("/fail", axum::routing::get(fail))
        .route("/health", axum::routing::get(|| async { "OK" }))
        .layer(close_segment())
        .layer(OpenSegmentLayer::new(config));

    let server = axum::Server::bind(&address).serve(app.into_make_service());
    let address = server.local_addr();
    tracing::info!(
        server.address = %address.ip(),
        server.port = address.port(),
        "started",
    );
    server
        .with_graceful_shutdown(async {
            match wait_for_termination().await {
                Ok(signal) => tracing::info!(%signal, "stopping"),
                Err(error) => tracing::error!(%error, "cannot wait for termination"),
            }
        })
        .await?;

    Ok(())
}

async fn fail() -> Response {
    let segment = context::current().map(|segment| segment.name().to_owned());
    tracing::warn!(?segment, "about to fail");

    let mut response = (StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong.").into_response();
    RequestFault::new("the /fail route always fails").attach(&mut response);
    response
}
