//! A simple web server that proxies another.
//!
//! The proxied server root URL should be specified in the `TARGET_URL`
//! environment variable. The proxied request continues this server's
//! segment, and a failure to reach the target is recorded on it.

use std::env;
use std::net;

use axum::response::{IntoResponse, Response};
use http::StatusCode;
use segment_tracing::{close_segment, open_segment, tracing, RequestFault};
use test_servers::termination::wait_for_termination;

const DEFAULT_PORT: u16 = 9002;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let target_uri: http::uri::Uri = env::var("TARGET_URL")?.parse()?;
    let target_uri_scheme = target_uri
        .scheme()
        .ok_or_else(|| anyhow::anyhow!("target URL has no scheme"))?
        .clone();
    let target_uri_authority = target_uri
        .authority()
        .ok_or_else(|| anyhow::anyhow!("target URL has no authority"))?
        .clone();

    let host = net::IpAddr::V6(net::Ipv6Addr::LOCALHOST);
    let port = env::var("PORT")
        .map(|s| s.parse())
        .unwrap_or(Ok(DEFAULT_PORT))?;
    let address = net::SocketAddr::new(host, port);

    let open = open_segment(env!("CARGO_BIN_NAME"))?;
    let _global_tracing = segment_tracing::setup::init_tracing(
        open.tracer().config(),
        env!("CARGO_PKG_VERSION"),
        None,
    )
    .map_err(|e| anyhow::anyhow!(e))?;

    let client = reqwest::Client::new();
    let app = axum::Router::new()
        .route("/health", axum::routing::get(|| async { "OK" }))
        .fallback(
            move |method: http::method::Method, request_uri: http::uri::Uri, body: String| {
                async move {
                    let mut target_uri_builder = http::uri::Uri::builder()
                        .scheme(target_uri_scheme)
                        .authority(target_uri_authority);
                    if let Some(path_and_query) = request_uri.path_and_query() {
                        target_uri_builder =
                            target_uri_builder.path_and_query(path_and_query.clone());
                    }

                    let forwarded = async move {
                        let target_uri = target_uri_builder.build()?.to_string();
                        let response = client
                            .request(method, target_uri)
                            .headers(segment_tracing::http_client::trace_headers())
                            .body(body)
                            .send()
                            .await?;
                        anyhow::Ok(response.text().await?)
                    };
                    match forwarded.await {
                        Ok(text) => text.into_response(),
                        Err(error) => bad_gateway(error),
                    }
                }
            },
        )
        .layer(close_segment())
        .layer(open);

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

fn bad_gateway(error: anyhow::Error) -> Response {
    let mut response = (StatusCode::BAD_GATEWAY, error.to_string()).into_response();
    RequestFault::new(error).attach(&mut response);
    response
}
