//! Router assembly.
//!
//! Every path under `/` is a file lookup in the asset directory. Responses
//! are marked uncacheable so an embedded app reloaded inside the host always
//! picks up the latest build.

use axum::Router;
use axum::http::{HeaderValue, header};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;

pub const CACHE_CONTROL: &str = "no-cache, no-store, must-revalidate";
pub const PRAGMA: &str = "no-cache";
pub const EXPIRES: &str = "0";

pub fn app(config: &ServerConfig) -> Router {
    let assets = ServeDir::new(&config.asset_dir).append_index_html_on_directories(true);

    Router::new()
        .fallback_service(assets)
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static(CACHE_CONTROL),
        ))
        .layer(SetResponseHeaderLayer::overriding(header::PRAGMA, HeaderValue::from_static(PRAGMA)))
        .layer(SetResponseHeaderLayer::overriding(header::EXPIRES, HeaderValue::from_static(EXPIRES)))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
#[path = "routes_test.rs"]
mod tests;
