use anyhow::Result;
use axum::http::HeaderValue;
use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use sbal_api::{
    misc_routes, package_routes, setup_tracing, team_routes, user_routes, ApiServerEnv,
    GlobalState,
};
use sbal_common::EnvVars;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    setup_tracing();

    let env = ApiServerEnv::load();
    let cors = if env.client_url == "*" {
        CorsLayer::very_permissive()
    } else {
        CorsLayer::new()
            .allow_origin(env.client_url.parse::<HeaderValue>()?)
            .allow_methods(Any)
            .allow_headers(Any)
    };
    let trace = TraceLayer::new_for_http();

    let state = GlobalState::new().await?;

    let api = Router::new()
        .merge(user_routes())
        .merge(team_routes())
        .merge(package_routes())
        .merge(misc_routes());

    let app = Router::new()
        .route("/", get(|| async { "SBAL System API is running" }))
        .nest("/api/users", api)
        .layer(cors)
        .layer(trace)
        .with_state(state);

    let port: u16 = env.port.parse().expect("failed to convert to number");

    let listener = tokio::net::TcpListener::bind(format!(":::{port}")).await?;
    tracing::info!("LISTENING ON {port}");
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
