mod api;
mod config;
mod error;
mod identity;
mod ledger;
mod models;
mod money;
mod notify;
mod oracle;
mod policy;
mod rail;
mod referral;
mod state;
mod store;
mod submissions;

use axum::Router;
use config::CONFIG;
use notify::LogNotifier;
use oracle::AllowlistOracle;
use rail::SolanaRail;
use state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let rail = Arc::new(SolanaRail::new(
        CONFIG.solana_rpc_url.clone(),
        CONFIG.operating_wallet_path.clone(),
        CONFIG.token_mint.clone(),
    ));
    let oracle = Arc::new(AllowlistOracle::from_env("CHANNEL_MEMBERS"));
    let state = AppState::new(&CONFIG, rail, oracle, Arc::new(LogNotifier));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(api::user::routes())
        .merge(api::verify::routes())
        .merge(api::tasks::routes())
        .merge(api::admin::routes())
        .layer(cors)
        .with_state(state);

    let listener = TcpListener::bind(&CONFIG.bind_addr)
        .await
        .expect("failed to bind listener");
    info!(addr = %CONFIG.bind_addr, "server running");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("server error");
}
