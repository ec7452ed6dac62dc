//! redpacket - service entry point
//!
//! Boot order: config, logging, database (with schema bootstrap), payment
//! network client, engine components, background refund sweeper, then the
//! HTTP gateway.

use std::sync::Arc;

use redpacket::config::AppConfig;
use redpacket::db::Database;
use redpacket::network::NetworkClient;
use redpacket::packet::api::{self, AppState};
use redpacket::packet::{ClaimArbiter, PacketService, PacketStore, RefundSettler, RefundSweeper};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env);
    let _log_guard = redpacket::logging::init_logging(&config);

    tracing::info!("starting redpacket engine in {} mode", env);

    let db = Database::connect(&config.postgres_url).await?;
    db.migrate().await?;

    let store = Arc::new(PacketStore::new(db.pool().clone()));
    let client = Arc::new(NetworkClient::new(&config.network));
    let service = Arc::new(PacketService::new(store.clone(), client.clone(), &config));
    let arbiter = Arc::new(ClaimArbiter::new(
        store.clone(),
        config.message_template.group_opened_packet.clone(),
    ));
    let settler = Arc::new(RefundSettler::new(store.clone(), client));

    let sweeper = RefundSweeper::new(store.clone(), settler, &config.packet);
    tokio::spawn(async move { sweeper.run().await });

    let app = api::router(AppState {
        store,
        service,
        arbiter,
    });

    let port = get_port_override().unwrap_or(config.gateway.port);
    let listener = tokio::net::TcpListener::bind((config.gateway.host.as_str(), port)).await?;
    tracing::info!("gateway listening on {}:{}", config.gateway.host, port);
    axum::serve(listener, app).await?;
    Ok(())
}
