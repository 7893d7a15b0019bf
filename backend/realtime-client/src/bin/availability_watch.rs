/// Watch live availability for one class
///
/// ```text
/// REALTIME_URL=ws://localhost:8000/ws REALTIME_CLASS_ID=<uuid> availability-watch
/// ```
use anyhow::{Context, Result};
use realtime_client::{
    logging, AvailabilityBinding, AvailabilitySnapshot, ClientConfig, ClientEvent,
    ConnectionManager, EventKind, SubscriptionRegistry, WsConnector,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    logging::init_tracing();

    let config = ClientConfig::from_env().context("Failed to load REALTIME_* configuration")?;
    let class_id: Uuid = std::env::var("REALTIME_CLASS_ID")
        .context("REALTIME_CLASS_ID must be set")?
        .parse()
        .context("REALTIME_CLASS_ID must be a UUID")?;
    let total_spots: u32 = std::env::var("REALTIME_TOTAL_SPOTS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(20);

    let connection = Arc::new(ConnectionManager::from_config(
        &config,
        Arc::new(WsConnector),
    ));
    let registry = Arc::new(SubscriptionRegistry::new(connection.clone()));

    let (exhausted_tx, mut exhausted_rx) = mpsc::unbounded_channel();
    connection
        .dispatcher()
        .on(EventKind::ReconnectExhausted, move |event| {
            if let ClientEvent::ReconnectExhausted { attempts } = event {
                let _ = exhausted_tx.send(*attempts);
            }
            Ok(())
        });
    connection.dispatcher().on(EventKind::Connected, |_| {
        info!("Connected");
        Ok(())
    });
    connection.dispatcher().on(EventKind::Disconnected, |event| {
        if let ClientEvent::Disconnected { reason } = event {
            warn!(reason = %reason, "Disconnected, reconnecting");
        }
        Ok(())
    });

    let (binding, mut notices) = AvailabilityBinding::mount(
        registry.clone(),
        class_id,
        AvailabilitySnapshot {
            available_spots: total_spots,
            total_spots,
        },
    );

    connection.connect(config.session_token.as_deref());
    info!(%class_id, url = %config.url, "Watching class availability");

    loop {
        tokio::select! {
            Some(notice) = notices.recv() => {
                let state = binding.state();
                info!(
                    available = state.available_spots,
                    total = state.total_spots,
                    status = %binding.status(),
                    "{}",
                    notice.message()
                );
            }
            Some(attempts) = exhausted_rx.recv() => {
                error!(attempts, "Could not reconnect, giving up");
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    drop(binding);
    connection.disconnect();
    Ok(())
}
