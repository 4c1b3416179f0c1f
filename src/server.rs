//! TCP front end: accepts connections and runs one session task per client.

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use log::{error, info, warn};
use tokio::net::TcpListener;
use tokio::task::JoinSet;

use crate::config::Config;
use crate::metrics;
use crate::session::{serve_connection, SessionSettings, WorldContext};
use crate::world::WorldStoreBuilder;

pub struct WorldServer {
    config: Config,
    ctx: Arc<WorldContext>,
}

impl WorldServer {
    /// Open the world database and make sure the default zone exists.
    pub fn new(config: Config) -> Result<Self> {
        let store = WorldStoreBuilder::new(config.world.db_path())
            .default_zone(&config.world.default_zone)
            .open()?;
        let ctx = Arc::new(WorldContext::new(
            Arc::new(store),
            SessionSettings::from_config(&config),
        ));
        Ok(Self { config, ctx })
    }

    pub fn context(&self) -> Arc<WorldContext> {
        Arc::clone(&self.ctx)
    }

    /// Serve on the configured address until Ctrl-C.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(&self.config.server.bind).await?;
        info!(
            "'{}' listening on {}",
            self.config.server.name,
            listener.local_addr()?
        );
        self.serve_with_shutdown(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await
    }

    /// Accept connections from `listener` until `shutdown` completes, then abort every session.
    pub async fn serve_with_shutdown<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut sessions = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Received shutdown signal");
                    break;
                }
                accepted = listener.accept() => {
                    let (stream, addr) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            warn!("accept failed: {}", e);
                            continue;
                        }
                    };
                    let ctx = self.context();
                    sessions.spawn(async move {
                        let peer = addr.to_string();
                        if let Err(e) = serve_connection(stream, ctx, &peer).await {
                            warn!("{}: session ended with error: {}", peer, e);
                        }
                    });
                }
                Some(finished) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(e) = finished {
                        if e.is_panic() {
                            error!("session task panicked: {}", e);
                        }
                    }
                }
            }
        }

        info!("Shutting down; closing {} sessions", sessions.len());
        sessions.shutdown().await;
        self.ctx.store.flush()?;
        let totals = metrics::snapshot();
        info!(
            "Served {} sessions (peak {}), {} commands; events delivered {} dropped {}",
            totals.sessions_opened,
            totals.sessions_peak,
            totals.commands_dispatched,
            totals.events_delivered,
            totals.events_dropped
        );
        Ok(())
    }

    /// Print world and session statistics, as text or as one JSON object.
    pub fn show_status(&self, json: bool) -> Result<()> {
        let stats = self.ctx.store.stats();
        let sessions = metrics::snapshot();
        if json {
            let payload = serde_json::json!({
                "name": self.config.server.name,
                "bind": self.config.server.bind,
                "world": stats,
                "sessions": sessions,
            });
            println!("{}", payload);
            return Ok(());
        }
        println!("=== {} Status ===", self.config.server.name);
        println!("Listen Address: {}", self.config.server.bind);
        println!("Database: {}", self.config.world.db_path().display());
        println!("Zones: {}", stats.zones);
        println!("Rooms: {}", stats.rooms);
        println!("Characters: {}", stats.characters);
        println!("Active Sessions: {}", sessions.sessions_active);
        Ok(())
    }
}
