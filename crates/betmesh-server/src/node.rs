//! Wiring a configured node together and running it.

use std::net::SocketAddr;
use std::sync::Arc;

use betmesh_config::BetmeshConfig;
use betmesh_gossip::{
    Broadcaster, ExistenceOracle, GossipSettings, GossipTransport, HttpPeerProbe, PeerAddr,
    PeerChannels, PeerRegistry, Reconciler,
};
use betmesh_ledger::Ledger;
use betmesh_store::{RecordStore, SharedStore, StoreOptions};
use betmesh_types::NodeId;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::routes::router;
use crate::service::NodeService;
use crate::{ServerError, ServerResult};

/// A running node. Dropping the handle does not stop it; call
/// [`NodeHandle::shutdown`].
#[derive(Debug)]
pub struct NodeHandle {
    http_addr: SocketAddr,
    gossip_addr: SocketAddr,
    service: Arc<NodeService<HttpPeerProbe>>,
    shutdown: watch::Sender<bool>,
    server: JoinHandle<std::io::Result<()>>,
    gossip: Vec<JoinHandle<()>>,
}

impl NodeHandle {
    /// Address the HTTP server is bound to.
    pub fn http_addr(&self) -> SocketAddr {
        self.http_addr
    }

    /// Address the gossip listener is bound to.
    pub fn gossip_addr(&self) -> SocketAddr {
        self.gossip_addr
    }

    pub fn service(&self) -> &Arc<NodeService<HttpPeerProbe>> {
        &self.service
    }

    /// Stops accepting work, drains in-flight requests and closes every
    /// gossip channel.
    pub async fn shutdown(self) -> ServerResult<()> {
        info!(node_id = %self.service.ledger().node_id(), "node shutting down");
        // Receivers may all be gone already; nothing to signal then.
        let _ = self.shutdown.send(true);

        let served = self
            .server
            .await
            .map_err(|e| ServerError::Task(e.to_string()))?;
        for task in self.gossip {
            if let Err(e) = task.await {
                warn!(error = %e, "gossip task ended abnormally");
            }
        }
        served?;
        info!("node stopped");
        Ok(())
    }
}

/// Binds the configured addresses and starts the node.
pub async fn start(config: &BetmeshConfig) -> ServerResult<NodeHandle> {
    let http = bind("http", &config.node.http_addr).await?;
    let gossip = bind("gossip", &config.node.gossip_addr).await?;
    start_with_listeners(config, http, gossip).await
}

/// Starts a node on listeners the caller already bound. The addresses in
/// `config.node` are ignored.
pub async fn start_with_listeners(
    config: &BetmeshConfig,
    http: TcpListener,
    gossip: TcpListener,
) -> ServerResult<NodeHandle> {
    config.validate()?;
    let node_id = NodeId::new(config.node.id);
    let http_addr = http.local_addr()?;
    let gossip_addr = gossip.local_addr()?;

    let store = if config.storage.in_memory {
        RecordStore::in_memory()
    } else {
        let options = StoreOptions {
            sync_writes: config.storage.sync_writes,
        };
        RecordStore::open(&config.node.data_dir, options)?
    };
    let store = SharedStore::new(store);

    let settings = GossipSettings {
        queue_depth: config.gossip.queue_depth,
        max_frame_bytes: config.gossip.max_frame_bytes,
        dial_attempts: config.gossip.dial_attempts,
        dial_backoff: config.gossip.dial_backoff(),
    };
    let channels = Arc::new(PeerChannels::new(settings.queue_depth));
    let broadcaster = Broadcaster::new(Arc::clone(&channels), settings.max_frame_bytes);
    let ledger = Ledger::new(node_id, store.clone(), Arc::new(broadcaster));

    let registry = Arc::new(PeerRegistry::new(
        config
            .peers
            .iter()
            .map(|p| PeerAddr::new(p.http.clone(), p.gossip.clone())),
    ));
    let timeout = config.oracle.timeout();
    let probe = HttpPeerProbe::new(timeout)?;
    let oracle = ExistenceOracle::new(Arc::clone(&registry), probe, timeout);
    let service = Arc::new(NodeService::new(ledger, oracle, Arc::clone(&channels)));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let transport = GossipTransport::new(channels, Reconciler::new(node_id, store), settings);
    let mut gossip_tasks = vec![transport.spawn_listener(gossip, shutdown_rx.clone())];
    gossip_tasks.extend(transport.spawn_dialers(&registry, shutdown_rx.clone()));

    let app = router(Arc::clone(&service));
    let mut stop = shutdown_rx;
    let server = tokio::spawn(async move {
        axum::serve(http, app)
            .with_graceful_shutdown(async move {
                while !*stop.borrow_and_update() {
                    if stop.changed().await.is_err() {
                        break;
                    }
                }
            })
            .await
    });

    info!(
        %node_id,
        http = %http_addr,
        gossip = %gossip_addr,
        peers = registry.len(),
        "node started"
    );

    Ok(NodeHandle {
        http_addr,
        gossip_addr,
        service,
        shutdown: shutdown_tx,
        server,
        gossip: gossip_tasks,
    })
}

async fn bind(listener: &'static str, addr: &str) -> ServerResult<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::BindFailed {
            listener,
            addr: addr.to_string(),
            source,
        })
}
