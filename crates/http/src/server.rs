use std::fmt;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::config::ServerConfig;
use crate::connection::{ConnectionContext, HttpConnection};
use crate::handler::Handler;
use crate::protocol::ConnectionError;
use crate::reaper::reap_idle;
use crate::registry::{ConnectionHandle, ConnectionRegistry};
use crate::stats::{ServerStats, StatsSnapshot};

#[derive(Default)]
pub struct ServerBuilder {
    address: Option<Result<Vec<SocketAddr>, io::Error>>,
    config: ServerConfig,
    handler: Option<Arc<dyn Handler>>,
}

impl ServerBuilder {
    fn new() -> Self {
        Self::default()
    }

    pub fn address<A: ToSocketAddrs>(mut self, address: A) -> Self {
        self.address = Some(address.to_socket_addrs().map(|addrs| addrs.collect()));
        self
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn handler(mut self, handler: impl Handler) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    pub fn build(self) -> Result<Server, ServerBuildError> {
        let address = self.address.ok_or(ServerBuildError::MissingAddress)?.map_err(ServerBuildError::from)?;
        let handler = self.handler.ok_or(ServerBuildError::MissingHandler)?;
        Ok(Server {
            address,
            shared: Shared {
                config: Arc::new(self.config),
                handler,
                registry: Arc::new(ConnectionRegistry::new()),
                stats: Arc::new(ServerStats::default()),
            },
        })
    }
}

impl fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerBuilder")
            .field("address", &self.address)
            .field("config", &self.config)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error("address must be set")]
    MissingAddress,
    #[error("handler must be set")]
    MissingHandler,
    #[error("address can't be resolved: {source}")]
    InvalidAddress {
        #[from]
        source: io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("can't bind {address:?}: {source}")]
    Bind { address: Vec<SocketAddr>, source: io::Error },
}

/// Everything a connection task needs from its server.
#[derive(Clone)]
struct Shared {
    config: Arc<ServerConfig>,
    handler: Arc<dyn Handler>,
    registry: Arc<ConnectionRegistry>,
    stats: Arc<ServerStats>,
}

/// An HTTP/1.1 server: accept loop, per-connection tasks and the idle reaper.
///
/// ```no_run
/// use brook_http::Server;
/// use brook_http::handler::make_handler;
/// use brook_http::protocol::ResponseHead;
/// use brook_http::protocol::body::BodyProcessing;
/// use http::StatusCode;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let server = Server::builder()
///     .address("127.0.0.1:8080")
///     .handler(make_handler(|_req, res| {
///         res.write_response(ResponseHead::empty(StatusCode::NO_CONTENT));
///         res.done();
///         BodyProcessing::DiscardBody
///     }))
///     .build()?;
///
/// let running = server.start().await?;
/// tokio::signal::ctrl_c().await?;
/// running.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct Server {
    address: Vec<SocketAddr>,
    shared: Shared,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Binds the listener and starts accepting connections in the background.
    pub async fn start(self) -> Result<RunningServer, ServerError> {
        let listener = TcpListener::bind(self.address.as_slice())
            .await
            .map_err(|source| ServerError::Bind { address: self.address.clone(), source })?;
        let local_addr =
            listener.local_addr().map_err(|source| ServerError::Bind { address: self.address.clone(), source })?;
        info!(address = %local_addr, "start listening");

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(accept_loop(listener, self.shared.clone(), shutdown.clone()));
        Ok(RunningServer { local_addr, shared: self.shared, shutdown, task })
    }

    /// Serves until the process is interrupted.
    pub async fn run(self) -> Result<(), ServerError> {
        let running = self.start().await?;
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(cause = %e, "can't listen for ctrl-c, shutting down");
        }
        running.shutdown().await;
        Ok(())
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server").field("address", &self.address).field("config", &self.shared.config).finish()
    }
}

/// A server that is accepting connections.
pub struct RunningServer {
    local_addr: SocketAddr,
    shared: Shared,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl RunningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Number of connections currently open.
    pub fn connections(&self) -> usize {
        self.shared.registry.len()
    }

    /// Stops accepting, closes every connection and waits for the accept
    /// loop and the reaper to finish.
    pub async fn shutdown(self) {
        info!(address = %self.local_addr, "shutting down");
        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            error!(cause = %e, "accept loop failed");
        }
    }
}

impl fmt::Debug for RunningServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunningServer").field("local_addr", &self.local_addr).finish_non_exhaustive()
    }
}

async fn accept_loop(listener: TcpListener, shared: Shared, shutdown: CancellationToken) {
    let reaper_stop = CancellationToken::new();
    let reaper = tokio::spawn(reap_idle(
        Arc::clone(&shared.registry),
        Arc::clone(&shared.stats),
        shared.config.get_keep_alive_timeout(),
        reaper_stop.clone(),
    ));

    loop {
        let accepted = tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            accepted = listener.accept() => accepted,
        };
        match accepted {
            Ok((stream, peer)) => spawn_connection(stream, peer, &shared),
            Err(e) => warn!(cause = %e, "failed to accept"),
        }
    }

    drop(listener);
    // the reaper closes whatever is still open once it is told to stop
    reaper_stop.cancel();
    if let Err(e) = reaper.await {
        error!(cause = %e, "reaper task failed");
    }
}

fn spawn_connection(stream: TcpStream, peer: SocketAddr, shared: &Shared) {
    let Shared { config, handler, registry, stats } = shared.clone();

    let id = registry.next_id();
    let context = ConnectionContext::new(config, Arc::clone(&stats));
    registry.insert(id, ConnectionHandle { token: context.token.clone(), lifecycle: Arc::clone(&context.lifecycle) });
    stats.connection_accepted();

    let span = info_span!("connection", conn = %id, peer = %peer);
    tokio::spawn(
        async move {
            info!("connection accepted");
            if let Err(e) = stream.set_nodelay(true) {
                debug!(cause = %e, "can't set TCP_NODELAY");
            }

            let (reader, writer) = stream.into_split();
            let connection = HttpConnection::new(reader, writer, context.clone());
            match connection.process(handler).await {
                Ok(()) => info!("finished process, connection shutdown"),
                Err(
                    e @ (ConnectionError::UnexpectedEof
                    | ConnectionError::SocketReset
                    | ConnectionError::Aborted
                    | ConnectionError::BodyProcessingAborted
                    | ConnectionError::Parse { .. }),
                ) => info!(cause = %e, "connection shutdown"),
                Err(e) => error!(cause = %e, "connection failed, shutdown"),
            }

            context.lifecycle.close();
            context.token.cancel();
            registry.remove(id);
            stats.connection_closed();
        }
        .instrument(span),
    );
}
