use crate::operations::{may_block, process_request, Listener};
use anyhow::{anyhow, Result};
use dfs_core::NamingCoordinator;
use dfs_proto::{decode_line, encode_line, ErrorKind, Request, Response};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_stream::{wrappers::TcpListenerStream, StreamExt};
use tracing::{debug, error, info, warn};

pub struct NamingServer {
    naming: Arc<NamingCoordinator>,
    service: Option<TcpListener>,
    registration: Option<TcpListener>,
    service_addr: SocketAddr,
    registration_addr: SocketAddr,
}

impl NamingServer {
    /// Binds both listeners. Port 0 picks an ephemeral port; see
    /// [`NamingServer::service_addr`] for the result.
    pub async fn bind(
        naming: Arc<NamingCoordinator>,
        service: SocketAddr,
        registration: SocketAddr,
    ) -> Result<Self> {
        let service = TcpListener::bind(service).await?;
        let registration = TcpListener::bind(registration).await?;
        let service_addr = service.local_addr()?;
        let registration_addr = registration.local_addr()?;

        info!(%service_addr, %registration_addr, "Naming server listening");

        Ok(Self {
            naming,
            service: Some(service),
            registration: Some(registration),
            service_addr,
            registration_addr,
        })
    }

    pub fn service_addr(&self) -> SocketAddr {
        self.service_addr
    }

    pub fn registration_addr(&self) -> SocketAddr {
        self.registration_addr
    }

    pub async fn run(&mut self) -> Result<()> {
        let service = self.service.take().ok_or_else(|| anyhow!("Server not initialized"))?;
        let registration = self
            .registration
            .take()
            .ok_or_else(|| anyhow!("Server not initialized"))?;

        let service = TcpListenerStream::new(service).map(|conn| (Listener::Service, conn));
        let registration =
            TcpListenerStream::new(registration).map(|conn| (Listener::Registration, conn));
        let mut incoming = service.merge(registration);

        info!("Naming server started. Press Ctrl+C to stop.");

        while let Some((listener, conn)) = incoming.next().await {
            match conn {
                Ok(socket) => {
                    let naming = Arc::clone(&self.naming);
                    tokio::spawn(async move {
                        if let Err(e) = handle_client(naming, socket, listener).await {
                            error!("Error handling {} client: {}", listener, e);
                        }
                    });
                }
                Err(e) => {
                    warn!("Error accepting {} connection: {}", listener, e);
                }
            }
        }

        Ok(())
    }

    pub async fn shutdown(self) -> Result<()> {
        info!(
            storage_nodes = self.naming.storage_nodes().len(),
            "Shutting down naming server..."
        );
        Ok(())
    }
}

/// Serves request lines until the peer closes the connection.
async fn handle_client(
    naming: Arc<NamingCoordinator>,
    socket: TcpStream,
    listener: Listener,
) -> Result<()> {
    let peer = socket.peer_addr()?;
    debug!(%peer, %listener, "Handling new client connection");

    let (reader, mut writer) = socket.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match decode_line::<Request>(&line) {
            Ok(request) => {
                debug!(%peer, op = request.op_name(), path = request.path(), "request");
                if may_block(&request) {
                    run_on_thread(Arc::clone(&naming), request, listener).await?
                } else {
                    process_request(&naming, request, listener)
                }
            }
            Err(e) => Response::error(ErrorKind::InvalidRequest, format!("malformed request: {}", e)),
        };

        writer.write_all(encode_line(&response)?.as_bytes()).await?;
        writer.flush().await?;
    }

    debug!(%peer, "Client disconnected");
    Ok(())
}

/// Lock waits are unbounded, so a waiting request holds a thread of its own
/// rather than a slot in the runtime's capped blocking pool.
async fn run_on_thread(
    naming: Arc<NamingCoordinator>,
    request: Request,
    listener: Listener,
) -> Result<Response> {
    let (tx, rx) = oneshot::channel();
    std::thread::Builder::new()
        .name(format!("naming-{}", request.op_name()))
        .spawn(move || {
            // The receiver is gone only if the connection task was dropped.
            let _ = tx.send(process_request(&naming, request, listener));
        })?;
    rx.await
        .map_err(|_| anyhow!("request thread exited without a response"))
}
