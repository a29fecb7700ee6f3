use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{serve::Listener, Router};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Duration;
use tokio_rustls::{server::TlsStream, TlsAcceptor};
use tracing::{error, info, warn};

use crate::config::ApiConfig;
use crate::errors::Error;
use crate::service::CredentialService;

use super::routes::build_router;
use super::tls::configure_tls_acceptor;

/// Serve the API until ctrl-c, then drain in-flight requests.
pub async fn start_api_server(
    config: &ApiConfig,
    service: Arc<CredentialService>,
) -> crate::Result<()> {
    let addr = config.socket_addr()?;
    let router = build_router(service);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::transport(format!("Failed to bind API server: {}", e)))?;

    let drain_timeout = config.drain_timeout();
    match (&config.tls.cert, &config.tls.key) {
        (Some(cert), Some(key)) => {
            let (acceptor, certificate_info) = configure_tls_acceptor(cert, key)?;
            info!(
                address = %addr,
                subject = %certificate_info.subject,
                expires_at = %certificate_info.not_after,
                "Starting HTTPS API server"
            );
            let tls_listener = TlsListener::new(listener, acceptor);
            serve_with_drain(tls_listener, router, drain_timeout).await?;
        }
        _ => {
            warn!(address = %addr, "TLS is not configured, starting plain HTTP API server");
            serve_with_drain(listener, router, drain_timeout).await?;
        }
    }

    info!("API server shutdown completed");
    Ok(())
}

async fn serve_with_drain<L>(listener: L, router: Router, drain_timeout: Duration) -> crate::Result<()>
where
    L: Listener,
    L::Addr: std::fmt::Debug,
{
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    run_until_drained(server.into_future(), shutdown_rx, drain_timeout).await
}

/// Drive the server, giving it `drain_timeout` to finish once shutdown starts.
async fn run_until_drained<F>(
    server: F,
    mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
    drain_timeout: Duration,
) -> crate::Result<()>
where
    F: Future<Output = std::io::Result<()>>,
{
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            return result.map_err(|e| Error::transport(format!("API server error: {}", e)));
        }
        _ = shutdown_rx.wait_for(|stopping| *stopping) => {
            info!(timeout_seconds = drain_timeout.as_secs(), "Draining in-flight requests");
        }
    }

    match tokio::time::timeout(drain_timeout, &mut server).await {
        Ok(result) => result.map_err(|e| Error::transport(format!("API server error: {}", e))),
        Err(_) => {
            warn!("Drain timeout elapsed, dropping remaining connections");
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "API server shutdown listener failed");
    }
}

struct TlsListener {
    listener: TcpListener,
    acceptor: TlsAcceptor,
}

impl TlsListener {
    fn new(listener: TcpListener, acceptor: TlsAcceptor) -> Self {
        Self { listener, acceptor }
    }
}

impl Listener for TlsListener {
    type Io = TlsStream<TcpStream>;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => match self.acceptor.accept(stream).await {
                    Ok(tls_stream) => return (tls_stream, addr),
                    Err(err) => {
                        warn!(error = %err, %addr, "TLS handshake failed");
                        continue;
                    }
                },
                Err(err) => {
                    if is_connection_error(&err) {
                        continue;
                    }
                    error!("HTTPS accept error: {err}");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    fn local_addr(&self) -> std::io::Result<Self::Addr> {
        self.listener.local_addr()
    }
}

fn is_connection_error(error: &std::io::Error) -> bool {
    matches!(
        error.kind(),
        std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::ConnectionReset
    )
}
