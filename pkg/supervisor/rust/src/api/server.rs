// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::api::handlers::ControlApi;
use anyhow::{Context, Result};
use hyper::Request;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use log::{debug, info, warn};
use std::convert::Infallible;
use std::fmt;
use std::fs::Permissions;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, UnixListener};

/// How long in-flight requests get to finish once the server stops accepting.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

pub enum ApiListener {
    Tcp(TcpListener),
    Unix { listener: UnixListener, path: PathBuf },
}

impl ApiListener {
    pub async fn bind_tcp(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("could not bind {addr}"))?;
        Ok(ApiListener::Tcp(listener))
    }

    /// Bind a Unix socket, replacing a stale socket file and restricting it
    /// to owner and group.
    pub fn bind_unix(path: &Path) -> Result<Self> {
        std::fs::remove_file(path)
            .or_else(|error| {
                if error.kind() == ErrorKind::NotFound {
                    Ok(())
                } else {
                    Err(error)
                }
            })
            .context("failed to remove existing socket")?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            info!("Creating socket directory: {}", parent.display());
            std::fs::create_dir_all(parent).context("could not create socket directory")?;
        }

        let listener = UnixListener::bind(path)
            .with_context(|| format!("could not create {}", path.display()))?;
        std::fs::set_permissions(path, Permissions::from_mode(0o660))
            .context("could not set socket permissions")?;

        Ok(ApiListener::Unix {
            listener,
            path: path.to_path_buf(),
        })
    }

    /// Bound TCP address; `None` for a Unix socket.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match self {
            ApiListener::Tcp(listener) => listener.local_addr().ok(),
            ApiListener::Unix { .. } => None,
        }
    }

    async fn accept(&self, api: &Arc<ControlApi>, graceful: &GracefulShutdown) -> Result<()> {
        match self {
            ApiListener::Tcp(listener) => {
                let (stream, peer) = listener.accept().await?;
                debug!("accepted connection from {peer}");
                serve_connection(stream, api.clone(), graceful);
            }
            ApiListener::Unix { listener, .. } => {
                let (stream, _) = listener.accept().await?;
                serve_connection(stream, api.clone(), graceful);
            }
        }
        Ok(())
    }
}

impl fmt::Display for ApiListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiListener::Tcp(listener) => match listener.local_addr() {
                Ok(addr) => write!(f, "tcp://{addr}"),
                Err(_) => write!(f, "tcp://<unbound>"),
            },
            ApiListener::Unix { path, .. } => write!(f, "unix://{}", path.display()),
        }
    }
}

impl Drop for ApiListener {
    fn drop(&mut self) {
        if let ApiListener::Unix { path, .. } = self {
            match std::fs::remove_file(&*path) {
                Ok(()) => info!("Removed socket at {}", path.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove socket {}: {e}", path.display()),
            }
        }
    }
}

fn serve_connection<S>(stream: S, api: Arc<ControlApi>, graceful: &GracefulShutdown)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    // Use an adapter to access something implementing `tokio::io` traits as if they
    // implement `hyper::rt` IO traits.
    let io = TokioIo::new(stream);
    let service = service_fn(move |req: Request<Incoming>| {
        let api = api.clone();
        async move { Ok::<_, Infallible>(api.handle(req).await) }
    });
    let conn = graceful.watch(http1::Builder::new().serve_connection(io, service));
    tokio::spawn(async move {
        if let Err(err) = conn.await {
            debug!("Error serving connection: {err}");
        }
    });
}

/// Accept and serve connections until `shutdown` resolves, then let in-flight
/// requests finish for up to [`DRAIN_TIMEOUT`].
pub async fn serve(
    listener: ApiListener,
    api: Arc<ControlApi>,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    info!("REST API server listening on {listener}");
    let graceful = GracefulShutdown::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept(&api, &graceful) => {
                if let Err(e) = accepted {
                    warn!("Failed to accept connection: {e:#}");
                }
            }
            () = &mut shutdown => {
                info!("REST API server shutting down");
                break;
            }
        }
    }

    drop(listener);
    tokio::select! {
        () = graceful.shutdown() => debug!("all connections closed"),
        () = tokio::time::sleep(DRAIN_TIMEOUT) => {
            warn!("connections still open after {}s, giving up", DRAIN_TIMEOUT.as_secs());
        }
    }
    Ok(())
}
