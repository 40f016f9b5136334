//! HTTP server implementation.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use super::service::handle_request;
use crate::error::Result;
use crate::ratelimit::RateLimiterRegistry;

/// HTTP server exposing rate limit decisions.
pub struct HttpServer {
    /// Bound listener
    listener: TcpListener,
    /// Shared limiter state
    registry: Arc<RateLimiterRegistry>,
}

impl HttpServer {
    /// Bind to `addr`. Port 0 picks an ephemeral port; see [`HttpServer::local_addr`].
    pub async fn bind(addr: SocketAddr, registry: Arc<RateLimiterRegistry>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, registry })
    }

    /// The address actually bound.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `signal` resolves.
    ///
    /// Connections already in flight are left to finish on their own tasks.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let addr = self.local_addr()?;
        info!(addr = %addr, "Starting HTTP server for rate limit decisions");

        tokio::pin!(signal);

        loop {
            tokio::select! {
                _ = &mut signal => {
                    info!("HTTP server received shutdown signal");
                    break;
                }
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            warn!(error = %e, "Accept error");
                            continue;
                        }
                    };

                    let registry = Arc::clone(&self.registry);
                    tokio::spawn(async move {
                        let svc = service_fn(move |req: Request<Incoming>| {
                            let registry = Arc::clone(&registry);
                            async move { Ok::<_, Infallible>(handle_request(&registry, &req)) }
                        });

                        if let Err(e) = http1::Builder::new()
                            .serve_connection(TokioIo::new(stream), svc)
                            .await
                        {
                            debug!(peer = %peer, error = %e, "Connection closed with error");
                        }
                    });
                }
            }
        }

        info!("HTTP server stopped");
        Ok(())
    }
}
