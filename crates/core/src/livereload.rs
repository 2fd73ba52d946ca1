//! Browser live reload
//!
//! Speaks the LiveReload protocol (version 7) that the browser extensions and
//! the `livereload.js` client understand: the client opens a WebSocket, sends
//! `hello`, and the server pushes a `reload` command for every changed asset.

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::path::Path;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, watch};
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, info, warn};

use crate::error::{Error, IoResultExt, Result};

const PROTOCOL: &str = "http://livereload.com/protocols/official-7";

/// Receives "this output changed" notifications from the watch session.
pub trait LiveReload: Send + Sync {
    fn notify_change(&self, path: &Path);
    fn close(&self);
}

/// Used when live reload is turned off
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLiveReload;

impl LiveReload for NoopLiveReload {
    fn notify_change(&self, _path: &Path) {}
    fn close(&self) {}
}

pub struct LiveReloadServer {
    addr: SocketAddr,
    updates: broadcast::Sender<String>,
    shutdown: watch::Sender<bool>,
}

impl LiveReloadServer {
    /// Bind on localhost and start accepting clients. Port 0 picks a free port.
    pub async fn bind(port: u16) -> Result<Self> {
        let requested = SocketAddr::from(([127, 0, 0, 1], port));
        let listener = TcpListener::bind(requested)
            .await
            .map_err(|e| Error::Other(format!("live reload server could not bind {requested}: {e}")))?;
        let addr = listener.local_addr().at(requested.to_string())?;

        let (updates, _) = broadcast::channel(16);
        let (shutdown, shutdown_rx) = watch::channel(false);
        tokio::spawn(accept_loop(listener, updates.clone(), shutdown_rx));

        info!("Live reload listening on ws://{}", addr);
        Ok(Self {
            addr,
            updates,
            shutdown,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Connected clients
    pub fn client_count(&self) -> usize {
        self.updates.receiver_count()
    }
}

impl LiveReload for LiveReloadServer {
    fn notify_change(&self, path: &Path) {
        let message = reload_message(path);
        match self.updates.send(message) {
            Ok(clients) => debug!("Reload {:?} sent to {} client(s)", path, clients),
            Err(_) => debug!("No live reload clients for {:?}", path),
        }
    }

    fn close(&self) {
        self.shutdown.send_replace(true);
    }
}

impl Drop for LiveReloadServer {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

fn reload_message(path: &Path) -> String {
    let live_css = path.extension().is_some_and(|ext| ext == "css");
    json!({
        "command": "reload",
        "path": path.to_string_lossy(),
        "liveCSS": live_css,
    })
    .to_string()
}

fn is_hello(text: &str) -> bool {
    serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|v| v.get("command").and_then(Value::as_str).map(|c| c == "hello"))
        .unwrap_or(false)
}

async fn accept_loop(
    listener: TcpListener,
    updates: broadcast::Sender<String>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!("Live reload client connected from {}", peer);
                    let receiver = updates.subscribe();
                    let shutdown = shutdown.clone();
                    tokio::spawn(async move {
                        if let Err(e) = serve_client(stream, receiver, shutdown).await {
                            debug!("Live reload client {} dropped: {}", peer, e);
                        }
                    });
                }
                Err(e) => warn!("Live reload accept failed: {}", e),
            },
            _ = shutdown.changed() => break,
        }
    }
    debug!("Live reload server stopped");
}

async fn serve_client(
    stream: TcpStream,
    mut updates: broadcast::Receiver<String>,
    mut shutdown: watch::Receiver<bool>,
) -> std::result::Result<(), tungstenite::Error> {
    let socket = tokio_tungstenite::accept_async(stream).await?;
    let (mut sink, mut source) = socket.split();

    loop {
        tokio::select! {
            incoming = source.next() => match incoming {
                Some(Ok(message)) if message.is_text() => {
                    if is_hello(message.to_text().unwrap_or_default()) {
                        let reply = json!({
                            "command": "hello",
                            "protocols": [PROTOCOL],
                            "serverName": "wpbuild",
                        });
                        sink.send(Message::text(reply.to_string())).await?;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e),
            },
            update = updates.recv() => match update {
                Ok(payload) => sink.send(Message::text(payload)).await?,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = shutdown.changed() => break,
        }
    }

    let _ = sink.close().await;
    Ok(())
}
