//! WebSocket transport
//!
//! Accepts TCP connections and gives each one its own task. Responsibilities:
//! - Read the HTTP request head and either upgrade or serve the status page
//! - Create a `Connection` for each upgraded client and register it with
//!   the `Relay` before the handshake response is written
//! - Forward every inbound data frame to the relay
//! - Drain the connection's outbound queue into the socket from a second task,
//!   pinging the client at half the idle timeout
//! - Drop clients that stay silent past the idle timeout, so a peer that
//!   vanished without FIN or RST still leaves the group
//! - Remove the connection from the relay exactly once, whichever side
//!   (read loop or send loop) finishes first, and stop the other side

use futures_util::{SinkExt, Stream, StreamExt};
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::spawn;
use tokio::sync::{Notify, mpsc};
use tokio::time::{Duration, Instant, Interval, interval_at, timeout};
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, warn};
use tungstenite::protocol::Message as WsMessage;
use tungstenite::protocol::Role;
use tungstenite::protocol::frame::CloseFrame;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::{ServerSettings, Settings};
use crate::connection::Connection;
use crate::relay::Relay;
use crate::transport::handshake::{
    MAX_HEAD_BYTES, read_request_head, write_status_response, write_switching_protocols,
};
use crate::utils::{RelayError, Result};

/// Binds `addr` and serves until the listener fails.
pub async fn start_websocket_server(
    addr: String,
    relay: Arc<Mutex<Relay>>,
    settings: Settings,
) -> Result<()> {
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| RelayError::Bind {
            addr: addr.clone(),
            source,
        })?;
    serve(listener, relay, settings).await
}

/// Accept loop over an already-bound listener.
pub async fn serve(
    listener: TcpListener,
    relay: Arc<Mutex<Relay>>,
    settings: Settings,
) -> Result<()> {
    let local = listener.local_addr()?;
    info!("Stable server running at ws://localhost:{}", local.port());

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("Failed to accept connection: {e}");
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }
        };
        let relay = relay.clone();
        let server = settings.server.clone();

        spawn(async move {
            if let Err(e) = handle_connection(stream, peer, relay, server).await {
                debug!(%peer, "Connection ended with error: {e}");
            }
        });
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    relay: Arc<Mutex<Relay>>,
    server: ServerSettings,
) -> Result<()> {
    let mut reader = BufReader::new(stream);

    let read_head = read_request_head(&mut reader, MAX_HEAD_BYTES);
    let head = match timeout(server.handshake_timeout(), read_head).await {
        Ok(Ok(head)) => head,
        Ok(Err(e)) if e.is_bad_request() => {
            debug!(%peer, "Bad request, serving status page: {e}");
            return write_status_response(&mut reader, false).await;
        }
        Ok(Err(e)) => return Err(e),
        Err(_) => return Err(RelayError::HandshakeTimeout),
    };

    let Some(key) = head.websocket_key().map(str::to_owned) else {
        if head.wants_upgrade() {
            debug!(%peer, path = %head.path, "WebSocket upgrade rejected, serving status page");
        }
        return write_status_response(&mut reader, head.method == "HEAD").await;
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
    let conn = Connection::new(tx);
    let client_id = conn.id.clone();
    {
        let mut relay = lock(&relay);
        relay.connect(conn);
    }

    let cleanup_called = Arc::new(AtomicBool::new(false));
    let closed = Arc::new(Notify::new());

    let do_cleanup = {
        let relay = relay.clone();
        let client_id = client_id.clone();
        let cleanup_called = cleanup_called.clone();
        let closed = closed.clone();

        move |close: Option<&CloseFrame>| {
            if !cleanup_called.swap(true, Ordering::SeqCst) {
                lock(&relay).disconnect(&client_id, close);
                closed.notify_one();
            }
        }
    };

    if let Err(e) = write_switching_protocols(&mut reader, &key).await {
        do_cleanup(None);
        return Err(e);
    }

    let ws_stream = WebSocketStream::from_raw_socket(reader, Role::Server, None).await;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let idle = server.idle_timeout();

    {
        let client_id = client_id.clone();
        let do_cleanup = do_cleanup.clone();
        let mut heartbeat = idle.map(|idle| interval_at(Instant::now() + idle / 2, idle / 2));

        spawn(async move {
            loop {
                let msg = tokio::select! {
                    msg = rx.recv() => match msg {
                        Some(msg) => msg,
                        None => break,
                    },
                    _ = tick(&mut heartbeat) => WsMessage::Ping(Default::default()),
                };
                let closing = msg.is_close();
                if let Err(e) = ws_sender.send(msg).await {
                    debug!(%client_id, "Failed to send message: {e}");
                    break;
                }
                if closing {
                    break;
                }
            }

            let _ = ws_sender.close().await;
            do_cleanup(None);
            debug!(%client_id, "Send loop closed");
        });
    }

    let mut close_frame = None;
    loop {
        let frame = tokio::select! {
            _ = closed.notified() => {
                debug!(%client_id, "Send loop gone, stopping read loop");
                break;
            }
            frame = next_frame(&mut ws_receiver, idle) => frame,
        };

        match frame {
            Some(Ok(WsMessage::Close(frame))) => {
                close_frame = frame;
                break;
            }
            Some(Ok(msg)) if Relay::is_relayable(&msg) => {
                lock(&relay).relay(&client_id, msg);
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                debug!(%client_id, "Read error: {e}");
                break;
            }
            None => break,
        }
    }

    do_cleanup(close_frame.as_ref());
    Ok(())
}

/// Next inbound frame, or `RelayError::IdleTimeout` when the client has
/// been silent for `idle`. Pongs count as traffic.
async fn next_frame<S>(receiver: &mut S, idle: Option<Duration>) -> Option<Result<WsMessage>>
where
    S: Stream<Item = std::result::Result<WsMessage, tungstenite::Error>> + Unpin,
{
    let next = match idle {
        Some(idle) => match timeout(idle, receiver.next()).await {
            Ok(next) => next,
            Err(_) => return Some(Err(RelayError::IdleTimeout(idle))),
        },
        None => receiver.next().await,
    };
    next.map(|frame| frame.map_err(RelayError::from))
}

/// Waits for the next heartbeat; never fires when pings are disabled.
async fn tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Locks the relay, recovering the guard if a previous holder panicked.
fn lock(relay: &Mutex<Relay>) -> std::sync::MutexGuard<'_, Relay> {
    relay.lock().unwrap_or_else(|poisoned| {
        error!("Relay lock was poisoned, recovering");
        poisoned.into_inner()
    })
}
