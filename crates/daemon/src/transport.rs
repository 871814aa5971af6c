// SPDX-License-Identifier: MIT

//! Transport (`spec.md` §4.B): accepts connections on a local stream
//! socket and, optionally, a TCP listener gated behind an auth-token
//! handshake. Each connection gets its own reader loop and a bounded
//! outbound channel so a slow client can't block dispatch for everyone
//! else, following the teacher daemon's `listener` module's split of
//! "accept loop spawns a task per connection" and "writer drains a
//! channel" — generalized here from request/response to the framed,
//! multiplexed protocol this kernel speaks.

use crate::context::KernelContext;
use crate::dispatch::dispatch;
use agentkernel_core::{AgentId, KernelError, Permissions};
use agentkernel_wire::{read_frame, write_frame, Frame, Opcode, ProtocolError};
use std::io;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, UnixListener};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Outbound replies per connection before the writer task applies
/// back-pressure to the dispatch loop.
const OUTBOUND_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionSource {
    /// Local Unix socket — trusted, no auth required.
    Unix,
    /// Remote TCP — must present `config.auth_token` on the first frame.
    Tcp,
}

pub struct Transport {
    unix: UnixListener,
    tcp: Option<TcpListener>,
    ctx: Arc<KernelContext>,
}

impl Transport {
    /// Binds the Unix socket (removing a stale one left behind by a prior
    /// crashed instance) and, if configured, the TCP listener.
    pub async fn bind(ctx: Arc<KernelContext>) -> io::Result<Self> {
        let socket_path = ctx.config.socket_path.clone();
        remove_stale_socket(&socket_path).await;
        if let Some(parent) = Path::new(&socket_path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let unix = UnixListener::bind(&socket_path)?;

        let tcp = match &ctx.config.tcp_addr {
            Some(addr) => Some(TcpListener::bind(addr).await?),
            None => None,
        };

        Ok(Self { unix, tcp, ctx })
    }

    pub async fn run(self) {
        match self.tcp {
            Some(tcp) => self.run_dual(tcp).await,
            None => self.run_unix_only().await,
        }
    }

    /// Accepts until `EXIT` notifies `ctx.shutdown`, then removes the
    /// listening socket so a subsequent connect attempt fails with an
    /// OS-level not-found rather than finding a dead socket file
    /// (`spec.md` §5, §6, §8 testable property 10).
    async fn run_unix_only(self) {
        loop {
            tokio::select! {
                result = self.unix.accept() => {
                    match result {
                        Ok((stream, _)) => self.spawn_connection(stream, ConnectionSource::Unix),
                        Err(e) => warn!(error = %e, "unix accept error"),
                    }
                }
                _ = self.ctx.shutdown.notified() => break,
            }
        }
        self.shutdown_cleanup().await;
    }

    async fn run_dual(self, tcp: TcpListener) {
        loop {
            tokio::select! {
                result = self.unix.accept() => {
                    match result {
                        Ok((stream, _)) => self.spawn_connection(stream, ConnectionSource::Unix),
                        Err(e) => warn!(error = %e, "unix accept error"),
                    }
                }
                result = tcp.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            debug!(%addr, "tcp connection accepted");
                            self.spawn_connection(stream, ConnectionSource::Tcp);
                        }
                        Err(e) => warn!(error = %e, "tcp accept error"),
                    }
                }
                _ = self.ctx.shutdown.notified() => break,
            }
        }
        self.shutdown_cleanup().await;
    }

    async fn shutdown_cleanup(&self) {
        let _ = tokio::fs::remove_file(&self.ctx.config.socket_path).await;
        info!(socket = %self.ctx.config.socket_path, "exit requested, listening socket removed");
    }

    fn spawn_connection<S>(&self, stream: S, source: ConnectionSource)
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let ctx = Arc::clone(&self.ctx);
        tokio::spawn(async move {
            handle_connection(stream, source, ctx).await;
        });
    }
}

/// Removes the socket file at `path` only after a connect probe confirms
/// no live listener owns it (`spec.md` §9 design note), so restarting
/// the kernel doesn't clobber a socket another instance is still serving.
async fn remove_stale_socket(path: &str) {
    if tokio::net::UnixStream::connect(path).await.is_ok() {
        warn!(path, "a live kernel instance already owns this socket");
        return;
    }
    let _ = tokio::fs::remove_file(path).await;
}

async fn handle_connection<S>(stream: S, source: ConnectionSource, ctx: Arc<KernelContext>)
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let (mut reader, writer) = tokio::io::split(stream);

    let agent_id = ctx.registry.allocate(ctx.clock.epoch_ms(), Permissions::preset(ctx.config.default_permission_level()));
    ctx.registry.set_state(agent_id, crate::registry::AgentState::Running);
    debug!(agent_id = agent_id.0, ?source, "connection accepted");

    let (outbound_tx, outbound_rx) = mpsc::channel::<Frame>(OUTBOUND_CHANNEL_CAPACITY);
    let writer_task = tokio::spawn(run_writer(writer, outbound_rx));

    let mut authenticated = source == ConnectionSource::Unix;

    loop {
        let frame = match read_frame(&mut reader).await {
            Ok(frame) => frame,
            Err(ProtocolError::Eof) => break,
            Err(e) => {
                warn!(agent_id = agent_id.0, error = %e, "protocol error, closing connection");
                break;
            }
        };

        if !authenticated {
            match authenticate(&ctx, &frame) {
                Ok(()) => authenticated = true,
                Err(err) => {
                    let reply = Frame::new(agent_id, frame.opcode, error_payload(&err));
                    let _ = outbound_tx.send(reply).await;
                    break;
                }
            }
        }

        let dispatched = dispatch(&ctx, agent_id, frame.opcode, frame.payload).await;
        let reply = Frame::new(agent_id, frame.opcode, dispatched.payload);
        if outbound_tx.send(reply).await.is_err() {
            break;
        }
        if dispatched.close {
            break;
        }
    }

    drop(outbound_tx);
    let _ = writer_task.await;
    ctx.remove_agent_state(agent_id);
    info!(agent_id = agent_id.0, "connection closed");
}

/// A TCP connection's first frame must be `HELLO` carrying a `token` field
/// matching `config.auth_token` (`spec.md` §9 design note on the dual
/// listener). The token field is not part of HELLO's documented request
/// shape (`{}`) since it is a transport-level concern, not a kernel one;
/// parsing it here only, ahead of normal dispatch.
fn authenticate(ctx: &Arc<KernelContext>, frame: &Frame) -> Result<(), KernelError> {
    let Some(expected) = &ctx.config.auth_token else {
        return Ok(());
    };
    if Opcode::try_from(frame.opcode) != Ok(Opcode::Hello) {
        return Err(KernelError::PermissionDenied("first frame on a TCP connection must be HELLO".into()));
    }
    #[derive(serde::Deserialize, Default)]
    struct HelloHandshake {
        #[serde(default)]
        token: Option<String>,
    }
    let handshake: HelloHandshake = if frame.payload.is_empty() {
        HelloHandshake::default()
    } else {
        serde_json::from_slice(&frame.payload).unwrap_or_default()
    };
    match handshake.token {
        Some(token) if &token == expected => Ok(()),
        _ => Err(KernelError::PermissionDenied("invalid or missing auth token".into())),
    }
}

fn error_payload(err: &KernelError) -> Vec<u8> {
    let reply = crate::protocol::ErrorReply::from(err);
    serde_json::to_vec(&reply).unwrap_or_else(|_| b"{}".to_vec())
}

async fn run_writer<W: AsyncWrite + Unpin>(mut writer: W, mut outbound_rx: mpsc::Receiver<Frame>) {
    while let Some(frame) = outbound_rx.recv().await {
        if write_frame(&mut writer, &frame).await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
