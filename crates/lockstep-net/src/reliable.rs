// SPDX-License-Identifier: Apache-2.0
//! The reliable channel's background tasks: one accept loop per listener,
//! and a reader/writer task pair per connection, each half split off the
//! stream and fed through its own `mpsc` channel.
//!
//! Frames on the wire are `u32 length (little-endian) + payload`, capped
//! at [`lockstep_proto::MAX_FRAME_LEN`]; a zero-length frame is a
//! heartbeat PING and carries no payload at all.

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Events a reliable-channel background task reports back to the owning
/// [`crate::Transport`]. Correlated by `conn_id`, not by peer id: peer id
/// assignment happens synchronously inside `Transport::poll`, so these
/// tasks never need to learn it.
pub(crate) enum InternalEvent {
    /// A new connection was accepted.
    Accepted {
        conn_id: u64,
        addr: SocketAddr,
        writer_tx: mpsc::Sender<Vec<u8>>,
    },
    /// A complete frame arrived from a connection.
    Data { conn_id: u64, bytes: Vec<u8> },
    /// The connection closed, cleanly or otherwise.
    Closed { conn_id: u64 },
}

pub(crate) fn frame(payload: &[u8]) -> Vec<u8> {
    let len = u32::try_from(payload.len()).unwrap_or(u32::MAX);
    let mut out = Vec::with_capacity(4 + payload.len());
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(payload);
    out
}

pub(crate) async fn accept_loop(listener: TcpListener, tx: mpsc::UnboundedSender<InternalEvent>) {
    let mut next_conn_id = 0u64;
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(err) => {
                tracing::warn!(?err, "accept failed");
                continue;
            }
        };
        let conn_id = next_conn_id;
        next_conn_id += 1;

        if let Err(err) = stream.set_nodelay(true) {
            tracing::warn!(?err, conn_id, "failed to set TCP_NODELAY");
        }
        let (reader, writer) = stream.into_split();
        let (writer_tx, writer_rx) = mpsc::channel::<Vec<u8>>(256);
        tokio::spawn(writer_loop(writer, writer_rx));

        if tx
            .send(InternalEvent::Accepted { conn_id, addr, writer_tx })
            .is_err()
        {
            return;
        }
        tokio::spawn(reader_loop(reader, conn_id, tx.clone()));
    }
}

async fn writer_loop(mut writer: OwnedWriteHalf, mut rx: mpsc::Receiver<Vec<u8>>) {
    while let Some(buf) = rx.recv().await {
        if writer.write_all(&buf).await.is_err() {
            break;
        }
    }
}

async fn reader_loop(mut reader: OwnedReadHalf, conn_id: u64, tx: mpsc::UnboundedSender<InternalEvent>) {
    let mut read_buf = vec![0u8; 16 * 1024];
    let mut acc: Vec<u8> = Vec::with_capacity(8 * 1024);

    'outer: loop {
        let n = match reader.read(&mut read_buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        acc.extend_from_slice(&read_buf[..n]);

        loop {
            if acc.len() < 4 {
                break;
            }
            let len = u32::from_le_bytes([acc[0], acc[1], acc[2], acc[3]]) as usize;
            if len > lockstep_proto::MAX_FRAME_LEN {
                tracing::warn!(conn_id, len, "oversized frame, closing connection");
                let _ = tx.send(InternalEvent::Closed { conn_id });
                break 'outer;
            }
            if acc.len() < 4 + len {
                break;
            }
            let bytes: Vec<u8> = acc.drain(..4 + len).skip(4).collect();
            if tx.send(InternalEvent::Data { conn_id, bytes }).is_err() {
                return;
            }
        }
    }

    let _ = tx.send(InternalEvent::Closed { conn_id });
}
