//! # Stdio front-end
//!
//! Line-delimited JSON-RPC frames on stdin, handled by the process-lived
//! `stdio` session. Replies and queued server-initiated frames are written
//! to stdout by a single writer task so per-session ordering is preserved.
//! Idle pings are pointless on a pipe, but the writer still runs the
//! periodic callback cleanup.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::error::{ServerError, ServerResult};
use crate::server::McpServer;
use crate::session::{Payload, QUEUE_WAIT};

pub(crate) async fn run(server: Arc<McpServer>) -> ServerResult<()> {
    let session = server.create_session("stdio");
    tracing::info!(server = %server.identity().name, "serving MCP over stdio");

    let writer_session = session.clone();
    let writer = tokio::spawn(async move {
        let Some(mut rx) = writer_session.take_receiver() else {
            return Ok::<(), std::io::Error>(());
        };

        let mut stdout = tokio::io::stdout();
        loop {
            match tokio::time::timeout(QUEUE_WAIT, rx.recv()).await {
                Err(_) => {
                    // Duration::MAX disables the ping half of cleanup.
                    writer_session.cleanup(Duration::MAX);
                }
                Ok(None) => break,
                Ok(Some(outbound)) => {
                    match outbound.payload {
                        Payload::Bytes(bytes) => stdout.write_all(&bytes).await?,
                        Payload::Stream(encoder) => {
                            for chunk in encoder {
                                stdout.write_all(&chunk?).await?;
                            }
                        }
                    }
                    stdout.write_all(b"\n").await?;
                    stdout.flush().await?;
                }
            }
        }

        Ok(())
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let frame: Value = match serde_json::from_str(&line) {
            Ok(frame) => frame,
            Err(error) => {
                tracing::error!(%error, "invalid json RPC line");
                continue;
            }
        };

        if let Some(payload) = session.clone().handle_json_rpc(frame).await {
            session.send("message", payload);
        }
    }

    // Stdin closed: drop our sender so the writer drains and exits.
    server.remove_session("stdio");
    drop(session);
    writer
        .await
        .map_err(|error| ServerError::Internal(error.to_string()))??;

    Ok(())
}
