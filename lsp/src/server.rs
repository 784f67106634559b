//! Session handle — owns the `java -jar` child and the LSP conversation.
//!
//! A [`ServerHandle`] exists only for a fully initialized session: spawn
//! and handshake happen in [`ServerHandle::launch`], and any failure there
//! means no handle. Reader and writer run as separate tasks; the handle
//! talks to them over channels.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tokio::io::AsyncRead;
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, mpsc, oneshot};

use crate::codec::{MessageReader, MessageWriter};
use crate::protocol::{self, Notification, Request};
use crate::types::{LANGUAGE_ID, SessionEvent};

const REQUEST_TIMEOUT_SECS: u64 = 30;

const SHUTDOWN_TIMEOUT_SECS: u64 = 2;

const WRITER_CHANNEL_CAPACITY: usize = 64;

type PendingResponses = Arc<Mutex<HashMap<u64, oneshot::Sender<serde_json::Value>>>>;

enum WriterCommand {
    Send(serde_json::Value),
    Shutdown,
}

pub(crate) struct ServerHandle {
    child: Child,
    writer_tx: mpsc::Sender<WriterCommand>,
    next_id: u64,
    pending: PendingResponses,
    /// Per-document version counters; presence means didOpen was sent.
    doc_versions: HashMap<String, i32>,
    #[allow(dead_code)]
    reader_task: tokio::task::JoinHandle<()>,
    #[allow(dead_code)]
    writer_task: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    /// Spawn `<java> -jar <jar_path>` and complete the LSP handshake.
    ///
    /// On any failure the child is reaped via `kill_on_drop` and no handle
    /// is returned — there is no partially-running state.
    pub async fn launch(
        java: &str,
        jar_path: &Path,
        workspace_root: &Path,
        max_problems: Option<u32>,
        event_tx: mpsc::Sender<SessionEvent>,
    ) -> Result<Self> {
        let mut child = Command::new(java)
            .arg("-jar")
            .arg(jar_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawning {java} -jar {}", jar_path.display()))?;

        let stdout = child.stdout.take().context("no stdout from child")?;
        let stdin = child.stdin.take().context("no stdin from child")?;

        let pending: PendingResponses = Arc::new(Mutex::new(HashMap::new()));

        let (writer_tx, mut writer_rx) = mpsc::channel::<WriterCommand>(WRITER_CHANNEL_CAPACITY);
        let writer_task = tokio::spawn(async move {
            let mut writer = MessageWriter::new(stdin);
            while let Some(command) = writer_rx.recv().await {
                match command {
                    WriterCommand::Send(frame) => {
                        if let Err(e) = writer.write_message(&frame).await {
                            tracing::warn!("language server write error: {e}");
                            break;
                        }
                    }
                    WriterCommand::Shutdown => break,
                }
            }
        });

        let reader_task = tokio::spawn(Self::pump_messages(
            MessageReader::new(stdout),
            pending.clone(),
            writer_tx.clone(),
            event_tx,
        ));

        let mut handle = Self {
            child,
            writer_tx,
            next_id: 1,
            pending,
            doc_versions: HashMap::new(),
            reader_task,
            writer_task,
        };

        handle.initialize(workspace_root, max_problems).await?;

        Ok(handle)
    }

    /// Drive the read side of the session until the stream ends or breaks,
    /// then drop any in-flight waiters so their requests fail immediately
    /// instead of running out the request timeout.
    async fn pump_messages<R: AsyncRead + Unpin>(
        mut reader: MessageReader<R>,
        pending: PendingResponses,
        writer_tx: mpsc::Sender<WriterCommand>,
        event_tx: mpsc::Sender<SessionEvent>,
    ) {
        loop {
            match reader.read_message().await {
                Ok(Some(frame)) => {
                    Self::dispatch(&frame, &pending, &writer_tx).await;
                }
                Ok(None) => {
                    tracing::info!("language server closed its stdout");
                    let _ = event_tx.send(SessionEvent::Exited).await;
                    break;
                }
                Err(e) => {
                    tracing::warn!("language server transport error: {e}");
                    let _ = event_tx.send(SessionEvent::Failed(e.to_string())).await;
                    break;
                }
            }
        }
        pending.lock().await.clear();
    }

    /// Route one incoming frame: responses to their waiters, requests to a
    /// method-not-found reply (some servers block until answered), other
    /// notifications to the log.
    async fn dispatch(
        frame: &serde_json::Value,
        pending: &Mutex<HashMap<u64, oneshot::Sender<serde_json::Value>>>,
        writer_tx: &mpsc::Sender<WriterCommand>,
    ) {
        let id = frame.get("id");
        let method = frame.get("method").and_then(|m| m.as_str());

        match (id, method) {
            (Some(id), None) => {
                let Some(id) = id.as_u64() else {
                    tracing::trace!("ignoring response with non-numeric id");
                    return;
                };
                if let Some(waiter) = pending.lock().await.remove(&id) {
                    let _ = waiter.send(frame.clone());
                }
            }
            (Some(id), Some(method)) => {
                tracing::debug!(method, "server request answered with method-not-found");
                let reply = serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": { "code": -32601, "message": format!("Method not found: {method}") }
                });
                let _ = writer_tx.send(WriterCommand::Send(reply)).await;
            }
            (None, Some("textDocument/publishDiagnostics")) => {
                // Diagnostics rendering belongs to the editor; we only log.
                let count = frame["params"]["diagnostics"]
                    .as_array()
                    .map_or(0, Vec::len);
                tracing::debug!(
                    uri = frame["params"]["uri"].as_str().unwrap_or(""),
                    count,
                    "diagnostics published"
                );
            }
            (None, Some(method)) => {
                tracing::trace!(method, "ignoring server notification");
            }
            (None, None) => {
                tracing::trace!("ignoring malformed frame from server");
            }
        }
    }

    async fn initialize(&mut self, workspace_root: &Path, max_problems: Option<u32>) -> Result<()> {
        let root_uri =
            protocol::path_to_file_uri(workspace_root).context("workspace root as URI")?;

        let params = protocol::initialize_params(root_uri.as_str(), max_problems);
        let response = self.send_request("initialize", Some(params)).await?;
        if let Some(error) = response.get("error") {
            bail!(
                "initialize failed: {}",
                error["message"].as_str().unwrap_or("unknown error")
            );
        }

        self.send_notification("initialized", Some(serde_json::json!({})))
            .await
    }

    async fn send_request(
        &mut self,
        method: &'static str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let id = self.next_id;
        self.next_id += 1;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let frame = serde_json::to_value(Request::new(id, method, params))
            .context("encoding request")?;
        if self.writer_tx.send(WriterCommand::Send(frame)).await.is_err() {
            self.pending.lock().await.remove(&id);
            bail!("writer channel closed");
        }

        let timeout = std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS);
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => {
                self.pending.lock().await.remove(&id);
                bail!("server exited before responding to {method}");
            }
            Err(_) => {
                self.pending.lock().await.remove(&id);
                bail!("{method} request timed out");
            }
        }
    }

    async fn send_notification(
        &self,
        method: &'static str,
        params: Option<serde_json::Value>,
    ) -> Result<()> {
        let frame = serde_json::to_value(Notification::new(method, params))
            .context("encoding notification")?;
        self.writer_tx
            .send(WriterCommand::Send(frame))
            .await
            .map_err(|_| anyhow::anyhow!("writer channel closed"))
    }

    /// Sync a document's full text: didOpen on first sight, didChange after.
    pub async fn sync_document(&mut self, path: &Path, text: &str) -> Result<()> {
        let uri = protocol::path_to_file_uri(path)
            .context("document path as URI")?
            .to_string();

        if let Some(version) = self.doc_versions.get_mut(&uri) {
            *version += 1;
            let params = protocol::did_change_params(&uri, *version, text);
            self.send_notification("textDocument/didChange", Some(params))
                .await
        } else {
            self.doc_versions.insert(uri.clone(), 1);
            let params = protocol::did_open_params(&uri, LANGUAGE_ID, 1, text);
            self.send_notification("textDocument/didOpen", Some(params))
                .await
        }
    }

    /// Graceful shutdown: shutdown request, exit notification, then wait
    /// for the child with a deadline before killing it. Consumes self.
    pub async fn shutdown(mut self) {
        if let Ok(response) = self.send_request("shutdown", None).await
            && response.get("error").is_none()
        {
            let _ = self.send_notification("exit", None).await;
        }

        let _ = self.writer_tx.send(WriterCommand::Shutdown).await;

        let deadline = std::time::Duration::from_secs(SHUTDOWN_TIMEOUT_SECS);
        if tokio::time::timeout(deadline, self.child.wait()).await.is_err() {
            tracing::debug!("language server did not exit in time, killing");
            let _ = self.child.kill().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channels() -> (
        PendingResponses,
        mpsc::Sender<WriterCommand>,
        mpsc::Receiver<WriterCommand>,
    ) {
        let pending: PendingResponses = Arc::new(Mutex::new(HashMap::new()));
        let (writer_tx, writer_rx) = mpsc::channel(8);
        (pending, writer_tx, writer_rx)
    }

    #[tokio::test]
    async fn response_reaches_its_waiter() {
        let (pending, writer_tx, _writer_rx) = channels();
        let (tx, rx) = oneshot::channel();
        pending.lock().await.insert(1, tx);

        let frame = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": { "capabilities": {} }
        });
        ServerHandle::dispatch(&frame, &pending, &writer_tx).await;

        let response = rx.await.unwrap();
        assert!(response["result"]["capabilities"].is_object());
        assert!(pending.lock().await.is_empty());
    }

    #[tokio::test]
    async fn error_response_also_reaches_waiter() {
        let (pending, writer_tx, _writer_rx) = channels();
        let (tx, rx) = oneshot::channel();
        pending.lock().await.insert(4, tx);

        let frame = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 4,
            "error": { "code": -32600, "message": "invalid request" }
        });
        ServerHandle::dispatch(&frame, &pending, &writer_tx).await;

        assert!(rx.await.unwrap()["error"].is_object());
    }

    #[tokio::test]
    async fn server_request_gets_method_not_found() {
        let (pending, writer_tx, mut writer_rx) = channels();

        let frame = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 9,
            "method": "workspace/configuration",
            "params": {}
        });
        ServerHandle::dispatch(&frame, &pending, &writer_tx).await;

        match writer_rx.try_recv().unwrap() {
            WriterCommand::Send(reply) => {
                assert_eq!(reply["id"], 9);
                assert_eq!(reply["error"]["code"], -32601);
            }
            WriterCommand::Shutdown => panic!("expected Send"),
        }
    }

    #[tokio::test]
    async fn diagnostics_notification_is_consumed_silently() {
        let (pending, writer_tx, mut writer_rx) = channels();

        let frame = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "textDocument/publishDiagnostics",
            "params": {
                "uri": "file:///q.eol",
                "diagnostics": [{
                    "range": { "start": { "line": 0, "character": 0 },
                               "end": { "line": 0, "character": 3 } },
                    "severity": 1,
                    "message": "unknown variable"
                }]
            }
        });
        ServerHandle::dispatch(&frame, &pending, &writer_tx).await;

        assert!(writer_rx.try_recv().is_err());
        assert!(pending.lock().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_notification_is_ignored() {
        let (pending, writer_tx, mut writer_rx) = channels();

        let frame = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "window/logMessage",
            "params": { "type": 3, "message": "hello" }
        });
        ServerHandle::dispatch(&frame, &pending, &writer_tx).await;

        assert!(writer_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn response_for_unknown_id_is_dropped() {
        let (pending, writer_tx, _writer_rx) = channels();
        let frame = serde_json::json!({ "jsonrpc": "2.0", "id": 404, "result": {} });
        ServerHandle::dispatch(&frame, &pending, &writer_tx).await;
    }

    #[tokio::test]
    async fn stream_end_fails_in_flight_requests_immediately() {
        let (pending, writer_tx, _writer_rx) = channels();
        let (tx, rx) = oneshot::channel();
        pending.lock().await.insert(1, tx);
        let (event_tx, mut event_rx) = mpsc::channel(4);

        ServerHandle::pump_messages(
            MessageReader::new(&[][..]),
            pending.clone(),
            writer_tx,
            event_tx,
        )
        .await;

        assert!(matches!(event_rx.try_recv(), Ok(SessionEvent::Exited)));
        // The waiter's sender was dropped, so the request fails now rather
        // than waiting out the request timeout.
        assert!(rx.await.is_err());
        assert!(pending.lock().await.is_empty());
    }

    #[tokio::test]
    async fn transport_error_fails_in_flight_requests_immediately() {
        let (pending, writer_tx, _writer_rx) = channels();
        let (tx, rx) = oneshot::channel();
        pending.lock().await.insert(2, tx);
        let (event_tx, mut event_rx) = mpsc::channel(4);

        ServerHandle::pump_messages(
            MessageReader::new(&b"not a header\r\n"[..]),
            pending.clone(),
            writer_tx,
            event_tx,
        )
        .await;

        assert!(matches!(event_rx.try_recv(), Ok(SessionEvent::Failed(_))));
        assert!(rx.await.is_err());
    }
}
