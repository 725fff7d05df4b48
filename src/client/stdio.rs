//! Process-backed language client.
//!
//! Spawns the server from its [`LaunchSpec`] and relays framed LSP
//! messages between the host streams (the editor) and the server's
//! stdio. The relay does not interpret requests; it only watches for the
//! handful of messages that matter to the lifecycle:
//!
//! - `initialize` responses, to log the server's identity
//! - the host's `exit` notification, so stop does not repeat it
//! - responses to the client's own `shutdown` request, which are not
//!   forwarded to the host

use std::io::{self, Read};
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use lsp_types::InitializeResult;
use lsp_types::notification::{Exit, Notification};
use lsp_types::request::{Initialize, Request, Shutdown};
use serde_json::{Value as JsonValue, json};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader, ReadBuf};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use super::transport::{self, MessageInfo};
use super::watcher::{FileWatcher, changes_notification};
use super::{ClientError, ClientFactory, ClientFuture, ClientOptions, LanguageClient};
use crate::server::LaunchSpec;

/// Id of the client's own shutdown request.
const SHUTDOWN_REQUEST_ID: &str = "drools-lsp-client/shutdown";

/// Time the server gets to answer the shutdown request.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(3);

/// Time the server gets to exit after its stdin is closed.
const EXIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum queued messages for the server.
const WRITE_QUEUE_SIZE: usize = 64;

/// Maximum queued chunks read from a blocking source.
const READ_QUEUE_SIZE: usize = 16;

/// Size of a single blocking read.
const READ_CHUNK_SIZE: usize = 8192;

/// Reader half of the host connection.
pub type HostReader = Box<dyn AsyncRead + Send + Unpin>;

/// Writer half of the host connection.
pub type HostWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// The editor side of the relay.
pub struct HostIo {
    reader: HostReader,
    writer: HostWriter,
}

impl HostIo {
    /// Creates host streams from any reader/writer pair.
    #[must_use]
    pub fn new(
        reader: impl AsyncRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
        }
    }

    /// Uses the current process's stdin and stdout.
    ///
    /// Stdin is read through a [`BlockingReader`] so an idle editor does
    /// not keep the process alive after the server is gone.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(
            BlockingReader::spawn("drools-lsp-stdin", io::stdin()),
            tokio::io::stdout(),
        )
    }
}

/// Async reader over a blocking source read on a detached thread.
///
/// Dropping the reader never waits for the thread. A read that does not
/// return, such as stdin with no input, cannot delay runtime shutdown.
pub struct BlockingReader {
    rx: mpsc::Receiver<Vec<u8>>,
    chunk: Vec<u8>,
    pos: usize,
}

impl BlockingReader {
    /// Starts a thread named `name` that reads `source` until end of stream.
    pub fn spawn<R: Read + Send + 'static>(name: &str, mut source: R) -> Self {
        let (tx, rx) = mpsc::channel::<Vec<u8>>(READ_QUEUE_SIZE);

        let spawned = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let mut buf = vec![0u8; READ_CHUNK_SIZE];
                loop {
                    match source.read(&mut buf) {
                        Ok(0) => break,
                        Ok(n) => {
                            if tx.blocking_send(buf[..n].to_vec()).is_err() {
                                break;
                            }
                        }
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                        Err(e) => {
                            warn!("Failed to read host input: {}", e);
                            break;
                        }
                    }
                }
            });

        // A failed spawn drops the sender, which reads as end of stream.
        if let Err(e) = spawned {
            error!("Failed to start reader thread {}: {}", name, e);
        }

        Self {
            rx,
            chunk: Vec::new(),
            pos: 0,
        }
    }
}

impl AsyncRead for BlockingReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;

        if this.pos >= this.chunk.len() {
            match this.rx.poll_recv(cx) {
                Poll::Ready(Some(chunk)) => {
                    this.chunk = chunk;
                    this.pos = 0;
                }
                Poll::Ready(None) => return Poll::Ready(Ok(())),
                Poll::Pending => return Poll::Pending,
            }
        }

        let n = buf.remaining().min(this.chunk.len() - this.pos);
        buf.put_slice(&this.chunk[this.pos..this.pos + n]);
        this.pos += n;
        Poll::Ready(Ok(()))
    }
}

/// State shared between the relay tasks.
#[derive(Default)]
struct RelayState {
    /// Id of the host's pending `initialize` request.
    initialize_id: Mutex<Option<JsonValue>>,
    /// Fired when the server answers the client's shutdown request.
    shutdown_ack: Mutex<Option<oneshot::Sender<()>>>,
    /// Whether the host already sent `exit`.
    exit_forwarded: AtomicBool,
    /// Whether the server closed its output.
    server_closed: AtomicBool,
}

/// Language client connected to a server process over stdio.
pub struct StdioClient {
    /// Client identifier.
    id: String,

    /// Display name.
    name: String,

    /// How to start the server.
    spec: LaunchSpec,

    /// Document and watcher settings.
    options: ClientOptions,

    /// Host streams, consumed by start.
    host: Option<HostIo>,

    /// Server process.
    process: Option<Child>,

    /// Channel to send messages to the server.
    writer_tx: Option<mpsc::Sender<Vec<u8>>>,

    /// Relay state.
    state: Arc<RelayState>,

    /// Set once the relay has ended.
    exit_tx: Arc<watch::Sender<bool>>,

    /// Tasks feeding the server; aborted on stop.
    feeders: Vec<JoinHandle<()>>,

    /// Task owning the server's stdin.
    writer_task: Option<JoinHandle<()>>,
}

impl StdioClient {
    /// Creates a client that relays between `host` and the server.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        spec: LaunchSpec,
        options: ClientOptions,
        host: HostIo,
    ) -> Self {
        let (exit_tx, _) = watch::channel(false);
        Self {
            id: id.into(),
            name: name.into(),
            spec,
            options,
            host: Some(host),
            process: None,
            writer_tx: None,
            state: Arc::new(RelayState::default()),
            exit_tx: Arc::new(exit_tx),
            feeders: Vec::new(),
            writer_task: None,
        }
    }

    /// Returns the client identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the launch specification.
    #[must_use]
    pub fn spec(&self) -> &LaunchSpec {
        &self.spec
    }

    /// Returns whether the server process has been started and not stopped.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.process.is_some()
    }

    /// Returns a receiver that turns `true` once the relay has ended.
    ///
    /// The relay ends when the server closes its stdout, the host closes
    /// its input, or the client is stopped.
    #[must_use]
    pub fn exit_signal(&self) -> watch::Receiver<bool> {
        self.exit_tx.subscribe()
    }

    async fn spawn(&mut self) -> Result<(), ClientError> {
        if self.process.is_some() {
            return Err(ClientError::AlreadyStarted);
        }
        let watcher = match &self.options.watch_root {
            Some(root) => Some(FileWatcher::new(root.clone(), &self.options)?),
            None => None,
        };
        let host = self.host.take().ok_or(ClientError::AlreadyStarted)?;

        info!("Starting {} ({}): {}", self.name, self.id, self.spec);

        let mut child = Command::new(&self.spec.command)
            .args(&self.spec.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ClientError::SpawnError(std::io::Error::other("Failed to get stdin")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ClientError::SpawnError(std::io::Error::other("Failed to get stdout")))?;
        let stderr = child.stderr.take();

        // Writer task: sole owner of the server's stdin. Closing every
        // sender closes stdin.
        let (writer_tx, mut writer_rx) = mpsc::channel::<Vec<u8>>(WRITE_QUEUE_SIZE);
        self.writer_task = Some(tokio::spawn(async move {
            let mut stdin = stdin;
            while let Some(body) = writer_rx.recv().await {
                if let Err(e) = transport::write_message(&mut stdin, &body).await {
                    warn!("Failed to write to server: {}", e);
                    break;
                }
            }
        }));

        // Server -> host.
        let state = Arc::clone(&self.state);
        let exit_tx = Arc::clone(&self.exit_tx);
        let host_writer = host.writer;
        tokio::spawn(async move {
            Self::server_to_host(BufReader::new(stdout), host_writer, Arc::clone(&state)).await;
            state.server_closed.store(true, Ordering::SeqCst);
            exit_tx.send_replace(true);
        });

        // Host -> server.
        let state = Arc::clone(&self.state);
        let exit_tx = Arc::clone(&self.exit_tx);
        let tx = writer_tx.clone();
        let host_reader = host.reader;
        self.feeders.push(tokio::spawn(async move {
            Self::host_to_server(BufReader::new(host_reader), tx, state).await;
            exit_tx.send_replace(true);
        }));

        if let Some(stderr) = stderr {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "drools_lsp_client::server", "{}", line);
                }
            });
        }

        if let Some(watcher) = watcher {
            let interval = self.options.watch_interval;
            self.feeders
                .push(tokio::spawn(Self::watch_loop(watcher, interval, writer_tx.clone())));
        }

        self.writer_tx = Some(writer_tx);
        self.process = Some(child);
        Ok(())
    }

    /// Forwards server messages to the host.
    async fn server_to_host<R>(mut reader: R, mut host: HostWriter, state: Arc<RelayState>)
    where
        R: tokio::io::AsyncBufRead + Unpin,
    {
        loop {
            let body = match transport::read_message(&mut reader).await {
                Ok(Some(body)) => body,
                Ok(None) => {
                    debug!("Server closed its output");
                    return;
                }
                Err(e) => {
                    error!("Failed to read from server: {}", e);
                    return;
                }
            };

            if let Some(info) = MessageInfo::inspect(&body) {
                if info.id == Some(JsonValue::from(SHUTDOWN_REQUEST_ID)) {
                    if let Some(ack) = state.shutdown_ack.lock().await.take() {
                        let _ = ack.send(());
                    }
                    continue;
                }

                if let Some(method) = &info.method {
                    trace!("server -> host: {}", method);
                }

                if info.id.is_some() && info.method.is_none() {
                    let mut initialize_id = state.initialize_id.lock().await;
                    if initialize_id.is_some() && *initialize_id == info.id {
                        initialize_id.take();
                        Self::log_server_info(&body);
                    }
                }
            }

            if let Err(e) = transport::write_message(&mut host, &body).await {
                warn!("Failed to write to host: {}", e);
                return;
            }
        }
    }

    /// Forwards host messages to the server.
    async fn host_to_server<R>(mut reader: R, tx: mpsc::Sender<Vec<u8>>, state: Arc<RelayState>)
    where
        R: tokio::io::AsyncBufRead + Unpin,
    {
        loop {
            let body = match transport::read_message(&mut reader).await {
                Ok(Some(body)) => body,
                Ok(None) => {
                    debug!("Host closed its input");
                    return;
                }
                Err(e) => {
                    error!("Failed to read from host: {}", e);
                    return;
                }
            };

            if let Some(info) = MessageInfo::inspect(&body) {
                if let Some(method) = &info.method {
                    trace!("host -> server: {}", method);
                }
                if info.method.as_deref() == Some(Initialize::METHOD) {
                    *state.initialize_id.lock().await = info.id.clone();
                }
                if info.is_notification(Exit::METHOD) {
                    state.exit_forwarded.store(true, Ordering::SeqCst);
                }
            }

            if tx.send(body).await.is_err() {
                return;
            }
        }
    }

    /// Polls the watcher and injects change notifications.
    async fn watch_loop(mut watcher: FileWatcher, interval: Duration, tx: mpsc::Sender<Vec<u8>>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let changes = watcher.poll();
            if changes.is_empty() {
                continue;
            }

            let body = match serde_json::to_vec(&changes_notification(&changes)) {
                Ok(body) => body,
                Err(e) => {
                    warn!("Failed to encode file changes: {}", e);
                    continue;
                }
            };
            if tx.send(body).await.is_err() {
                return;
            }
        }
    }

    /// Logs the server name and version from an initialize response.
    fn log_server_info(body: &[u8]) {
        let result = serde_json::from_slice::<JsonValue>(body)
            .ok()
            .and_then(|mut v| v.get_mut("result").map(JsonValue::take))
            .and_then(|result| serde_json::from_value::<InitializeResult>(result).ok());

        match result.and_then(|r| r.server_info) {
            Some(server) => info!(
                "Server initialized: {} {}",
                server.name,
                server.version.unwrap_or_default()
            ),
            None => info!("Server initialized"),
        }
    }

    async fn shutdown(&mut self) -> Result<(), ClientError> {
        let Some(mut child) = self.process.take() else {
            return Ok(());
        };

        for feeder in self.feeders.drain(..) {
            feeder.abort();
        }

        if let Some(tx) = self.writer_tx.take() {
            let running = matches!(child.try_wait(), Ok(None))
                && !self.state.server_closed.load(Ordering::SeqCst);
            if running && !self.state.exit_forwarded.load(Ordering::SeqCst) {
                Self::request_shutdown(&self.state, &tx).await;
            } else {
                debug!("{} already gone, skipping shutdown request", self.name);
            }
        }

        // Let the writer flush; its end closes the server's stdin.
        if let Some(writer) = self.writer_task.take() {
            let _ = tokio::time::timeout(EXIT_TIMEOUT, writer).await;
        }

        let status = match tokio::time::timeout(EXIT_TIMEOUT, child.wait()).await {
            Ok(status) => Some(status?),
            Err(_) => {
                warn!("{} did not exit in {:?}, killing it", self.name, EXIT_TIMEOUT);
                child.kill().await?;
                None
            }
        };

        self.exit_tx.send_replace(true);

        match status {
            Some(status) if !status.success() => {
                error!("{} exited: {}", self.name, status);
                Err(ClientError::ServerExited(status))
            }
            Some(status) => {
                info!("{} exited: {}", self.name, status);
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Sends `shutdown`, waits briefly for the answer, then sends `exit`.
    async fn request_shutdown(state: &RelayState, tx: &mpsc::Sender<Vec<u8>>) {
        let (ack_tx, ack_rx) = oneshot::channel();
        *state.shutdown_ack.lock().await = Some(ack_tx);

        let shutdown = json!({
            "jsonrpc": "2.0",
            "id": SHUTDOWN_REQUEST_ID,
            "method": Shutdown::METHOD,
        });
        let exit = json!({ "jsonrpc": "2.0", "method": Exit::METHOD });

        if tx.send(shutdown.to_string().into_bytes()).await.is_err() {
            return;
        }
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, ack_rx).await.is_err() {
            debug!("No shutdown response within {:?}", SHUTDOWN_TIMEOUT);
        }
        let _ = tx.send(exit.to_string().into_bytes()).await;
    }
}

impl LanguageClient for StdioClient {
    fn start(&mut self) -> ClientFuture<'_, Result<(), ClientError>> {
        Box::pin(self.spawn())
    }

    fn stop(&mut self) -> ClientFuture<'_, Result<(), ClientError>> {
        Box::pin(self.shutdown())
    }
}

impl Drop for StdioClient {
    fn drop(&mut self) {
        for feeder in self.feeders.drain(..) {
            feeder.abort();
        }
        if let Some(ref mut process) = self.process {
            let _ = process.start_kill();
        }
    }
}

/// Factory of [`StdioClient`]s relaying over the process's own stdio.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdioClientFactory;

impl ClientFactory for StdioClientFactory {
    type Client = StdioClient;

    fn create(
        &self,
        id: &str,
        name: &str,
        spec: LaunchSpec,
        options: ClientOptions,
    ) -> Self::Client {
        StdioClient::new(id, name, spec, options, HostIo::stdio())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn client(command: &str) -> StdioClient {
        let (host_side, _editor_side) = tokio::io::duplex(1024);
        let (reader, writer) = tokio::io::split(host_side);
        StdioClient::new(
            "droolsLsp",
            "Drools DRL Language Server",
            LaunchSpec::new(command, Vec::<String>::new()),
            ClientOptions::default(),
            HostIo::new(reader, writer),
        )
    }

    #[tokio::test]
    async fn test_stop_before_start_is_noop() {
        let mut client = client("java");
        assert!(!client.is_running());
        client.stop().await.unwrap();
        assert!(!*client.exit_signal().borrow());
    }

    #[tokio::test]
    async fn test_spawn_failure_is_reported() {
        let mut client = client("/definitely/not/a/java/binary");
        let err = client.start().await.unwrap_err();
        assert!(matches!(err, ClientError::SpawnError(_)));
        assert!(!client.is_running());
    }

    /// Source whose reads never complete in time.
    struct Stalled;

    impl Read for Stalled {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            std::thread::sleep(Duration::from_secs(30));
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_blocking_reader_reads_to_end() {
        use tokio::io::AsyncReadExt;

        let data = vec![b'x'; READ_CHUNK_SIZE * 2 + 17];
        let mut reader = BlockingReader::spawn("test-reader", io::Cursor::new(data.clone()));

        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_stalled_source_does_not_block_runtime_shutdown() {
        use tokio::io::AsyncReadExt;

        let runtime = tokio::runtime::Runtime::new().expect("runtime");
        let started = std::time::Instant::now();

        runtime.block_on(async {
            let mut reader = BlockingReader::spawn("stalled-reader", Stalled);
            let mut buf = [0u8; 8];
            let read = tokio::time::timeout(Duration::from_millis(50), reader.read(&mut buf)).await;
            assert!(read.is_err());
        });
        drop(runtime);

        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_log_server_info_tolerates_garbage() {
        StdioClient::log_server_info(b"not json");
        StdioClient::log_server_info(br#"{"id":1,"result":{"capabilities":{}}}"#);
    }
}
