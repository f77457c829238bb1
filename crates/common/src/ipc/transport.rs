// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 SwapperD Desktop Contributors

//! Correlated transport: call/reply on top of a one-way framed stream.
//!
//! Outgoing calls are tracked in a pending-call table keyed by correlation
//! id. Exactly one of {reply, timeout, cancellation} removes an entry; the
//! other paths find nothing to resolve and become no-ops. Incoming requests
//! run in their own tasks so a slow handler never blocks the connection.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use super::frame::{undecodable_request_id, Frame, RemoteError};
use super::MessageKind;
use crate::error::{Error, Result};

/// Upper bound for one frame on the wire
pub const MAX_FRAME_LENGTH: usize = 4 * 1024 * 1024;

type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;
type Handler = Arc<dyn Fn(Value) -> HandlerFuture + Send + Sync>;
type Listener = Arc<dyn Fn(Value) + Send + Sync>;

/// How long a caller is willing to wait for a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
    After(Duration),
    /// Wait until the peer replies, however long that takes
    Never,
}

impl Deadline {
    /// Millisecond timeout where `0` means no timeout
    pub fn from_millis(millis: u64) -> Self {
        if millis == 0 {
            Deadline::Never
        } else {
            Deadline::After(Duration::from_millis(millis))
        }
    }
}

struct PendingCall {
    kind: MessageKind,
    reply: oneshot::Sender<Result<Value>>,
}

struct Inner {
    outbound: mpsc::UnboundedSender<Frame>,
    next_id: AtomicU64,
    pending: Mutex<HashMap<u64, PendingCall>>,
    handlers: RwLock<HashMap<MessageKind, Handler>>,
    listeners: RwLock<HashMap<MessageKind, Vec<Listener>>>,
    running: Mutex<HashMap<u64, AbortHandle>>,
    closed: CancellationToken,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One end of a bridge connection. Cheap to clone; all clones share the
/// same pending-call table and handler registry.
#[derive(Clone)]
pub struct Transport {
    inner: Arc<Inner>,
}

impl Transport {
    /// Start a transport over a read half and a write half.
    ///
    /// Spawns the reader and writer tasks; must be called inside a tokio runtime.
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            outbound,
            next_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
            handlers: RwLock::new(HashMap::new()),
            listeners: RwLock::new(HashMap::new()),
            running: Mutex::new(HashMap::new()),
            closed: CancellationToken::new(),
        });

        let lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_FRAME_LENGTH));
        let sink = FramedWrite::new(writer, LinesCodec::new_with_max_length(MAX_FRAME_LENGTH));

        tokio::spawn(write_loop(sink, outbound_rx, inner.closed.clone()));
        tokio::spawn(read_loop(Arc::clone(&inner), lines));

        Self { inner }
    }

    /// Transport over a connected Unix socket
    #[cfg(unix)]
    pub fn from_unix(stream: tokio::net::UnixStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self::new(reader, writer)
    }

    /// Two transports connected to each other through an in-memory pipe
    pub fn pair() -> (Transport, Transport) {
        let (left, right) = tokio::io::duplex(64 * 1024);
        let (left_read, left_write) = tokio::io::split(left);
        let (right_read, right_write) = tokio::io::split(right);
        (
            Transport::new(left_read, left_write),
            Transport::new(right_read, right_write),
        )
    }

    /// Send a request and wait for the matching reply.
    ///
    /// Dropping the returned future cancels the call: the pending entry is
    /// discarded and the peer is told to abort its handler.
    pub async fn call(&self, kind: MessageKind, payload: Value, deadline: Deadline) -> Result<Value> {
        if self.inner.closed.is_cancelled() {
            return Err(Error::Closed);
        }

        let (reply_tx, mut reply_rx) = oneshot::channel();
        let id = self.inner.register(kind, reply_tx);
        let mut guard = PendingGuard {
            inner: &self.inner,
            id,
            kind,
            armed: true,
        };

        trace!("Calling {} (id {})", kind, id);
        self.inner.send(Frame::Request { id, kind, payload })?;

        let outcome = match deadline {
            Deadline::Never => reply_rx.await,
            Deadline::After(after) => match tokio::time::timeout(after, &mut reply_rx).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    guard.armed = false;
                    if self.inner.take_pending(id).is_some() {
                        debug!("{} call {} timed out after {:?}", kind, id, after);
                        self.inner.send_cancel(id, kind);
                        return Err(Error::Timeout { kind, after });
                    }
                    // The reply was taken out of the table right as the
                    // timer fired; it is already on its way.
                    reply_rx.await
                }
            },
        };
        guard.armed = false;

        match outcome {
            Ok(result) => result,
            Err(_) => Err(Error::Closed),
        }
    }

    /// Register the handler for a request kind, replacing any previous one
    pub fn on<F, Fut>(&self, kind: MessageKind, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |payload| -> HandlerFuture { Box::pin(handler(payload)) });
        let previous = self
            .inner
            .handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(kind, handler);
        if previous.is_some() {
            debug!("Replaced handler for {}", kind);
        }
    }

    /// Remove the handler for a request kind
    pub fn off(&self, kind: MessageKind) -> bool {
        self.inner
            .handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&kind)
            .is_some()
    }

    /// Add a listener for a one-way message kind
    pub fn listen<F>(&self, kind: MessageKind, listener: F)
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.inner
            .listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(kind)
            .or_default()
            .push(Arc::new(listener));
    }

    /// Deliver a one-way message; no reply is expected
    pub fn notify(&self, kind: MessageKind, payload: Value) -> Result<()> {
        self.inner.send(Frame::Notify { kind, payload })
    }

    /// Number of outgoing calls still waiting for a reply
    pub fn pending_calls(&self) -> usize {
        lock(&self.inner.pending).len()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.is_cancelled()
    }

    /// Resolves once the connection has gone away
    pub async fn closed(&self) {
        self.inner.closed.cancelled().await
    }

    /// Shut the connection down; pending calls fail with [`Error::Closed`]
    pub fn close(&self) {
        self.inner.closed.cancel();
    }
}

/// Discards a pending call when its caller stops waiting
struct PendingGuard<'a> {
    inner: &'a Arc<Inner>,
    id: u64,
    kind: MessageKind,
    armed: bool,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.armed && self.inner.take_pending(self.id).is_some() {
            debug!("{} call {} cancelled by caller", self.kind, self.id);
            self.inner.send_cancel(self.id, self.kind);
        }
    }
}

impl Inner {
    fn register(&self, kind: MessageKind, reply: oneshot::Sender<Result<Value>>) -> u64 {
        let mut pending = lock(&self.pending);
        loop {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            match pending.entry(id) {
                Entry::Vacant(slot) => {
                    slot.insert(PendingCall { kind, reply });
                    return id;
                }
                Entry::Occupied(_) => warn!("Correlation id {} still in flight, skipping", id),
            }
        }
    }

    fn take_pending(&self, id: u64) -> Option<PendingCall> {
        lock(&self.pending).remove(&id)
    }

    fn send(&self, frame: Frame) -> Result<()> {
        self.outbound.send(frame).map_err(|_| Error::Closed)
    }

    fn send_cancel(&self, id: u64, kind: MessageKind) {
        if self.send(Frame::Cancel { id, kind }).is_err() {
            trace!("Connection closed before cancel for {} could be sent", id);
        }
    }

    fn dispatch(self: &Arc<Self>, frame: Frame) {
        match frame {
            Frame::Request { id, kind, payload } => self.serve(id, kind, payload),
            Frame::Reply {
                id,
                kind,
                result,
                error,
            } => {
                let outcome = match error {
                    Some(error) => Err(Error::from(error)),
                    None => Ok(result.unwrap_or(Value::Null)),
                };
                self.resolve(id, kind, outcome);
            }
            Frame::Notify { kind, payload } => self.deliver(kind, payload),
            Frame::Cancel { id, kind } => {
                if let Some(handle) = lock(&self.running).remove(&id) {
                    debug!("Peer cancelled {} call {}", kind, id);
                    handle.abort();
                }
            }
        }
    }

    fn resolve(&self, id: u64, kind: MessageKind, outcome: Result<Value>) {
        match self.take_pending(id) {
            Some(call) => {
                if call.kind != kind {
                    warn!("Reply {} is tagged {} but the call was {}", id, kind, call.kind);
                }
                // The caller may have stopped listening in the meantime
                let _ = call.reply.send(outcome);
            }
            None => debug!("Dropping reply for unknown or expired call {} ({})", id, kind),
        }
    }

    fn serve(self: &Arc<Self>, id: u64, kind: MessageKind, payload: Value) {
        let handler = self
            .handlers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&kind)
            .cloned();

        let Some(handler) = handler else {
            warn!("No handler registered for {} (call {})", kind, id);
            let error = RemoteError::protocol(format!("no handler registered for {}", kind));
            let _ = self.send(Frame::reply(id, kind, Err(error)));
            return;
        };

        // The handler is invoked inside the task so a panic while building
        // its future is caught the same way as one while polling it.
        let task = tokio::spawn(async move { handler(payload).await });
        lock(&self.running).insert(id, task.abort_handle());

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let joined = task.await;
            lock(&inner.running).remove(&id);

            let outcome = match joined {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => {
                    debug!("{} handler failed for call {}: {}", kind, id, err);
                    Err(RemoteError::from(&err))
                }
                Err(join_err) if join_err.is_cancelled() => {
                    debug!("{} handler for call {} aborted", kind, id);
                    return;
                }
                Err(_) => {
                    error!("{} handler panicked while serving call {}", kind, id);
                    Err(RemoteError::handler(format!("{} handler panicked", kind)))
                }
            };

            if inner.send(Frame::reply(id, kind, outcome)).is_err() {
                debug!("Connection closed before reply {} could be sent", id);
            }
        });
    }

    fn deliver(&self, kind: MessageKind, payload: Value) {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&kind)
            .cloned()
            .unwrap_or_default();

        if listeners.is_empty() {
            trace!("No listeners for {}", kind);
            return;
        }

        for listener in listeners {
            let payload = payload.clone();
            if std::panic::catch_unwind(AssertUnwindSafe(|| listener(payload))).is_err() {
                error!("Listener for {} panicked", kind);
            }
        }
    }

    fn reject_undecodable(&self, line: &str, err: &serde_json::Error) {
        warn!("Dropping malformed frame: {}", err);
        if let Some(id) = undecodable_request_id(line) {
            let error = RemoteError::protocol(format!("malformed request: {}", err));
            let _ = self.send(Frame::reply(id, MessageKind::Unknown, Err(error)));
        }
    }

    fn shutdown(&self) {
        self.closed.cancel();

        // Dropping the reply senders fails every waiting caller with Closed
        let pending: Vec<_> = lock(&self.pending).drain().collect();
        if !pending.is_empty() {
            debug!("Failing {} pending call(s): connection closed", pending.len());
        }

        for (_, handle) in lock(&self.running).drain() {
            handle.abort();
        }
    }
}

async fn read_loop<R>(inner: Arc<Inner>, mut lines: FramedRead<R, LinesCodec>)
where
    R: AsyncRead + Unpin,
{
    loop {
        let next = tokio::select! {
            _ = inner.closed.cancelled() => break,
            next = lines.next() => next,
        };

        match next {
            Some(Ok(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Frame>(&line) {
                    Ok(frame) => inner.dispatch(frame),
                    Err(err) => inner.reject_undecodable(&line, &err),
                }
            }
            Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                warn!("Dropping frame longer than {} bytes", MAX_FRAME_LENGTH);
            }
            Some(Err(LinesCodecError::Io(err))) => {
                debug!("Bridge read error: {}", err);
                break;
            }
            None => {
                debug!("Bridge peer disconnected");
                break;
            }
        }
    }

    inner.shutdown();
}

async fn write_loop<W>(
    mut sink: FramedWrite<W, LinesCodec>,
    mut outbound: mpsc::UnboundedReceiver<Frame>,
    closed: CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let frame = tokio::select! {
            _ = closed.cancelled() => break,
            frame = outbound.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        let line = match serde_json::to_string(&frame) {
            Ok(line) => line,
            Err(err) => {
                error!("Failed to serialize frame: {}", err);
                continue;
            }
        };

        if let Err(err) = sink.send(line).await {
            debug!("Bridge write error: {}", err);
            break;
        }
    }

    closed.cancel();
}
