//! The control-link transport.
//!
//! A [`Link`] owns one WebSocket connection to a TV and the table of
//! outstanding requests and subscriptions on it. A background receive task
//! reads every inbound frame and dispatches it by correlation id; it is the
//! only resolver of waiters besides the close path. Many callers may issue
//! requests concurrently on one link; nothing is serialized besides the
//! frame writes themselves.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::error::{Error as WsError, ProtocolError};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::protocol::{InboundMessage, InboundType, OutboundMessage, RequestId};

/// Default budget for a single command round-trip. The TV closing the socket
/// resolves waiters immediately; this bound covers a TV that stops answering
/// without closing.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Bound on establishing the socket itself, so a sleeping host does not pin
/// the caller for the full TCP retry cycle.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// A waiter registered in the link table.
enum Pending {
    /// Resolved by the first matching frame, then removed.
    Request(oneshot::Sender<Result<InboundMessage>>),
    /// Like `Request`, but an intermediate pairing-prompt frame does not
    /// resolve it.
    Register(oneshot::Sender<Result<InboundMessage>>),
    /// Receives every matching push until cancelled.
    Subscription(mpsc::UnboundedSender<Value>),
}

type PendingTable = Arc<Mutex<HashMap<RequestId, Pending>>>;

/// One WebSocket connection to a TV.
pub struct Link {
    sink: Arc<Mutex<WsSink>>,
    table: PendingTable,
    next_id: AtomicU64,
    closed: Arc<AtomicBool>,
    request_timeout: Duration,
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl Link {
    /// Open the control socket at `url` (`ws://<ip>:3000`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connect`] for expected network failures (host
    /// unreachable, refused, reset, bad address, connect timeout); the
    /// caller may retry those. Anything else surfaces as
    /// [`Error::WebSocket`].
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_timeout(url, DEFAULT_REQUEST_TIMEOUT).await
    }

    /// Like [`Link::connect`], with an explicit per-request timeout.
    ///
    /// # Errors
    ///
    /// Same as [`Link::connect`].
    pub async fn connect_with_timeout(url: &str, request_timeout: Duration) -> Result<Self> {
        let connect = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(url));
        let (ws, _response) = match connect.await {
            Err(_) => return Err(Error::Connect(format!("timed out connecting to {url}"))),
            Ok(Err(e)) => return Err(classify_connect_error(e)),
            Ok(Ok(ok)) => ok,
        };

        let (sink, stream) = ws.split();

        let table: PendingTable = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));

        let reader_table = Arc::clone(&table);
        let reader_closed = Arc::clone(&closed);
        tokio::spawn(async move {
            let mut stream = stream;
            while let Some(item) = stream.next().await {
                match item {
                    Ok(Message::Text(text)) => match serde_json::from_str::<InboundMessage>(&text)
                    {
                        Ok(msg) => dispatch(&reader_table, msg).await,
                        Err(e) => warn!("discarding unparseable frame: {e}"),
                    },
                    Ok(Message::Close(_)) => {
                        debug!("peer closed the control socket");
                        break;
                    }
                    // Pings are answered by the websocket layer; binary
                    // frames never occur on the control link.
                    Ok(_) => {}
                    Err(e) => {
                        warn!("control socket read failed: {e}");
                        break;
                    }
                }
            }
            reader_closed.store(true, Ordering::SeqCst);
            drain(&reader_table).await;
        });

        Ok(Self {
            sink: Arc::new(Mutex::new(sink)),
            table,
            next_id: AtomicU64::new(1),
            closed,
            request_timeout,
        })
    }

    /// Send a request and wait for the matching frame, returning its payload.
    ///
    /// # Errors
    ///
    /// [`Error::Tv`] if the TV answers with an error frame, [`Error::Closed`]
    /// if the link closes first, [`Error::Timeout`] if nothing matches within
    /// the request timeout.
    pub async fn request(&self, uri: &str, payload: Option<Value>) -> Result<Value> {
        let msg = self.send_and_wait(uri, payload).await?;
        Ok(msg.payload)
    }

    /// Send a request and wait for the full matching frame.
    ///
    /// # Errors
    ///
    /// Same as [`Link::request`].
    pub async fn send_and_wait(&self, uri: &str, payload: Option<Value>) -> Result<InboundMessage> {
        let (id, rx) = self
            .enroll(|id| OutboundMessage::request(id, uri, payload.clone()), false)
            .await?;
        self.await_waiter(id, rx, self.request_timeout).await
    }

    /// Send a registration frame and wait for the final `registered` (or
    /// error) frame. An intermediate prompt frame keeps the waiter alive,
    /// so `timeout` should cover a human reaching for the remote.
    ///
    /// # Errors
    ///
    /// Same as [`Link::request`].
    pub async fn register(&self, payload: Value, timeout: Duration) -> Result<InboundMessage> {
        let (id, rx) = self
            .enroll(|id| OutboundMessage::register(id, payload.clone()), true)
            .await?;
        self.await_waiter(id, rx, timeout).await
    }

    /// Send a subscribe frame and return a handle yielding every push the
    /// TV sends for it. The first delivery is the TV's snapshot of the
    /// current state; the subscription stays registered until cancelled,
    /// dropped, or the link closes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the link is already closed, or the write
    /// failure if the frame could not be sent.
    pub async fn subscribe(&self, uri: &str, payload: Option<Value>) -> Result<Subscription> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        let id = self.next_id();
        let (tx, rx) = mpsc::unbounded_channel();
        self.table
            .lock()
            .await
            .insert(id.clone(), Pending::Subscription(tx));

        let msg = OutboundMessage::subscribe(id.clone(), uri, payload);
        if let Err(e) = self.write(&msg).await {
            self.table.lock().await.remove(&id);
            return Err(e);
        }

        Ok(Subscription {
            id,
            updates: rx,
            sink: Arc::clone(&self.sink),
            table: Arc::clone(&self.table),
            closed: Arc::clone(&self.closed),
        })
    }

    /// Close the link. Idempotent: the first call closes the socket and
    /// resolves every outstanding waiter with [`Error::Closed`]; later calls
    /// do nothing.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        {
            let mut sink = self.sink.lock().await;
            let _ = sink.close().await;
        }
        drain(&self.table).await;
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn next_id(&self) -> RequestId {
        RequestId::from(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Register a waiter, then write the frame; unregisters again if the
    /// write fails so the table never leaks entries for unsent requests.
    async fn enroll(
        &self,
        build: impl FnOnce(RequestId) -> OutboundMessage,
        register: bool,
    ) -> Result<(RequestId, oneshot::Receiver<Result<InboundMessage>>)> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        let id = self.next_id();
        let (tx, rx) = oneshot::channel();
        let waiter = if register {
            Pending::Register(tx)
        } else {
            Pending::Request(tx)
        };
        self.table.lock().await.insert(id.clone(), waiter);

        let msg = build(id.clone());
        if let Err(e) = self.write(&msg).await {
            self.table.lock().await.remove(&id);
            return Err(e);
        }
        Ok((id, rx))
    }

    async fn await_waiter(
        &self,
        id: RequestId,
        rx: oneshot::Receiver<Result<InboundMessage>>,
        timeout: Duration,
    ) -> Result<InboundMessage> {
        match tokio::time::timeout(timeout, rx).await {
            Err(_) => {
                // A frame matching this id from now on is unsolicited and
                // gets dropped by the dispatcher.
                self.table.lock().await.remove(&id);
                Err(Error::Timeout)
            }
            Ok(Err(_)) => Err(Error::Closed),
            Ok(Ok(result)) => result,
        }
    }

    async fn write(&self, msg: &OutboundMessage) -> Result<()> {
        let text = serde_json::to_string(msg)?;
        let mut sink = self.sink.lock().await;
        sink.send(Message::Text(text)).await.map_err(|e| match e {
            WsError::ConnectionClosed | WsError::AlreadyClosed => Error::Closed,
            other => Error::WebSocket(other),
        })
    }
}

/// A standing subscription on a link.
///
/// Yields one [`Value`] payload per push. Ends when the link closes or the
/// subscription is cancelled; dropping the handle cancels implicitly on the
/// next push attempt.
pub struct Subscription {
    id: RequestId,
    updates: mpsc::UnboundedReceiver<Value>,
    sink: Arc<Mutex<WsSink>>,
    table: PendingTable,
    closed: Arc<AtomicBool>,
}

impl Subscription {
    #[must_use]
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    /// Next pushed payload, or `None` once the subscription has ended.
    pub async fn next(&mut self) -> Option<Value> {
        self.updates.recv().await
    }

    /// Cancel the subscription: removes the table entry and tells the TV to
    /// stop pushing. Telling the TV is best-effort; a link that is already
    /// closed has nothing left to unsubscribe from.
    ///
    /// # Errors
    ///
    /// Returns the write failure if the unsubscribe frame could not be sent
    /// over a live link.
    pub async fn unsubscribe(mut self) -> Result<()> {
        self.updates.close();
        self.table.lock().await.remove(&self.id);
        if self.closed.load(Ordering::SeqCst) {
            return Ok(());
        }
        let text = serde_json::to_string(&OutboundMessage::unsubscribe(self.id.clone()))?;
        let mut sink = self.sink.lock().await;
        match sink.send(Message::Text(text)).await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(Error::WebSocket(e)),
        }
    }
}

/// Route one inbound frame to its waiter. Frames with no registered id are
/// logged and dropped, never fatal.
async fn dispatch(table: &PendingTable, msg: InboundMessage) {
    let Some(id) = msg.id.clone() else {
        debug!("dropping frame without id");
        return;
    };
    let mut table = table.lock().await;
    match table.entry(id) {
        Entry::Vacant(entry) => {
            debug!("dropping frame with no matching waiter (id {})", entry.key());
        }
        Entry::Occupied(mut entry) => match entry.get_mut() {
            Pending::Subscription(tx) => {
                if msg.msg_type == InboundType::Error {
                    warn!(
                        "subscription {} ended by TV: {}",
                        entry.key(),
                        msg.error.as_deref().unwrap_or("unspecified error")
                    );
                    entry.remove();
                } else if tx.send(msg.payload).is_err() {
                    debug!("subscriber for {} went away, cancelling", entry.key());
                    entry.remove();
                }
            }
            Pending::Register(_) if msg.is_pairing_prompt() => {
                debug!("pairing prompt is on screen, waiting for the user to accept");
            }
            Pending::Register(_) | Pending::Request(_) => {
                let result = if msg.msg_type == InboundType::Error {
                    Err(Error::Tv(
                        msg.error
                            .clone()
                            .unwrap_or_else(|| "unspecified error".to_string()),
                    ))
                } else {
                    Ok(msg)
                };
                match entry.remove() {
                    Pending::Request(tx) | Pending::Register(tx) => {
                        // A second frame with the same id finds the entry
                        // gone and is dropped as unmatched.
                        let _ = tx.send(result);
                    }
                    Pending::Subscription(_) => unreachable!("matched a non-subscription entry"),
                }
            }
        },
    }
}

/// Resolve every outstanding waiter with failure and end every subscription
/// stream. Runs at most once with work to do: callers race on the `closed`
/// flag, and the table is empty afterwards.
async fn drain(table: &PendingTable) {
    let mut table = table.lock().await;
    for (_, waiter) in table.drain() {
        match waiter {
            Pending::Request(tx) | Pending::Register(tx) => {
                let _ = tx.send(Err(Error::Closed));
            }
            // Dropping the sender ends the stream.
            Pending::Subscription(_) => {}
        }
    }
}

fn classify_connect_error(e: WsError) -> Error {
    match e {
        WsError::Io(e) => Error::Connect(e.to_string()),
        WsError::Url(e) => Error::Connect(e.to_string()),
        // A TV that is still booting its socket server accepts TCP and then
        // drops the connection; both shapes of that are worth a retry.
        WsError::Protocol(
            ProtocolError::ResetWithoutClosingHandshake | ProtocolError::HandshakeIncomplete,
        ) => Error::Connect("connection dropped during websocket handshake".to_string()),
        other => Error::WebSocket(other),
    }
}
