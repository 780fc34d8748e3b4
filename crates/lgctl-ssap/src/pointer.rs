//! The pointer/mouse input sub-link.
//!
//! Button, pointer and scroll events do not travel over the control link.
//! The TV hands out a dedicated socket URL on request (already authorized:
//! the URL embeds a token, so this link needs no handshake of its own) and
//! speaks a line-oriented plain-text protocol on it:
//!
//! ```text
//! type:button
//! name:ENTER
//!
//! ```
//!
//! The sub-link's lifecycle is independent of the control link; the facade
//! recreates it on demand when the TV has dropped it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::error::Error as WsError;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;

use crate::error::{Error, Result};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Remote-control buttons the input socket accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Ok,
    Back,
    Up,
    Down,
    Left,
    Right,
    Exit,
    Home,
}

impl PointerButton {
    #[must_use]
    pub fn wire_name(self) -> &'static str {
        match self {
            PointerButton::Ok => "ENTER",
            PointerButton::Back => "BACK",
            PointerButton::Up => "UP",
            PointerButton::Down => "DOWN",
            PointerButton::Left => "LEFT",
            PointerButton::Right => "RIGHT",
            PointerButton::Exit => "EXIT",
            PointerButton::Home => "HOME",
        }
    }
}

/// A connected pointer socket. Cheap to clone; all clones share the
/// underlying connection.
#[derive(Clone)]
pub struct PointerLink {
    sink: Arc<Mutex<WsSink>>,
    closed: Arc<AtomicBool>,
}

impl PointerLink {
    /// Connect to the socket URL the TV handed out.
    ///
    /// # Errors
    ///
    /// [`Error::Connect`] for network failures reaching the socket.
    pub async fn connect(url: &str) -> Result<Self> {
        let (ws, _response) = connect_async(url).await.map_err(|e| match e {
            WsError::Io(e) => Error::Connect(e.to_string()),
            WsError::Url(e) => Error::Connect(e.to_string()),
            other => Error::WebSocket(other),
        })?;
        let (sink, stream) = ws.split();

        let closed = Arc::new(AtomicBool::new(false));
        let reader_closed = Arc::clone(&closed);
        // The input socket never sends application frames; the read loop
        // only exists to notice the TV dropping the connection.
        tokio::spawn(async move {
            let mut stream = stream;
            while let Some(item) = stream.next().await {
                match item {
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
            debug!("pointer socket closed by peer");
            reader_closed.store(true, Ordering::SeqCst);
        });

        Ok(Self {
            sink: Arc::new(Mutex::new(sink)),
            closed,
        })
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Press a remote-control button.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] when the socket is gone.
    pub async fn button(&self, button: PointerButton) -> Result<()> {
        self.send(&format!("type:button\nname:{}\n\n", button.wire_name()))
            .await
    }

    /// Move the pointer by a relative offset.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] when the socket is gone.
    pub async fn move_by(&self, dx: i32, dy: i32) -> Result<()> {
        self.send(&format!("type:move\ndx:{dx}\ndy:{dy}\ndown:0\n\n"))
            .await
    }

    /// Click at the current pointer position.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] when the socket is gone.
    pub async fn click(&self) -> Result<()> {
        self.send("type:click\n\n").await
    }

    /// Scroll by a relative offset.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] when the socket is gone.
    pub async fn scroll(&self, dx: i32, dy: i32) -> Result<()> {
        self.send(&format!("type:scroll\ndx:{dx}\ndy:{dy}\n\n"))
            .await
    }

    /// Close the sub-link. Idempotent.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut sink = self.sink.lock().await;
        let _ = sink.close().await;
    }

    async fn send(&self, text: &str) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        let mut sink = self.sink.lock().await;
        sink.send(Message::Text(text.to_string()))
            .await
            .map_err(|e| match e {
                WsError::ConnectionClosed | WsError::AlreadyClosed => Error::Closed,
                other => Error::WebSocket(other),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_wire_names() {
        assert_eq!(PointerButton::Ok.wire_name(), "ENTER");
        assert_eq!(PointerButton::Back.wire_name(), "BACK");
        assert_eq!(PointerButton::Exit.wire_name(), "EXIT");
        assert_eq!(PointerButton::Left.wire_name(), "LEFT");
    }
}
