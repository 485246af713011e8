//! [`Connector`] backed by `tokio-tungstenite`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use futures::{SinkExt as _, StreamExt as _};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use url::Url;

use super::transport::{CloseCode, Connector, EventSink, ReadyState, Transport};
use super::error::WsError;
use crate::Result;
use crate::error::{Error, Kind};

#[derive(Debug)]
enum Outgoing {
    Text(String),
    Close(CloseCode, String),
}

/// Opens WebSocket connections to a fixed endpoint.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    endpoint: Url,
}

impl WebSocketConnector {
    /// Create a connector for a `ws://` or `wss://` endpoint.
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint)?;
        if !matches!(endpoint.scheme(), "ws" | "wss") {
            return Err(Error::validation(format!(
                "unsupported WebSocket scheme: {}",
                endpoint.scheme()
            )));
        }

        Ok(Self { endpoint })
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl Connector for WebSocketConnector {
    type Transport = WebSocketTransport;

    fn open(&mut self, events: EventSink) -> Result<WebSocketTransport> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::with_source(Kind::Internal, e))?;

        let ready = Arc::new(AtomicU8::new(ReadyState::Connecting.as_u8()));
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();

        runtime.spawn(run_connection(
            self.endpoint.clone(),
            events,
            Arc::clone(&ready),
            outgoing_rx,
        ));

        Ok(WebSocketTransport { outgoing_tx, ready })
    }
}

/// Handle to one WebSocket connection driven by a background task.
#[derive(Debug)]
pub struct WebSocketTransport {
    outgoing_tx: mpsc::UnboundedSender<Outgoing>,
    ready: Arc<AtomicU8>,
}

impl Transport for WebSocketTransport {
    fn send(&mut self, text: &str) -> Result<()> {
        if self.ready_state() != ReadyState::Open {
            return Err(WsError::NotReady.into());
        }

        self.outgoing_tx
            .send(Outgoing::Text(text.to_owned()))
            .map_err(|_e| WsError::ConnectionClosed)?;
        Ok(())
    }

    fn close(&mut self, code: CloseCode, reason: &str) {
        let previous = self.ready.fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
            match ReadyState::from_u8(state) {
                ReadyState::Connecting | ReadyState::Open => Some(ReadyState::Closing.as_u8()),
                ReadyState::Closing | ReadyState::Closed => None,
            }
        });

        if previous.is_ok() {
            _ = self.outgoing_tx.send(Outgoing::Close(code, reason.to_owned()));
        }
    }

    fn ready_state(&self) -> ReadyState {
        ReadyState::from_u8(self.ready.load(Ordering::Acquire))
    }
}

fn set_ready(ready: &AtomicU8, state: ReadyState) {
    ready.store(state.as_u8(), Ordering::Release);
}

/// Drive one connection: handshake, then pump frames in both directions until
/// the connection ends. Exactly one `Closed` event is reported.
async fn run_connection(
    endpoint: Url,
    events: EventSink,
    ready: Arc<AtomicU8>,
    mut outgoing_rx: mpsc::UnboundedReceiver<Outgoing>,
) {
    let ws_stream = match connect_async(endpoint.as_str()).await {
        Ok((ws_stream, _)) => ws_stream,
        Err(e) => {
            #[cfg(feature = "tracing")]
            tracing::warn!(%endpoint, error = %e, "Unable to connect");
            set_ready(&ready, ReadyState::Closed);
            events.error(e);
            events.closed(CloseCode::ABNORMAL, "connection failed");
            return;
        }
    };

    // A close requested during the handshake wins over the open.
    let opened = ready
        .compare_exchange(
            ReadyState::Connecting.as_u8(),
            ReadyState::Open.as_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        )
        .is_ok();
    if opened {
        events.opened();
    }

    let (mut write, mut read) = ws_stream.split();
    let mut close_sent = false;

    loop {
        tokio::select! {
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        #[cfg(feature = "tracing")]
                        tracing::trace!(text = %text.as_str(), "Received WebSocket text message");
                        events.message(text.as_str());
                    }
                    Some(Ok(Message::Close(frame))) => {
                        set_ready(&ready, ReadyState::Closed);
                        let (code, reason) = frame.map_or_else(
                            || (CloseCode::NO_STATUS, String::new()),
                            |f| (CloseCode::new(u16::from(f.code)), f.reason.as_str().to_owned()),
                        );
                        events.closed(code, reason);
                        return;
                    }
                    Some(Ok(_)) => {
                        // Binary frames are not part of the protocol; control frames are
                        // answered by tungstenite.
                    }
                    Some(Err(e)) => {
                        set_ready(&ready, ReadyState::Closed);
                        events.error(e);
                        events.closed(CloseCode::ABNORMAL, "connection error");
                        return;
                    }
                    None => {
                        set_ready(&ready, ReadyState::Closed);
                        events.closed(CloseCode::ABNORMAL, "connection dropped");
                        return;
                    }
                }
            }

            outgoing = outgoing_rx.recv(), if !close_sent => {
                match outgoing {
                    Some(Outgoing::Text(text)) => {
                        if let Err(e) = write.send(Message::Text(text.into())).await {
                            // The read half observes the broken connection and reports the close.
                            events.error(e);
                        }
                    }
                    Some(Outgoing::Close(code, reason)) => {
                        close_sent = true;
                        let frame = CloseFrame {
                            code: code.as_u16().into(),
                            reason: reason.into(),
                        };
                        _ = write.send(Message::Close(Some(frame))).await;
                    }
                    None => {
                        // Handle dropped without an explicit close.
                        close_sent = true;
                        set_ready(&ready, ReadyState::Closing);
                        _ = write.send(Message::Close(None)).await;
                    }
                }
            }
        }
    }
}
