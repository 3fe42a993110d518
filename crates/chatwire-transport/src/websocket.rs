//! WebSocket transport implementation using `tokio-tungstenite`.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};

use crate::{
    CloseCode, Connector, FrameReceiver, FrameSender, TransportError,
    TransportEvent,
};

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// A [`Connector`] that dials `ws://` and `wss://` URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl Connector for WebSocketConnector {
    type Sender = WebSocketSender;
    type Receiver = WebSocketReceiver;

    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Self::Sender, Self::Receiver), TransportError> {
        let (ws, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(map_connect_error)?;

        tracing::debug!("WebSocket connection established");

        let (sink, stream) = ws.split();
        Ok((WebSocketSender { sink }, WebSocketReceiver { stream }))
    }
}

/// Maps an upgrade failure, singling out rejected credentials.
fn map_connect_error(e: tungstenite::Error) -> TransportError {
    if let tungstenite::Error::Http(response) = &e {
        let status = response.status().as_u16();
        if status == 401 || status == 403 {
            return TransportError::Unauthorized(format!(
                "server answered HTTP {status}"
            ));
        }
    }
    TransportError::ConnectFailed(std::io::Error::new(
        std::io::ErrorKind::ConnectionRefused,
        e,
    ))
}

/// The write half of a WebSocket connection.
pub struct WebSocketSender {
    sink: SplitSink<WsStream, Message>,
}

impl FrameSender for WebSocketSender {
    async fn send(&mut self, data: Vec<u8>) -> Result<(), TransportError> {
        // JSON frames go out as text; anything else as binary.
        let msg = match String::from_utf8(data) {
            Ok(text) => Message::Text(text.into()),
            Err(e) => Message::Binary(e.into_bytes().into()),
        };
        self.sink.send(msg).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    async fn close(&mut self, code: CloseCode) -> Result<(), TransportError> {
        let frame = CloseFrame {
            code: code.into_inner().into(),
            reason: String::new().into(),
        };
        self.sink
            .send(Message::Close(Some(frame)))
            .await
            .map_err(|e| {
                TransportError::SendFailed(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    e,
                ))
            })
    }
}

/// The read half of a WebSocket connection.
pub struct WebSocketReceiver {
    stream: SplitStream<WsStream>,
}

impl FrameReceiver for WebSocketReceiver {
    async fn recv(&mut self) -> Result<TransportEvent, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(TransportEvent::Frame(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Binary(data))) => {
                    return Ok(TransportEvent::Frame(data.into()));
                }
                Some(Ok(Message::Close(frame))) => {
                    let code = frame
                        .map(|f| CloseCode::new(f.code.into()))
                        .unwrap_or(CloseCode::NO_STATUS);
                    return Ok(TransportEvent::Closed(code));
                }
                None => return Ok(TransportEvent::Closed(CloseCode::ABNORMAL)),
                Some(Ok(_)) => continue, // skip ping/pong/frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }
}
