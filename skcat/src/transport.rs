use std::{collections::VecDeque, future::Future, pin::Pin, time::Duration};

use futures::StreamExt as _;
use skcat_sans_io::{ConnectRequest, Event, Target, LATEST_VERSION, OFFERED_EXTENSIONS};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async_tls_with_config,
    tungstenite::{
        self,
        client::IntoClientRequest as _,
        handshake::client::{Request, Response},
        http::header::{HeaderValue, SEC_WEBSOCKET_EXTENSIONS, SEC_WEBSOCKET_PROTOCOL},
        Message,
    },
    Connector, MaybeTlsStream, WebSocketStream,
};
use tokio_util::bytes::Bytes;

use crate::Error;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Handshake =
    Pin<Box<dyn Future<Output = Result<(WsStream, Response), tungstenite::Error>>>>;

enum Connection {
    /// TCP connect, TLS and the HTTP upgrade, polled from [`Transport::service`].
    Handshaking(Handshake),
    Open(WsStream),
}

/// Owns the single WebSocket connection and turns everything that happens to it into
/// [`Event`]s.
///
/// [`Transport::connect`] only starts a handshake; its progress, like incoming data, is
/// reported by subsequent calls to [`Transport::service`].
pub struct Transport {
    /// Present when connecting over TLS; accepts self-signed certificates.
    tls: Option<native_tls::TlsConnector>,
    connection: Option<Connection>,
    backlog: VecDeque<Event>,
}

impl Transport {
    pub fn new(target: &Target) -> Result<Self, Error> {
        let version = target.version();
        if version != LATEST_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }

        let tls = if target.tls {
            let connector = native_tls::TlsConnector::builder()
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true)
                .build()?;
            Some(connector)
        } else {
            None
        };

        Ok(Self {
            tls,
            connection: None,
            backlog: VecDeque::new(),
        })
    }

    /// Begins connecting to `request.target`. `confirm_extension` is asked about every
    /// extension the handshake could offer; refused ones are left out.
    ///
    /// Failures are reported as [`Event::ConnectionError`] by the next [`Self::service`].
    pub fn connect<F>(&mut self, request: ConnectRequest, confirm_extension: F)
    where
        F: Fn(&str) -> bool,
    {
        if self.connection.is_some() {
            log::warn!("Ignoring connect request, a connection is already present");
            return;
        }

        let handshake = match handshake_request(&request.target, confirm_extension) {
            Ok(handshake) => handshake,
            Err(e) => {
                self.backlog.push_back(Event::ConnectionError(e.to_string()));
                return;
            }
        };

        let connector = self.tls.clone().map(Connector::NativeTls);
        log::debug!("Starting handshake with {}", request.target.authority());
        self.connection = Some(Connection::Handshaking(Box::pin(
            connect_async_tls_with_config(handshake, None, false, connector),
        )));
    }

    /// Waits up to `timeout` for the next event. Returns `None` if nothing happened.
    pub async fn service(&mut self, timeout: Duration) -> Option<Event> {
        if let Some(event) = self.backlog.pop_front() {
            return Some(event);
        }

        tokio::time::timeout(timeout, self.next_event())
            .await
            .unwrap_or(None)
    }

    /// Cancel safe: an interrupted handshake or read resumes on the next call.
    async fn next_event(&mut self) -> Option<Event> {
        loop {
            match self.connection.as_mut() {
                None => return std::future::pending().await,

                Some(Connection::Handshaking(handshake)) => {
                    return match handshake.as_mut().await {
                        Ok((stream, response)) => {
                            log::debug!("Handshake completed with status {}", response.status());
                            if let Some(extensions) = accepted_extensions(&response) {
                                // None of the offered extensions can be decoded here.
                                self.connection = None;
                                return Some(Event::ConnectionError(format!(
                                    "Server accepted unsupported extensions {extensions}, \
                                     refuse them with --undeflated and --nomux"
                                )));
                            }
                            self.connection = Some(Connection::Open(stream));
                            Some(Event::Established)
                        }
                        Err(e) => {
                            self.connection = None;
                            Some(Event::ConnectionError(e.to_string()))
                        }
                    };
                }

                Some(Connection::Open(stream)) => match stream.next().await {
                    Some(Ok(Message::Text(text))) => {
                        return Some(Event::Receive(Bytes::from(text)));
                    }
                    Some(Ok(Message::Binary(data))) => {
                        return Some(Event::Receive(Bytes::from(data)));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        // The stream ends once the close handshake completes.
                        log::debug!("Server sent close frame {frame:?}");
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                    Some(Err(e)) => {
                        self.connection = None;
                        return Some(Event::ConnectionError(e.to_string()));
                    }
                    None => {
                        self.connection = None;
                        return Some(Event::Closed);
                    }
                },
            }
        }
    }

    /// Closes the connection, if open, and releases the transport.
    pub async fn shutdown(mut self, timeout: Duration) {
        let Some(Connection::Open(mut stream)) = self.connection.take() else {
            return;
        };

        match tokio::time::timeout(timeout, stream.close(None)).await {
            Ok(Ok(())) => log::debug!("Connection closed"),
            Ok(Err(e)) => log::debug!("Failed to close connection cleanly: {e}"),
            Err(_) => log::debug!("Timed out closing connection"),
        }
    }
}

/// The non-empty value of `Sec-WebSocket-Extensions` in the handshake response.
fn accepted_extensions(response: &Response) -> Option<String> {
    let extensions = response.headers().get(SEC_WEBSOCKET_EXTENSIONS)?;
    let extensions = String::from_utf8_lossy(extensions.as_bytes()).trim().to_owned();
    (!extensions.is_empty()).then_some(extensions)
}

fn handshake_request<F>(target: &Target, confirm_extension: F) -> Result<Request, Error>
where
    F: Fn(&str) -> bool,
{
    let mut request = target.url().into_client_request()?;
    let headers = request.headers_mut();

    let offered: Vec<&str> = OFFERED_EXTENSIONS
        .into_iter()
        .filter(|&extension| confirm_extension(extension))
        .collect();
    if !offered.is_empty() {
        headers.insert(
            SEC_WEBSOCKET_EXTENSIONS,
            HeaderValue::from_str(&offered.join(", "))?,
        );
    }

    if let Some(protocol) = &target.protocol {
        headers.insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_str(protocol)?);
    }

    Ok(request)
}

#[cfg(test)]
mod handshake {
    use super::{accepted_extensions, handshake_request};
    use skcat_sans_io::{Target, GOOGLE_MUX};
    use tokio_tungstenite::tungstenite::http::Response;
    use tokio_tungstenite::tungstenite::http::header::{
        SEC_WEBSOCKET_EXTENSIONS, SEC_WEBSOCKET_PROTOCOL,
    };

    #[test]
    fn offers_all_extensions_by_default() {
        let request = handshake_request(&Target::new("localhost", 3000), |_| true).unwrap();
        assert_eq!(request.uri(), "ws://localhost:3000/signalk/v1/stream");
        assert_eq!(
            request.headers()[SEC_WEBSOCKET_EXTENSIONS],
            "deflate-stream, deflate-frame, x-google-mux"
        );
        assert!(request.headers().get(SEC_WEBSOCKET_PROTOCOL).is_none());
    }

    #[test]
    fn refused_extensions_are_left_out() {
        let request =
            handshake_request(&Target::new("localhost", 3000), |ext| ext == GOOGLE_MUX).unwrap();
        assert_eq!(request.headers()[SEC_WEBSOCKET_EXTENSIONS], "x-google-mux");

        let request = handshake_request(&Target::new("localhost", 3000), |_| false).unwrap();
        assert!(request.headers().get(SEC_WEBSOCKET_EXTENSIONS).is_none());
    }

    #[test]
    fn protocol_header() {
        let mut target = Target::new("localhost", 3000);
        target.protocol = Some("signalk".into());
        let request = handshake_request(&target, |_| true).unwrap();
        assert_eq!(request.headers()[SEC_WEBSOCKET_PROTOCOL], "signalk");
    }

    #[test]
    fn invalid_protocol_header() {
        let mut target = Target::new("localhost", 3000);
        target.protocol = Some("bad\nvalue".into());
        assert!(handshake_request(&target, |_| true).is_err());
    }

    #[test]
    fn accepted_extensions_in_response() {
        let response = Response::builder()
            .header(SEC_WEBSOCKET_EXTENSIONS, "deflate-frame")
            .body(None)
            .unwrap();
        assert_eq!(accepted_extensions(&response).as_deref(), Some("deflate-frame"));

        let response = Response::builder()
            .header(SEC_WEBSOCKET_EXTENSIONS, " ")
            .body(None)
            .unwrap();
        assert_eq!(accepted_extensions(&response), None);

        let response = Response::builder().body(None).unwrap();
        assert_eq!(accepted_extensions(&response), None);
    }
}
