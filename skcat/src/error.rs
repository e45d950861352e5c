use tokio_tungstenite::tungstenite::{self, http::header::InvalidHeaderValue};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Unsupported WebSocket version {0}, only {latest} is available", latest = skcat_sans_io::LATEST_VERSION)]
    UnsupportedVersion(u8),

    #[error("Failed to set up TLS: {0}")]
    Tls(#[from] native_tls::Error),

    #[error("Invalid handshake header: {0}")]
    Header(#[from] InvalidHeaderValue),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
}
