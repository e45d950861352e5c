/// Legacy per-frame/per-stream compression extensions.
pub const DEFLATE_STREAM: &str = "deflate-stream";
pub const DEFLATE_FRAME: &str = "deflate-frame";
/// Multiplexing extension.
pub const GOOGLE_MUX: &str = "x-google-mux";

/// Extensions the transport may advertise in its handshake, subject to [`ExtensionPolicy`].
pub const OFFERED_EXTENSIONS: [&str; 3] = [DEFLATE_STREAM, DEFLATE_FRAME, GOOGLE_MUX];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExtensionPolicy {
    /// Refuse [`DEFLATE_STREAM`] and [`DEFLATE_FRAME`].
    pub deny_deflate: bool,
    /// Refuse [`GOOGLE_MUX`].
    pub deny_mux: bool,
}

impl ExtensionPolicy {
    /// Answers the transport asking whether `extension` may be negotiated.
    /// Unknown extensions are always permitted.
    pub fn permits(&self, extension: &str) -> bool {
        let denied = match extension {
            DEFLATE_STREAM | DEFLATE_FRAME => self.deny_deflate,
            GOOGLE_MUX => self.deny_mux,
            _ => false,
        };

        if denied {
            log::info!("Denied {extension} extension");
        }
        !denied
    }
}
