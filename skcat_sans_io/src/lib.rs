mod extension;
mod state;

pub use extension::{
    ExtensionPolicy, DEFLATE_FRAME, DEFLATE_STREAM, GOOGLE_MUX, OFFERED_EXTENSIONS,
};
pub use state::HandleState;

use state::Step;

use std::time::{Duration, Instant};

use bytes::Bytes;

/// Well-known path of the delta stream on the server.
pub const STREAM_PATH: &str = "/signalk/v1/stream";

/// The only WebSocket version in use; requesting no version means this one.
pub const LATEST_VERSION: u8 = 13;

#[derive(Clone, Copy, Debug)]
pub struct Timeouts {
    /// Minimum spacing between two connection attempts.
    pub retry_interval: Duration,
    /// Upper bound on a single pass of servicing transport events.
    pub service_interval: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_secs(2),
            service_interval: Duration::from_millis(500),
        }
    }
}

/// Where and how to connect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: u16,
    pub path: String,
    /// Use TLS, accepting self-signed certificates.
    pub tls: bool,
    /// Value of `Sec-WebSocket-Protocol`, if any.
    pub protocol: Option<String>,
    /// Requested WebSocket version, `None` for [`LATEST_VERSION`].
    pub version: Option<u8>,
    /// Parsed for compatibility, has no effect on the connection.
    pub long_lived: bool,
}

impl Target {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            path: STREAM_PATH.into(),
            tls: false,
            protocol: None,
            version: None,
            long_lived: false,
        }
    }

    /// `host:port`, with IPv6 literals bracketed.
    pub fn authority(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    pub fn url(&self) -> String {
        let scheme = if self.tls { "wss" } else { "ws" };
        format!("{scheme}://{}{}", self.authority(), self.path)
    }

    pub fn version(&self) -> u8 {
        self.version.unwrap_or(LATEST_VERSION)
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub target: Target,
    pub timeouts: Timeouts,
    pub extensions: ExtensionPolicy,
}

/// Issued by [`Supervisor::maybe_connect`]; the transport turns it into a handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectRequest {
    pub target: Target,
}

/// Everything the transport reports about the connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Established,
    Receive(Bytes),
    /// The connection was closed by either side or the stream ended.
    Closed,
    /// The connection attempt failed or the established connection broke.
    ConnectionError(String),
}

#[derive(Debug)]
struct RateLimiter {
    interval: Duration,
    last_attempt: Option<Instant>,
}

impl RateLimiter {
    /// Records `now` as the last attempt when permitted.
    fn permit(&mut self, now: Instant) -> bool {
        match self.last_attempt {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last_attempt = Some(now);
                true
            }
        }
    }

    fn next_permitted_at(&self) -> Option<Instant> {
        self.last_attempt.map(|last| last + self.interval)
    }
}

/// Keeps at most one connection alive, with a minimum spacing between attempts.
///
/// Performs no I/O: the driver asks [`Supervisor::maybe_connect`] whether to connect,
/// forwards every transport [`Event`] to [`Supervisor::handle_event`] and answers
/// extension queries through [`Supervisor::confirm_extension`].
#[derive(Debug)]
pub struct Supervisor {
    config: Config,
    handle: HandleState,
    limiter: RateLimiter,
}

impl Supervisor {
    pub fn new(config: Config) -> Self {
        let limiter = RateLimiter {
            interval: config.timeouts.retry_interval,
            last_attempt: None,
        };

        Self {
            config,
            handle: HandleState::Absent,
            limiter,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> HandleState {
        self.handle
    }

    /// Returns a request when no connection is present and the retry interval has passed
    /// since the previous attempt. The handle is [`HandleState::Pending`] afterwards.
    pub fn maybe_connect(&mut self, now: Instant) -> Option<ConnectRequest> {
        if self.handle.is_present() || !self.limiter.permit(now) {
            return None;
        }

        log::info!("Connecting to {}", self.config.target.url());
        self.handle = HandleState::Pending;
        Some(ConnectRequest {
            target: self.config.target.clone(),
        })
    }

    /// When [`Self::maybe_connect`] will next be permitted to connect, ignoring whether a
    /// connection is present.
    pub fn poll_connect_timeout(&self, now: Instant) -> Instant {
        self.limiter.next_permitted_at().map_or(now, |at| at.max(now))
    }

    pub fn on_established(&mut self) {
        self.handle_event(&Event::Established);
    }

    pub fn on_closed(&mut self) {
        self.handle_event(&Event::Closed);
    }

    pub fn on_error(&mut self, reason: impl Into<String>) {
        self.handle_event(&Event::ConnectionError(reason.into()));
    }

    pub fn handle_event(&mut self, event: &Event) {
        if let Some(change) = self.handle.step(event) {
            self.handle = change;
        }
    }

    pub fn confirm_extension(&self, extension: &str) -> bool {
        self.config.extensions.permits(extension)
    }
}

#[cfg(test)]
fn supervisor() -> Supervisor {
    let _ = env_logger::builder().is_test(true).try_init();

    Supervisor::new(Config {
        target: Target::new("localhost", 3000),
        timeouts: Timeouts::default(),
        extensions: ExtensionPolicy::default(),
    })
}

#[test]
fn first_attempt_is_immediate() {
    let mut supervisor = supervisor();
    let now = Instant::now();

    assert_eq!(supervisor.poll_connect_timeout(now), now);
    let request = supervisor.maybe_connect(now).expect("First attempt must be permitted");
    assert_eq!(request.target.url(), "ws://localhost:3000/signalk/v1/stream");
    assert_eq!(supervisor.state(), HandleState::Pending);
}

#[test]
fn no_second_connection_while_present() {
    let mut supervisor = supervisor();
    let now = Instant::now();

    assert!(supervisor.maybe_connect(now).is_some());
    assert!(supervisor.maybe_connect(now + Duration::from_secs(10)).is_none());

    supervisor.on_established();
    assert_eq!(supervisor.state(), HandleState::Active);
    assert!(supervisor.maybe_connect(now + Duration::from_secs(20)).is_none());
}

#[test]
fn close_within_interval_waits_for_interval() {
    let mut supervisor = supervisor();
    let now = Instant::now();

    assert!(supervisor.maybe_connect(now).is_some());
    supervisor.on_closed();
    assert_eq!(supervisor.state(), HandleState::Absent);

    assert!(supervisor.maybe_connect(now).is_none());
    assert!(supervisor
        .maybe_connect(now + Duration::from_millis(1999))
        .is_none());
    assert_eq!(
        supervisor.poll_connect_timeout(now),
        now + Duration::from_secs(2)
    );
    assert!(supervisor
        .maybe_connect(now + Duration::from_secs(2))
        .is_some());
}

#[test]
fn reconnect_after_error() {
    let mut supervisor = supervisor();
    let now = Instant::now();

    assert!(supervisor.maybe_connect(now).is_some());
    supervisor.on_established();
    supervisor.on_error("connection reset by peer");
    assert_eq!(supervisor.state(), HandleState::Absent);

    let later = now + Duration::from_secs(3);
    assert!(supervisor.maybe_connect(later).is_some());
    assert_eq!(supervisor.state(), HandleState::Pending);
}

#[test]
fn one_request_per_window() {
    let mut supervisor = supervisor();
    let start = Instant::now();

    // Every attempt fails immediately; poll every 500ms for 10s.
    let mut requests = 0;
    for tick in 0..20 {
        let now = start + Duration::from_millis(500) * tick;
        if supervisor.maybe_connect(now).is_some() {
            requests += 1;
            supervisor.on_error("refused");
        }
    }
    assert_eq!(requests, 5);
}

#[test]
fn receive_keeps_handle() {
    let mut supervisor = supervisor();
    let now = Instant::now();

    supervisor.maybe_connect(now);
    supervisor.on_established();
    supervisor.handle_event(&Event::Receive(Bytes::from_static(b"{}")));
    assert_eq!(supervisor.state(), HandleState::Active);
}

#[test]
fn at_most_one_connection() {
    #[derive(Clone, Copy, Debug)]
    enum Action {
        Connect,
        Established,
        Closed,
        Error,
        Receive,
    }
    const ACTIONS: [Action; 5] = [
        Action::Connect,
        Action::Established,
        Action::Closed,
        Action::Error,
        Action::Receive,
    ];

    // Every sequence of five actions, each one retry interval apart.
    for mut index in 0..ACTIONS.len().pow(5) {
        let mut supervisor = supervisor();
        let start = Instant::now();
        let mut sequence = vec![];

        for tick in 0..5u32 {
            let action = ACTIONS[index % ACTIONS.len()];
            index /= ACTIONS.len();
            sequence.push(action);

            let now = start + Duration::from_secs(2) * tick;
            let before = supervisor.state();
            match action {
                Action::Connect => {
                    let issued = supervisor.maybe_connect(now).is_some();
                    assert_eq!(issued, !before.is_present(), "{sequence:?}");
                }
                Action::Established => supervisor.on_established(),
                Action::Closed => supervisor.on_closed(),
                Action::Error => supervisor.on_error("error"),
                Action::Receive => supervisor.handle_event(&Event::Receive(Bytes::new())),
            }
        }
    }
}

#[test]
fn targets() {
    let mut target = Target::new("::1", 443);
    target.tls = true;
    assert_eq!(target.url(), "wss://[::1]:443/signalk/v1/stream");
    assert_eq!(target.version(), LATEST_VERSION);

    let target = Target::new("demo.signalk.org", 80);
    assert_eq!(target.authority(), "demo.signalk.org:80");
}
