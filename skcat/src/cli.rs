use clap::{CommandFactory, Parser};
use skcat_sans_io::{Config, ExtensionPolicy, Target, Timeouts, STREAM_PATH};

/// SignalK websockets test client
#[derive(Parser, Debug)]
#[command(name = "skcat", disable_help_flag = true)]
pub struct Cli {
    /// Server host name or address
    pub host: String,

    /// Server port
    #[arg(short, long, default_value_t = 3000)]
    pub port: u16,

    /// Connect over TLS, accepting self-signed certificates
    #[arg(short, long)]
    pub ssl: bool,

    /// Refuse the deflate-stream and deflate-frame extensions
    #[arg(short, long)]
    pub undeflated: bool,

    /// Refuse the x-google-mux extension
    #[arg(short, long)]
    pub nomux: bool,

    /// Mark the connection as long-lived (no effect)
    #[arg(short, long)]
    pub longlived: bool,

    /// WebSocket version, latest if omitted
    #[arg(short, long, value_name = "VER")]
    pub version: Option<u8>,

    /// WebSocket subprotocol to request
    #[arg(short = 'P', long)]
    pub protocol: Option<String>,

    /// Log bitfield: 1 error, 2 warn, 4 notice, 8 info, 16 debug
    #[arg(short, long, value_name = "BITFIELD")]
    pub debug: Option<u32>,

    /// Print usage
    #[arg(short, long)]
    pub help: bool,
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        Config {
            target: Target {
                host: cli.host,
                port: cli.port,
                path: STREAM_PATH.into(),
                tls: cli.ssl,
                protocol: cli.protocol,
                version: cli.version,
                long_lived: cli.longlived,
            },
            timeouts: Timeouts::default(),
            extensions: ExtensionPolicy {
                deny_deflate: cli.undeflated,
                deny_mux: cli.nomux,
            },
        }
    }
}

pub fn usage() -> String {
    Cli::command().render_help().to_string()
}

#[cfg(test)]
mod parse {
    use super::Cli;
    use clap::Parser;
    use skcat_sans_io::Config;

    #[test]
    fn defaults() {
        let config: Config = Cli::try_parse_from(["skcat", "demo.signalk.org"])
            .unwrap()
            .into();
        assert_eq!(config.target.url(), "ws://demo.signalk.org:3000/signalk/v1/stream");
        assert!(!config.extensions.deny_deflate);
        assert!(!config.extensions.deny_mux);
        assert!(!config.target.long_lived);
        assert_eq!(config.target.version, None);
        assert_eq!(config.target.protocol, None);
    }

    #[test]
    fn long_flags() {
        let cli = Cli::try_parse_from([
            "skcat",
            "localhost",
            "--port=8443",
            "--ssl",
            "--undeflated",
            "--nomux",
            "--longlived",
            "--version=13",
            "--debug=7",
        ])
        .unwrap();
        assert_eq!(cli.debug, Some(7));

        let config: Config = cli.into();
        assert_eq!(config.target.url(), "wss://localhost:8443/signalk/v1/stream");
        assert!(config.extensions.deny_deflate);
        assert!(config.extensions.deny_mux);
        assert!(config.target.long_lived);
        assert_eq!(config.target.version, Some(13));
    }

    #[test]
    fn short_flags() {
        let cli =
            Cli::try_parse_from(["skcat", "-p", "80", "-s", "-u", "-n", "-l", "-d", "31", "host"])
                .unwrap();
        assert_eq!(cli.port, 80);
        assert!(cli.ssl && cli.undeflated && cli.nomux && cli.longlived);
        assert_eq!(cli.debug, Some(31));
        assert_eq!(cli.host, "host");
    }

    #[test]
    fn missing_host() {
        assert!(Cli::try_parse_from(["skcat"]).is_err());
        assert!(Cli::try_parse_from(["skcat", "-s"]).is_err());
    }

    #[test]
    fn help_is_a_flag() {
        let cli = Cli::try_parse_from(["skcat", "-h", "host"]).unwrap();
        assert!(cli.help);
    }

    #[test]
    fn usage_mentions_options() {
        let usage = super::usage();
        assert!(usage.starts_with("SignalK websockets test client"));
        assert!(usage.contains("Usage:"));
        assert!(usage.contains("--undeflated"));
    }
}
