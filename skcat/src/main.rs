use std::process::ExitCode;

use clap::{error::ErrorKind, Parser};
use tokio_util::codec::FramedWrite;

use skcat::{cli::Cli, Shutdown, Transport};
use skcat_codec::StreamPrinter;
use skcat_sans_io::{Config, Supervisor};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = match Cli::try_parse() {
        Ok(args) if !args.help => args,
        Ok(_) => return usage(),
        Err(e) => {
            if e.kind() != ErrorKind::MissingRequiredArgument {
                eprint!("{}", e.render());
            }
            return usage();
        }
    };

    skcat::logging::init(args.debug);

    let config = Config::from(args);
    let transport = match Transport::new(&config.target) {
        Ok(transport) => transport,
        Err(e) => {
            eprintln!("Creating websocket transport failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = Shutdown::listen();
    let mut stdout = FramedWrite::new(tokio::io::stdout(), StreamPrinter::new());

    skcat::run(Supervisor::new(config), transport, &shutdown, &mut stdout).await;

    ExitCode::SUCCESS
}

fn usage() -> ExitCode {
    eprint!("{}", skcat::cli::usage());
    ExitCode::FAILURE
}
