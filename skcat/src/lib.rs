pub mod cli;
pub mod logging;

mod error;
mod shutdown;
mod transport;

pub use error::Error;
pub use shutdown::Shutdown;
pub use transport::Transport;

use std::time::Instant;

use futures::{Sink, SinkExt as _};
use skcat_sans_io::{Event, Supervisor};
use tokio_util::bytes::Bytes;

/// Connects, prints and reconnects until `shutdown` is triggered.
///
/// Every pass first lets the supervisor start a connection if none is present, then
/// services the transport for at most one service interval. Received chunks go to
/// `output`, typically a [`skcat_codec::StreamPrinter`] framed over stdout.
pub async fn run<O>(
    mut supervisor: Supervisor,
    mut transport: Transport,
    shutdown: &Shutdown,
    output: &mut O,
) where
    O: Sink<Bytes, Error = std::io::Error> + Unpin,
{
    let service_interval = supervisor.config().timeouts.service_interval;

    while !shutdown.is_triggered() {
        if let Some(request) = supervisor.maybe_connect(Instant::now()) {
            transport.connect(request, |extension| supervisor.confirm_extension(extension));
        }

        let Some(event) = transport.service(service_interval).await else {
            continue;
        };

        if let Event::Receive(chunk) = &event {
            if let Err(e) = output.send(chunk.clone()).await {
                log::error!("Failed to write to stdout: {e}");
            }
        }
        supervisor.handle_event(&event);

        if matches!(event, Event::Closed | Event::ConnectionError(_)) {
            let now = Instant::now();
            let retry_in = supervisor.poll_connect_timeout(now).duration_since(now);
            log::info!("Reconnecting in {:.1}s", retry_in.as_secs_f64());
        }
    }

    log::error!("Exiting");
    transport.shutdown(service_interval).await;
}
