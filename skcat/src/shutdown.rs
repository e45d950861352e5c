use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Set once by an interrupt, never cleared.
#[derive(Clone, Debug, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    /// Spawns a listener that triggers the returned flag on SIGINT.
    pub fn listen() -> Self {
        let shutdown = Self::default();

        let flag = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    log::info!("Interrupted, shutting down");
                    flag.trigger();
                }
                Err(e) => log::error!("Failed to listen for interrupts: {e}"),
            }
        });

        shutdown
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
