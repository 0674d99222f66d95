//! Shutdown requests and OS signal delivery.
//!
//! [`ShutdownFlag`] is a shared counter: non-zero means a shutdown was
//! requested. Lanes check it before starting each event; the level machine
//! checks it before descending. The only writers are
//! [`ShutdownFlag::request`] and the [`SignalListener`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio::sync::oneshot;
use tracing::{error, warn};

/// Process-wide shutdown request counter.
#[derive(Clone, Debug, Default)]
pub struct ShutdownFlag(Arc<AtomicUsize>);

impl ShutdownFlag {
    /// A flag with no request pending.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether shutdown has been requested.
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Acquire) > 0
    }

    /// Request shutdown. Called on signal delivery.
    pub fn request(&self) {
        self.0.fetch_add(1, Ordering::AcqRel);
    }

    /// Number of requests received.
    pub fn requests(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }
}

/// Waits for a termination signal on a dedicated thread and raises the
/// shutdown flag when one arrives.
///
/// The listener thread is stopped and joined on drop.
pub struct SignalListener {
    stop_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl SignalListener {
    /// Start listening for SIGINT, SIGTERM and SIGQUIT (Ctrl-C elsewhere).
    pub fn spawn(flag: ShutdownFlag) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let handle = thread::Builder::new()
            .name("quark-signals".into())
            .spawn(move || {
                runtime.block_on(async move {
                    tokio::select! {
                        result = wait_for_shutdown_signal() => match result {
                            Ok(()) => {
                                warn!("termination signal received, requesting shutdown");
                                flag.request();
                            }
                            Err(e) => error!(error = %e, "could not install signal handlers"),
                        },
                        _ = stop_rx => {}
                    }
                });
            })?;
        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }
}

impl Drop for SignalListener {
    fn drop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = sigint.recv() => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
