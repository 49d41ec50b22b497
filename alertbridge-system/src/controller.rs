use std::io;
use std::time::Duration;

use once_cell::sync::Lazy;
use tokio::sync::watch;

type Channel<T> = (watch::Sender<Option<T>>, watch::Receiver<Option<T>>);

/// Global [`Shutdown`] channel.
///
/// The receiver is kept alive so that sending never fails, even before any service subscribed.
static SHUTDOWN: Lazy<Channel<Shutdown>> = Lazy::new(|| watch::channel(None));

/// Notifies a service about an upcoming shutdown.
///
/// A graceful shutdown carries the `timeout` within which services must have finished their work.
/// Services should stop accepting new messages, complete what they already hold and then return.
/// A shutdown without a timeout requests an immediate stop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Shutdown {
    /// The timeout for this shutdown. `None` indicates an immediate forced shutdown.
    pub timeout: Option<Duration>,
}

/// Handle to the global shutdown signal, obtained from [`Controller::shutdown_handle`].
#[derive(Debug)]
pub struct ShutdownHandle(watch::Receiver<Option<Shutdown>>);

impl ShutdownHandle {
    /// Waits for the next shutdown request.
    ///
    /// If a shutdown has been requested before this handle was created, this resolves right away.
    pub async fn notified(&mut self) -> Shutdown {
        loop {
            if let Some(shutdown) = *self.0.borrow_and_update() {
                return shutdown;
            }

            if self.0.changed().await.is_err() {
                // The global sender is never dropped, so this is unreachable in practice.
                return Shutdown { timeout: None };
            }
        }
    }
}

/// Service to start and gracefully stop the system runtime.
///
/// The controller listens for `SIGINT`, `SIGQUIT` and `SIGTERM`. An interrupt or quit signal
/// requests an immediate shutdown, a terminate signal requests a graceful shutdown with the
/// configured timeout. Services subscribe through [`Controller::shutdown_handle`].
///
/// ### Example
///
/// ```
/// use std::time::Duration;
/// use alertbridge_system::Controller;
///
/// # let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
/// # rt.block_on(async {
/// Controller::start(Duration::from_secs(10));
/// let mut shutdown = Controller::shutdown_handle();
///
/// Controller::shutdown(Some(Duration::from_secs(1)));
/// assert_eq!(shutdown.notified().await.timeout, Some(Duration::from_secs(1)));
/// # });
/// ```
#[derive(Debug)]
pub struct Controller;

impl Controller {
    /// Starts listening for process signals on the current runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a Tokio runtime.
    pub fn start(shutdown_timeout: Duration) {
        tokio::spawn(async move {
            if let Err(error) = monitor_signals(shutdown_timeout).await {
                alertbridge_log::error!(
                    "failed to listen for shutdown signals: {}",
                    alertbridge_log::LogError(&error)
                );
            }
        });
    }

    /// Returns a handle that is notified when the system shuts down.
    pub fn shutdown_handle() -> ShutdownHandle {
        ShutdownHandle(SHUTDOWN.1.clone())
    }

    /// Requests a shutdown of all services.
    ///
    /// `None` requests an immediate shutdown, otherwise services have the given timeout to
    /// finish their work.
    pub fn shutdown(timeout: Option<Duration>) {
        SHUTDOWN.0.send_replace(Some(Shutdown { timeout }));
    }
}

#[cfg(unix)]
async fn monitor_signals(timeout: Duration) -> io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sig_int = signal(SignalKind::interrupt())?;
    let mut sig_quit = signal(SignalKind::quit())?;
    let mut sig_term = signal(SignalKind::terminate())?;

    loop {
        let timeout = tokio::select! {
            biased;

            Some(()) = sig_int.recv() => {
                alertbridge_log::info!("SIGINT received, exiting");
                None
            }
            Some(()) = sig_quit.recv() => {
                alertbridge_log::info!("SIGQUIT received, exiting");
                None
            }
            Some(()) = sig_term.recv() => {
                alertbridge_log::info!("SIGTERM received, stopping in {}s", timeout.as_secs());
                Some(timeout)
            }

            else => break,
        };

        Controller::shutdown(timeout);
    }

    Ok(())
}

#[cfg(windows)]
async fn monitor_signals(timeout: Duration) -> io::Result<()> {
    use tokio::signal::windows::{ctrl_break, ctrl_c, ctrl_close};

    let mut ctrl_c = ctrl_c()?;
    let mut ctrl_break = ctrl_break()?;
    let mut ctrl_close = ctrl_close()?;

    loop {
        let timeout = tokio::select! {
            biased;

            Some(()) = ctrl_c.recv() => {
                alertbridge_log::info!("CTRL-C received, exiting");
                None
            }
            Some(()) = ctrl_break.recv() => {
                alertbridge_log::info!("CTRL-BREAK received, exiting");
                None
            }
            Some(()) = ctrl_close.recv() => {
                alertbridge_log::info!("CTRL-CLOSE received, stopping in {}s", timeout.as_secs());
                Some(timeout)
            }

            else => break,
        };

        Controller::shutdown(timeout);
    }

    Ok(())
}
