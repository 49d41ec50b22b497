use std::fmt;
use std::future::Future;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[doc(inline)]
pub use tokio::sync::mpsc::error::TryRecvError;

/// A message interface for [services](Service).
///
/// Every message sent to a service passes through its inbox as a value of this type.
pub trait Interface: Send + 'static {}

/// Services without messages, such as servers driven by external input.
impl Interface for () {}

/// An error when [sending](Addr::send) a message to a service fails.
///
/// This only happens after the service has stopped receiving, usually during shutdown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SendError;

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to send message to service")
    }
}

impl std::error::Error for SendError {}

/// The address of a [`Service`].
///
/// The address allows to [send](Self::send) messages into the bounded inbox of a service as long
/// as the service is running. It can be freely cloned.
pub struct Addr<I: Interface> {
    tx: mpsc::Sender<I>,
    name: &'static str,
}

impl<I: Interface> Addr<I> {
    /// Sends a message to the service.
    ///
    /// If the inbox is full, this waits until the service has taken out a message. Fails with
    /// [`SendError`] once the receiving side has been closed.
    pub async fn send(&self, message: I) -> Result<(), SendError> {
        self.tx.send(message).await.map_err(|_| SendError)
    }

    /// Returns `true` if the service no longer accepts messages.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Returns the number of messages waiting in the inbox.
    pub fn queue_size(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }
}

impl<I: Interface> fmt::Debug for Addr<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Addr")
            .field("name", &self.name)
            .field("open", &!self.tx.is_closed())
            .field("queue_size", &self.queue_size())
            .finish()
    }
}

// Manually derive clone since we do not require `I: Clone`.
impl<I: Interface> Clone for Addr<I> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            name: self.name,
        }
    }
}

/// Inbound channel for messages sent through an [`Addr`].
///
/// The receiver is owned by the service implementation.
pub struct Receiver<I: Interface> {
    rx: mpsc::Receiver<I>,
    name: &'static str,
}

impl<I: Interface> Receiver<I> {
    /// Receives the next message, waiting until one is available.
    ///
    /// Returns `None` when the channel is closed and all queued messages have been received.
    pub async fn recv(&mut self) -> Option<I> {
        self.rx.recv().await
    }

    /// Receives the next message if one is queued, without waiting.
    pub fn try_recv(&mut self) -> Result<I, TryRecvError> {
        self.rx.try_recv()
    }

    /// Stops accepting new messages.
    ///
    /// Messages that are already queued can still be received. Senders waiting for capacity
    /// fail with [`SendError`].
    pub fn close(&mut self) {
        alertbridge_log::debug!(service = self.name, "closing inbox");
        self.rx.close();
    }
}

impl<I: Interface> fmt::Debug for Receiver<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receiver")
            .field("name", &self.name)
            .field("len", &self.rx.len())
            .finish()
    }
}

/// Creates a bounded inbox for a service.
///
/// # Panics
///
/// Panics if `capacity` is zero.
pub fn channel<I: Interface>(name: &'static str, capacity: usize) -> (Addr<I>, Receiver<I>) {
    let (tx, rx) = mpsc::channel(capacity);
    (Addr { tx, name }, Receiver { rx, name })
}

/// An asynchronous unit responding to messages.
///
/// Services receive messages from their [`Receiver`] and handle them in a single task. A
/// service runs until its inbox is closed and drained, which happens either when all
/// [addresses](Addr) have been dropped or when the service closes the inbox itself during
/// shutdown.
///
/// # Example
///
/// ```
/// use alertbridge_system::{Interface, Receiver, Service};
///
/// struct Ping;
///
/// impl Interface for Ping {}
///
/// struct PingService;
///
/// impl Service for PingService {
///     type Interface = Ping;
///
///     async fn run(self, mut rx: Receiver<Self::Interface>) {
///         while let Some(Ping) = rx.recv().await {
///             alertbridge_log::info!("ping");
///         }
///     }
/// }
///
/// # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
/// # rt.block_on(async {
/// let (addr, handle) = PingService.start(10);
/// addr.send(Ping).await.unwrap();
/// drop(addr);
/// handle.await.unwrap();
/// # });
/// ```
pub trait Service: Sized + Send + 'static {
    /// The interface of messages this service implements.
    type Interface: Interface;

    /// Handles messages until the inbox is closed and drained.
    fn run(self, rx: Receiver<Self::Interface>) -> impl Future<Output = ()> + Send + 'static;

    /// Starts the service on the current runtime with an inbox of the given capacity.
    ///
    /// Returns the address of the service and a handle that resolves when the service stops.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or when called outside of a Tokio runtime.
    fn start(self, capacity: usize) -> (Addr<Self::Interface>, JoinHandle<()>) {
        let (addr, rx) = channel(Self::name(), capacity);
        alertbridge_log::debug!(service = Self::name(), capacity, "starting service");
        let handle = tokio::spawn(self.run(rx));
        (addr, handle)
    }

    /// Returns a unique name for this service implementation.
    ///
    /// This is used for logging.
    fn name() -> &'static str {
        std::any::type_name::<Self>()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[derive(Debug, PartialEq)]
    struct Message(u32);

    impl Interface for Message {}

    struct CollectService(tokio::sync::mpsc::UnboundedSender<u32>);

    impl Service for CollectService {
        type Interface = Message;

        async fn run(self, mut rx: Receiver<Self::Interface>) {
            while let Some(Message(value)) = rx.recv().await {
                self.0.send(value).ok();
            }
        }
    }

    #[tokio::test]
    async fn test_service_receives_in_order() {
        let (tx, mut collected) = tokio::sync::mpsc::unbounded_channel();
        let (addr, handle) = CollectService(tx).start(4);

        for i in 0..10 {
            addr.send(Message(i)).await.unwrap();
        }

        drop(addr);
        handle.await.unwrap();

        let mut values = Vec::new();
        while let Ok(value) = collected.try_recv() {
            values.push(value);
        }
        assert_eq!(values, (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_send_waits_while_full() {
        let (addr, mut rx) = channel::<Message>("test", 2);

        addr.send(Message(1)).await.unwrap();
        addr.send(Message(2)).await.unwrap();
        assert_eq!(addr.queue_size(), 2);

        // The inbox is full, so the third message cannot be placed yet.
        let blocked = tokio::time::timeout(Duration::from_millis(50), addr.send(Message(3))).await;
        assert!(blocked.is_err());

        assert_eq!(rx.try_recv(), Ok(Message(1)));
        let unblocked =
            tokio::time::timeout(Duration::from_millis(50), addr.send(Message(3))).await;
        assert_eq!(unblocked, Ok(Ok(())));
        assert_eq!(addr.queue_size(), 2);
    }

    #[tokio::test]
    async fn test_try_recv_empty_and_disconnected() {
        let (addr, mut rx) = channel::<Message>("test", 1);
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

        addr.send(Message(7)).await.unwrap();
        drop(addr);

        assert_eq!(rx.try_recv(), Ok(Message(7)));
        assert_eq!(rx.try_recv(), Err(TryRecvError::Disconnected));
    }

    #[tokio::test]
    async fn test_close_rejects_new_messages() {
        let (addr, mut rx) = channel::<Message>("test", 4);
        addr.send(Message(1)).await.unwrap();

        rx.close();
        assert!(addr.is_closed());
        assert_eq!(addr.send(Message(2)).await, Err(SendError));

        // Queued messages are still delivered after closing.
        assert_eq!(rx.recv().await, Some(Message(1)));
        assert_eq!(rx.recv().await, None);
    }
}
