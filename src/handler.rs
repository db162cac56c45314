//! Notification sinks for stream sessions.

use tokio::sync::mpsc;

use crate::client::ClientError;
use crate::model::StreamEvent;

/// Receives the lifecycle notifications of one stream session.
///
/// All methods default to no-ops. `on_open` fires at most once, `on_message`
/// once per event in arrival order, and exactly one of `on_error` or
/// `on_close` ends the session.
///
/// Notifications are delivered from the session's read task, except for the
/// `on_close` triggered by [`StreamHandle::close`](crate::session::StreamHandle::close),
/// which runs on the caller's thread.
pub trait StreamHandler: Send + Sync + 'static {
    fn on_open(&self) {}

    fn on_message(&self, _event: StreamEvent) {}

    fn on_error(&self, _error: ClientError) {}

    fn on_close(&self) {}
}

/// A notification, as delivered to channel-based listeners.
#[derive(Debug)]
pub enum StreamNotification {
    Open,
    Message(StreamEvent),
    Error(ClientError),
    Close,
}

impl StreamNotification {
    /// True for the notification that ends a session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamNotification::Error(_) | StreamNotification::Close)
    }
}

// A dropped receiver means nobody is listening any more; sends are best effort.
impl StreamHandler for mpsc::UnboundedSender<StreamNotification> {
    fn on_open(&self) {
        let _ = self.send(StreamNotification::Open);
    }

    fn on_message(&self, event: StreamEvent) {
        let _ = self.send(StreamNotification::Message(event));
    }

    fn on_error(&self, error: ClientError) {
        let _ = self.send(StreamNotification::Error(error));
    }

    fn on_close(&self) {
        let _ = self.send(StreamNotification::Close);
    }
}

type Callback<T> = Box<dyn Fn(T) + Send + Sync>;

/// Closure-based handler with every callback optional.
///
/// # Example
/// ```
/// use chatwire::handler::Callbacks;
///
/// let callbacks = Callbacks::new()
///     .with_message(|event| print!("{}", event.text()))
///     .with_close(|| println!());
/// ```
#[derive(Default)]
pub struct Callbacks {
    open: Option<Callback<()>>,
    message: Option<Callback<StreamEvent>>,
    error: Option<Callback<ClientError>>,
    close: Option<Callback<()>>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_open(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.open = Some(Box::new(move |()| f()));
        self
    }

    pub fn with_message(mut self, f: impl Fn(StreamEvent) + Send + Sync + 'static) -> Self {
        self.message = Some(Box::new(f));
        self
    }

    pub fn with_error(mut self, f: impl Fn(ClientError) + Send + Sync + 'static) -> Self {
        self.error = Some(Box::new(f));
        self
    }

    pub fn with_close(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.close = Some(Box::new(move |()| f()));
        self
    }
}

impl StreamHandler for Callbacks {
    fn on_open(&self) {
        if let Some(f) = &self.open {
            f(());
        }
    }

    fn on_message(&self, event: StreamEvent) {
        if let Some(f) = &self.message {
            f(event);
        }
    }

    fn on_error(&self, error: ClientError) {
        if let Some(f) = &self.error {
            f(error);
        }
    }

    fn on_close(&self) {
        if let Some(f) = &self.close {
            f(());
        }
    }
}
