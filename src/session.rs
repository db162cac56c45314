//! Stream sessions: one cancellable streaming exchange with the backend.
//!
//! A session moves through `Idle -> Connecting -> Open -> Draining -> Closed`.
//! `Closed` is reached exactly once, by whichever comes first of end of body,
//! the `[DONE]` sentinel, a transport error, or [`StreamHandle::close`]. The
//! state cell doubles as the terminal guard, so the notification for that
//! transition (`on_close` or `on_error`) fires once and every later attempt
//! is a no-op.

use futures::StreamExt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::ClientError;
use crate::decoder::LineDecoder;
use crate::handler::StreamHandler;
use crate::model::StreamRequest;
use crate::sse::{parse_record, Record};
use crate::transport::StreamTransport;

/// Lifecycle state of a stream session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// Created, request not issued yet.
    Idle = 0,
    /// Request issued, waiting for the response to begin.
    Connecting = 1,
    /// Response accepted, reading the body.
    Open = 2,
    /// The body or the sentinel said there is nothing more to read.
    Draining = 3,
    /// Terminal.
    Closed = 4,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Idle,
            1 => SessionState::Connecting,
            2 => SessionState::Open,
            3 => SessionState::Draining,
            _ => SessionState::Closed,
        }
    }
}

/// State shared between the read task and the caller's handle.
struct Shared {
    state: AtomicU8,
    handler: Box<dyn StreamHandler>,
    label: String,
}

impl Shared {
    fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn is_active(&self) -> bool {
        self.state() != SessionState::Closed
    }

    /// Non-terminal transition. Fails once the session is closed.
    fn advance(&self, to: SessionState) -> bool {
        self.state
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (current != SessionState::Closed as u8).then_some(to as u8)
            })
            .is_ok()
    }

    /// The terminal guard: true only for the first caller.
    fn terminate(&self) -> bool {
        self.state.swap(SessionState::Closed as u8, Ordering::SeqCst) != SessionState::Closed as u8
    }

    fn close(&self, cause: &'static str) {
        if self.terminate() {
            info!(session = %self.label, cause, "stream closed");
            self.handler.on_close();
        }
    }

    fn fail(&self, error: ClientError) {
        if error.is_cancelled() {
            self.close("cancelled by transport");
            return;
        }
        if self.terminate() {
            warn!(session = %self.label, error = %error, "stream failed");
            self.handler.on_error(error);
        } else {
            debug!(session = %self.label, error = %error, "error after close ignored");
        }
    }
}

/// One streaming exchange over a [`StreamTransport`].
///
/// `open` consumes the session; create a new one for every exchange.
///
/// # Example
/// ```ignore
/// let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
/// let handle = StreamSession::new(client.clone()).open(StreamRequest::new("Hi"), tx);
///
/// while let Some(notification) = rx.recv().await {
///     if notification.is_terminal() {
///         break;
///     }
/// }
/// ```
pub struct StreamSession<T> {
    transport: T,
}

impl<T> StreamSession<T>
where
    T: StreamTransport + 'static,
{
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Issue the request and start reading in a background task.
    ///
    /// `request.message` is forwarded as given, empty or not.
    ///
    /// # Panics
    /// Must be called from within a tokio runtime.
    pub fn open<H: StreamHandler>(self, request: StreamRequest, handler: H) -> StreamHandle {
        let label = request.session_id.clone().unwrap_or_else(|| "new".to_string());
        let shared = Arc::new(Shared {
            state: AtomicU8::new(SessionState::Idle as u8),
            handler: Box::new(handler),
            label,
        });
        let (cancel_tx, cancel_rx) = watch::channel(false);

        shared.advance(SessionState::Connecting);
        debug!(session = %shared.label, "opening stream");
        let task = tokio::spawn(read_loop(self.transport, request, shared.clone(), cancel_rx));

        StreamHandle {
            shared,
            cancel: cancel_tx,
            task,
        }
    }
}

/// Caller's handle on an open session.
///
/// Dropping the handle does not cancel the session; it keeps running until
/// it ends on its own. Call [`close`](Self::close) to cancel.
pub struct StreamHandle {
    shared: Arc<Shared>,
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl StreamHandle {
    /// Cancel the exchange.
    ///
    /// Aborts the in-flight request and fires `on_close` unless the session
    /// already ended. Safe to call any number of times.
    pub fn close(&self) {
        let _ = self.cancel.send(true);
        if self.shared.terminate() {
            info!(session = %self.shared.label, "stream closed by caller");
            self.shared.handler.on_close();
        }
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    pub fn is_closed(&self) -> bool {
        !self.shared.is_active()
    }

    /// Wait for the read task to finish.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            warn!(session = %self.shared.label, error = %e, "stream task did not complete");
        }
    }
}

/// Resolves when the handle requests cancellation. A handle dropped without
/// closing never cancels.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    let requested = rx.wait_for(|cancel| *cancel).await.map(|_| ());
    if requested.is_err() {
        std::future::pending::<()>().await;
    }
}

async fn read_loop<T: StreamTransport>(
    transport: T,
    request: StreamRequest,
    shared: Arc<Shared>,
    mut cancel: watch::Receiver<bool>,
) {
    if !shared.is_active() {
        return;
    }

    let opened = tokio::select! {
        biased;
        _ = cancelled(&mut cancel) => return,
        opened = transport.open(&request) => opened,
    };
    let mut body = match opened {
        Ok(body) => body,
        Err(e) => {
            shared.fail(e);
            return;
        }
    };

    if !shared.advance(SessionState::Open) {
        return;
    }
    info!(session = %shared.label, "stream opened");
    shared.handler.on_open();

    let mut decoder = LineDecoder::new();
    loop {
        if !shared.is_active() {
            return;
        }

        // Dropping `body` on return aborts the request.
        let next = tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => return,
            next = body.next() => next,
        };

        match next {
            Some(Ok(chunk)) => {
                for line in decoder.feed(&chunk) {
                    if !shared.is_active() {
                        return;
                    }
                    match parse_record(&line) {
                        Some(Record::Event(event)) => shared.handler.on_message(event),
                        Some(Record::Done) => {
                            debug!(session = %shared.label, "received [DONE]");
                            shared.advance(SessionState::Draining);
                            shared.close("sentinel");
                            return;
                        }
                        None => {}
                    }
                }
            }
            Some(Err(e)) => {
                shared.fail(e);
                return;
            }
            None => {
                let tail = decoder.finish();
                if !tail.is_empty() {
                    debug!(
                        session = %shared.label,
                        bytes = tail.len(),
                        "discarding unterminated record"
                    );
                }
                shared.advance(SessionState::Draining);
                shared.close("end of body");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::StreamNotification;
    use crate::model::StreamEvent;
    use crate::transport::ByteStream;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::stream;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    enum Script {
        /// Body made of these chunks, then end of body.
        Body(Vec<Result<Bytes, ClientError>>),
        /// These chunks, then a body that never ends.
        Stall(Vec<Result<Bytes, ClientError>>),
        /// The request fails before the body starts.
        Reject(ClientError),
        /// The response never begins.
        Hang,
    }

    struct FakeTransport {
        script: Mutex<Option<Script>>,
    }

    impl FakeTransport {
        fn new(script: Script) -> Self {
            Self {
                script: Mutex::new(Some(script)),
            }
        }
    }

    #[async_trait]
    impl StreamTransport for FakeTransport {
        async fn open(&self, _request: &StreamRequest) -> Result<ByteStream, ClientError> {
            let script = self.script.lock().unwrap().take().expect("opened twice");
            match script {
                Script::Body(chunks) => Ok(Box::pin(stream::iter(chunks))),
                Script::Stall(chunks) => {
                    Ok(Box::pin(stream::iter(chunks).chain(stream::pending())))
                }
                Script::Reject(e) => Err(e),
                Script::Hang => std::future::pending().await,
            }
        }
    }

    fn chunks(parts: &[&str]) -> Vec<Result<Bytes, ClientError>> {
        parts
            .iter()
            .map(|p| Ok(Bytes::copy_from_slice(p.as_bytes())))
            .collect()
    }

    fn open(script: Script) -> (StreamHandle, mpsc::UnboundedReceiver<StreamNotification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle =
            StreamSession::new(FakeTransport::new(script)).open(StreamRequest::new("hello"), tx);
        (handle, rx)
    }

    /// Wait for the task, then collect everything still queued.
    async fn finish(
        handle: StreamHandle,
        mut rx: mpsc::UnboundedReceiver<StreamNotification>,
    ) -> Vec<StreamNotification> {
        handle.join().await;
        let mut out = Vec::new();
        while let Some(n) = rx.recv().await {
            out.push(n);
        }
        out
    }

    fn count(notifications: &[StreamNotification], pred: fn(&StreamNotification) -> bool) -> usize {
        notifications.iter().filter(|n| pred(n)).count()
    }

    fn messages(notifications: &[StreamNotification]) -> Vec<StreamEvent> {
        notifications
            .iter()
            .filter_map(|n| match n {
                StreamNotification::Message(e) => Some(e.clone()),
                _ => None,
            })
            .collect()
    }

    fn is_close(n: &StreamNotification) -> bool {
        matches!(n, StreamNotification::Close)
    }

    fn is_error(n: &StreamNotification) -> bool {
        matches!(n, StreamNotification::Error(_))
    }

    #[tokio::test]
    async fn test_delivers_content_final_then_one_close() {
        let (handle, rx) = open(Script::Body(chunks(&[
            "data: {\"content\":\"a\"}\n\n",
            "data: {\"content\":\"b\",\"is_final\":true}\n\ndata: [DONE]\n",
        ])));
        let out = finish(handle, rx).await;

        assert!(matches!(out[0], StreamNotification::Open));
        assert_eq!(
            messages(&out),
            vec![
                StreamEvent::Content { text: "a".into() },
                StreamEvent::Final { text: "b".into(), tool_calls: vec![] },
            ]
        );
        assert!(is_close(out.last().unwrap()));
        assert_eq!(count(&out, is_close), 1);
        assert_eq!(count(&out, is_error), 0);
    }

    #[tokio::test]
    async fn test_malformed_payload_becomes_raw_and_processing_continues() {
        let (handle, rx) = open(Script::Body(chunks(&[
            "data: not-json\n",
            "data: {\"content\":\"after\"}\n",
        ])));
        let out = finish(handle, rx).await;

        assert_eq!(
            messages(&out),
            vec![
                StreamEvent::Raw { text: "not-json".into() },
                StreamEvent::Content { text: "after".into() },
            ]
        );
        assert_eq!(count(&out, is_close), 1);
        assert_eq!(count(&out, is_error), 0);
    }

    #[tokio::test]
    async fn test_records_after_sentinel_are_not_delivered() {
        let (handle, rx) = open(Script::Stall(chunks(&[
            "data: {\"content\":\"a\"}\ndata: [DONE]\ndata: {\"content\":\"late\"}\n",
        ])));
        let out = finish(handle, rx).await;

        assert_eq!(messages(&out), vec![StreamEvent::Content { text: "a".into() }]);
        assert_eq!(count(&out, is_close), 1);
    }

    #[tokio::test]
    async fn test_heartbeats_and_other_fields_are_ignored() {
        let (handle, rx) = open(Script::Body(chunks(&[
            ": comment\nevent: message\ndata: \ndata:    \n\ndata: {\"content\":\"x\"}\n",
        ])));
        let out = finish(handle, rx).await;
        assert_eq!(messages(&out), vec![StreamEvent::Content { text: "x".into() }]);
    }

    #[tokio::test]
    async fn test_unterminated_tail_is_dropped_at_end_of_body() {
        let (handle, rx) = open(Script::Body(chunks(&[
            "data: {\"content\":\"a\"}\n",
            "data: {\"content\":\"cut",
        ])));
        let out = finish(handle, rx).await;

        assert_eq!(messages(&out), vec![StreamEvent::Content { text: "a".into() }]);
        assert_eq!(count(&out, is_close), 1);
    }

    #[tokio::test]
    async fn test_multibyte_text_split_across_chunks() {
        let body = "data: {\"content\":\"héllo 世界\"}\n".as_bytes();
        let split = body.iter().position(|b| *b == 0xE4).unwrap() + 1;
        let (handle, rx) = open(Script::Body(vec![
            Ok(Bytes::copy_from_slice(&body[..split])),
            Ok(Bytes::copy_from_slice(&body[split..])),
        ]));
        let out = finish(handle, rx).await;

        assert_eq!(messages(&out), vec![StreamEvent::Content { text: "héllo 世界".into() }]);
    }

    #[tokio::test]
    async fn test_error_status_reports_one_error_and_no_messages() {
        let (handle, rx) = open(Script::Reject(ClientError::Status {
            status: 500,
            body: "Internal Server Error".into(),
        }));
        let out = finish(handle, rx).await;

        assert_eq!(count(&out, is_error), 1);
        assert!(messages(&out).is_empty());
        assert_eq!(count(&out, is_close), 0);
        assert!(matches!(
            out.last(),
            Some(StreamNotification::Error(ClientError::Status { status: 500, .. }))
        ));
    }

    #[tokio::test]
    async fn test_read_failure_mid_stream_is_terminal() {
        let mut body = chunks(&["data: {\"content\":\"a\"}\n"]);
        body.push(Err(ClientError::Transport("connection reset".into())));
        body.extend(chunks(&["data: {\"content\":\"b\"}\n"]));
        let (handle, rx) = open(Script::Body(body));
        let out = finish(handle, rx).await;

        assert_eq!(messages(&out), vec![StreamEvent::Content { text: "a".into() }]);
        assert_eq!(count(&out, is_error), 1);
        assert_eq!(count(&out, is_close), 0);
    }

    #[tokio::test]
    async fn test_transport_cancellation_is_reported_as_close() {
        let (handle, rx) = open(Script::Reject(ClientError::Cancelled));
        let out = finish(handle, rx).await;

        assert_eq!(count(&out, is_error), 0);
        assert_eq!(count(&out, is_close), 1);
    }

    #[tokio::test]
    async fn test_cancel_mid_stream_closes_once_without_error() {
        let (handle, mut rx) = open(Script::Stall(chunks(&[
            "data: {\"content\":\"a\"}\n",
            "data: {\"content\":\"b\"}\n",
        ])));

        assert!(matches!(rx.recv().await, Some(StreamNotification::Open)));
        assert!(matches!(rx.recv().await, Some(StreamNotification::Message(_))));
        assert!(matches!(rx.recv().await, Some(StreamNotification::Message(_))));

        handle.close();
        assert_eq!(handle.state(), SessionState::Closed);
        let out = finish(handle, rx).await;

        assert_eq!(count(&out, is_error), 0);
        assert_eq!(count(&out, is_close), 1);
    }

    #[tokio::test]
    async fn test_close_twice_fires_close_once() {
        let (handle, rx) = open(Script::Stall(vec![]));
        handle.close();
        handle.close();
        assert!(handle.is_closed());
        let out = finish(handle, rx).await;

        assert_eq!(count(&out, is_close), 1);
        assert_eq!(count(&out, is_error), 0);
    }

    #[tokio::test]
    async fn test_close_while_connecting_skips_open() {
        let (handle, rx) = open(Script::Hang);
        assert_eq!(handle.state(), SessionState::Connecting);
        handle.close();
        let out = finish(handle, rx).await;

        assert_eq!(out.len(), 1);
        assert!(is_close(&out[0]));
    }

    #[tokio::test]
    async fn test_close_after_natural_end_is_a_no_op() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let transport = FakeTransport::new(Script::Body(chunks(&["data: [DONE]\n"])));
        let handle = StreamSession::new(transport).open(StreamRequest::new("hi"), tx);

        while let Some(n) = rx.recv().await {
            if n.is_terminal() {
                break;
            }
        }
        assert_eq!(handle.state(), SessionState::Closed);

        handle.close();
        let rest = finish(handle, rx).await;
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_sessions_are_independent() {
        let (first, first_rx) = open(Script::Stall(chunks(&["data: {\"content\":\"one\"}\n"])));
        let (second, second_rx) = open(Script::Body(chunks(&["data: {\"content\":\"two\"}\n"])));

        first.close();
        let first_out = finish(first, first_rx).await;
        let second_out = finish(second, second_rx).await;

        assert_eq!(count(&first_out, is_close), 1);
        assert_eq!(count(&second_out, is_close), 1);
        assert_eq!(messages(&second_out), vec![StreamEvent::Content { text: "two".into() }]);
    }

    #[tokio::test]
    async fn test_transport_can_be_shared_behind_arc() {
        let transport: Arc<dyn StreamTransport> = Arc::new(FakeTransport::new(Script::Body(
            chunks(&["data: {\"content\":\"x\"}\n"]),
        )));
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = StreamSession::new(transport).open(StreamRequest::new("hi"), tx);
        let out = finish(handle, rx).await;

        assert_eq!(messages(&out), vec![StreamEvent::Content { text: "x".into() }]);
        assert_eq!(count(&out, is_close), 1);
    }
}
