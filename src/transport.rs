//! The transport seam used by stream sessions.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

use crate::client::ClientError;
use crate::model::StreamRequest;

/// Response body of a streaming request, as raw byte chunks in arrival order.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ClientError>> + Send>>;

/// Issues the streaming request for a [`StreamSession`](crate::session::StreamSession).
///
/// `open` resolves once the response has begun: headers received and the
/// status checked. A non-success status must be returned as an error, never
/// as a body. Dropping the returned stream aborts the request.
///
/// [`ChatClient`](crate::client::ChatClient) is the HTTP implementation; tests
/// and alternative backends can provide their own.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    async fn open(&self, request: &StreamRequest) -> Result<ByteStream, ClientError>;
}

#[async_trait]
impl<T: StreamTransport + ?Sized> StreamTransport for std::sync::Arc<T> {
    async fn open(&self, request: &StreamRequest) -> Result<ByteStream, ClientError> {
        (**self).open(request).await
    }
}
