use std::fmt;

use bytes::Bytes;
use tokio::sync::oneshot;

use crate::protocol::BodyError;

/// A piece of the request body stream delivered to a [`BodyHandler`].
#[derive(Debug)]
pub enum BodyChunk {
    /// New body bytes. The [`Ack`] must be released when the handler is done with them.
    Chunk(Bytes, Ack),
    /// A trailer field. Request trailers are currently skipped by the decoder,
    /// so handlers only need this arm for exhaustiveness.
    Trailer(String, String),
    /// The body is complete
    End,
    /// The body stream broke, e.g. the peer closed the connection mid-body
    Failed(BodyError),
}

/// Release signal for a delivered body chunk.
///
/// Dropping an `Ack` without calling [`Ack::ack`] also releases the chunk.
pub struct Ack {
    sender: oneshot::Sender<()>,
}

impl Ack {
    pub(crate) fn channel() -> (Ack, oneshot::Receiver<()>) {
        let (sender, receiver) = oneshot::channel();
        (Ack { sender }, receiver)
    }

    /// Signals the engine that the chunk's bytes have been consumed.
    pub fn ack(self) {
        // the receiver is gone when the connection was torn down meanwhile
        let _ = self.sender.send(());
    }
}

impl fmt::Debug for Ack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ack").field("released", &self.sender.is_closed()).finish()
    }
}

/// Callback receiving body chunks. Setting the `bool` to `true` stops delivery.
pub type BodyHandler = Box<dyn FnMut(BodyChunk, &mut bool) + Send + 'static>;

/// What the engine should do with the request body.
pub enum BodyProcessing {
    /// Drain the body without calling the application
    DiscardBody,
    /// Deliver every chunk, then `End`, to the handler
    ProcessBody(BodyHandler),
}

impl BodyProcessing {
    /// Wraps a closure into [`BodyProcessing::ProcessBody`].
    pub fn process<F>(handler: F) -> Self
    where
        F: FnMut(BodyChunk, &mut bool) + Send + 'static,
    {
        BodyProcessing::ProcessBody(Box::new(handler))
    }
}

impl fmt::Debug for BodyProcessing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodyProcessing::DiscardBody => f.write_str("DiscardBody"),
            BodyProcessing::ProcessBody(_) => f.write_str("ProcessBody(..)"),
        }
    }
}
