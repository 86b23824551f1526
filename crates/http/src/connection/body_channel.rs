use bytes::Bytes;
use tracing::{debug, trace};

use crate::protocol::body::{Ack, BodyChunk, BodyProcessing};
use crate::protocol::{BodyError, ConnectionError};

/// Hands request body bytes to the mode chosen by the handler.
///
/// Chunks go out one at a time: [`BodyChannel::deliver`] resolves only once
/// the handler released the chunk's [`Ack`], and the connection does not read
/// from the socket meanwhile.
#[derive(Debug)]
pub struct BodyChannel {
    mode: BodyProcessing,
    state: DeliveryState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeliveryState {
    Open,
    Stopped,
    Finished,
}

impl BodyChannel {
    pub fn new(mode: BodyProcessing) -> Self {
        Self { mode, state: DeliveryState::Open }
    }

    /// A channel that drops everything, for requests nobody will answer.
    pub fn discard() -> Self {
        Self::new(BodyProcessing::DiscardBody)
    }

    pub async fn deliver(&mut self, bytes: Bytes) -> Result<(), ConnectionError> {
        let BodyProcessing::ProcessBody(handler) = &mut self.mode else {
            trace!(len = bytes.len(), "discarding request body bytes");
            return Ok(());
        };
        if self.state != DeliveryState::Open {
            return Err(ConnectionError::BodyProcessingAborted);
        }

        let (ack, released) = Ack::channel();
        let mut stop = false;
        handler(BodyChunk::Chunk(bytes, ack), &mut stop);
        if stop {
            debug!("body handler stopped processing");
            self.state = DeliveryState::Stopped;
            return Err(ConnectionError::BodyProcessingAborted);
        }

        // a dropped ack releases the chunk as well
        let _ = released.await;
        Ok(())
    }

    /// Delivers `End` once the whole body was read.
    pub fn finish(&mut self) {
        if let BodyProcessing::ProcessBody(handler) = &mut self.mode
            && self.state == DeliveryState::Open
        {
            let mut stop = false;
            handler(BodyChunk::End, &mut stop);
        }
        self.state = DeliveryState::Finished;
    }

    /// Tells the handler the body will never complete.
    pub fn fail(&mut self, error: BodyError) {
        if let BodyProcessing::ProcessBody(handler) = &mut self.mode
            && self.state == DeliveryState::Open
        {
            let mut stop = false;
            handler(BodyChunk::Failed(error), &mut stop);
        }
        self.state = DeliveryState::Finished;
    }

    pub fn is_finished(&self) -> bool {
        self.state == DeliveryState::Finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recording() -> (BodyProcessing, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(vec![]));
        let log = Arc::clone(&seen);
        let mode = BodyProcessing::process(move |chunk, _stop| {
            let entry = match chunk {
                BodyChunk::Chunk(bytes, ack) => {
                    ack.ack();
                    String::from_utf8_lossy(&bytes).into_owned()
                }
                BodyChunk::Trailer(name, _) => format!("trailer {name}"),
                BodyChunk::End => "end".to_string(),
                BodyChunk::Failed(e) => format!("failed: {e}"),
            };
            log.lock().unwrap().push(entry);
        });
        (mode, seen)
    }

    #[tokio::test]
    async fn delivers_chunks_then_end() {
        let (mode, seen) = recording();
        let mut channel = BodyChannel::new(mode);

        channel.deliver(Bytes::from_static(b"hello")).await.unwrap();
        channel.deliver(Bytes::from_static(b"world")).await.unwrap();
        channel.finish();
        channel.finish();

        assert_eq!(*seen.lock().unwrap(), vec!["hello", "world", "end"]);
    }

    #[tokio::test]
    async fn waits_for_ack() {
        let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();
        let mut channel = BodyChannel::new(BodyProcessing::process(move |chunk, _stop| {
            if let BodyChunk::Chunk(_, ack) = chunk {
                sender.send(ack).unwrap();
            }
        }));

        let delivery = tokio::spawn(async move {
            channel.deliver(Bytes::from_static(b"slow")).await.unwrap();
            channel
        });

        let ack = receiver.recv().await.unwrap();
        tokio::task::yield_now().await;
        assert!(!delivery.is_finished());

        ack.ack();
        let channel = delivery.await.unwrap();
        assert!(!channel.is_finished());
    }

    #[tokio::test]
    async fn stop_aborts_delivery() {
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);
        let mut channel = BodyChannel::new(BodyProcessing::process(move |_chunk, stop| {
            *counter.lock().unwrap() += 1;
            *stop = true;
        }));

        let err = channel.deliver(Bytes::from_static(b"first")).await.unwrap_err();
        assert!(matches!(err, ConnectionError::BodyProcessingAborted));
        assert!(channel.deliver(Bytes::from_static(b"second")).await.is_err());
        channel.finish();

        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn failure_is_reported_once() {
        let (mode, seen) = recording();
        let mut channel = BodyChannel::new(mode);
        channel.fail(BodyError::UnexpectedEof);
        channel.fail(BodyError::Reset);

        assert_eq!(seen.lock().unwrap().len(), 1);
        assert!(seen.lock().unwrap()[0].starts_with("failed"));
    }

    #[tokio::test]
    async fn discard_swallows_everything() {
        let mut channel = BodyChannel::discard();
        channel.deliver(Bytes::from_static(b"ignored")).await.unwrap();
        channel.finish();
        assert!(channel.is_finished());
    }
}
