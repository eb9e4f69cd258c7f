//! Mock transport for testing
//!
//! Records every sent frame and answers from a scripted queue or from a
//! responder closure that plays the device side. An empty queue behaves like
//! a silent device: `receive` reports a timeout immediately.

use crate::echonet::frame::Frame;
use crate::echonet::transport::EchonetTransport;
use crate::error::EchonetError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Scripted outcome of one `receive` call.
#[derive(Debug, Clone)]
pub enum MockReply {
    Frame(Frame),
    Timeout,
    Error(String),
}

/// Device-side behaviour: maps a request to its reply (`None` = no reply).
pub type Responder = Box<dyn FnMut(&Frame) -> Option<Frame> + Send>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Mock transport that simulates a peer node.
#[derive(Clone)]
pub struct MockTransport {
    /// Frames passed to `send`, in order
    pub sent: Arc<Mutex<Vec<Frame>>>,
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    responder: Arc<Mutex<Option<Responder>>>,
    send_error: Arc<Mutex<Option<String>>>,
    peer: SocketAddr,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        MockTransport {
            sent: Arc::new(Mutex::new(Vec::new())),
            replies: Arc::new(Mutex::new(VecDeque::new())),
            responder: Arc::new(Mutex::new(None)),
            send_error: Arc::new(Mutex::new(None)),
            peer: SocketAddr::from(([192, 0, 2, 10], crate::constants::ECHONET_PORT)),
        }
    }

    /// Mock whose replies are computed from each sent frame.
    pub fn with_responder(responder: impl FnMut(&Frame) -> Option<Frame> + Send + 'static) -> Self {
        let mock = Self::new();
        *lock(&mock.responder) = Some(Box::new(responder));
        mock
    }

    /// Queue a reply for a later `receive`.
    pub fn queue_reply(&self, reply: MockReply) {
        lock(&self.replies).push_back(reply);
    }

    /// Queue a frame for a later `receive`.
    pub fn queue_frame(&self, frame: Frame) {
        self.queue_reply(MockReply::Frame(frame));
    }

    /// Make the next `send` fail with the given message.
    pub fn fail_next_send(&self, message: &str) {
        *lock(&self.send_error) = Some(message.to_string());
    }

    /// Copy of every frame sent so far.
    pub fn sent_frames(&self) -> Vec<Frame> {
        lock(&self.sent).clone()
    }
}

#[async_trait]
impl EchonetTransport for MockTransport {
    async fn send(&mut self, frame: &Frame) -> Result<(), EchonetError> {
        if let Some(message) = lock(&self.send_error).take() {
            return Err(EchonetError::Transport(message));
        }
        lock(&self.sent).push(frame.clone());

        let reply = lock(&self.responder).as_mut().map(|respond| respond(frame));
        if let Some(reply) = reply {
            let reply = match reply {
                Some(frame) => MockReply::Frame(frame),
                None => MockReply::Timeout,
            };
            self.queue_reply(reply);
        }
        Ok(())
    }

    async fn receive(&mut self, timeout: Duration) -> Result<Frame, EchonetError> {
        match lock(&self.replies).pop_front() {
            Some(MockReply::Frame(frame)) => Ok(frame),
            Some(MockReply::Error(message)) => Err(EchonetError::Transport(message)),
            Some(MockReply::Timeout) | None => Err(EchonetError::Timeout(timeout)),
        }
    }

    fn peer(&self) -> SocketAddr {
        self.peer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::echonet::frame::{ObjectCode, PropertyData};

    fn get_request() -> Frame {
        Frame::new(
            1,
            ObjectCode::NODE_PROFILE,
            ObjectCode::new(0x01, 0x30, 0x01),
            0x62,
            vec![PropertyData::request(0x80)],
        )
    }

    #[tokio::test]
    async fn test_scripted_replies() {
        let mut mock = MockTransport::new();
        mock.queue_frame(get_request());
        mock.queue_reply(MockReply::Error("reset".into()));

        assert!(mock.receive(Duration::from_secs(1)).await.is_ok());
        assert!(matches!(
            mock.receive(Duration::from_secs(1)).await,
            Err(EchonetError::Transport(_))
        ));
        assert!(mock
            .receive(Duration::from_secs(1))
            .await
            .unwrap_err()
            .is_timeout());
    }

    #[tokio::test]
    async fn test_responder_and_send_failure() {
        let mut mock = MockTransport::with_responder(|request| {
            let mut reply = request.clone();
            reply.service = 0x72;
            Some(reply)
        });
        let reply = mock
            .request(&get_request(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(reply.service, 0x72);
        assert_eq!(mock.sent_frames().len(), 1);

        mock.fail_next_send("unreachable");
        assert!(mock.send(&get_request()).await.is_err());
        assert_eq!(mock.sent_frames().len(), 1);
    }
}
