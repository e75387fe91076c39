//! Per-subscriber stream session.
//!
//! A session turns broker events into Server-Sent Events frames:
//! a `connected` greeting, one named frame per record, and a comment-only
//! keep-alive whenever the broker stays idle.

mod frame;

use std::time::Duration;

use futures_core::Stream;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::broker::{BrokerEvent, EventBroker, Subscriber};

pub use frame::Frame;

/// Lifecycle of a stream session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Attached, greeting not yet sent.
    Opening,
    /// Delivering records and keep-alives.
    Streaming,
    /// Finished; no further frames.
    Closed,
}

/// One live subscriber's protocol state machine.
#[derive(Debug)]
pub struct StreamSession {
    subscriber: Subscriber,
    state: SessionState,
    idle: Duration,
    cancel: CancellationToken,
}

impl StreamSession {
    /// Attach a new session to the broker.
    ///
    /// The session closes when `cancel` fires, when the broker goes away,
    /// or when the session is dropped by the transport.
    #[must_use]
    pub fn attach(broker: &EventBroker, idle: Duration, cancel: CancellationToken) -> Self {
        let subscriber = broker.subscribe();
        tracing::info!(session = %subscriber.id(), "Stream session opened");
        Self {
            subscriber,
            state: SessionState::Opening,
            idle,
            cancel,
        }
    }

    /// Session id, shared with its broker subscription.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.subscriber.id()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Produce the next frame, or `None` once the session is closed.
    ///
    /// Cancellation is checked before every wait and takes priority over
    /// any record that is ready at the same time.
    pub async fn next_frame(&mut self) -> Option<Frame> {
        match self.state {
            SessionState::Opening => {
                self.state = SessionState::Streaming;
                Some(Frame::connected())
            }
            SessionState::Streaming => {
                let event = tokio::select! {
                    biased;

                    () = self.cancel.cancelled() => None,
                    event = self.subscriber.next_event(self.idle) => Some(event),
                };

                match event {
                    Some(BrokerEvent::Record(record)) => Some(Frame::Record(record)),
                    Some(BrokerEvent::Idle) => Some(Frame::KeepAlive),
                    Some(BrokerEvent::Closed) | None => {
                        self.close();
                        None
                    }
                }
            }
            SessionState::Closed => None,
        }
    }

    /// Stop the session; later calls to [`next_frame`](Self::next_frame)
    /// return `None`.
    pub fn close(&mut self) {
        if self.state != SessionState::Closed {
            self.state = SessionState::Closed;
            tracing::debug!(session = %self.id(), "Stream session closed");
        }
    }

    /// Turn the session into a stream of frames ending when it closes.
    pub fn into_stream(self) -> impl Stream<Item = Frame> + Send {
        futures_util::stream::unfold(self, |mut session| async move {
            let frame = session.next_frame().await?;
            Some((frame, session))
        })
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        tracing::debug!(session = %self.id(), "Stream session ended");
    }
}
