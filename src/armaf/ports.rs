//! Request / response channels between tokio tasks.
//!
//! A task which owns some state (an "actor") keeps an [ActorReceiver] and
//! hands out [ActorPort]s. Every message sent through a port carries a
//! [oneshot] channel for the answer, so callers can await the result of their
//! own request without sharing any state with the actor.

use std::{fmt::Debug, result::Result};
use thiserror::Error;
use tokio::sync::{mpsc, mpsc::error::SendError, oneshot, watch};

/// How many requests may wait in an actor's queue before senders are
/// suspended.
const REQUEST_QUEUE_LENGTH: usize = 16;

type ResponseReceiver<R, E> = oneshot::Receiver<Result<R, E>>;

/// A payload sent to an actor together with the channel for its response.
pub struct Request<P, R, E> {
    pub payload: P,
    pub response_sender: oneshot::Sender<Result<R, E>>,
}

impl<P, R, E> Request<P, R, E> {
    /// Wrap the payload into a request, returning the receiving side of the
    /// response channel.
    pub fn new(payload: P) -> (Request<P, R, E>, ResponseReceiver<R, E>) {
        let (response_sender, response_receiver) = oneshot::channel();
        let request = Request {
            payload,
            response_sender,
        };
        (request, response_receiver)
    }

    /// Send the response back to the requester.
    ///
    /// Fails, handing the response back, if the requester stopped waiting.
    pub fn respond(self, response: Result<R, E>) -> Result<(), Result<R, E>> {
        self.response_sender.send(response)
    }
}

/// An error occurring during the exchange of messages with an actor.
#[derive(Debug, Error, Clone)]
pub enum ActorRequestError<E: Debug> {
    #[error("error when sending message to actor")]
    Send,

    #[error("actor went away without responding")]
    Recv,

    #[error("internal actor error: {0:?}")]
    Actor(E),
}

/// The sending side of an actor's request queue.
///
/// Ports are cheap to clone. The actor treats the moment when its last port
/// is dropped as the signal to wind down, so there is no dedicated stop
/// message.
#[derive(Debug)]
pub struct ActorPort<P, R, E: Debug> {
    message_sender: mpsc::Sender<Request<P, R, E>>,
    shutdown_receiver: watch::Receiver<()>,
}

// A derived Clone would require E: Clone, which anyhow::Error is not.
impl<P, R, E: Debug> Clone for ActorPort<P, R, E> {
    fn clone(&self) -> Self {
        Self {
            message_sender: self.message_sender.clone(),
            shutdown_receiver: self.shutdown_receiver.clone(),
        }
    }
}

impl<P, R, E: Debug> ActorPort<P, R, E> {
    /// Create a connected port and receiver pair.
    ///
    /// The receiver is meant to be moved into the actor's task while the port
    /// goes back to whoever spawned it.
    pub fn make() -> (ActorPort<P, R, E>, ActorReceiver<P, R, E>) {
        let (message_sender, request_receiver) = mpsc::channel(REQUEST_QUEUE_LENGTH);
        let (shutdown_notifier, shutdown_receiver) = watch::channel(());
        (
            ActorPort {
                message_sender,
                shutdown_receiver,
            },
            ActorReceiver {
                request_receiver,
                _shutdown_notifier: shutdown_notifier,
            },
        )
    }

    /// Enqueue an already constructed [Request]. Prefer [Self::request].
    pub async fn raw_request(
        &self,
        r: Request<P, R, E>,
    ) -> Result<(), SendError<Request<P, R, E>>> {
        self.message_sender.send(r).await
    }

    /// Send the payload to the actor and wait for its response.
    pub async fn request(&self, payload: P) -> Result<R, ActorRequestError<E>> {
        let (req, rx) = Request::new(payload);
        if self.raw_request(req).await.is_err() {
            return Err(ActorRequestError::Send);
        }
        match rx.await {
            Err(_) => Err(ActorRequestError::Recv),
            Ok(Ok(response)) => Ok(response),
            Ok(Err(actor_error)) => Err(ActorRequestError::Actor(actor_error)),
        }
    }

    /// Drop this port and wait until the actor terminates.
    ///
    /// The actor terminates once every other clone of this port is gone too
    /// and it has dropped its [ActorReceiver].
    pub async fn await_shutdown(self) {
        drop(self.message_sender);
        let mut shutdown_receiver = self.shutdown_receiver;
        // The notifier never sends, so this only returns when it is dropped.
        let result = shutdown_receiver.changed().await;
        assert!(result.is_err());
    }
}

/// The receiving side of an [ActorPort].
///
/// Dropping it is what wakes up [ActorPort::await_shutdown], so it must be
/// the last thing an actor lets go of.
#[derive(Debug)]
pub struct ActorReceiver<P, R, E: Debug> {
    pub request_receiver: mpsc::Receiver<Request<P, R, E>>,
    _shutdown_notifier: watch::Sender<()>,
}

impl<P, R, E: Debug> ActorReceiver<P, R, E> {
    /// Receive the next request, or `None` once all ports are dropped.
    pub async fn recv(&mut self) -> Option<Request<P, R, E>> {
        self.request_receiver.recv().await
    }
}
