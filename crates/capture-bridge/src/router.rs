/// Per-context message dispatch.
///
/// Each page context runs one `MessageRouter` event loop. Handlers are registered
/// per `MessageType` and return a future; the router awaits it on its own task and
/// resolves that envelope's reply exactly once. Envelopes never share a reply slot,
/// so concurrent gestures on the same page are independent.
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::channel::{pending_response, ChannelError, PendingResponse};
use crate::message::{CaptureResponse, Message, MessageType};

const QUEUE_DEPTH: usize = 32;

type Handler = Arc<dyn Fn(Message) -> BoxFuture<'static, CaptureResponse> + Send + Sync>;

struct Envelope {
    message: Message,
    reply: PendingResponse<CaptureResponse>,
}

#[derive(Default)]
pub struct MessageRouter {
    handlers: HashMap<MessageType, Handler>,
}

impl MessageRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for `kind`, replacing any previous one.
    pub fn on<F, Fut>(&mut self, kind: MessageType, handler: F)
    where
        F: Fn(Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CaptureResponse> + Send + 'static,
    {
        self.handlers
            .insert(kind, Arc::new(move |message| handler(message).boxed()));
    }

    /// Start the event loop and return the handle other contexts send through.
    /// The loop ends once every handle is dropped.
    pub fn spawn(self) -> TabHandle {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        tokio::spawn(self.run(rx));
        TabHandle { tx }
    }

    async fn run(self, mut rx: mpsc::Receiver<Envelope>) {
        while let Some(envelope) = rx.recv().await {
            self.dispatch(envelope);
        }
        debug!("message router stopped");
    }

    fn dispatch(&self, envelope: Envelope) {
        let Envelope { message, reply } = envelope;
        let kind = message.kind;
        let Some(handler) = self.handlers.get(&kind) else {
            warn!(?kind, "no handler registered for message");
            let _ = reply.resolve(CaptureResponse::failure(format!(
                "no handler registered for {kind:?}"
            )));
            return;
        };

        let response = handler(message);
        tokio::spawn(async move {
            let response = response.await;
            if let Err(e) = reply.resolve(response) {
                warn!(?kind, error = %e, "could not deliver response");
            }
        });
    }
}

/// Sending side of a context's router.
#[derive(Clone)]
pub struct TabHandle {
    tx: mpsc::Sender<Envelope>,
}

impl TabHandle {
    /// Send one message and wait for its single response.
    pub async fn send_message(&self, message: Message) -> Result<CaptureResponse, ChannelError> {
        let (reply, response) = pending_response();
        self.tx
            .send(Envelope { message, reply })
            .await
            .map_err(|_| ChannelError::Disconnected)?;
        response.recv().await
    }
}
