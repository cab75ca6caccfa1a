//! WebSocket channel handling
//!
//! One task per socket: it registers with the actor, forwards actor commands
//! out (counter pushes, forced closes) and feeds inbound frames back in. The
//! actor queues the current value before the connection is visible to
//! broadcasts, so the first frame a client sees is always the counter.

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, trace};

use tally_protocol::decode_payload;

use crate::counter::CounterActor;
use crate::registry::Outbound;

pub async fn handle_socket(mut socket: WebSocket, actor: CounterActor, identity: String) {
    let handle = match actor.connect(identity).await {
        Ok(handle) => handle,
        Err(err) => {
            // Serving a wrong baseline is worse than refusing the socket.
            debug!(error = %err, "refusing socket, counter value not loadable");
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };
    let id = handle.id;
    let mut outbound = handle.outbound;

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            command = outbound.recv() => match command {
                Some(Outbound::Count(value)) => {
                    if sink.send(Message::Text(value.to_string())).await.is_err() {
                        break;
                    }
                }
                Some(Outbound::Close { code, reason }) => {
                    let _ = sink
                        .send(Message::Close(Some(CloseFrame {
                            code,
                            reason: reason.into(),
                        })))
                        .await;
                    break;
                }
                None => break,
            },
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    actor.request_increment(id, &text).await;
                }
                Some(Ok(Message::Binary(bytes))) => {
                    if let Some(text) = decode_payload(&bytes) {
                        actor.request_increment(id, text).await;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                // Ping/pong are answered by the transport layer.
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    trace!(error = %err, "socket read error");
                    break;
                }
            },
        }
    }

    actor.disconnect(id).await;
}
