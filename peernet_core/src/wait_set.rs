//! Multiplexed wait over an actor's inbound endpoints.

use crate::protocol::{read_frame, Message, MessageKind, ProtocolError};
use peernet_env::ActorId;
use std::collections::BTreeMap;
use std::future::poll_fn;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncRead, BufReader};
use tracing::debug;

struct Inbound<E> {
    from: ActorId,
    reader: BufReader<E>,
    /// Kind of a frame whose tag was read but whose payload was late
    pending: Option<MessageKind>,
}

/// The inbound endpoints of one actor, tagged by sending actor.
///
/// Each endpoint is buffered, so readiness can be observed without
/// consuming any bytes: an endpoint is ready when its buffer holds data,
/// its peer has gone away (EOF), or the last read failed.
pub struct WaitSet<E> {
    endpoints: Vec<Inbound<E>>,
}

impl<E> WaitSet<E>
where
    E: AsyncRead + Unpin,
{
    /// Builds the set from receive endpoints keyed by source actor.
    pub fn new(inbound: BTreeMap<ActorId, E>) -> Self {
        let endpoints = inbound
            .into_iter()
            .map(|(from, endpoint)| Inbound {
                from,
                reader: BufReader::new(endpoint),
                pending: None,
            })
            .collect();
        Self { endpoints }
    }

    /// Number of endpoints in the set.
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// True if the set holds no endpoints.
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Source actors, in set order.
    pub fn peers(&self) -> impl Iterator<Item = ActorId> + '_ {
        self.endpoints.iter().map(|inbound| inbound.from)
    }

    /// Waits until at least one endpoint is ready or `timeout` elapses.
    ///
    /// Returns the positions of every endpoint that was ready when the wait
    /// completed. A timeout returns an empty list. Nothing is read.
    pub async fn wait(&mut self, timeout: Duration) -> Vec<usize> {
        tokio::time::timeout(timeout, poll_fn(|cx| self.poll_ready(cx)))
            .await
            .unwrap_or_default()
    }

    /// Decodes exactly one frame from the endpoint at `position`.
    ///
    /// A frame left incomplete by an earlier call is finished first.
    /// `position` must come from [`WaitSet::wait`].
    pub(crate) async fn read_one(
        &mut self,
        position: usize,
        payload_timeout: Duration,
    ) -> (ActorId, Result<Message, ProtocolError>) {
        let inbound = &mut self.endpoints[position];
        let result = read_frame(&mut inbound.reader, &mut inbound.pending, payload_timeout).await;
        (inbound.from, result)
    }

    /// Reads every frame still queued once all senders are gone.
    ///
    /// Returns the total amount carried by the queued credits. Each
    /// endpoint is read until it reports EOF; a read that stalls for longer
    /// than `payload_timeout` ends that endpoint too, so a live sender
    /// cannot hang the call.
    pub async fn drain_queued(&mut self, payload_timeout: Duration) -> u64 {
        let mut total = 0u64;

        for inbound in &mut self.endpoints {
            loop {
                let read = read_frame(&mut inbound.reader, &mut inbound.pending, payload_timeout);
                match tokio::time::timeout(payload_timeout, read).await {
                    Ok(Ok(Message::Credit { amount })) => total += amount as u64,
                    Ok(Err(ProtocolError::UnknownKind(tag))) => {
                        debug!(
                            "Queued frame from actor {} has unknown kind {:#04x}",
                            inbound.from, tag
                        );
                    }
                    Ok(Err(_)) | Err(_) => break,
                }
            }
        }

        total
    }

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Vec<usize>> {
        let ready: Vec<usize> = self
            .endpoints
            .iter_mut()
            .enumerate()
            .filter_map(|(position, inbound)| {
                Pin::new(&mut inbound.reader)
                    .poll_fill_buf(cx)
                    .is_ready()
                    .then_some(position)
            })
            .collect();

        if ready.is_empty() {
            Poll::Pending
        } else {
            Poll::Ready(ready)
        }
    }
}
