//! Outbound transport adapter.

use tracing::trace;

use helix_messages::{encode_frame, MessageKind};
use helix_types::ShardGroupId;

use crate::traits::ShardTransport;

/// Adapts a raw byte sink into a [`ShardTransport`] by applying the wire
/// framing.
///
/// The host supplies a closure that broadcasts one framed buffer to the shard
/// group (gossipsub publish, UDP fanout, an in-memory bus in tests). Broadcast
/// is best-effort; no delivery acknowledgement is expected at this layer.
pub struct FramedTransport<F>
where
    F: Fn(ShardGroupId, Vec<u8>) + Send + Sync,
{
    send: F,
}

impl<F> FramedTransport<F>
where
    F: Fn(ShardGroupId, Vec<u8>) + Send + Sync,
{
    pub fn new(send: F) -> Self {
        FramedTransport { send }
    }
}

impl<F> ShardTransport for FramedTransport<F>
where
    F: Fn(ShardGroupId, Vec<u8>) + Send + Sync,
{
    fn send_to_shard(&self, shard: ShardGroupId, kind: MessageKind, body: Vec<u8>) {
        let frame = encode_frame(kind, &body);
        trace!(%shard, ?kind, bytes = frame.len(), "broadcasting to shard group");
        (self.send)(shard, frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helix_messages::{decode_frame, encode_message, ConsensusMessage};
    use helix_types::{Hash, KeyPair};
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_frames_are_decodable_by_the_receiver() {
        let captured: Arc<Mutex<Vec<(ShardGroupId, Vec<u8>)>>> = Arc::default();
        let sink = captured.clone();
        let transport = FramedTransport::new(move |shard, frame| {
            sink.lock().push((shard, frame));
        });

        let key = KeyPair::from_seed(&[3u8; 32]);
        let message = ConsensusMessage::prepare(4, Hash::from_bytes(b"block"), &key);
        let body = encode_message(&message).unwrap();
        transport.send_to_shard(ShardGroupId(2), message.kind(), body);

        let sent = captured.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, ShardGroupId(2));
        assert_eq!(decode_frame(&sent[0].1).unwrap(), message);
    }
}
