use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::detection::RawDetection;

/// One frame's worth of detector output, tagged with a monotonically
/// increasing sequence number. Frames may be skipped upstream but never
/// reordered.
#[derive(Clone, Debug)]
pub struct Frame {
    pub seq: u64,
    pub detections: Vec<RawDetection>,
}

/// Producer side of a single-slot frame handoff.
///
/// The slot favors recency over completeness: publishing into a full slot
/// discards the unread frame instead of blocking the producer, so a slow
/// consumer always resumes with the newest frame and no backlog.
pub struct FramePublisher<T> {
    sender: Sender<T>,
    receiver: Receiver<T>,
}

impl<T> FramePublisher<T> {
    pub fn publish(&self, frame: T) {
        if let Err(TrySendError::Full(frame)) = self.sender.try_send(frame) {
            let _ = self.receiver.try_recv();
            // The consumer may have drained the slot in between; either
            // way the newest frame wins or the consumer already has one
            // newer than what it would have read.
            let _ = self.sender.try_send(frame);
        }
    }
}

/// Creates the single-slot frame channel. The receiver end is a plain
/// `crossbeam_channel::Receiver`, so the consumer can `recv` with a
/// timeout and observe disconnection when the producer goes away.
pub fn frame_slot<T>() -> (FramePublisher<T>, Receiver<T>) {
    let (sender, receiver) = bounded(1);
    (
        FramePublisher {
            sender,
            receiver: receiver.clone(),
        },
        receiver,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consumer_sees_only_the_newest_frame() {
        let (publisher, receiver) = frame_slot();

        publisher.publish(1u64);
        publisher.publish(2u64);
        publisher.publish(3u64);

        assert_eq!(receiver.try_recv(), Ok(3));
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_publish_never_blocks() {
        let (publisher, receiver) = frame_slot();

        for frame in 0..1000u64 {
            publisher.publish(frame);
        }

        assert_eq!(receiver.try_recv(), Ok(999));
    }

    #[test]
    fn test_receiver_disconnects_when_publisher_drops() {
        let (publisher, receiver) = frame_slot::<u64>();
        drop(publisher);

        assert!(receiver.try_recv().is_err());
        assert!(receiver.recv().is_err());
    }
}
