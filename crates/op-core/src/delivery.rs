//! Ordered delivery into a publisher.
//!
//! The read loop must never wait on a slow consumer, so each destination gets
//! an unbounded queue drained by a single task. Items for one destination are
//! written in the order they were pushed. Dropping every handle of a queue
//! ends the stream after the items already queued; [`DeliveryQueue::close`]
//! ends it at once.

use tokio::sync::mpsc;
use tracing::trace;

use crate::publisher::{Publisher, PublisherError, Writer};

/// Queue feeding one publisher.
pub struct DeliveryQueue<T> {
    queue: mpsc::UnboundedSender<T>,
    writer: Writer<T>,
}

impl<T> Clone for DeliveryQueue<T> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            writer: self.writer.clone(),
        }
    }
}

impl<T> std::fmt::Debug for DeliveryQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryQueue")
            .field("writer", &self.writer)
            .finish()
    }
}

impl<T: Send + 'static> DeliveryQueue<T> {
    /// Spawn the drain task for `publisher`.
    ///
    /// Must be called within a tokio runtime. The task holds only a write
    /// handle, so it also stops once every reader is dropped. When the last
    /// queue handle is dropped it delivers what is left and closes the
    /// publisher.
    #[must_use]
    pub fn spawn(publisher: Publisher<T>) -> Self {
        let (queue, mut pending) = mpsc::unbounded_channel();
        let writer = publisher.writer();
        let sink = writer.clone();

        tokio::spawn(async move {
            while let Some(item) = pending.recv().await {
                if let Err(PublisherError::Closed) = sink.write(item).await {
                    trace!(dropped = pending.len() + 1, "Delivery stopped, publisher closed");
                    return;
                }
            }
            sink.close();
        });

        Self { queue, writer }
    }
}

impl<T> DeliveryQueue<T> {
    /// Queue an item. Returns `false` if the drain task has stopped.
    pub fn push(&self, item: T) -> bool {
        self.queue.send(item).is_ok()
    }

    /// Write handle of the destination publisher.
    #[must_use]
    pub fn writer(&self) -> &Writer<T> {
        &self.writer
    }

    /// Close the destination publisher, dropping queued items.
    pub fn close(&self) {
        self.writer.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use std::time::Duration;

    #[tokio::test]
    async fn test_delivery_preserves_order() {
        let publisher = Publisher::new();
        let reader = publisher.reader();
        let queue = DeliveryQueue::spawn(publisher);

        for i in 0..100 {
            assert!(queue.push(i));
        }
        for i in 0..100 {
            assert_eq!(reader.recv().await, Some(i));
        }
    }

    #[tokio::test]
    async fn test_push_does_not_wait_for_reader() {
        let publisher = Publisher::new();
        let queue = DeliveryQueue::spawn(publisher.clone());

        // No reader is consuming; pushes still return immediately.
        for i in 0..1000 {
            assert!(queue.push(i));
        }

        let first: Vec<_> = publisher.reader().into_stream().take(3).collect().await;
        assert_eq!(first, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_close_stops_delivery() {
        let publisher = Publisher::new();
        let reader = publisher.reader();
        let queue = DeliveryQueue::spawn(publisher);

        queue.push(1);
        queue.push(2);
        queue.push(3);
        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.close();

        // At most the buffered item is still readable, then end-of-stream.
        let rest: Vec<_> = reader.into_stream().collect().await;
        assert!(rest.len() <= 1);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!queue.push(4));
    }

    #[tokio::test]
    async fn test_dropped_queue_delivers_then_closes() {
        let publisher = Publisher::new();
        let reader = publisher.reader();
        let queue = DeliveryQueue::spawn(publisher.clone());

        for i in 0..5 {
            queue.push(i);
        }
        drop(queue);

        let items: Vec<_> = reader.into_stream().collect().await;
        assert_eq!(items, vec![0, 1, 2, 3, 4]);
        assert!(publisher.is_closed());
    }

    #[tokio::test]
    async fn test_drain_stops_when_readers_are_gone() {
        let publisher = Publisher::new();
        let queue = DeliveryQueue::spawn(publisher);

        queue.push(1);
        queue.push(2);
        queue.push(3);
        tokio::time::timeout(Duration::from_secs(1), async {
            while queue.push(4) {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_aliased_handles_share_order() {
        let publisher = Publisher::with_capacity(16);
        let reader = publisher.reader();
        let station = DeliveryQueue::spawn(publisher);
        let bolt = station.clone();

        station.push("0106");
        bolt.push("0107");
        station.push("0106");
        bolt.push("0107");

        for expected in ["0106", "0107", "0106", "0107"] {
            assert_eq!(reader.recv().await, Some(expected));
        }
    }
}
