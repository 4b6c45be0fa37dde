//! Topic key to delivery queue table.
//!
//! The table is owned and mutated by the session's I/O task only, so it is a
//! plain map. Aliased keys registered together share one delivery queue.

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use crate::delivery::DeliveryQueue;
use crate::publisher::{Publisher, Writer};
use crate::topic::TopicKey;

/// Registry errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A publisher is already registered for the key.
    #[error("Topic already registered: {0}")]
    AlreadyRegistered(TopicKey),

    /// Registration without keys.
    #[error("No topic keys given")]
    NoKeys,
}

/// Routes for every subscribed topic key.
pub struct TopicRegistry<T> {
    routes: HashMap<TopicKey, DeliveryQueue<T>>,
}

impl<T> Default for TopicRegistry<T> {
    fn default() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }
}

impl<T: Send + 'static> TopicRegistry<T> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Route every key in `keys` to `publisher` through one delivery queue.
    ///
    /// # Errors
    ///
    /// Returns an error if `keys` is empty or any key is already routed; in
    /// that case nothing is registered.
    pub fn register(&mut self, keys: &[TopicKey], publisher: Publisher<T>) -> Result<(), RegistryError> {
        if keys.is_empty() {
            return Err(RegistryError::NoKeys);
        }
        if let Some(taken) = keys.iter().find(|key| self.routes.contains_key(key)) {
            return Err(RegistryError::AlreadyRegistered(*taken));
        }

        let queue = DeliveryQueue::spawn(publisher);
        for key in keys {
            self.routes.insert(*key, queue.clone());
            debug!(topic = %key, "Topic registered");
        }
        Ok(())
    }
}

impl<T> TopicRegistry<T> {
    /// Remove the routes for `keys`, returning write handles of the
    /// publishers that were reachable through them (one per shared queue).
    pub fn deregister(&mut self, keys: &[TopicKey]) -> Vec<Writer<T>> {
        let mut removed: Vec<DeliveryQueue<T>> = Vec::new();
        for key in keys {
            if let Some(queue) = self.routes.remove(key) {
                debug!(topic = %key, "Topic deregistered");
                if !removed
                    .iter()
                    .any(|known| known.writer().same_channel(queue.writer()))
                {
                    removed.push(queue);
                }
            }
        }
        removed.into_iter().map(|queue| queue.writer().clone()).collect()
    }

    /// The delivery queue for `key`.
    #[must_use]
    pub fn route(&self, key: &TopicKey) -> Option<&DeliveryQueue<T>> {
        self.routes.get(key)
    }

    /// Whether `key` is routed.
    #[must_use]
    pub fn contains(&self, key: &TopicKey) -> bool {
        self.routes.contains_key(key)
    }

    /// Number of routed keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether no key is routed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Routed keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<TopicKey> {
        let mut keys: Vec<_> = self.routes.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    /// Remove every route. Each publisher closes once its queued pushes
    /// are delivered.
    pub fn close_all(&mut self) {
        for (key, _) in self.routes.drain() {
            debug!(topic = %key, "Topic route closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topic::Topic;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn test_register_and_route() {
        let mut registry = TopicRegistry::new();
        let publisher = Publisher::new();
        let reader = publisher.reader();

        registry
            .register(&Topic::LastTighteningResult.keys(), publisher)
            .unwrap();
        assert_eq!(registry.len(), 1);

        let key = TopicKey::from_mid(61);
        assert!(registry.route(&key).unwrap().push("push"));
        assert_eq!(reader.recv().await, Some("push"));
        assert!(registry.route(&TopicKey::from_mid(5)).is_none());
    }

    #[tokio::test]
    async fn test_aliases_share_publisher() {
        let mut registry = TopicRegistry::new();
        let publisher = Publisher::with_capacity(4);
        let reader = publisher.reader();
        registry
            .register(&Topic::PowerMacsResult.keys(), publisher)
            .unwrap();
        assert_eq!(registry.keys(), Topic::PowerMacsResult.keys());

        registry.route(&TopicKey::from_mid(106)).unwrap().push(106);
        registry.route(&TopicKey::from_mid(107)).unwrap().push(107);
        assert_eq!(reader.recv().await, Some(106));
        assert_eq!(reader.recv().await, Some(107));

        let removed = registry.deregister(&Topic::PowerMacsResult.keys());
        assert_eq!(removed.len(), 1);
        assert!(registry.is_empty());
        // The stream ends once the dropped queue is drained.
        removed[0].closed().await;
        assert_eq!(reader.recv().await, None);
    }

    #[tokio::test]
    async fn test_duplicate_registration() {
        let mut registry = TopicRegistry::<u8>::new();
        registry
            .register(&Topic::JobInfo.keys(), Publisher::new())
            .unwrap();
        assert_eq!(
            registry.register(&Topic::JobInfo.keys(), Publisher::new()),
            Err(RegistryError::AlreadyRegistered(TopicKey::from_mid(35)))
        );
        assert_eq!(registry.register(&[], Publisher::new()), Err(RegistryError::NoKeys));
    }

    #[tokio::test]
    async fn test_close_all() {
        let mut registry = TopicRegistry::<u8>::new();
        let jobs = Publisher::new();
        let results = Publisher::new();
        registry.register(&Topic::JobInfo.keys(), jobs.clone()).unwrap();
        registry
            .register(&Topic::PowerMacsResult.keys(), results.clone())
            .unwrap();

        registry.close_all();
        assert!(registry.is_empty());
        jobs.closed().await;
        results.closed().await;
        assert_eq!(jobs.reader().recv().await, None);
    }

    #[tokio::test]
    async fn test_close_all_delivers_queued_pushes() {
        let mut registry = TopicRegistry::new();
        let publisher = Publisher::new();
        let reader = publisher.reader();
        registry
            .register(&Topic::PowerMacsResult.keys(), publisher)
            .unwrap();

        registry.route(&TopicKey::from_mid(106)).unwrap().push(1);
        registry.route(&TopicKey::from_mid(107)).unwrap().push(2);
        registry.route(&TopicKey::from_mid(106)).unwrap().push(3);
        registry.close_all();

        let items: Vec<_> = reader.into_stream().collect().await;
        assert_eq!(items, vec![1, 2, 3]);
    }
}
