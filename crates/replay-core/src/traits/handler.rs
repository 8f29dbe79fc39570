//! Typed publish/subscribe.

use tokio::sync::mpsc;

/// Receives events of type `E` from a [`Publisher`].
pub trait EventHandler<E>: Send {
    /// Handle one event.
    fn handle(&mut self, event: &E);
}

impl<E, F> EventHandler<E> for F
where
    F: FnMut(&E) + Send,
{
    fn handle(&mut self, event: &E) {
        self(event)
    }
}

/// Forwards events into a channel. A closed receiver drops the event.
impl<E: Clone + Send> EventHandler<E> for mpsc::UnboundedSender<E> {
    fn handle(&mut self, event: &E) {
        let _ = self.send(event.clone());
    }
}

/// Ordered list of handlers, dispatched sequentially in registration order.
pub struct Publisher<E> {
    handlers: Vec<Box<dyn EventHandler<E>>>,
}

impl<E> Publisher<E> {
    /// Create a publisher with no handlers.
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Register a handler after the existing ones.
    pub fn subscribe(&mut self, handler: impl EventHandler<E> + 'static) {
        self.handlers.push(Box::new(handler));
    }

    /// Deliver an event to every handler.
    pub fn publish(&mut self, event: &E) {
        for handler in &mut self.handlers {
            handler.handle(event);
        }
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Check if no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<E> Default for Publisher<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for Publisher<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_publisher_dispatches_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut publisher: Publisher<u32> = Publisher::new();

        let first = Arc::clone(&seen);
        publisher.subscribe(move |event: &u32| first.lock().unwrap().push(("first", *event)));
        let second = Arc::clone(&seen);
        publisher.subscribe(move |event: &u32| second.lock().unwrap().push(("second", *event)));

        publisher.publish(&1);
        publisher.publish(&2);

        assert_eq!(publisher.len(), 2);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![("first", 1), ("second", 1), ("first", 2), ("second", 2)]
        );
    }

    #[test]
    fn test_channel_handler_forwards_clones() {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let mut publisher: Publisher<String> = Publisher::new();
        publisher.subscribe(tx);

        publisher.publish(&"filled".to_string());
        assert_eq!(rx.try_recv().unwrap(), "filled");

        drop(rx);
        publisher.publish(&"dropped".to_string());
    }
}
