//! Typed event bus.
//!
//! Carries gameplay events (hits, deaths, spawns, despawns, score changes)
//! from the resolvers that produce them to the broadcaster that drains them
//! at the end of the tick. Queues are typed; registration is implicit on the
//! first push of a type.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
};

/// Typed event queues.
#[derive(Default)]
pub struct EventBus {
    queues: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl EventBus {
    /// Pushes an event onto its type's queue.
    pub fn push<E: 'static + Send + Sync>(&mut self, event: E) {
        let queue = self
            .queues
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(Vec::<E>::new()));
        queue
            .downcast_mut::<Vec<E>>()
            .expect("queue type mismatch")
            .push(event);
    }

    /// Drains all queued events of a type, keeping the queue's allocation
    /// for the next tick.
    pub fn drain<E: 'static + Send + Sync>(&mut self) -> Vec<E> {
        self.queues
            .get_mut(&TypeId::of::<E>())
            .and_then(|queue| queue.downcast_mut::<Vec<E>>())
            .map(std::mem::take)
            .unwrap_or_default()
    }

    /// Number of queued events of a type.
    pub fn len<E: 'static + Send + Sync>(&self) -> usize {
        self.queues
            .get(&TypeId::of::<E>())
            .and_then(|queue| queue.downcast_ref::<Vec<E>>())
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Scored(u32);
    #[derive(Debug, PartialEq)]
    struct Died(u32);

    #[test]
    fn queues_are_typed_and_ordered() {
        let mut bus = EventBus::default();
        bus.push(Scored(1));
        bus.push(Died(9));
        bus.push(Scored(2));

        assert_eq!(bus.len::<Scored>(), 2);
        assert_eq!(bus.drain::<Scored>(), vec![Scored(1), Scored(2)]);
        assert_eq!(bus.len::<Scored>(), 0);
        // Other queues unaffected by the drain.
        assert_eq!(bus.drain::<Died>(), vec![Died(9)]);
    }

    #[test]
    fn drain_on_empty_bus_is_empty() {
        let mut bus = EventBus::default();
        assert!(bus.drain::<Scored>().is_empty());
    }
}
