//! Capacity-bounded, order-preserving stores of product tokens (spec §4.2).
//!
//! `put` never blocks in this kernel: routers reserve a queue's remaining
//! capacity before issuing a transport request (spec §4.6 step 4), so by
//! the time a transport controller actually puts a token the slot is
//! guaranteed to exist. A `put` that still finds the queue full is treated
//! as the fatal invariant violation spec §7 describes.

use std::collections::VecDeque;

use crate::error::SimulationFault;
use crate::ids::{EventId, ProductId, QueueId};
use crate::world::World;

/// `capacity == 0` is the legacy convention for "unbounded" (spec §9 open
/// question, resolved in favor of this reading).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    Bounded(usize),
    Unbounded,
}

impl Capacity {
    pub fn from_config(raw: usize) -> Self {
        if raw == 0 {
            Capacity::Unbounded
        } else {
            Capacity::Bounded(raw)
        }
    }
}

/// What a queue actually stores: which product, and its declared type (the
/// only thing a `get` predicate or a sink filter ever needs to know).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductToken {
    pub product: ProductId,
    pub product_type: String,
}

/// A predicate a `get` can filter on. The kernel only ever needs to look
/// for "the token for this specific product" or "anything at all", so this
/// stays a closed enum rather than a boxed closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GetPredicate {
    Any,
    Product(ProductId),
}

impl GetPredicate {
    fn matches(self, token: &ProductToken) -> bool {
        match self {
            GetPredicate::Any => true,
            GetPredicate::Product(p) => token.product == p,
        }
    }
}

struct PendingGet {
    predicate: GetPredicate,
    event: EventId,
}

pub struct Queue {
    pub id: QueueId,
    capacity: Capacity,
    items: VecDeque<ProductToken>,
    reserves: usize,
    pending_getters: Vec<PendingGet>,
}

/// The outcome of attempting a `get`: either the token is already here, or
/// the caller must suspend on the returned event and retry once it fires.
pub enum GetOutcome {
    Ready(ProductToken),
    Pending(EventId),
}

impl Queue {
    pub fn new(id: QueueId, capacity: Capacity) -> Self {
        Queue { id, capacity, items: VecDeque::new(), reserves: 0, pending_getters: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// `len + reserves >= capacity`. Unbounded queues are never full.
    pub fn full(&self) -> bool {
        match self.capacity {
            Capacity::Unbounded => false,
            Capacity::Bounded(cap) => self.items.len() + self.reserves >= cap,
        }
    }

    pub fn reserve(&mut self) {
        self.reserves += 1;
    }

    pub fn unreserve(&mut self) {
        self.reserves = self.reserves.saturating_sub(1);
    }
}

impl World {
    /// Insert a token into a queue, waking the first matching pending
    /// getter if one exists. Returns the invariant-violation fault if the
    /// queue is at (non-reserved) capacity — transport controllers only
    /// ever call this after a router reservation, so this should not
    /// trigger in a correctly wired simulation.
    pub fn queue_put(&mut self, queue: QueueId, token: ProductToken) -> Result<(), SimulationFault> {
        {
            let q = &self.queues[queue.index()];
            if let Capacity::Bounded(cap) = q.capacity {
                if q.items.len() >= cap {
                    return Err(SimulationFault::QueueFullInvariantViolation(queue));
                }
            }
        }
        let wake = {
            let q = &mut self.queues[queue.index()];
            q.items.push_back(token);
            let position = q.pending_getters.iter().position(|g| g.predicate.matches(q.items.front().unwrap()));
            position.map(|idx| q.pending_getters.remove(idx))
        };
        if let Some(pending) = wake {
            self.succeed(pending.event)?;
        }
        Ok(())
    }

    /// Try to take the first token matching `predicate`. If none is
    /// present yet, registers a waiter and returns an event that fires the
    /// moment one is put.
    pub fn queue_get(&mut self, queue: QueueId, predicate: GetPredicate) -> GetOutcome {
        let q = &mut self.queues[queue.index()];
        if let Some(pos) = q.items.iter().position(|t| predicate.matches(t)) {
            let token = q.items.remove(pos).unwrap();
            self.refresh_got_free_for_queue(queue);
            return GetOutcome::Ready(token);
        }
        let event = self.event();
        self.queues[queue.index()].pending_getters.push(PendingGet { predicate, event });
        GetOutcome::Pending(event)
    }

    /// Re-attempt a `get` after its wait event fired, and resolve it to a
    /// token. The token is guaranteed present because `queue_put` only
    /// succeeds the waiter's event after inserting a matching token.
    pub fn queue_take_ready(&mut self, queue: QueueId, predicate: GetPredicate) -> ProductToken {
        let token = {
            let q = &mut self.queues[queue.index()];
            let pos = q
                .items
                .iter()
                .position(|t| predicate.matches(t))
                .expect("queue_take_ready called without a matching token present");
            q.items.remove(pos).unwrap()
        };
        self.refresh_got_free_for_queue(queue);
        token
    }

    pub fn queue_reserve(&mut self, queue: QueueId) {
        self.queues[queue.index()].reserve();
    }

    pub fn queue_unreserve(&mut self, queue: QueueId) {
        self.queues[queue.index()].unreserve();
    }

    pub fn queue_full(&self, queue: QueueId) -> bool {
        self.queues[queue.index()].full()
    }

    pub fn queue_len(&self, queue: QueueId) -> usize {
        self.queues[queue.index()].len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_world() -> World {
        World::new(1, 1_000)
    }

    #[test]
    fn put_then_get_same_tick() {
        let mut w = test_world();
        let q = w.add_queue(Capacity::Unbounded);
        w.queue_put(q, ProductToken { product: ProductId(0), product_type: "P".into() }).unwrap();
        match w.queue_get(q, GetPredicate::Any) {
            GetOutcome::Ready(tok) => assert_eq!(tok.product, ProductId(0)),
            GetOutcome::Pending(_) => panic!("expected ready"),
        }
    }

    #[test]
    fn get_before_put_blocks_then_wakes() {
        let mut w = test_world();
        let q = w.add_queue(Capacity::Bounded(1));
        let outcome = w.queue_get(q, GetPredicate::Product(ProductId(0)));
        let event = match outcome {
            GetOutcome::Pending(e) => e,
            GetOutcome::Ready(_) => panic!("expected pending"),
        };
        assert!(!w.event_triggered(event));
        w.queue_put(q, ProductToken { product: ProductId(0), product_type: "P".into() }).unwrap();
        assert!(w.event_triggered(event));
    }

    #[test]
    fn capacity_one_blocks_second_put_until_get() {
        let mut w = test_world();
        let q = w.add_queue(Capacity::Bounded(1));
        w.queue_put(q, ProductToken { product: ProductId(0), product_type: "P".into() }).unwrap();
        assert!(w.queue_full(q));
        let err = w.queue_put(q, ProductToken { product: ProductId(1), product_type: "P".into() });
        assert!(err.is_err());
        let _ = w.queue_get(q, GetPredicate::Any);
        assert!(!w.queue_full(q));
    }
}
