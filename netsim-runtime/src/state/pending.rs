use futures::channel::oneshot;
use std::collections::HashMap;
use std::hash::Hash;

/// Identifies one waiter so that its own timeout can withdraw it without disturbing siblings
/// registered under the same key.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct WaiterId(u64);

pub type Outcome<T, E> = Result<T, E>;

struct Waiter<T, E> {
    id: WaiterId,
    sender: oneshot::Sender<Outcome<T, E>>,
}

/// In-flight requests keyed by a correlation id (target address for ARP/NDP, target plus echo
/// identifier and sequence for pings). A key may have several waiters; a resolution or rejection
/// completes all of them at once and forgets the key.
pub struct PendingRegistry<K, T, E> {
    waiters: HashMap<K, Vec<Waiter<T, E>>>,
    next_id: u64,
}

impl<K, T, E> Default for PendingRegistry<K, T, E>
where
    K: Eq + Hash + Clone,
    T: Clone,
    E: Clone,
{
    fn default() -> Self {
        PendingRegistry::new()
    }
}

impl<K, T, E> PendingRegistry<K, T, E>
where
    K: Eq + Hash + Clone,
    T: Clone,
    E: Clone,
{
    pub fn new() -> Self {
        PendingRegistry {
            waiters: HashMap::new(),
            next_id: 0,
        }
    }

    /// Adds a waiter for `key`. The caller awaits the receiver, normally under a timeout, and
    /// calls `cancel` with the returned id if the timeout wins.
    pub fn register(&mut self, key: K) -> (WaiterId, oneshot::Receiver<Outcome<T, E>>) {
        let (sender, receiver) = oneshot::channel();
        let id = WaiterId(self.next_id);
        self.next_id += 1;
        self.waiters
            .entry(key)
            .or_insert_with(Vec::new)
            .push(Waiter { id, sender });
        (id, receiver)
    }

    /// Completes every waiter of `key` with `value`. Returns how many were woken.
    pub fn resolve(&mut self, key: &K, value: T) -> usize {
        self.complete(key, Ok(value))
    }

    pub fn reject(&mut self, key: &K, reason: E) -> usize {
        self.complete(key, Err(reason))
    }

    /// Rejects every waiter of every key.
    pub fn reject_all(&mut self, reason: E) -> usize {
        let keys: Vec<K> = self.waiters.keys().cloned().collect();
        keys.iter()
            .map(|key| self.complete(key, Err(reason.clone())))
            .sum()
    }

    /// Withdraws a single waiter. The key disappears once its last waiter is gone.
    pub fn cancel(&mut self, key: &K, id: WaiterId) -> bool {
        let (removed, now_empty) = match self.waiters.get_mut(key) {
            Some(list) => {
                let before = list.len();
                list.retain(|waiter| waiter.id != id);
                (list.len() != before, list.is_empty())
            }
            None => (false, false),
        };
        if now_empty {
            self.waiters.remove(key);
        }
        removed
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.waiters.contains_key(key)
    }

    pub fn waiter_count(&self, key: &K) -> usize {
        self.waiters.get(key).map(Vec::len).unwrap_or(0)
    }

    pub fn keys(&self) -> Vec<K> {
        self.waiters.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }

    fn complete(&mut self, key: &K, outcome: Outcome<T, E>) -> usize {
        match self.waiters.remove(key) {
            Some(list) => list
                .into_iter()
                // A dropped receiver means its caller already gave up; nothing to deliver.
                .filter(|waiter| waiter.sender.is_canceled() == false)
                .map(|waiter| waiter.sender.send(outcome.clone()).is_ok() as usize)
                .sum(),
            None => 0,
        }
    }
}

/// Hands out echo identifiers. One counter per interface, wrapping at u16.
#[derive(Debug, Default)]
pub struct EchoIdAllocator {
    next: HashMap<String, u16>,
}

impl EchoIdAllocator {
    pub fn new() -> Self {
        EchoIdAllocator::default()
    }

    pub fn next_id(&mut self, iface: &str) -> u16 {
        let counter = self.next.entry(iface.to_string()).or_insert(1);
        let id = *counter;
        *counter = counter.wrapping_add(1);
        id
    }
}
