use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::error::GatewayError;

pub type FlightResult = Result<String, GatewayError>;

// Where a caller stands for a key: the leader starts the upstream call,
// followers just wait for its result
pub enum Flight {
    Leader(oneshot::Receiver<FlightResult>),
    Follower(oneshot::Receiver<FlightResult>),
}

// Pending generations, keyed like the cache. One upstream call per key at a time.
#[derive(Default)]
pub struct Inflight {
    pending: DashMap<String, Vec<oneshot::Sender<FlightResult>>>,
}

impl Inflight {
    pub fn new() -> Self {
        Self::default()
    }

    // Register interest in `key`. Check-and-insert happens under the shard
    // lock so exactly one caller becomes leader.
    pub fn join(&self, key: &str) -> Flight {
        let (tx, rx) = oneshot::channel();
        match self.pending.entry(key.to_string()) {
            Entry::Occupied(mut waiters) => {
                waiters.get_mut().push(tx);
                Flight::Follower(rx)
            }
            Entry::Vacant(slot) => {
                slot.insert(vec![tx]);
                Flight::Leader(rx)
            }
        }
    }

    // Hand the result to every waiter and close the flight.
    // Returns how many waiters were still listening.
    pub fn complete(&self, key: &str, result: FlightResult) -> usize {
        let Some((_, waiters)) = self.pending.remove(key) else {
            return 0;
        };
        waiters
            .into_iter()
            .filter_map(|tx| tx.send(result.clone()).ok())
            .count()
    }

    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }
}

// Held by the task doing the generation. If the task unwinds before
// `finish`, waiters get an Internal error instead of hanging and the key
// is free for a new leader.
pub struct FlightGuard {
    inflight: Arc<Inflight>,
    key: String,
    done: bool,
}

impl FlightGuard {
    pub fn new(inflight: Arc<Inflight>, key: String) -> Self {
        Self {
            inflight,
            key,
            done: false,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn finish(mut self, result: FlightResult) -> usize {
        self.done = true;
        self.inflight.complete(&self.key, result)
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        if !self.done {
            self.inflight.complete(
                &self.key,
                Err(GatewayError::Internal(
                    "generation task aborted before producing a result".into(),
                )),
            );
        }
    }
}
