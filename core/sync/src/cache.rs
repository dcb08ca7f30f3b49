//! Process-wide cache of directory read results.
//!
//! Entries are keyed by the exact request that produced them. Any successful
//! write to a collection drops every entry of that collection and bumps its
//! generation; reads that were already in flight still answer their callers
//! but are not stored. Concurrent reads of the same key share one store call.

use client_console_schemas::Collection;
use client_console_store::StoreError;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::debug;

use crate::query::ListRequest;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub collection: Collection,
    pub request: ListRequest,
}

impl CacheKey {
    pub fn new(collection: Collection, request: ListRequest) -> Self {
        Self {
            collection,
            request: request.normalized(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Reads answered from a fresh entry
    pub hits: u64,
    /// Reads that went to the store
    pub fetches: u64,
    /// Reads that joined an in-flight fetch
    pub coalesced: u64,
    /// Entries dropped by invalidation
    pub invalidated: u64,
}

type Shared<V> = Result<Arc<V>, StoreError>;

struct Flight<V> {
    id: u64,
    generation: u64,
    invalidated: bool,
    waiters: Vec<oneshot::Sender<Shared<V>>>,
}

struct CacheState<V> {
    entries: HashMap<CacheKey, Arc<V>>,
    flights: HashMap<CacheKey, Flight<V>>,
    generations: HashMap<Collection, u64>,
    next_flight: u64,
    stats: CacheStats,
}

impl<V> CacheState<V> {
    fn generation(&self, collection: Collection) -> u64 {
        self.generations.get(&collection).copied().unwrap_or(0)
    }
}

pub struct ResultCache<V> {
    state: Mutex<CacheState<V>>,
}

impl<V> Default for ResultCache<V> {
    fn default() -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                flights: HashMap::new(),
                generations: HashMap::new(),
                next_flight: 0,
                stats: CacheStats::default(),
            }),
        }
    }
}

/// Removes an abandoned flight so its waiters retry instead of hanging
struct FlightGuard<'a, V> {
    cache: &'a ResultCache<V>,
    key: &'a CacheKey,
    id: u64,
    armed: bool,
}

impl<V> Drop for FlightGuard<'_, V> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.cache.lock();
        if state.flights.get(self.key).map(|f| f.id) == Some(self.id) {
            state.flights.remove(self.key);
            debug!("Abandoned fetch for {:?}", self.key);
        }
    }
}

enum Join<V> {
    Wait(oneshot::Receiver<Shared<V>>),
    Lead { id: u64, generation: u64 },
}

impl<V> ResultCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CacheState<V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fresh entry for `key`, if any, without touching the store
    pub fn peek(&self, key: &CacheKey) -> Option<Arc<V>> {
        self.lock().entries.get(key).cloned()
    }

    /// Number of fresh entries
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn generation(&self, collection: Collection) -> u64 {
        self.lock().generation(collection)
    }

    pub fn stats(&self) -> CacheStats {
        self.lock().stats
    }

    /// Return the fresh entry for `key`, or run `fetch` once and remember its
    /// result. Callers arriving while a fetch for the same key is running
    /// wait for that fetch instead of starting their own. A failed fetch
    /// stores nothing.
    pub async fn get_or_fetch<F, Fut>(&self, key: CacheKey, fetch: F) -> Shared<V>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<V, StoreError>> + Send,
    {
        let (id, generation) = loop {
            let join = {
                let mut locked = self.lock();
                let state = &mut *locked;
                if let Some(value) = state.entries.get(&key).cloned() {
                    state.stats.hits += 1;
                    debug!("Cache hit for {:?}", key.request);
                    return Ok(value);
                }

                let generation = state.generation(key.collection);
                match state.flights.get_mut(&key) {
                    Some(flight) if flight.generation == generation && !flight.invalidated => {
                        let (tx, rx) = oneshot::channel();
                        flight.waiters.push(tx);
                        state.stats.coalesced += 1;
                        Join::Wait(rx)
                    }
                    _ => {
                        let id = state.next_flight;
                        state.next_flight += 1;
                        state.stats.fetches += 1;
                        // Replacing an outdated flight drops its waiters, which retry here
                        state.flights.insert(
                            key.clone(),
                            Flight {
                                id,
                                generation,
                                invalidated: false,
                                waiters: Vec::new(),
                            },
                        );
                        Join::Lead { id, generation }
                    }
                }
            };

            match join {
                Join::Lead { id, generation } => break (id, generation),
                Join::Wait(rx) => match rx.await {
                    Ok(result) => return result,
                    Err(_) => debug!("In-flight fetch for {:?} went away, retrying", key.request),
                },
            }
        };

        debug!("Cache miss for {:?}, fetching", key.request);
        let mut guard = FlightGuard {
            cache: self,
            key: &key,
            id,
            armed: true,
        };
        let result = fetch().await.map(Arc::new);
        guard.armed = false;

        self.finish(&key, id, generation, &result);
        result
    }

    fn finish(&self, key: &CacheKey, id: u64, generation: u64, result: &Shared<V>) {
        let waiters = {
            let mut state = self.lock();
            let owned = state.flights.get(key).is_some_and(|flight| flight.id == id);
            let flight = if owned {
                state.flights.remove(key)
            } else {
                None
            };

            let current = flight.as_ref().is_some_and(|flight| !flight.invalidated)
                && state.generation(key.collection) == generation;

            match result {
                Ok(value) if current => {
                    state.entries.insert(key.clone(), Arc::clone(value));
                }
                Ok(_) => debug!("Discarding result for {:?} read before invalidation", key.request),
                Err(err) => debug!("Fetch for {:?} failed: {}", key.request, err),
            }

            flight.map(|flight| flight.waiters).unwrap_or_default()
        };

        for waiter in waiters {
            let _ = waiter.send(result.clone());
        }
    }

    /// Drop every entry of `collection` and fence off reads already running.
    /// Returns the number of entries dropped.
    pub fn invalidate_collection(&self, collection: Collection) -> usize {
        let mut guard = self.lock();
        let state = &mut *guard;
        *state.generations.entry(collection).or_insert(0) += 1;

        let before = state.entries.len();
        state.entries.retain(|key, _| key.collection != collection);
        let dropped = before - state.entries.len();
        state.stats.invalidated += dropped as u64;

        debug!(
            "Invalidated {} cached {} result(s), generation {}",
            dropped,
            collection,
            state.generation(collection)
        );
        dropped
    }

    /// Drop a single entry. Invalidating a key without a fresh entry changes
    /// nothing and returns `false`.
    pub fn invalidate_key(&self, key: &CacheKey) -> bool {
        let mut state = self.lock();
        if let Some(flight) = state.flights.get_mut(key) {
            flight.invalidated = true;
        }
        let dropped = state.entries.remove(key).is_some();
        if dropped {
            state.stats.invalidated += 1;
        }
        dropped
    }
}
