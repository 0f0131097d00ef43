//! Memoized simulation runs
//!
//! A simulation is fully determined by the history it was estimated from, the path count, the horizon and the
//! seed, so a repeated request for the same four can be answered from memory. The history is named by the
//! instrument and the day it ends on: a new trading day brings a new close and with it a new key, so an entry never
//! outlives the day it was computed for. Only the service uses this, the simulator itself keeps nothing between
//! calls. The oldest entry is evicted once the cache is full.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::NaiveDate;

use crate::simulation::{Simulation, SimulationParams};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub instrument: String,
    /// last day of the history the volatility was estimated from
    pub as_of: NaiveDate,
    pub params: SimulationParams,
    pub seed: u64,
}

#[derive(Debug, Default)]
struct Entries {
    map: HashMap<CacheKey, Arc<Simulation>>,
    order: VecDeque<CacheKey>,
}

#[derive(Debug)]
pub struct SimulationCache {
    capacity: usize,
    entries: Mutex<Entries>,
}

impl SimulationCache {
    /// A capacity of 0 disables caching
    pub fn new(capacity: usize) -> SimulationCache {
        SimulationCache {
            capacity,
            entries: Mutex::new(Entries::default()),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<Simulation>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.map.get(key).cloned()
    }

    pub fn insert(&self, key: CacheKey, simulation: Simulation) -> Arc<Simulation> {
        let simulation = Arc::new(simulation);
        if self.capacity == 0 {
            return simulation;
        }
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.map.insert(key.clone(), simulation.clone()).is_none() {
            entries.order.push_back(key);
        }
        while entries.map.len() > self.capacity {
            match entries.order.pop_front() {
                Some(oldest) => {
                    entries.map.remove(&oldest);
                }
                None => break,
            }
        }
        simulation
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .map
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
