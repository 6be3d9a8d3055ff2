//! Environment abstraction for configuration lookups.
//!
//! Configuration loaders take `&impl ConfigEnv` so tests can supply
//! values without mutating the process environment.

use std::collections::HashMap;

pub trait ConfigEnv {
    /// Fetch a string value by name.
    fn string(&self, name: &str) -> Option<String>;
}

/// Environment access backed by the real process environment.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessEnv;

impl ConfigEnv for ProcessEnv {
    fn string(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Fixed set of variables, for tests and embedded setups.
#[derive(Clone, Debug, Default)]
pub struct MapEnv(HashMap<String, String>);

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }
}

impl ConfigEnv for MapEnv {
    fn string(&self, name: &str) -> Option<String> {
        self.0.get(name).cloned()
    }
}
