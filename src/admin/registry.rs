//! Loop registrations.
//!
//! A background loop is started on behalf of a named registration (for example
//! the `Admin` module). Registering the same name again supersedes the previous
//! registration: its [`CancellationToken`] is cancelled, and any loop started
//! with that token stops at its next poll. Cancellation is the only stop signal
//! a loop ever receives.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use log::{debug, info};
use tokio_util::sync::CancellationToken;

/// Identity under which a background loop runs.
#[derive(Debug, Clone)]
pub struct Registration {
    name: String,
    generation: u64,
    token: CancellationToken,
}

impl Registration {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Token handed to loops started for this registration.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_superseded(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[derive(Debug, Default)]
struct Inner {
    active: HashMap<String, Registration>,
    next_generation: u64,
}

/// Process-wide table of active registrations, keyed by name.
#[derive(Debug, Default)]
pub struct Registry {
    inner: Mutex<Inner>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register `name`, superseding (cancelling) whatever was registered before.
    pub fn register(&self, name: &str) -> Registration {
        let mut inner = self.inner();
        inner.next_generation += 1;
        let registration = Registration {
            name: name.to_string(),
            generation: inner.next_generation,
            token: CancellationToken::new(),
        };
        if let Some(previous) = inner.active.insert(name.to_string(), registration.clone()) {
            info!(
                "registration '{}' generation {} superseded by generation {}",
                name, previous.generation, registration.generation
            );
            previous.token.cancel();
        } else {
            debug!("registration '{}' generation {} active", name, registration.generation);
        }
        registration
    }

    /// Remove `name` and cancel its token. Returns false if nothing was registered.
    pub fn unregister(&self, name: &str) -> bool {
        match self.inner().active.remove(name) {
            Some(previous) => {
                info!("registration '{}' generation {} removed", name, previous.generation);
                previous.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Whether `registration` is still the active one for its name.
    pub fn is_current(&self, registration: &Registration) -> bool {
        self.inner()
            .active
            .get(&registration.name)
            .map(|r| r.generation == registration.generation)
            .unwrap_or(false)
    }

    pub fn current(&self, name: &str) -> Option<Registration> {
        self.inner().active.get(name).cloned()
    }

    /// Cancel every registration. Used on shutdown.
    pub fn cancel_all(&self) {
        let drained: Vec<Registration> = self.inner().active.drain().map(|(_, r)| r).collect();
        for r in drained {
            r.token.cancel();
        }
    }
}
