//! Name → store handle registry
//!
//! Lets multiple independently named stores coexist (e.g. one per external
//! account) and be reached by name. The registry is an explicit value owned
//! by the caller, not a process-global table; handle-based access bypasses
//! it entirely.
//!
//! Entries are removed when the instance terminates: a reaper task watches
//! each actor and prunes the entry on exit, and `resolve` drops any entry
//! whose handle has closed in the meantime.

use std::collections::HashMap;
use std::sync::Arc;

use oauth_client::Credential;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::store::{self, StoreHandle, StoreOptions};

/// Registry of running store instances, keyed by name.
pub struct StoreRegistry {
    entries: Mutex<HashMap<String, Entry>>,
}

/// A name is reserved while its store performs startup network I/O, so the
/// lock never spans an await on the network and other stores stay reachable.
enum Entry {
    Reserved,
    Live(StoreHandle),
}

impl StoreRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(HashMap::new()),
        })
    }

    /// Start a store under its name and register the handle.
    ///
    /// Registering a second instance under a live (or currently starting)
    /// name is a configuration error. The name is reserved up front and the
    /// lock released while startup performs its validate/refresh network
    /// calls, so concurrent starts of the same name cannot race each other
    /// and other stores are never queued behind this one's startup.
    pub async fn start(self: &Arc<Self>, options: StoreOptions) -> Result<StoreHandle> {
        let name = options.name.clone();
        {
            let mut entries = self.entries.lock().await;
            match entries.get(&name) {
                Some(Entry::Reserved) => return Err(Error::NameInUse(name)),
                Some(Entry::Live(existing)) if !existing.is_closed() => {
                    return Err(Error::NameInUse(name));
                }
                _ => {}
            }
            entries.insert(name.clone(), Entry::Reserved);
        }

        let started = match store::start(options).await {
            Ok(started) => started,
            Err(e) => {
                self.entries.lock().await.remove(&name);
                return Err(e);
            }
        };

        self.entries
            .lock()
            .await
            .insert(name.clone(), Entry::Live(started.handle.clone()));
        info!(store = %name, "store registered");

        // Reap the entry when the actor exits, surfacing abnormal exits
        let registry = Arc::downgrade(self);
        let task = started.task;
        let reaped = name.clone();
        tokio::spawn(async move {
            match task.await {
                Ok(Ok(())) => debug!(store = %reaped, "store exited cleanly"),
                Ok(Err(e)) => error!(store = %reaped, error = %e, "store terminated abnormally"),
                Err(e) => error!(store = %reaped, error = %e, "store task panicked"),
            }
            if let Some(registry) = registry.upgrade() {
                let mut entries = registry.entries.lock().await;
                // Only remove the entry if it still refers to the dead
                // instance; the name may have been reused already
                if let Some(Entry::Live(h)) = entries.get(&reaped) {
                    if h.is_closed() {
                        entries.remove(&reaped);
                        debug!(store = %reaped, "store deregistered");
                    }
                }
            }
        });

        Ok(started.handle)
    }

    /// Look up a live store handle by name.
    ///
    /// A name that is still starting up counts as not found; callers see it
    /// only once startup has succeeded.
    pub async fn resolve(&self, name: &str) -> Result<StoreHandle> {
        let mut entries = self.entries.lock().await;
        match entries.get(name) {
            Some(Entry::Live(handle)) if !handle.is_closed() => Ok(handle.clone()),
            Some(Entry::Live(_)) => {
                entries.remove(name);
                Err(Error::NotFound(name.into()))
            }
            Some(Entry::Reserved) | None => Err(Error::NotFound(name.into())),
        }
    }

    /// Fetch the named store's current credential.
    pub async fn get(&self, name: &str) -> Result<Credential> {
        self.resolve(name).await?.get().await
    }

    /// Replace the named store's credential.
    pub async fn put(&self, name: &str, credential: Credential) -> Result<()> {
        self.resolve(name).await?.put(credential).await
    }

    /// Stop the named store and remove its entry eagerly.
    pub async fn stop(&self, name: &str) -> Result<()> {
        let handle = {
            let mut entries = self.entries.lock().await;
            match entries.remove(name) {
                Some(Entry::Live(handle)) => handle,
                Some(Entry::Reserved) => {
                    entries.insert(name.into(), Entry::Reserved);
                    return Err(Error::NotFound(name.into()));
                }
                None => return Err(Error::NotFound(name.into())),
            }
        };
        handle.stop().await
    }

    /// Names of currently registered stores.
    pub async fn names(&self) -> Vec<String> {
        self.entries.lock().await.keys().cloned().collect()
    }
}
