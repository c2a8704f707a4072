//! The credential store actor
//!
//! One store instance owns one [`Credential`] and runs as a single tokio
//! task. Commands (`get`, `put`, `stop`) arrive on an mpsc channel and are
//! processed strictly in order, interleaved with two internal deadlines: a
//! pre-expiry refresh and a periodic revalidation. A refresh or validate in
//! flight blocks the instance's loop, so commands queue behind it — there is
//! no internal parallelism within one instance.
//!
//! Timer discipline: the deadlines are plain `Option<Instant>` fields and the
//! sleep futures are recreated on every loop iteration, so replacing a
//! deadline in the same serialized step as a credential replacement is the
//! cancel-and-reschedule — a stale timer can never fire against a newer
//! credential.

use std::sync::Arc;
use std::time::Duration;

use oauth_client::{AuthOps, Credential};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::hooks::{LifecycleHooks, NoopHooks};

/// Default interval between periodic revalidations.
pub const DEFAULT_VALIDATE_INTERVAL: Duration = Duration::from_secs(3600);

/// Default margin before expiry at which the refresh timer fires.
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(600);

/// Floor for computed timer delays; an already-past deadline fires almost
/// immediately rather than scheduling a negative delay.
const MIN_TIMER_DELAY_MS: i64 = 1;

const COMMAND_BUFFER: usize = 32;

/// Options for starting a store instance.
pub struct StoreOptions {
    pub name: String,
    /// Starting credential, handed to the load hook as its fallback.
    pub seed: Option<Credential>,
    pub ops: Arc<dyn AuthOps>,
    pub hooks: Arc<dyn LifecycleHooks>,
    pub validate_interval: Duration,
    pub refresh_margin: Duration,
}

impl StoreOptions {
    /// Options with no-op hooks and default intervals.
    pub fn new(name: impl Into<String>, ops: Arc<dyn AuthOps>) -> Self {
        Self {
            name: name.into(),
            seed: None,
            ops,
            hooks: Arc::new(NoopHooks),
            validate_interval: DEFAULT_VALIDATE_INTERVAL,
            refresh_margin: DEFAULT_REFRESH_MARGIN,
        }
    }

    pub fn seed(mut self, credential: Credential) -> Self {
        self.seed = Some(credential);
        self
    }

    pub fn hooks(mut self, hooks: Arc<dyn LifecycleHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn validate_interval(mut self, interval: Duration) -> Self {
        self.validate_interval = interval;
        self
    }

    pub fn refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }
}

enum Command {
    Get(oneshot::Sender<Credential>),
    Put(Credential, oneshot::Sender<()>),
    Stop(oneshot::Sender<()>),
}

/// Cloneable handle to a running store instance.
///
/// All methods return [`Error::Closed`] once the instance has stopped.
#[derive(Clone, Debug)]
pub struct StoreHandle {
    name: String,
    tx: mpsc::Sender<Command>,
}

impl StoreHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Snapshot of the current credential. No network call; queued behind any
    /// in-flight refresh/validate work.
    pub async fn get(&self) -> Result<Credential> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Get(reply))
            .await
            .map_err(|_| Error::Closed)?;
        rx.await.map_err(|_| Error::Closed)
    }

    /// Replace the credential. Runs the put hook and reschedules both timers
    /// before acknowledging.
    pub async fn put(&self, credential: Credential) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Put(credential, reply))
            .await
            .map_err(|_| Error::Closed)?;
        rx.await.map_err(|_| Error::Closed)
    }

    /// Stop the instance. Resolves after the terminate hook has run.
    pub async fn stop(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Stop(reply))
            .await
            .map_err(|_| Error::Closed)?;
        rx.await.map_err(|_| Error::Closed)
    }

    /// Whether the instance has exited.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves once the instance has exited, on any exit path. Lets an
    /// owner react to abnormal termination without holding the task handle.
    pub async fn closed(&self) {
        self.tx.closed().await;
    }
}

/// A started store: the handle plus the actor task for supervision.
///
/// The task resolves `Err(Error::RefreshFailed)` on abnormal termination so
/// an owner can decide whether to restart with fresh authorization.
#[derive(Debug)]
pub struct StartedStore {
    pub handle: StoreHandle,
    pub task: JoinHandle<Result<()>>,
}

/// Start a store instance.
///
/// Loads the initial credential through the load hook (fatal if none
/// results), then brings it to a known-good state before returning: a
/// credential expiring within the refresh margin (or carrying no expiry at
/// all) is refreshed immediately; otherwise it is validated, and a failed
/// validation falls through to a refresh. A failed refresh here is fatal and
/// no instance is left running.
pub async fn start(options: StoreOptions) -> Result<StartedStore> {
    let StoreOptions {
        name,
        seed,
        ops,
        hooks,
        validate_interval,
        refresh_margin,
    } = options;

    let loaded = hooks
        .load(&name, seed)
        .await
        .map_err(|e| Error::Startup(format!("load hook: {e}")))?;
    let credential = loaded.ok_or_else(|| {
        Error::Startup(format!("no credential available for store {name}"))
    })?;

    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
    let mut actor = StoreActor {
        name,
        credential,
        ops,
        hooks,
        validate_interval,
        refresh_margin,
        refresh_at: None,
        validate_at: None,
        rx,
    };

    let margin_ms = refresh_margin.as_millis() as i64;
    match actor.credential.millis_until_expiry() {
        Some(remaining) if remaining > margin_ms => {
            debug!(store = %actor.name, remaining_ms = remaining, "validating loaded credential");
            match actor.ops.validate(&actor.credential).await {
                Ok(()) => actor.reschedule(),
                Err(e) => {
                    // Expected precondition for a refresh, not an error
                    info!(store = %actor.name, error = %e, "startup validation failed, refreshing");
                    actor.refresh().await?;
                }
            }
        }
        _ => {
            debug!(store = %actor.name, "credential expired or expiring, refreshing before ready");
            actor.refresh().await?;
        }
    }

    info!(store = %actor.name, expires_at = ?actor.credential.expires_at, "credential store ready");

    let handle = StoreHandle {
        name: actor.name.clone(),
        tx,
    };
    let task = tokio::spawn(actor.run());
    Ok(StartedStore { handle, task })
}

struct StoreActor {
    name: String,
    credential: Credential,
    ops: Arc<dyn AuthOps>,
    hooks: Arc<dyn LifecycleHooks>,
    validate_interval: Duration,
    refresh_margin: Duration,
    refresh_at: Option<Instant>,
    validate_at: Option<Instant>,
    rx: mpsc::Receiver<Command>,
}

impl StoreActor {
    async fn run(mut self) -> Result<()> {
        let outcome = self.serve().await;

        // Terminate hook runs on every exit path: explicit stop, all handles
        // dropped, fatal refresh failure.
        if let Err(e) = self
            .hooks
            .terminate(&self.name, self.credential.clone())
            .await
        {
            warn!(store = %self.name, error = %e, "terminate hook failed");
        }

        match outcome {
            Ok(stop_ack) => {
                info!(store = %self.name, "credential store stopped");
                if let Some(ack) = stop_ack {
                    let _ = ack.send(());
                }
                Ok(())
            }
            Err(e) => {
                error!(store = %self.name, error = %e, "credential store terminated abnormally");
                Err(e)
            }
        }
    }

    /// Serve commands and timers until stop, handle closure, or a fatal
    /// refresh failure. Returns the stop acknowledger on explicit stop so it
    /// can be answered after the terminate hook.
    async fn serve(&mut self) -> Result<Option<oneshot::Sender<()>>> {
        loop {
            let refresh_at = self.refresh_at.unwrap_or_else(far_future);
            let validate_at = self.validate_at.unwrap_or_else(far_future);

            tokio::select! {
                cmd = self.rx.recv() => match cmd {
                    Some(Command::Get(reply)) => {
                        let _ = reply.send(self.credential.clone());
                    }
                    Some(Command::Put(credential, reply)) => {
                        debug!(store = %self.name, "external credential put");
                        self.install(credential).await;
                        let _ = reply.send(());
                    }
                    Some(Command::Stop(reply)) => return Ok(Some(reply)),
                    None => return Ok(None),
                },
                _ = tokio::time::sleep_until(refresh_at) => {
                    debug!(store = %self.name, "refresh timer fired");
                    self.refresh().await?;
                }
                _ = tokio::time::sleep_until(validate_at) => {
                    match self.ops.validate(&self.credential).await {
                        Ok(()) => {
                            debug!(store = %self.name, "access token still valid");
                            self.reschedule();
                        }
                        Err(e) => {
                            info!(store = %self.name, error = %e, "validation failed, refreshing");
                            self.refresh().await?;
                        }
                    }
                }
            }
        }
    }

    /// Exchange the refresh token and install the replacement credential.
    ///
    /// Failure is fatal for the instance: a rejected refresh token almost
    /// always means revocation or expiry of the refresh token itself, so
    /// automatic retry is deliberately not attempted.
    async fn refresh(&mut self) -> Result<()> {
        match self.ops.refresh(&self.credential).await {
            Ok(response) => {
                let refreshed = self.credential.apply_refresh(&response);
                info!(
                    store = %self.name,
                    expires_at = ?refreshed.expires_at,
                    "token refresh succeeded"
                );
                self.install(refreshed).await;
                Ok(())
            }
            Err(e) => Err(Error::RefreshFailed(e.to_string())),
        }
    }

    /// Install a replacement credential: run the put hook, swap the value,
    /// and reschedule both timers — all in one serialized step.
    async fn install(&mut self, credential: Credential) {
        let credential = match self.hooks.put(&self.name, credential.clone()).await {
            Ok(returned) => returned,
            Err(e) => {
                // Hook failures degrade to passthrough
                warn!(store = %self.name, error = %e, "put hook failed, continuing unpersisted");
                credential
            }
        };
        self.credential = credential;
        self.reschedule();
    }

    /// Recompute both deadlines against the current credential.
    ///
    /// Refresh fires at `expires_at - margin` (1 ms floor when already past);
    /// no refresh deadline without an expiry — the periodic validation will
    /// catch an unusable token. Validation fires a fixed interval from now,
    /// i.e. relative to the last successful check or replacement.
    fn reschedule(&mut self) {
        self.validate_at = Some(Instant::now() + self.validate_interval);
        self.refresh_at = self.credential.millis_until_expiry().map(|remaining| {
            let delay = (remaining - self.refresh_margin.as_millis() as i64).max(MIN_TIMER_DELAY_MS);
            Instant::now() + Duration::from_millis(delay as u64)
        });
    }
}

fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86400 * 30)
}
