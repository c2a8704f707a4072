//! Lifecycle hooks for credential persistence
//!
//! The store calls out at three points: `load` once at startup, `put` on
//! every credential replacement, and `terminate` exactly once at shutdown.
//! Implementations are typed (a trait impl, not a dispatched value shape);
//! hook failures on `put`/`terminate` are logged by the store and degrade to
//! passing the credential through unchanged.

use std::path::{Path, PathBuf};

use oauth_client::{BoxFuture, Credential};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Persistence hook points invoked by a store instance.
///
/// Uses `BoxFuture` return types for dyn-compatibility (`Arc<dyn LifecycleHooks>`).
pub trait LifecycleHooks: Send + Sync {
    /// Called once at startup. Returns the credential the store should begin
    /// with; typical implementations read a persisted record and fall back to
    /// `seed` when none exists. `None` is a fatal startup error.
    fn load<'a>(
        &'a self,
        name: &'a str,
        seed: Option<Credential>,
    ) -> BoxFuture<'a, Result<Option<Credential>>>;

    /// Called on every successful refresh and every external put. The returned
    /// credential becomes the store's in-memory value.
    fn put<'a>(&'a self, name: &'a str, credential: Credential)
    -> BoxFuture<'a, Result<Credential>>;

    /// Called exactly once when the store shuts down, on every exit path.
    fn terminate<'a>(&'a self, name: &'a str, credential: Credential) -> BoxFuture<'a, Result<()>>;
}

/// Hooks that persist nothing: load returns the seed, put passes through.
pub struct NoopHooks;

impl LifecycleHooks for NoopHooks {
    fn load<'a>(
        &'a self,
        _name: &'a str,
        seed: Option<Credential>,
    ) -> BoxFuture<'a, Result<Option<Credential>>> {
        Box::pin(async move { Ok(seed) })
    }

    fn put<'a>(
        &'a self,
        _name: &'a str,
        credential: Credential,
    ) -> BoxFuture<'a, Result<Credential>> {
        Box::pin(async move { Ok(credential) })
    }

    fn terminate<'a>(
        &'a self,
        _name: &'a str,
        _credential: Credential,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move { Ok(()) })
    }
}

/// File-backed hooks: one JSON record per store name under a directory.
///
/// All writes use atomic temp-file + rename to prevent corruption on crash,
/// with 0600 permissions since the file contains OAuth tokens.
pub struct FileHooks {
    dir: PathBuf,
}

impl FileHooks {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn record_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }
}

impl LifecycleHooks for FileHooks {
    fn load<'a>(
        &'a self,
        name: &'a str,
        seed: Option<Credential>,
    ) -> BoxFuture<'a, Result<Option<Credential>>> {
        Box::pin(async move {
            let path = self.record_path(name);
            if !path.exists() {
                debug!(store = name, path = %path.display(), "no persisted credential, using seed");
                return Ok(seed);
            }
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Hook(format!("reading credential record: {e}")))?;
            let credential: Credential = serde_json::from_str(&contents)
                .map_err(|e| Error::Hook(format!("parsing credential record: {e}")))?;
            info!(store = name, path = %path.display(), "loaded persisted credential");
            Ok(Some(credential))
        })
    }

    fn put<'a>(
        &'a self,
        name: &'a str,
        credential: Credential,
    ) -> BoxFuture<'a, Result<Credential>> {
        Box::pin(async move {
            write_atomic(&self.dir, &self.record_path(name), &credential).await?;
            Ok(credential)
        })
    }

    fn terminate<'a>(&'a self, name: &'a str, credential: Credential) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            write_atomic(&self.dir, &self.record_path(name), &credential).await?;
            info!(store = name, "persisted final credential state");
            Ok(())
        })
    }
}

/// Write a credential record atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. Sets file permissions to 0600 (owner read/write only).
async fn write_atomic(dir: &Path, path: &Path, credential: &Credential) -> Result<()> {
    let json = serde_json::to_string_pretty(credential)
        .map_err(|e| Error::Hook(format!("serializing credential record: {e}")))?;

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| Error::Hook(format!("creating credential directory: {e}")))?;

    let record_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("credential");
    let tmp_path = dir.join(format!(".{record_name}.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Hook(format!("writing temp credential record: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Hook(format!("setting credential record permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Hook(format!("renaming temp credential record: {e}")))?;

    debug!(path = %path.display(), "persisted credential record");
    Ok(())
}
