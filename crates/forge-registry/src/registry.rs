use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use forge_core::CapabilityKey;

use crate::manifest::PluginManifest;
use crate::process::ProcessSpecialist;
use crate::specialist::Specialist;

/// Metadata the registry keeps per handler.
#[derive(Debug, Clone)]
pub struct HandlerDescriptor {
    /// Primary capability key this handler is indexed under.
    pub capability: CapabilityKey,
    /// One-line description, surfaced to the interpreter prompt.
    pub description: String,
    /// Every capability string the handler declares.
    pub capabilities: Vec<String>,
    /// Where the handler lives — a script path, or "builtin".
    pub location: String,
    pub registered_at: DateTime<Utc>,
}

/// One registry entry: descriptor plus the executable specialist.
pub struct RegisteredHandler {
    pub descriptor: HandlerDescriptor,
    pub specialist: Arc<dyn Specialist>,
    /// In-process handlers registered directly; these survive a refresh.
    builtin: bool,
}

type Index = HashMap<CapabilityKey, Arc<RegisteredHandler>>;

/// Copy-on-write capability index.
///
/// Writers build a fresh map and swap the `Arc` in one move, so a reader
/// that grabbed the previous snapshot finishes against a consistent view —
/// never a mixture of old and new entries. Resolution is a read-lock clone
/// of the `Arc` followed by a plain `HashMap` lookup.
pub struct CapabilityRegistry {
    index: RwLock<Arc<Index>>,
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            index: RwLock::new(Arc::new(HashMap::new())),
        }
    }

    /// Register an in-process specialist. Atomic upsert, last write wins.
    pub fn register(
        &self,
        key: impl Into<CapabilityKey>,
        descriptor: HandlerDescriptor,
        specialist: Arc<dyn Specialist>,
    ) {
        let key = key.into();
        info!(capability = %key, location = %descriptor.location, "registering capability");
        let handler = Arc::new(RegisteredHandler {
            descriptor,
            specialist,
            builtin: true,
        });
        let mut guard = self.index.write();
        let mut next: Index = (**guard).clone();
        next.insert(key, handler);
        *guard = Arc::new(next);
    }

    /// Look up a capability. `None` is not an error — it is the signal
    /// that the capability needs building.
    pub fn resolve(&self, key: &str) -> Option<Arc<RegisteredHandler>> {
        let snapshot = self.index.read().clone();
        snapshot.get(key).cloned()
    }

    /// The current index snapshot.
    pub fn snapshot(&self) -> Arc<Index> {
        self.index.read().clone()
    }

    /// All registered capability keys, sorted.
    pub fn list_capabilities(&self) -> Vec<CapabilityKey> {
        let snapshot = self.index.read().clone();
        let mut keys: Vec<_> = snapshot.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// (key, description) pairs for prompt assembly, sorted by key.
    pub fn describe(&self) -> Vec<(String, String)> {
        let snapshot = self.index.read().clone();
        let mut out: Vec<_> = snapshot
            .iter()
            .map(|(k, h)| (k.clone(), h.descriptor.description.clone()))
            .collect();
        out.sort();
        out
    }

    /// Rebuild the index from `*/plugin.toml` manifests under `plugins_dir`.
    ///
    /// Only declared manifest entries count — a directory without a
    /// manifest is ignored, and a broken manifest is skipped with a
    /// warning rather than poisoning the rest of the scan. Built-in
    /// entries survive; a manifest whose directory disappeared does not.
    /// Returns the capability keys loaded from disk.
    pub fn refresh(&self, plugins_dir: &Path) -> forge_core::Result<Vec<CapabilityKey>> {
        let mut disk: Index = HashMap::new();

        let mut loaded = Vec::new();
        if plugins_dir.exists() {
            for entry in std::fs::read_dir(plugins_dir)? {
                let dir = entry?.path();
                if !dir.is_dir() || !dir.join(PluginManifest::FILE_NAME).exists() {
                    continue;
                }
                let manifest = match PluginManifest::load(&dir) {
                    Ok(m) => m,
                    Err(e) => {
                        warn!(path = ?dir, error = %e, "skipping broken manifest");
                        continue;
                    }
                };
                let script = dir.join(&manifest.specialist);
                let specialist = Arc::new(ProcessSpecialist::new(
                    manifest.capabilities.clone(),
                    script.clone(),
                ));
                let handler = Arc::new(RegisteredHandler {
                    descriptor: HandlerDescriptor {
                        capability: manifest.name.clone(),
                        description: manifest.description.clone(),
                        capabilities: manifest.capabilities.clone(),
                        location: script.display().to_string(),
                        registered_at: Utc::now(),
                    },
                    specialist,
                    builtin: false,
                });
                for key in &manifest.capabilities {
                    loaded.push(key.clone());
                    disk.insert(key.clone(), handler.clone());
                }
                debug!(handler = %manifest.name, capabilities = ?manifest.capabilities, "loaded manifest");
            }
        } else {
            debug!(?plugins_dir, "plugins directory does not exist, nothing to load");
        }

        // Merge under the write lock: a register() that landed while the
        // scan was reading disk must survive the swap
        let mut guard = self.index.write();
        let mut next: Index = guard
            .iter()
            .filter(|(_, handler)| handler.builtin)
            .map(|(key, handler)| (key.clone(), handler.clone()))
            .collect();
        next.extend(disk);
        *guard = Arc::new(next);
        drop(guard);

        info!(count = loaded.len(), "registry refreshed");
        loaded.sort();
        Ok(loaded)
    }
}
