//! Process-wide registry of named knowledge bases.
//!
//! The registry replaces the usual "global dict of bases" with an explicit
//! context object: it is built once at process start from the configured
//! reference document plus the preset list, then injected into request
//! handlers and treated as read-mostly. Each base sits behind its own
//! `RwLock`, so concurrent searches share a read lock while a force rebuild
//! takes the write lock, so two requests can never race to write the same
//! snapshot.
//!
//! Initialization is failure-tolerant per entry: a preset whose document is
//! missing or whose build fails is logged and left out; the rest of the
//! registry still comes up. The reference base is special: its entry is
//! always present (possibly unbuilt) so a later rebuild can revive it.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::Config;
use crate::kb::KnowledgeBase;

/// Key of the always-present Grupo Sura reference base.
pub const REFERENCE_KEY: &str = "sura";

pub struct Registry {
    bases: HashMap<String, Arc<RwLock<KnowledgeBase>>>,
}

impl Registry {
    /// Builds or loads every configured base. Never fails as a whole:
    /// individual entries that cannot be built are skipped with a warning.
    pub async fn initialize(config: &Config) -> Registry {
        let mut bases = HashMap::new();

        // The reference entry always exists, built or not, so that
        // `/rebuild-sura` has somewhere to rebuild into.
        let mut reference = KnowledgeBase::new(REFERENCE_KEY, &config.storage.data_dir);
        if config.reference.path.exists() {
            match reference.build(config, &config.reference.path, false).await {
                Ok(()) => info!(
                    key = REFERENCE_KEY,
                    chunks = reference.chunk_count(),
                    "reference base ready"
                ),
                Err(e) => warn!(
                    key = REFERENCE_KEY,
                    error = %e,
                    "failed to build reference base; it stays unbuilt until rebuilt"
                ),
            }
        } else {
            warn!(
                key = REFERENCE_KEY,
                path = %config.reference.path.display(),
                "reference document missing; the base stays unbuilt"
            );
        }
        bases.insert(REFERENCE_KEY.to_string(), Arc::new(RwLock::new(reference)));

        for preset in &config.presets {
            if !preset.path.exists() {
                warn!(
                    key = %preset.key,
                    path = %preset.path.display(),
                    "preset document missing; entry skipped"
                );
                continue;
            }

            let mut kb = KnowledgeBase::new(&preset.key, &config.storage.data_dir);
            match kb.build(config, &preset.path, false).await {
                Ok(()) => {
                    info!(key = %preset.key, chunks = kb.chunk_count(), "preset base ready");
                    bases.insert(preset.key.clone(), Arc::new(RwLock::new(kb)));
                }
                Err(e) => {
                    warn!(key = %preset.key, error = %e, "failed to build preset base; entry skipped");
                }
            }
        }

        Registry { bases }
    }

    pub fn get(&self, key: &str) -> Option<Arc<RwLock<KnowledgeBase>>> {
        self.bases.get(key).cloned()
    }

    /// The fixed reference base. Present after any `initialize`, though
    /// possibly unbuilt.
    pub fn reference(&self) -> Option<Arc<RwLock<KnowledgeBase>>> {
        self.get(REFERENCE_KEY)
    }

    pub fn len(&self) -> usize {
        self.bases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }
}
