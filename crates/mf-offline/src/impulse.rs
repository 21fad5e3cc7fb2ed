//! Impulse response registry
//!
//! Named impulse responses come from memory (registered up front) or from
//! `<dir>/<name>.wav`, loaded on first use and cached.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, warn};
use mf_core::PcmBuffer;
use mf_master::ImpulseResponseProvider;
use mf_master::ReverbUnavailable;
use parking_lot::RwLock;

use crate::decoder::decode_wav;

/// Thread-safe impulse response registry
#[derive(Debug, Default)]
pub struct ImpulseResponseRegistry {
    dir: Option<PathBuf>,
    cache: RwLock<HashMap<String, Arc<PcmBuffer>>>,
}

impl ImpulseResponseRegistry {
    /// Registry with in-memory entries only
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry that also searches `dir` for `<name>.wav`
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Directory searched for impulse response files
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Register (or replace) an impulse response
    pub fn register(&self, name: impl Into<String>, ir: PcmBuffer) {
        let name = name.into();
        debug!("registered impulse response '{name}' ({} frames)", ir.frames());
        self.cache.write().insert(name, Arc::new(ir));
    }

    /// Names currently loaded or registered, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.cache.read().keys().cloned().collect();
        names.sort();
        names
    }

    fn load(&self, name: &str) -> Result<Arc<PcmBuffer>, ReverbUnavailable> {
        if let Some(ir) = self.cache.read().get(name) {
            return Ok(Arc::clone(ir));
        }

        let dir = self
            .dir
            .as_ref()
            .ok_or_else(|| ReverbUnavailable::NotFound(name.to_string()))?;

        // Names address files directly inside `dir`, never paths
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(ReverbUnavailable::NotFound(name.to_string()));
        }

        let path = dir.join(format!("{name}.wav"));
        if !path.is_file() {
            return Err(ReverbUnavailable::NotFound(name.to_string()));
        }

        let ir = decode_wav(&path).map_err(|e| {
            warn!("impulse response '{name}' failed to load: {e}");
            ReverbUnavailable::LoadFailed {
                name: name.to_string(),
                reason: e.to_string(),
            }
        })?;

        let ir = Arc::new(ir);
        self.cache
            .write()
            .entry(name.to_string())
            .or_insert_with(|| Arc::clone(&ir));
        debug!("loaded impulse response '{name}' from {}", path.display());
        Ok(ir)
    }
}

impl ImpulseResponseProvider for ImpulseResponseRegistry {
    fn impulse_response(&self, name: &str) -> Result<PcmBuffer, ReverbUnavailable> {
        self.load(name).map(|ir| (*ir).clone())
    }
}
