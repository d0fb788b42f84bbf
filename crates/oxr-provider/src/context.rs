//! Handle bundles passed to components that call into the runtime.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, error};

use crate::runtime::{SuggestedBinding, XrRuntime};
use crate::types::{InstanceHandle, SessionHandle, SpaceHandle, XrPath};
use crate::{lock, ProviderError, ProviderResult};

#[derive(Default)]
struct PathCache {
    by_name: HashMap<String, XrPath>,
    by_path: HashMap<XrPath, String>,
}

/// A live instance plus the runtime it belongs to.
///
/// Cheap to clone; clones share the path cache.
#[derive(Clone)]
pub struct InstanceContext {
    runtime: Arc<dyn XrRuntime>,
    instance: InstanceHandle,
    paths: Arc<Mutex<PathCache>>,
}

impl InstanceContext {
    pub fn new(runtime: Arc<dyn XrRuntime>, instance: InstanceHandle) -> Self {
        Self {
            runtime,
            instance,
            paths: Arc::new(Mutex::new(PathCache::default())),
        }
    }

    pub fn runtime(&self) -> &Arc<dyn XrRuntime> {
        &self.runtime
    }

    pub fn handle(&self) -> InstanceHandle {
        self.instance
    }

    pub fn string_to_path(&self, path: &str) -> ProviderResult<XrPath> {
        if let Some(cached) = lock(&self.paths).by_name.get(path) {
            return Ok(*cached);
        }

        let xr_path = self.runtime.string_to_path(self.instance, path).map_err(|code| {
            error!("unable to convert '{path}' to a path ({code}); check for disallowed characters");
            ProviderError::Runtime(code)
        })?;

        let mut cache = lock(&self.paths);
        cache.by_name.insert(path.to_string(), xr_path);
        cache.by_path.insert(xr_path, path.to_string());
        Ok(xr_path)
    }

    /// Converts an optional subpath; `None` and `""` map to [`XrPath::NULL`].
    pub fn optional_path(&self, path: Option<&str>) -> ProviderResult<XrPath> {
        match path {
            Some(p) if !p.is_empty() => self.string_to_path(p),
            _ => Ok(XrPath::NULL),
        }
    }

    pub fn path_to_string(&self, path: XrPath) -> ProviderResult<String> {
        if let Some(cached) = lock(&self.paths).by_path.get(&path) {
            return Ok(cached.clone());
        }

        let text = self
            .runtime
            .path_to_string(self.instance, path)
            .map_err(ProviderError::Runtime)?;

        let mut cache = lock(&self.paths);
        cache.by_name.insert(text.clone(), path);
        cache.by_path.insert(path, text.clone());
        Ok(text)
    }

    /// Submits `bindings` for the interaction profile at `profile`.
    pub fn suggest_bindings(
        &self,
        profile: &str,
        bindings: &[SuggestedBinding],
    ) -> ProviderResult<()> {
        let profile_path = self.string_to_path(profile)?;
        self.runtime
            .suggest_bindings(self.instance, profile_path, bindings)
            .map_err(|code| {
                error!("binding suggestion rejected for {profile}: {code}");
                ProviderError::Runtime(code)
            })?;
        debug!("{} binding(s) suggested for {profile}", bindings.len());
        Ok(())
    }
}

/// Handles Input needs from its Session.
#[derive(Clone)]
pub struct SessionContext {
    instance: InstanceContext,
    session: SessionHandle,
    app_space: SpaceHandle,
}

impl SessionContext {
    pub fn new(instance: InstanceContext, session: SessionHandle, app_space: SpaceHandle) -> Self {
        Self {
            instance,
            session,
            app_space,
        }
    }

    pub fn instance(&self) -> &InstanceContext {
        &self.instance
    }

    pub fn runtime(&self) -> &Arc<dyn XrRuntime> {
        self.instance.runtime()
    }

    pub fn session(&self) -> SessionHandle {
        self.session
    }

    pub fn app_space(&self) -> SpaceHandle {
        self.app_space
    }
}
