//! The runtime facade: instance lifetime, extension negotiation, the single
//! session and the adapter registry.

use std::sync::Arc;

use oxr_common::AppConfig;
use tracing::{debug, error, info, warn};

use crate::context::{InstanceContext, SessionContext};
use crate::extensions::{
    Extension, ExtensionRegistry, EYE_GAZE_INTERACTION, HEADLESS, UNSUPPORTED_GRAPHICS_APIS,
    VULKAN_ENABLE, VULKAN_ENABLE2,
};
use crate::runtime::{GraphicsBinding, InstanceCreateInfo, XrRuntime, CURRENT_API_VERSION};
use crate::session::{Session, SessionOptions};
use crate::types::{
    FormFactor, RuntimeEvent, RuntimeProperties, SystemId, SystemProperties, Version,
};
use crate::{ProviderError, ProviderResult};

/// What the application asks for at instance creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    pub app_name: String,
    pub app_version: u32,
    pub engine_name: String,
    pub engine_version: u32,
    /// Wishlist; anything the runtime does not advertise is dropped.
    pub extensions: Vec<String>,
    pub api_layers: Vec<String>,
}

impl AppInfo {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            app_version: 1,
            engine_name: String::new(),
            engine_version: 0,
            extensions: Vec::new(),
            api_layers: Vec::new(),
        }
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_api_layers<I, S>(mut self, layers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.api_layers = layers.into_iter().map(Into::into).collect();
        self
    }
}

impl From<&AppConfig> for AppInfo {
    fn from(config: &AppConfig) -> Self {
        Self {
            app_name: config.app_name.clone(),
            app_version: config.app_version,
            engine_name: config.engine_name.clone(),
            engine_version: config.engine_version,
            extensions: config.extensions.clone(),
            api_layers: config.api_layers.clone(),
        }
    }
}

/// Everything a live instance carries.
struct Live {
    instance: InstanceContext,
    system: SystemId,
    runtime_properties: Option<RuntimeProperties>,
    system_properties: Option<SystemProperties>,
    extensions: Vec<String>,
    api_layers: Vec<String>,
}

/// Owns the runtime connection.
///
/// Teardown order is fixed: adapters (newest first), then the session, then
/// the instance.
pub struct Provider {
    runtime: Arc<dyn XrRuntime>,
    live: Option<Live>,
    registry: ExtensionRegistry,
    session: Option<Session>,
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("initialized", &self.live.is_some())
            .field("extensions", &self.enabled_extensions())
            .field("adapters", &self.registry)
            .field("session", &self.session)
            .finish()
    }
}

impl Provider {
    pub fn new(runtime: Arc<dyn XrRuntime>) -> Self {
        Self {
            runtime,
            live: None,
            registry: ExtensionRegistry::new(),
            session: None,
        }
    }

    pub fn runtime(&self) -> &Arc<dyn XrRuntime> {
        &self.runtime
    }

    /// Extension names the runtime advertises.
    pub fn supported_extensions(&self) -> ProviderResult<Vec<String>> {
        let extensions = self.runtime.enumerate_extensions().map_err(|code| {
            error!("unable to enumerate runtime extensions: {code}");
            ProviderError::Runtime(code)
        })?;
        Ok(extensions.into_iter().map(|e| e.name).collect())
    }

    pub fn supported_api_layers(&self) -> ProviderResult<Vec<String>> {
        let layers = self.runtime.enumerate_api_layers().map_err(|code| {
            error!("unable to enumerate api layers: {code}");
            ProviderError::Runtime(code)
        })?;
        Ok(layers.into_iter().map(|l| l.name).collect())
    }

    /// Keeps only the names the runtime advertises, in their original order.
    pub fn filter_requested(&self, names: &mut Vec<String>) -> ProviderResult<()> {
        let supported = self.supported_extensions()?;
        retain_supported(names, &supported, "extension");
        Ok(())
    }

    pub fn filter_api_layers(&self, names: &mut Vec<String>) -> ProviderResult<()> {
        let supported = self.supported_api_layers()?;
        retain_supported(names, &supported, "api layer");
        Ok(())
    }

    /// Best Vulkan binding extension on offer, for callers building a wishlist.
    pub fn preferred_vulkan_extension(&self) -> ProviderResult<Option<&'static str>> {
        let supported = self.supported_extensions()?;
        Ok([VULKAN_ENABLE2, VULKAN_ENABLE]
            .into_iter()
            .find(|name| supported.iter().any(|s| s == name)))
    }

    /// Creates the instance and resolves the head-mounted system.
    pub fn init(&mut self, app: &AppInfo) -> ProviderResult<()> {
        if self.live.is_some() {
            error!("provider already initialized");
            return Err(ProviderError::AlreadyInitialized);
        }

        let mut extensions = app.extensions.clone();
        extensions.retain(|name| {
            let unsupported = UNSUPPORTED_GRAPHICS_APIS.contains(&name.as_str());
            if unsupported {
                warn!("{name} removed from request: only Vulkan is supported");
            }
            !unsupported
        });
        self.filter_requested(&mut extensions)?;
        dedup_in_order(&mut extensions);

        let mut api_layers = app.api_layers.clone();
        if !api_layers.is_empty() {
            self.filter_api_layers(&mut api_layers)?;
            dedup_in_order(&mut api_layers);
        }

        let handle = self
            .runtime
            .create_instance(&InstanceCreateInfo {
                app_name: app.app_name.clone(),
                app_version: app.app_version,
                engine_name: app.engine_name.clone(),
                engine_version: app.engine_version,
                api_version: CURRENT_API_VERSION,
                extensions: extensions.clone(),
                api_layers: api_layers.clone(),
            })
            .map_err(|code| {
                error!("unable to create instance: {code}");
                ProviderError::RuntimeRefused(code)
            })?;
        let instance = InstanceContext::new(self.runtime.clone(), handle);
        info!("instance created with {} extension(s)", extensions.len());
        for name in &extensions {
            debug!("\t{name}");
        }

        let runtime_properties = match self.runtime.instance_properties(handle) {
            Ok(props) => {
                info!("runtime: {} {}", props.runtime_name, props.runtime_version);
                Some(props)
            }
            Err(code) => {
                warn!("unable to query runtime properties: {code}");
                None
            }
        };

        let system = match self.runtime.get_system(handle, FormFactor::HeadMountedDisplay) {
            Ok(system) => system,
            Err(code) => {
                error!("no head mounted display available: {code}");
                if let Err(destroy) = self.runtime.destroy_instance(handle) {
                    warn!("instance cleanup failed: {destroy}");
                }
                return Err(ProviderError::SystemUnavailable(code));
            }
        };

        let system_properties = match self.runtime.system_properties(handle, system) {
            Ok(props) => {
                info!(
                    "system: {} (vendor id {:#x})",
                    props.system_name, props.vendor_id
                );
                Some(props)
            }
            Err(code) => {
                warn!("unable to query system properties: {code}");
                None
            }
        };

        match self.runtime.enumerate_view_configurations(handle, system) {
            Ok(views) => {
                debug!("{} view configuration(s) supported:", views.len());
                for view in views {
                    debug!("\t{view:?}");
                }
            }
            Err(code) => warn!("unable to enumerate view configurations: {code}"),
        }

        if extensions.iter().any(|name| name == EYE_GAZE_INTERACTION) {
            self.registry.add(EYE_GAZE_INTERACTION, &instance, None);
        }

        self.live = Some(Live {
            instance,
            system,
            runtime_properties,
            system_properties,
            extensions,
            api_layers,
        });
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.live.is_some()
    }

    /// Enabled extensions in request order; empty before `init`.
    pub fn enabled_extensions(&self) -> &[String] {
        self.live
            .as_ref()
            .map(|live| live.extensions.as_slice())
            .unwrap_or_default()
    }

    pub fn enabled_api_layers(&self) -> &[String] {
        self.live
            .as_ref()
            .map(|live| live.api_layers.as_slice())
            .unwrap_or_default()
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled_extensions().iter().any(|e| e == name)
    }

    /// The Vulkan binding extension that was enabled, if any.
    pub fn vulkan_extension(&self) -> Option<&'static str> {
        [VULKAN_ENABLE2, VULKAN_ENABLE]
            .into_iter()
            .find(|name| self.is_enabled(name))
    }

    pub fn instance(&self) -> Option<&InstanceContext> {
        self.live.as_ref().map(|live| &live.instance)
    }

    pub fn system_id(&self) -> Option<SystemId> {
        self.live.as_ref().map(|live| live.system)
    }

    pub fn runtime_properties(&self) -> Option<&RuntimeProperties> {
        self.live.as_ref()?.runtime_properties.as_ref()
    }

    pub fn runtime_version(&self) -> Option<Version> {
        self.runtime_properties().map(|p| p.runtime_version)
    }

    pub fn system_properties(&self) -> Option<&SystemProperties> {
        self.live.as_ref()?.system_properties.as_ref()
    }

    pub fn extensions(&self) -> &ExtensionRegistry {
        &self.registry
    }

    pub fn extensions_mut(&mut self) -> &mut ExtensionRegistry {
        &mut self.registry
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut Session> {
        self.session.as_mut()
    }

    /// Registry and session borrowed together, for adapters that work
    /// through the session's [`Input`](crate::input::Input).
    pub fn extensions_and_session(&mut self) -> (&mut ExtensionRegistry, Option<&mut Session>) {
        (&mut self.registry, self.session.as_mut())
    }

    /// Creates the session and the adapters of every enabled session-level
    /// extension, in the order the extensions were enabled.
    pub fn create_session(
        &mut self,
        graphics: &GraphicsBinding,
        options: SessionOptions,
    ) -> ProviderResult<&mut Session> {
        let Some(live) = &self.live else {
            return Err(ProviderError::NotInitialized);
        };
        if self.session.is_some() {
            error!("a session already exists");
            return Err(ProviderError::SessionExists);
        }
        match graphics {
            GraphicsBinding::Headless if !live.extensions.iter().any(|e| e == HEADLESS) => {
                return Err(ProviderError::not_present(HEADLESS));
            }
            GraphicsBinding::Vulkan(_) if self.vulkan_extension().is_none() => {
                return Err(ProviderError::not_present(VULKAN_ENABLE2));
            }
            _ => {}
        }

        let session = Session::create(&live.instance, live.system, graphics, options)?;
        info!("session created ({})", session.handle().raw());

        let ctx = SessionContext::new(live.instance.clone(), session.handle(), session.app_space());
        for name in &live.extensions {
            if Extension::from_name(name).is_some_and(Extension::needs_session) {
                self.registry.add(name, &live.instance, Some(&ctx));
            }
        }

        Ok(self.session.insert(session))
    }

    /// Releases the session adapters, then the session. Returns whether a
    /// session existed.
    pub fn destroy_session(&mut self) -> bool {
        if self.session.is_none() {
            return false;
        }
        self.registry.remove_session_adapters();
        self.session = None;
        true
    }

    /// Pops one runtime event. Session state changes are applied to the
    /// live session before the event is returned.
    pub fn poll_event(&mut self) -> ProviderResult<Option<RuntimeEvent>> {
        let live = self.live.as_ref().ok_or(ProviderError::NotInitialized)?;
        let event = self
            .runtime
            .poll_event(live.instance.handle())
            .map_err(ProviderError::Runtime)?;

        match &event {
            Some(RuntimeEvent::SessionStateChanged { session, state, .. }) => {
                if let Some(current) = self.session.as_mut().filter(|s| s.handle() == *session) {
                    debug!("session state {:?} -> {state:?}", current.state());
                    current.set_state(*state);
                }
            }
            Some(RuntimeEvent::EventsLost { count }) => warn!("{count} runtime event(s) lost"),
            Some(RuntimeEvent::InstanceLossPending { loss_time }) => {
                warn!("instance loss pending at {loss_time}")
            }
            Some(other) => debug!("runtime event: {other:?}"),
            None => {}
        }
        Ok(event)
    }

    /// Drains the queue; returns how many events were handled.
    pub fn poll_events(&mut self) -> ProviderResult<usize> {
        let mut handled = 0;
        while self.poll_event()?.is_some() {
            handled += 1;
        }
        Ok(handled)
    }

    /// Tears everything down. Safe to call repeatedly.
    pub fn destroy(&mut self) {
        self.registry.clear();
        self.session = None;
        if let Some(live) = self.live.take() {
            match self.runtime.destroy_instance(live.instance.handle()) {
                Ok(()) => info!("instance destroyed"),
                Err(code) => warn!("unable to destroy instance: {code}"),
            }
        }
    }
}

impl Drop for Provider {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn retain_supported(names: &mut Vec<String>, supported: &[String], kind: &str) {
    names.retain(|name| {
        let keep = supported.iter().any(|s| s == name);
        if !keep {
            debug!("{kind} {name} not supported by the runtime; dropped");
        }
        keep
    });
}

fn dedup_in_order(names: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    names.retain(|name| seen.insert(name.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::XrCode;
    use crate::dummy::{DummyRuntime, DummyVerb};
    use crate::extensions::{EyeGaze, HAND_TRACKING, PASSTHROUGH, REFRESH_RATE};
    use crate::types::SessionState;

    fn strings(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_filter_keeps_order_and_drops_unknown() {
        let runtime = Arc::new(DummyRuntime::with_extensions(&["XR_B", "XR_C", "XR_D"]));
        let provider = Provider::new(runtime);
        let mut names = strings(&["XR_A", "XR_C", "XR_B"]);
        provider.filter_requested(&mut names).unwrap();
        assert_eq!(names, strings(&["XR_C", "XR_B"]));
    }

    #[test]
    fn test_init_enables_filtered_set() {
        let runtime = Arc::new(DummyRuntime::with_extensions(&["XR_B", "XR_C", "XR_D"]));
        let mut provider = Provider::new(runtime.clone());
        provider
            .init(&AppInfo::new("init-test").with_extensions(["XR_A", "XR_B", "XR_C", "XR_B"]))
            .unwrap();
        assert_eq!(provider.enabled_extensions(), strings(&["XR_B", "XR_C"]).as_slice());
        assert_eq!(runtime.enabled_extensions(), strings(&["XR_B", "XR_C"]));
        assert_eq!(provider.runtime_version(), Some(Version::new(1, 0, 7)));
        assert_eq!(
            provider.system_properties().map(|p| p.system_name.as_str()),
            Some("Dummy HMD")
        );
    }

    #[test]
    fn test_other_graphics_apis_stripped() {
        let runtime = Arc::new(DummyRuntime::new());
        runtime.set_extensions(&["XR_KHR_opengl_enable", VULKAN_ENABLE, HEADLESS]);
        let mut provider = Provider::new(runtime);
        assert_eq!(provider.preferred_vulkan_extension().unwrap(), Some(VULKAN_ENABLE));
        provider
            .init(&AppInfo::new("gfx-test").with_extensions([
                "XR_KHR_opengl_enable",
                VULKAN_ENABLE,
                HEADLESS,
            ]))
            .unwrap();
        assert_eq!(provider.enabled_extensions(), strings(&[VULKAN_ENABLE, HEADLESS]).as_slice());
        assert_eq!(provider.vulkan_extension(), Some(VULKAN_ENABLE));
    }

    #[test]
    fn test_init_twice_fails() {
        let runtime = Arc::new(DummyRuntime::new());
        let mut provider = Provider::new(runtime);
        let app = AppInfo::new("twice");
        provider.init(&app).unwrap();
        let err = provider.init(&app).unwrap_err();
        assert!(matches!(err, ProviderError::AlreadyInitialized));
        assert_eq!(err.code(), XrCode::ERROR_CALL_ORDER_INVALID);
    }

    #[test]
    fn test_refused_instance() {
        let runtime = Arc::new(DummyRuntime::new());
        runtime.fail_next(DummyVerb::CreateInstance, XrCode::ERROR_RUNTIME_UNAVAILABLE);
        let mut provider = Provider::new(runtime);
        let err = provider.init(&AppInfo::new("refused")).unwrap_err();
        assert!(matches!(err, ProviderError::RuntimeRefused(XrCode::ERROR_RUNTIME_UNAVAILABLE)));
        assert!(!provider.is_initialized());
    }

    #[test]
    fn test_missing_system_releases_instance() {
        let runtime = Arc::new(DummyRuntime::new());
        runtime.set_system_available(false);
        let mut provider = Provider::new(runtime.clone());
        let err = provider.init(&AppInfo::new("no-hmd")).unwrap_err();
        assert!(matches!(err, ProviderError::SystemUnavailable(_)));
        assert!(!runtime.has_instance());

        runtime.set_system_available(true);
        provider.init(&AppInfo::new("no-hmd")).unwrap();
    }

    #[test]
    fn test_eye_gaze_added_at_init() {
        let runtime = Arc::new(DummyRuntime::new());
        let mut provider = Provider::new(runtime);
        provider
            .init(&AppInfo::new("gaze").with_extensions([EYE_GAZE_INTERACTION, HAND_TRACKING]))
            .unwrap();
        assert!(provider.extensions().get::<EyeGaze>().is_some());
        assert_eq!(provider.extensions().len(), 1);
    }

    #[test]
    fn test_session_lifecycle() {
        let runtime = Arc::new(DummyRuntime::new());
        let mut provider = Provider::new(runtime.clone());
        assert!(matches!(
            provider.create_session(&GraphicsBinding::Headless, SessionOptions::default()),
            Err(ProviderError::NotInitialized)
        ));

        provider
            .init(&AppInfo::new("session").with_extensions([HEADLESS, PASSTHROUGH, REFRESH_RATE]))
            .unwrap();
        provider
            .create_session(&GraphicsBinding::Headless, SessionOptions::default())
            .unwrap();
        assert_eq!(provider.extensions().names(), vec![PASSTHROUGH, REFRESH_RATE]);
        assert!(matches!(
            provider.create_session(&GraphicsBinding::Headless, SessionOptions::default()),
            Err(ProviderError::SessionExists)
        ));

        assert!(provider.destroy_session());
        assert!(provider.extensions().is_empty());
        assert!(!provider.destroy_session());
        provider
            .create_session(&GraphicsBinding::Headless, SessionOptions::default())
            .unwrap();
    }

    #[test]
    fn test_headless_needs_its_extension() {
        let runtime = Arc::new(DummyRuntime::new());
        let mut provider = Provider::new(runtime);
        provider.init(&AppInfo::new("no-headless")).unwrap();
        let err = provider
            .create_session(&GraphicsBinding::Headless, SessionOptions::default())
            .unwrap_err();
        assert_eq!(err.code(), XrCode::ERROR_EXTENSION_NOT_PRESENT);
    }

    #[test]
    fn test_poll_event_tracks_session_state() {
        let runtime = Arc::new(DummyRuntime::new());
        let mut provider = Provider::new(runtime.clone());
        provider
            .init(&AppInfo::new("events").with_extensions([HEADLESS]))
            .unwrap();
        provider
            .create_session(&GraphicsBinding::Headless, SessionOptions::default())
            .unwrap();
        assert_eq!(provider.session().unwrap().state(), SessionState::Unknown);

        runtime.push_event(RuntimeEvent::EventsLost { count: 3 });
        assert_eq!(provider.poll_events().unwrap(), 3);
        assert_eq!(provider.session().unwrap().state(), SessionState::Ready);
        assert_eq!(provider.poll_event().unwrap(), None);
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let runtime = Arc::new(DummyRuntime::new());
        let mut provider = Provider::new(runtime.clone());
        provider
            .init(&AppInfo::new("destroy").with_extensions([HEADLESS]))
            .unwrap();
        provider
            .create_session(&GraphicsBinding::Headless, SessionOptions::default())
            .unwrap();
        provider.destroy();
        provider.destroy();
        assert!(!runtime.has_instance());
        assert!(provider.instance().is_none());
        assert!(provider.enabled_extensions().is_empty());
        let destroys = runtime
            .call_log()
            .iter()
            .filter(|e| *e == "destroy_instance")
            .count();
        assert_eq!(destroys, 1);
    }
}
