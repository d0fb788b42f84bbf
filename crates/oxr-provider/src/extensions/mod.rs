//! Extension negotiation results and the adapters built on top of them.
//!
//! The registry keeps at most one adapter per supported extension, in the
//! order they were added, and tears them down in reverse.

use std::any::Any;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::code::XrCode;
use crate::context::{InstanceContext, SessionContext};
use crate::ProviderResult;

pub mod eye_gaze;
pub mod hand_tracking;
pub mod passthrough;
pub mod refresh_rate;
pub mod vive_tracker;
pub mod visibility_mask;

pub use eye_gaze::EyeGaze;
pub use hand_tracking::HandTracking;
pub use passthrough::{Passthrough, PassthroughMode};
pub use refresh_rate::RefreshRate;
pub use vive_tracker::ViveTrackerInteraction;
pub use visibility_mask::{VisibilityMask, VisibilityMaskData};

pub const VISIBILITY_MASK: &str = "XR_KHR_visibility_mask";
pub const HAND_TRACKING: &str = "XR_EXT_hand_tracking";
pub const HAND_JOINTS_MOTION_RANGE: &str = "XR_EXT_hand_joints_motion_range";
pub const EYE_GAZE_INTERACTION: &str = "XR_EXT_eye_gaze_interaction";
pub const PASSTHROUGH: &str = "XR_FB_passthrough";
pub const REFRESH_RATE: &str = "XR_FB_display_refresh_rate";
pub const VIVE_TRACKER_INTERACTION: &str = "XR_HTCX_vive_tracker_interaction";
pub const HEADLESS: &str = "XR_MND_headless";
pub const VULKAN_ENABLE: &str = "XR_KHR_vulkan_enable";
pub const VULKAN_ENABLE2: &str = "XR_KHR_vulkan_enable2";

/// Graphics APIs other than Vulkan; stripped from every request.
pub const UNSUPPORTED_GRAPHICS_APIS: [&str; 5] = [
    "XR_KHR_opengl_enable",
    "XR_KHR_opengl_es_enable",
    "XR_KHR_D3D11_enable",
    "XR_KHR_D3D12_enable",
    "XR_MNDX_egl_enable",
];

/// Extensions with a native adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Extension {
    VisibilityMask,
    HandTracking,
    EyeGaze,
    Passthrough,
    RefreshRate,
    ViveTracker,
}

impl Extension {
    pub const ALL: [Extension; 6] = [
        Extension::VisibilityMask,
        Extension::HandTracking,
        Extension::EyeGaze,
        Extension::Passthrough,
        Extension::RefreshRate,
        Extension::ViveTracker,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Extension::VisibilityMask => VISIBILITY_MASK,
            Extension::HandTracking => HAND_TRACKING,
            Extension::EyeGaze => EYE_GAZE_INTERACTION,
            Extension::Passthrough => PASSTHROUGH,
            Extension::RefreshRate => REFRESH_RATE,
            Extension::ViveTracker => VIVE_TRACKER_INTERACTION,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ext| ext.name() == name)
    }

    /// Eye gaze works on the instance alone; every other adapter is bound
    /// to a session.
    pub fn needs_session(self) -> bool {
        !matches!(self, Extension::EyeGaze)
    }
}

impl std::fmt::Display for Extension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Common surface of every extension adapter.
pub trait ExtensionAdapter: Send + Sync + 'static {
    fn extension(&self) -> Extension;

    /// Canonical extension name, as the runtime reports it.
    fn name(&self) -> &'static str {
        self.extension().name()
    }

    /// Checks the resolved entry points and creates any runtime objects the
    /// adapter needs. Called once by the registry right after construction.
    fn init(&mut self) -> ProviderResult<()>;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Implements the `ExtensionAdapter` boilerplate for an adapter type.
macro_rules! adapter_common {
    ($ext:expr) => {
        fn extension(&self) -> $crate::extensions::Extension {
            $ext
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
    };
}
pub(crate) use adapter_common;

/// Resolved dispatch table, or the code the runtime refused it with.
pub(crate) type Resolved<T> = Result<Arc<T>, XrCode>;

pub(crate) fn resolved<T: ?Sized>(
    extension: Extension,
    result: Result<Arc<T>, XrCode>,
) -> Resolved<T> {
    if let Err(code) = &result {
        warn!("unable to resolve {extension} entry points: {code}");
    }
    result
}

pub(crate) fn fns<T: ?Sized>(table: &Resolved<T>) -> ProviderResult<&Arc<T>> {
    table.as_ref().map_err(|code| crate::ProviderError::Runtime(*code))
}

struct Entry {
    adapter: Box<dyn ExtensionAdapter>,
    status: Result<(), XrCode>,
}

/// Owns the adapters of the enabled extensions.
#[derive(Default)]
pub struct ExtensionRegistry {
    entries: Vec<Entry>,
}

impl std::fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| (e.adapter.name(), e.status.is_ok())))
            .finish()
    }
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds and records the adapter for `name`.
    ///
    /// Returns `false` when the name has no native adapter, when an adapter
    /// for it is already present, or when a session adapter is requested
    /// without a session. A failing `init` is recorded on the entry (see
    /// [`ExtensionRegistry::status`]) and still returns `true`.
    pub fn add(
        &mut self,
        name: &str,
        instance: &InstanceContext,
        session: Option<&SessionContext>,
    ) -> bool {
        let Some(extension) = Extension::from_name(name) else {
            debug!("{name} has no native adapter");
            return false;
        };
        if self.contains(extension) {
            debug!("{name} adapter already registered");
            return false;
        }

        let mut adapter: Box<dyn ExtensionAdapter> = match (extension, session) {
            (Extension::EyeGaze, _) => Box::new(EyeGaze::new(instance)),
            (_, None) => {
                error!("{name} needs a live session; adapter not created");
                return false;
            }
            (Extension::VisibilityMask, Some(s)) => {
                Box::new(VisibilityMask::new(instance, s.session()))
            }
            (Extension::HandTracking, Some(s)) => {
                Box::new(HandTracking::new(instance, s.session()))
            }
            (Extension::Passthrough, Some(s)) => Box::new(Passthrough::new(instance, s.session())),
            (Extension::RefreshRate, Some(s)) => Box::new(RefreshRate::new(instance, s.session())),
            (Extension::ViveTracker, Some(s)) => {
                Box::new(ViveTrackerInteraction::new(instance, s.session()))
            }
        };

        let status = adapter.init().map_err(|err| {
            warn!("{name} adapter failed to initialize: {err}");
            err.code()
        });
        if status.is_ok() {
            info!("{name} adapter ready");
        }
        self.entries.push(Entry { adapter, status });
        true
    }

    pub fn contains(&self, extension: Extension) -> bool {
        self.entries
            .iter()
            .any(|e| e.adapter.extension() == extension)
    }

    /// Typed lookup.
    pub fn get<T: ExtensionAdapter>(&self) -> Option<&T> {
        self.entries
            .iter()
            .find_map(|e| e.adapter.as_any().downcast_ref::<T>())
    }

    pub fn get_mut<T: ExtensionAdapter>(&mut self) -> Option<&mut T> {
        self.entries
            .iter_mut()
            .find_map(|e| e.adapter.as_any_mut().downcast_mut::<T>())
    }

    pub fn get_by_name(&self, name: &str) -> Option<&dyn ExtensionAdapter> {
        self.entries
            .iter()
            .find(|e| e.adapter.name() == name)
            .map(|e| e.adapter.as_ref())
    }

    /// Outcome of the adapter's `init`, if the adapter exists.
    pub fn status(&self, extension: Extension) -> Option<Result<(), XrCode>> {
        self.entries
            .iter()
            .find(|e| e.adapter.extension() == extension)
            .map(|e| e.status)
    }

    /// Adapter names in insertion order.
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.adapter.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every session-bound adapter, newest first.
    pub fn remove_session_adapters(&mut self) {
        let mut index = self.entries.len();
        while index > 0 {
            index -= 1;
            if self.entries[index].adapter.extension().needs_session() {
                let entry = self.entries.remove(index);
                debug!("{} adapter released", entry.adapter.name());
            }
        }
    }

    /// Drops every adapter, newest first.
    pub fn clear(&mut self) {
        while let Some(entry) = self.entries.pop() {
            debug!("{} adapter released", entry.adapter.name());
        }
    }
}

impl Drop for ExtensionRegistry {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dummy::DummyRuntime;
    use crate::provider::{AppInfo, Provider};
    use crate::runtime::GraphicsBinding;
    use crate::session::SessionOptions;

    fn provider(runtime: &Arc<DummyRuntime>, extensions: &[&str]) -> Provider {
        let mut provider = Provider::new(runtime.clone());
        let mut wishlist = vec![HEADLESS];
        wishlist.extend_from_slice(extensions);
        provider
            .init(&AppInfo::new("registry-test").with_extensions(wishlist))
            .unwrap();
        provider
    }

    #[test]
    fn test_extension_names_round_trip() {
        for ext in Extension::ALL {
            assert_eq!(Extension::from_name(ext.name()), Some(ext));
        }
        assert_eq!(Extension::from_name(HEADLESS), None);
    }

    #[test]
    fn test_unknown_name_not_added() {
        let runtime = Arc::new(DummyRuntime::new());
        let provider = provider(&runtime, &[]);
        let mut registry = ExtensionRegistry::new();
        assert!(!registry.add(HEADLESS, provider.instance().unwrap(), None));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_session_adapter_without_session_refused() {
        let runtime = Arc::new(DummyRuntime::new());
        let provider = provider(&runtime, &[REFRESH_RATE]);
        let mut registry = ExtensionRegistry::new();
        assert!(!registry.add(REFRESH_RATE, provider.instance().unwrap(), None));
        assert!(registry.get::<RefreshRate>().is_none());
    }

    #[test]
    fn test_one_adapter_per_extension() {
        let runtime = Arc::new(DummyRuntime::new());
        let provider = provider(&runtime, &[EYE_GAZE_INTERACTION]);
        let mut registry = ExtensionRegistry::new();
        let instance = provider.instance().unwrap();
        assert!(registry.add(EYE_GAZE_INTERACTION, instance, None));
        assert!(!registry.add(EYE_GAZE_INTERACTION, instance, None));
        assert_eq!(registry.len(), 1);
        assert!(registry.get::<EyeGaze>().is_some());
        assert!(registry.get::<HandTracking>().is_none());
    }

    #[test]
    fn test_failed_resolution_is_recorded() {
        let runtime = Arc::new(DummyRuntime::new());
        runtime.make_unresolvable(REFRESH_RATE);
        let mut provider = provider(&runtime, &[REFRESH_RATE]);
        provider
            .create_session(&GraphicsBinding::Headless, SessionOptions::default())
            .unwrap();

        let registry = provider.extensions();
        assert_eq!(
            registry.status(Extension::RefreshRate),
            Some(Err(XrCode::ERROR_FUNCTION_UNSUPPORTED))
        );
        let adapter = registry.get::<RefreshRate>().unwrap();
        assert_eq!(
            adapter.current_rate().unwrap_err().code(),
            XrCode::ERROR_FUNCTION_UNSUPPORTED
        );
    }

    #[test]
    fn test_teardown_is_reverse_order() {
        let runtime = Arc::new(DummyRuntime::new());
        let mut provider = provider(&runtime, &[HAND_TRACKING, PASSTHROUGH]);
        provider
            .create_session(&GraphicsBinding::Headless, SessionOptions::default())
            .unwrap();
        assert_eq!(
            provider.extensions().names(),
            vec![HAND_TRACKING, PASSTHROUGH]
        );

        provider.destroy();
        let log = runtime.call_log();
        let position = |entry: &str| log.iter().position(|e| e == entry).unwrap();
        assert!(position("destroy_passthrough") < position("destroy_hand_tracker:Left"));
        assert!(position("destroy_hand_tracker:Right") < position("destroy_session"));
        assert!(position("destroy_session") < position("destroy_instance"));
    }
}
