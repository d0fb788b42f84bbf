//! `XR_HTCX_vive_tracker_interaction`

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use super::{adapter_common, fns, resolved, Extension, ExtensionAdapter, Resolved};
use crate::action::{Action, ActionSet};
use crate::context::InstanceContext;
use crate::input::Input;
use crate::profiles::{Component, ControllerProfile, Qualifier, TrackerRole, ViveTracker};
use crate::runtime::ViveTrackerFns;
use crate::types::{ActionType, Posef, SessionHandle, SpaceHandle, ViveTrackerPaths};
use crate::{ProviderError, ProviderResult};

pub const TRACKER_POSE_ACTION: &str = "tracker_pose";

/// A tracker the runtime currently reports as connected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectedTracker {
    pub persistent_path: String,
    /// `None` until the user assigns the tracker a role.
    pub role: Option<TrackerRole>,
}

pub struct ViveTrackerInteraction {
    instance: InstanceContext,
    session: SessionHandle,
    fns: Resolved<dyn ViveTrackerFns>,
    action: Option<Arc<Action>>,
    /// Spaces created and bindings suggested for `action`.
    configured: bool,
    profile: ViveTracker,
}

impl ViveTrackerInteraction {
    pub fn new(instance: &InstanceContext, session: SessionHandle) -> Self {
        let fns = resolved(
            Extension::ViveTracker,
            instance.runtime().resolve_vive_tracker(instance.handle()),
        );
        Self {
            instance: instance.clone(),
            session,
            fns,
            action: None,
            configured: false,
            profile: ViveTracker::new(),
        }
    }

    /// Role user paths in declaration order.
    pub fn role_paths() -> Vec<String> {
        TrackerRole::ALL.iter().map(|role| role.path()).collect()
    }

    /// [`ExtensionAdapter::init`] followed by [`Self::setup_roles`].
    pub fn init_with_roles(
        &mut self,
        input: &Input,
        set: &ActionSet,
        localized_name: &str,
    ) -> ProviderResult<Arc<Action>> {
        self.init()?;
        self.setup_roles(input, set, localized_name)
    }

    /// Creates one pose action covering every tracker role, an action space
    /// per role and a grip pose binding per role, then suggests them.
    ///
    /// `set` must not be attached yet. The action is kept as soon as it
    /// exists, so a call that failed later on can be retried.
    pub fn setup_roles(
        &mut self,
        input: &Input,
        set: &ActionSet,
        localized_name: &str,
    ) -> ProviderResult<Arc<Action>> {
        if input.context().session() != self.session {
            return Err(ProviderError::validation(
                "input belongs to a different session",
            ));
        }
        let action = match &self.action {
            Some(action) if self.configured => return Ok(action.clone()),
            Some(action) => action.clone(),
            None => {
                let roles = Self::role_paths();
                let role_refs: Vec<&str> = roles.iter().map(String::as_str).collect();
                let action = input.create_action(
                    set,
                    TRACKER_POSE_ACTION,
                    localized_name,
                    ActionType::Pose,
                    &role_refs,
                )?;
                self.action = Some(action.clone());
                action
            }
        };
        // Replaces any space left over from an earlier attempt.
        input.create_action_spaces(&action, Posef::IDENTITY)?;

        for role in TrackerRole::ALL {
            self.profile.suggest_role_binding(
                &self.instance,
                &action,
                role,
                Component::GripPose,
                Qualifier::None,
            )?;
        }
        self.profile.suggest_all(&self.instance)?;
        info!(
            "tracker pose action created for {} roles in {}",
            TrackerRole::ALL.len(),
            set.name()
        );

        self.configured = true;
        Ok(action)
    }

    pub fn tracker_action(&self) -> Option<&Arc<Action>> {
        self.action.as_ref()
    }

    /// Action spaces in role order; empty before [`Self::setup_roles`], and
    /// null for roles whose space a failed setup did not create.
    pub fn tracker_spaces(&self) -> Vec<SpaceHandle> {
        self.action
            .as_ref()
            .map(|action| action.spaces())
            .unwrap_or_default()
    }

    pub fn profile(&self) -> &ViveTracker {
        &self.profile
    }

    pub fn connected_trackers(&self) -> ProviderResult<Vec<ConnectedTracker>> {
        let fns = fns(&self.fns)?;
        let instance = self.instance.handle();
        let count = fns.enumerate_tracker_paths(instance, &mut []).map_err(|code| {
            error!("unable to query tracker count: {code}");
            ProviderError::Runtime(code)
        })?;
        if count == 0 {
            return Ok(Vec::new());
        }
        let mut paths = vec![ViveTrackerPaths::default(); count as usize];
        let written = fns
            .enumerate_tracker_paths(instance, &mut paths)
            .map_err(|code| {
                error!("unable to enumerate trackers: {code}");
                ProviderError::Runtime(code)
            })?;
        paths.truncate(written as usize);

        paths
            .into_iter()
            .map(|entry| {
                let persistent_path = self.instance.path_to_string(entry.persistent_path)?;
                let role = if entry.role_path.is_null() {
                    None
                } else {
                    let role_path = self.instance.path_to_string(entry.role_path)?;
                    let role = role_path
                        .rsplit('/')
                        .next()
                        .and_then(TrackerRole::from_segment);
                    if role.is_none() {
                        warn!("tracker {persistent_path} has unknown role {role_path}");
                    }
                    role
                };
                Ok(ConnectedTracker {
                    persistent_path,
                    role,
                })
            })
            .collect()
    }
}

impl ExtensionAdapter for ViveTrackerInteraction {
    adapter_common!(Extension::ViveTracker);

    fn init(&mut self) -> ProviderResult<()> {
        fns(&self.fns).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::code::XrCode;
    use crate::dummy::DummyVerb;
    use crate::extensions::{HEADLESS, VIVE_TRACKER_INTERACTION};
    use crate::provider::{AppInfo, Provider};
    use crate::runtime::GraphicsBinding;
    use crate::session::SessionOptions;
    use crate::DummyRuntime;

    fn provider(runtime: &Arc<DummyRuntime>) -> Provider {
        let mut provider = Provider::new(runtime.clone());
        provider
            .init(
                &AppInfo::new("tracker-test")
                    .with_extensions([HEADLESS, VIVE_TRACKER_INTERACTION]),
            )
            .unwrap();
        provider
            .create_session(&GraphicsBinding::Headless, SessionOptions::default())
            .unwrap();
        provider
    }

    #[test]
    fn test_one_action_one_space_per_role() {
        let runtime = Arc::new(DummyRuntime::new());
        let mut provider = provider(&runtime);
        let (registry, session) = provider.extensions_and_session();
        let input = session.unwrap().input();
        let set = input.create_action_set("trackers", "Trackers", 0).unwrap();
        let trackers = registry.get_mut::<ViveTrackerInteraction>().unwrap();

        let action = trackers.setup_roles(input, &set, "Tracker pose").unwrap();
        assert_eq!(action.name(), TRACKER_POSE_ACTION);
        assert_eq!(action.subaction_paths().len(), TrackerRole::ALL.len());
        assert_eq!(runtime.action_spaces(action.handle()).len(), TrackerRole::ALL.len());
        assert_eq!(trackers.tracker_spaces().len(), TrackerRole::ALL.len());
        assert_eq!(set.len(), 1);

        let suggested = runtime.suggested_bindings(ViveTracker::PATH);
        assert_eq!(suggested.len(), TrackerRole::ALL.len());
        assert!(suggested
            .iter()
            .all(|(handle, path)| *handle == action.handle() && path.ends_with("/input/grip/pose")));

        let again = trackers.setup_roles(input, &set, "Tracker pose").unwrap();
        assert!(Arc::ptr_eq(&action, &again));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_setup_retries_after_partial_failure() {
        let runtime = Arc::new(DummyRuntime::new());
        let mut provider = provider(&runtime);
        let (registry, session) = provider.extensions_and_session();
        let input = session.unwrap().input();
        let set = input.create_action_set("trackers", "Trackers", 0).unwrap();
        let trackers = registry.get_mut::<ViveTrackerInteraction>().unwrap();

        runtime.fail_nth(DummyVerb::CreateActionSpace, 2, XrCode::ERROR_RUNTIME_FAILURE);
        let err = trackers.setup_roles(input, &set, "Tracker pose").unwrap_err();
        assert_eq!(err.code(), XrCode::ERROR_RUNTIME_FAILURE);
        let first = trackers.tracker_action().unwrap().clone();
        assert_eq!(set.len(), 1);

        runtime.fail_next(DummyVerb::SuggestBindings, XrCode::ERROR_RUNTIME_FAILURE);
        assert!(trackers.setup_roles(input, &set, "Tracker pose").is_err());
        assert!(runtime.suggested_bindings(ViveTracker::PATH).is_empty());

        let action = trackers.setup_roles(input, &set, "Tracker pose").unwrap();
        assert!(Arc::ptr_eq(&first, &action));
        assert_eq!(set.len(), 1);
        assert_eq!(runtime.action_spaces(action.handle()).len(), TrackerRole::ALL.len());
        assert!(trackers.tracker_spaces().iter().all(|space| !space.is_null()));
        assert_eq!(
            runtime.suggested_bindings(ViveTracker::PATH).len(),
            TrackerRole::ALL.len()
        );
    }

    #[test]
    fn test_attached_set_refused() {
        let runtime = Arc::new(DummyRuntime::new());
        let mut provider = provider(&runtime);
        let (registry, session) = provider.extensions_and_session();
        let input = session.unwrap().input_mut();
        let set = input.create_action_set("late", "Late", 0).unwrap();
        input.attach_action_sets(&[&*set]).unwrap();

        let trackers = registry.get_mut::<ViveTrackerInteraction>().unwrap();
        let err = trackers.setup_roles(input, &set, "Tracker pose").unwrap_err();
        assert!(matches!(err, ProviderError::ActionSetAttached(_)));
        assert!(trackers.tracker_action().is_none());
    }

    #[test]
    fn test_connected_trackers() {
        let runtime = Arc::new(DummyRuntime::new());
        let provider = provider(&runtime);
        let trackers = provider
            .extensions()
            .get::<ViveTrackerInteraction>()
            .unwrap();
        assert!(trackers.connected_trackers().unwrap().is_empty());

        runtime
            .connect_tracker("/devices/htc/vive_tracker_lhr_1", &TrackerRole::Waist.path())
            .unwrap();
        let connected = trackers.connected_trackers().unwrap();
        assert_eq!(
            connected,
            vec![ConnectedTracker {
                persistent_path: "/devices/htc/vive_tracker_lhr_1".into(),
                role: Some(TrackerRole::Waist),
            }]
        );

        runtime.fail_next(DummyVerb::EnumerateTrackers, XrCode::ERROR_RUNTIME_FAILURE);
        assert_eq!(
            trackers.connected_trackers().unwrap_err().code(),
            XrCode::ERROR_RUNTIME_FAILURE
        );
    }
}
