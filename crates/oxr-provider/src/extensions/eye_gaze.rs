//! `XR_EXT_eye_gaze_interaction`
//!
//! Instance-level: the gaze pose is an ordinary pose action bound under its
//! own interaction profile, so this adapter only carries the profile and
//! the sample-time query.

use tracing::{debug, error, info};

use super::{adapter_common, Extension, ExtensionAdapter};
use crate::action::Action;
use crate::context::InstanceContext;
use crate::runtime::SuggestedBinding;
use crate::types::{ActionType, SpaceHandle, SystemId, XrTime};
use crate::{ProviderError, ProviderResult};

pub const PROFILE: &str = "/interaction_profiles/ext/eye_gaze_interaction";
pub const GAZE_POSE_PATH: &str = "/user/eyes_ext/input/gaze_ext/pose";

pub struct EyeGaze {
    instance: InstanceContext,
    bindings: Vec<SuggestedBinding>,
}

impl EyeGaze {
    pub fn new(instance: &InstanceContext) -> Self {
        Self {
            instance: instance.clone(),
            bindings: Vec::new(),
        }
    }

    /// Whether the system reports eye gaze input.
    pub fn is_supported(&self, system: SystemId) -> ProviderResult<bool> {
        let properties = self
            .instance
            .runtime()
            .system_properties(self.instance.handle(), system)
            .map_err(|code| {
                error!("unable to query eye gaze support: {code}");
                ProviderError::Runtime(code)
            })?;
        Ok(properties.supports_eye_gaze)
    }

    /// Records `action` for the gaze pose. The action must be a pose action.
    pub fn add_pose_binding(&mut self, action: &Action) -> ProviderResult<()> {
        if action.action_type() != ActionType::Pose {
            return Err(ProviderError::TypeMismatch {
                action: action.name().to_string(),
                actual: action.action_type(),
                requested: ActionType::Pose,
            });
        }
        let binding = SuggestedBinding {
            action: action.handle(),
            binding: self.instance.string_to_path(GAZE_POSE_PATH)?,
        };
        if self.bindings.contains(&binding) {
            debug!("gaze binding for {} already recorded", action.name());
            return Ok(());
        }
        self.bindings.push(binding);
        Ok(())
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    /// Sends the recorded gaze bindings under [`PROFILE`].
    pub fn suggest_bindings(&self) -> ProviderResult<()> {
        if self.bindings.is_empty() {
            debug!("no eye gaze bindings recorded");
            return Ok(());
        }
        self.instance.suggest_bindings(PROFILE, &self.bindings)?;
        info!("eye gaze bindings sent to runtime");
        Ok(())
    }

    /// Time at which the gaze pose located in `space` was sampled.
    pub fn sample_time(
        &self,
        space: SpaceHandle,
        base: SpaceHandle,
        time: XrTime,
    ) -> ProviderResult<XrTime> {
        self.instance
            .runtime()
            .eye_gaze_sample_time(space, base, time)
            .map_err(ProviderError::Runtime)
    }
}

impl ExtensionAdapter for EyeGaze {
    adapter_common!(Extension::EyeGaze);

    fn init(&mut self) -> ProviderResult<()> {
        Ok(())
    }
}
