//! The runtime surface consumed by the provider.
//!
//! [`XrRuntime`] mirrors the C-style OpenXR entry points one verb at a time.
//! Implementations return the runtime's raw result code on failure and never
//! interpret it. Verbs whose success can be qualified (`XR_SESSION_NOT_FOCUSED`,
//! `XR_SESSION_LOSS_PENDING`, `XR_FRAME_DISCARDED`) also hand back the success
//! code they got. Extension entry points are resolved per instance through the
//! `resolve_*` methods, which hand out dispatch tables owned by the adapters.

use std::sync::Arc;

use crate::code::XrCode;
use crate::types::{
    ActionHandle, ActionSetHandle, ActionType, ApiLayerProperties, BlendMode, BoolState, Color4f,
    ExtensionProperties, FloatState, FormFactor, FrameState, Hand, HandJointsMotionRange,
    HandTrackerHandle, HapticVibration, InstanceHandle, JointLocation, JointVelocity,
    PassthroughHandle, PassthroughLayerHandle, PoseState, Posef, ReferenceSpace, RuntimeEvent,
    RuntimeProperties, SessionHandle, SpaceHandle, SpaceLocation, SystemId, SystemProperties,
    Vector2State, Vector2f, Version, ViewConfiguration, ViveTrackerPaths, VisibilityMaskType,
    XrPath, XrTime,
};

pub type RawResult<T> = std::result::Result<T, XrCode>;

/// API version requested at instance creation.
pub const CURRENT_API_VERSION: Version = Version::new(1, 0, 0);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceCreateInfo {
    pub app_name: String,
    pub app_version: u32,
    pub engine_name: String,
    pub engine_version: u32,
    pub api_version: Version,
    pub extensions: Vec<String>,
    pub api_layers: Vec<String>,
}

/// Raw Vulkan handles handed to the runtime, stored as integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VulkanBinding {
    pub instance: u64,
    pub physical_device: u64,
    pub device: u64,
    pub queue_family_index: u32,
    pub queue_index: u32,
}

/// Graphics binding for session creation. Vulkan is the only rendering API;
/// `Headless` requires `XR_MND_headless`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphicsBinding {
    Headless,
    Vulkan(VulkanBinding),
}

#[derive(Debug, Clone, Copy)]
pub struct ActionCreateInfo<'a> {
    pub name: &'a str,
    pub localized_name: &'a str,
    pub action_type: ActionType,
    pub subaction_paths: &'a [XrPath],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SuggestedBinding {
    pub action: ActionHandle,
    pub binding: XrPath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActiveActionSet {
    pub action_set: ActionSetHandle,
    pub subaction_path: XrPath,
}

/// Composition layers this layer can submit. Projection layers are owned by
/// the graphics backend and never pass through here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLayer {
    Passthrough(PassthroughLayerHandle),
}

#[derive(Debug, Clone, Copy)]
pub struct FrameEnd<'a> {
    pub display_time: XrTime,
    pub blend_mode: BlendMode,
    pub layers: &'a [FrameLayer],
}

#[derive(Debug, Clone, PartialEq)]
pub enum PassthroughColorMap {
    MonoToMono(Box<[u8; 256]>),
    MonoToRgba(Box<[Color4f; 256]>),
    BrightnessContrastSaturation {
        brightness: f32,
        contrast: f32,
        saturation: f32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PassthroughStyle {
    pub opacity: f32,
    pub edge_color: Color4f,
    pub color_map: Option<PassthroughColorMap>,
}

/// Element counts written by the two-call visibility mask query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MaskCounts {
    pub vertex_count: u32,
    pub index_count: u32,
}

pub trait XrRuntime: Send + Sync {
    fn enumerate_extensions(&self) -> RawResult<Vec<ExtensionProperties>>;
    fn enumerate_api_layers(&self) -> RawResult<Vec<ApiLayerProperties>>;

    fn create_instance(&self, info: &InstanceCreateInfo) -> RawResult<InstanceHandle>;
    fn destroy_instance(&self, instance: InstanceHandle) -> RawResult<()>;
    fn instance_properties(&self, instance: InstanceHandle) -> RawResult<RuntimeProperties>;
    fn get_system(&self, instance: InstanceHandle, form_factor: FormFactor) -> RawResult<SystemId>;
    fn system_properties(
        &self,
        instance: InstanceHandle,
        system: SystemId,
    ) -> RawResult<SystemProperties>;
    fn enumerate_view_configurations(
        &self,
        instance: InstanceHandle,
        system: SystemId,
    ) -> RawResult<Vec<ViewConfiguration>>;

    fn string_to_path(&self, instance: InstanceHandle, path: &str) -> RawResult<XrPath>;
    fn path_to_string(&self, instance: InstanceHandle, path: XrPath) -> RawResult<String>;

    /// Returns `Ok(None)` when the queue is empty.
    fn poll_event(&self, instance: InstanceHandle) -> RawResult<Option<RuntimeEvent>>;

    fn create_session(
        &self,
        instance: InstanceHandle,
        system: SystemId,
        graphics: &GraphicsBinding,
    ) -> RawResult<SessionHandle>;
    fn destroy_session(&self, session: SessionHandle) -> RawResult<()>;
    fn begin_session(&self, session: SessionHandle, view: ViewConfiguration) -> RawResult<()>;
    fn end_session(&self, session: SessionHandle) -> RawResult<()>;
    fn request_exit_session(&self, session: SessionHandle) -> RawResult<()>;

    fn enumerate_reference_spaces(&self, session: SessionHandle)
        -> RawResult<Vec<ReferenceSpace>>;
    fn create_reference_space(
        &self,
        session: SessionHandle,
        kind: ReferenceSpace,
        pose: Posef,
    ) -> RawResult<SpaceHandle>;
    fn destroy_space(&self, space: SpaceHandle) -> RawResult<()>;
    fn locate_space(
        &self,
        space: SpaceHandle,
        base: SpaceHandle,
        time: XrTime,
    ) -> RawResult<(SpaceLocation, XrCode)>;

    fn wait_frame(&self, session: SessionHandle) -> RawResult<(FrameState, XrCode)>;
    /// `XR_FRAME_DISCARDED` when the previous frame was never ended.
    fn begin_frame(&self, session: SessionHandle) -> RawResult<XrCode>;
    fn end_frame(&self, session: SessionHandle, frame: &FrameEnd<'_>) -> RawResult<XrCode>;

    fn create_action_set(
        &self,
        instance: InstanceHandle,
        name: &str,
        localized_name: &str,
        priority: u32,
    ) -> RawResult<ActionSetHandle>;
    fn destroy_action_set(&self, action_set: ActionSetHandle) -> RawResult<()>;
    fn create_action(
        &self,
        action_set: ActionSetHandle,
        info: &ActionCreateInfo<'_>,
    ) -> RawResult<ActionHandle>;
    fn destroy_action(&self, action: ActionHandle) -> RawResult<()>;
    fn create_action_space(
        &self,
        session: SessionHandle,
        action: ActionHandle,
        subaction_path: XrPath,
        pose: Posef,
    ) -> RawResult<SpaceHandle>;

    fn suggest_bindings(
        &self,
        instance: InstanceHandle,
        profile: XrPath,
        bindings: &[SuggestedBinding],
    ) -> RawResult<()>;
    fn attach_action_sets(
        &self,
        session: SessionHandle,
        action_sets: &[ActionSetHandle],
    ) -> RawResult<()>;
    /// `XR_SESSION_NOT_FOCUSED` means no action state was refreshed.
    fn sync_actions(&self, session: SessionHandle, active: &[ActiveActionSet])
        -> RawResult<XrCode>;

    fn action_state_boolean(
        &self,
        session: SessionHandle,
        action: ActionHandle,
        subaction_path: XrPath,
    ) -> RawResult<BoolState>;
    fn action_state_float(
        &self,
        session: SessionHandle,
        action: ActionHandle,
        subaction_path: XrPath,
    ) -> RawResult<FloatState>;
    fn action_state_vector2f(
        &self,
        session: SessionHandle,
        action: ActionHandle,
        subaction_path: XrPath,
    ) -> RawResult<Vector2State>;
    fn action_state_pose(
        &self,
        session: SessionHandle,
        action: ActionHandle,
        subaction_path: XrPath,
    ) -> RawResult<PoseState>;

    fn apply_haptic_feedback(
        &self,
        session: SessionHandle,
        action: ActionHandle,
        subaction_path: XrPath,
        vibration: &HapticVibration,
    ) -> RawResult<XrCode>;
    fn stop_haptic_feedback(
        &self,
        session: SessionHandle,
        action: ActionHandle,
        subaction_path: XrPath,
    ) -> RawResult<()>;
    fn current_interaction_profile(
        &self,
        session: SessionHandle,
        user_path: XrPath,
    ) -> RawResult<XrPath>;

    /// Sample time of the last eye gaze pose (`XR_EXT_eye_gaze_interaction`).
    fn eye_gaze_sample_time(
        &self,
        _space: SpaceHandle,
        _base: SpaceHandle,
        _time: XrTime,
    ) -> RawResult<XrTime> {
        Err(XrCode::ERROR_FUNCTION_UNSUPPORTED)
    }

    fn resolve_visibility_mask(
        &self,
        _instance: InstanceHandle,
    ) -> RawResult<Arc<dyn VisibilityMaskFns>> {
        Err(XrCode::ERROR_FUNCTION_UNSUPPORTED)
    }

    fn resolve_hand_tracking(
        &self,
        _instance: InstanceHandle,
    ) -> RawResult<Arc<dyn HandTrackingFns>> {
        Err(XrCode::ERROR_FUNCTION_UNSUPPORTED)
    }

    fn resolve_passthrough(&self, _instance: InstanceHandle) -> RawResult<Arc<dyn PassthroughFns>> {
        Err(XrCode::ERROR_FUNCTION_UNSUPPORTED)
    }

    fn resolve_refresh_rate(&self, _instance: InstanceHandle) -> RawResult<Arc<dyn RefreshRateFns>> {
        Err(XrCode::ERROR_FUNCTION_UNSUPPORTED)
    }

    fn resolve_vive_tracker(&self, _instance: InstanceHandle) -> RawResult<Arc<dyn ViveTrackerFns>> {
        Err(XrCode::ERROR_FUNCTION_UNSUPPORTED)
    }
}

/// `XR_KHR_visibility_mask`
pub trait VisibilityMaskFns: Send + Sync {
    /// Capacities are the slice lengths; empty slices query counts only.
    fn get_visibility_mask(
        &self,
        session: SessionHandle,
        view: ViewConfiguration,
        view_index: u32,
        mask_type: VisibilityMaskType,
        vertices: &mut [Vector2f],
        indices: &mut [u32],
    ) -> RawResult<MaskCounts>;
}

/// `XR_EXT_hand_tracking`
pub trait HandTrackingFns: Send + Sync {
    fn create_hand_tracker(&self, session: SessionHandle, hand: Hand)
        -> RawResult<HandTrackerHandle>;
    fn destroy_hand_tracker(&self, tracker: HandTrackerHandle) -> RawResult<()>;
    /// Writes joint data in place and returns the runtime's `isActive` flag
    /// with the success code. `velocities` is `None` when the caller opted out
    /// of velocity data.
    fn locate_hand_joints(
        &self,
        tracker: HandTrackerHandle,
        base: SpaceHandle,
        time: XrTime,
        motion_range: Option<HandJointsMotionRange>,
        locations: &mut [JointLocation],
        velocities: Option<&mut [JointVelocity]>,
    ) -> RawResult<(bool, XrCode)>;
}

/// `XR_FB_passthrough`
pub trait PassthroughFns: Send + Sync {
    fn create_passthrough(
        &self,
        session: SessionHandle,
        running_at_creation: bool,
    ) -> RawResult<PassthroughHandle>;
    fn destroy_passthrough(&self, passthrough: PassthroughHandle) -> RawResult<()>;
    fn passthrough_start(&self, passthrough: PassthroughHandle) -> RawResult<()>;
    fn passthrough_pause(&self, passthrough: PassthroughHandle) -> RawResult<()>;
    /// Creates a reconstruction-purpose layer.
    fn create_layer(
        &self,
        session: SessionHandle,
        passthrough: PassthroughHandle,
        running_at_creation: bool,
    ) -> RawResult<PassthroughLayerHandle>;
    fn destroy_layer(&self, layer: PassthroughLayerHandle) -> RawResult<()>;
    fn layer_pause(&self, layer: PassthroughLayerHandle) -> RawResult<()>;
    fn layer_resume(&self, layer: PassthroughLayerHandle) -> RawResult<()>;
    fn layer_set_style(
        &self,
        layer: PassthroughLayerHandle,
        style: &PassthroughStyle,
    ) -> RawResult<()>;
}

/// `XR_FB_display_refresh_rate`
pub trait RefreshRateFns: Send + Sync {
    /// Two-call enumerate; returns the number of rates available.
    fn enumerate_refresh_rates(&self, session: SessionHandle, rates: &mut [f32]) -> RawResult<u32>;
    fn get_refresh_rate(&self, session: SessionHandle) -> RawResult<f32>;
    fn request_refresh_rate(&self, session: SessionHandle, rate: f32) -> RawResult<()>;
}

/// `XR_HTCX_vive_tracker_interaction`
pub trait ViveTrackerFns: Send + Sync {
    /// Two-call enumerate; returns the number of connected trackers.
    fn enumerate_tracker_paths(
        &self,
        instance: InstanceHandle,
        paths: &mut [ViveTrackerPaths],
    ) -> RawResult<u32>;
}
