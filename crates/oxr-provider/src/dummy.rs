//! In-memory runtime.
//!
//! Implements the whole [`XrRuntime`] surface without a device. Used by the
//! test suites, by `oxr-probe --dummy`, and anywhere a scripted runtime is
//! handier than real hardware. Every verb can be made to fail on demand.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::code::XrCode;
use crate::extensions::{
    EYE_GAZE_INTERACTION, HAND_JOINTS_MOTION_RANGE, HAND_TRACKING, HEADLESS, PASSTHROUGH,
    REFRESH_RATE, VISIBILITY_MASK, VIVE_TRACKER_INTERACTION, VULKAN_ENABLE, VULKAN_ENABLE2,
};
use crate::runtime::{
    ActionCreateInfo, ActiveActionSet, FrameEnd, FrameLayer, GraphicsBinding, HandTrackingFns,
    InstanceCreateInfo, MaskCounts, PassthroughFns, PassthroughStyle, RawResult, RefreshRateFns,
    SuggestedBinding, ViveTrackerFns, VisibilityMaskFns, XrRuntime,
};
use crate::types::{
    ActionHandle, ActionSetHandle, ActionStateData, ActionType, ApiLayerProperties, BoolState,
    ExtensionProperties, FloatState, FormFactor, FrameState, Hand, HandJointsMotionRange,
    HandTrackerHandle, HapticVibration, InstanceHandle, JointLocation, JointVelocity,
    LocationFlags, PassthroughHandle, PassthroughLayerHandle, PoseState, Posef, ReferenceSpace,
    RuntimeEvent, RuntimeProperties, SessionHandle, SessionState, SpaceHandle, SpaceLocation,
    SystemId, SystemProperties, Vector2State, Vector2f, Vector3f, VelocityFlags, Version,
    ViewConfiguration, ViveTrackerPaths, VisibilityMaskType, XrPath, XrTime,
};

const FRAME_PERIOD_NS: i64 = 11_111_111;
const DUMMY_SYSTEM: SystemId = SystemId(0x5151);
const ERROR_REFRESH_RATE_UNSUPPORTED: XrCode = XrCode(-1_000_101_000);

/// Verbs that can be scripted to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DummyVerb {
    EnumerateExtensions,
    EnumerateApiLayers,
    CreateInstance,
    InstanceProperties,
    GetSystem,
    SystemProperties,
    StringToPath,
    CreateSession,
    BeginSession,
    EndSession,
    CreateReferenceSpace,
    LocateSpace,
    WaitFrame,
    BeginFrame,
    EndFrame,
    CreateActionSet,
    CreateAction,
    CreateActionSpace,
    SuggestBindings,
    AttachActionSets,
    SyncActions,
    ActionState,
    ApplyHaptic,
    CurrentInteractionProfile,
    CreateHandTracker,
    LocateHandJoints,
    VisibilityMask,
    CreatePassthrough,
    PassthroughStart,
    PassthroughPause,
    CreatePassthroughLayer,
    LayerPause,
    LayerResume,
    LayerSetStyle,
    RefreshRate,
    EnumerateTrackers,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ScriptValue {
    Bool(bool),
    Float(f32),
    Vector(Vector2f),
    Pose,
}

#[derive(Debug, Clone, Copy)]
struct SyncedValue {
    value: ScriptValue,
    changed: bool,
    time: XrTime,
}

#[derive(Debug, Clone)]
struct DummyAction {
    set: ActionSetHandle,
    action_type: ActionType,
    subaction_paths: Vec<XrPath>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failure {
    Once(XrCode),
    Always(XrCode),
    /// Fires once after `skip` more calls succeed.
    After { skip: u32, code: XrCode },
}

struct DummyState {
    extensions: Vec<ExtensionProperties>,
    api_layers: Vec<ApiLayerProperties>,
    next_handle: u64,
    instance: Option<InstanceHandle>,
    enabled_extensions: Vec<String>,
    system_available: bool,
    system_properties: SystemProperties,
    view_configurations: Vec<ViewConfiguration>,
    paths: Vec<String>,
    path_ids: HashMap<String, XrPath>,
    events: VecDeque<RuntimeEvent>,
    session: Option<SessionHandle>,
    session_running: bool,
    spaces: HashMap<SpaceHandle, Option<(ActionHandle, XrPath)>>,
    space_locations: HashMap<SpaceHandle, SpaceLocation>,
    action_sets: HashMap<ActionSetHandle, String>,
    actions: HashMap<ActionHandle, DummyAction>,
    attached: Vec<ActionSetHandle>,
    active_sets: Vec<ActionSetHandle>,
    suggested: HashMap<XrPath, Vec<SuggestedBinding>>,
    scripted: HashMap<(ActionHandle, XrPath), ScriptValue>,
    synced: HashMap<(ActionHandle, XrPath), SyncedValue>,
    sync_count: u64,
    haptics: Vec<(ActionHandle, XrPath, HapticVibration)>,
    interaction_profiles: HashMap<XrPath, XrPath>,
    frame_index: i64,
    last_layers: Vec<FrameLayer>,
    failures: HashMap<DummyVerb, Failure>,
    unresolvable: HashSet<&'static str>,
    hand_trackers: HashMap<HandTrackerHandle, Hand>,
    hands_active: bool,
    last_motion_range: Option<HandJointsMotionRange>,
    mask_vertices: Vec<Vector2f>,
    mask_indices: Vec<u32>,
    refresh_rates: Vec<f32>,
    current_rate: f32,
    trackers: Vec<ViveTrackerPaths>,
    passthroughs: HashSet<PassthroughHandle>,
    passthrough_layers: HashSet<PassthroughLayerHandle>,
    last_style: Option<PassthroughStyle>,
    call_log: Vec<String>,
}

impl DummyState {
    fn new() -> Self {
        let extensions = [
            VULKAN_ENABLE2,
            VULKAN_ENABLE,
            HEADLESS,
            VISIBILITY_MASK,
            HAND_TRACKING,
            HAND_JOINTS_MOTION_RANGE,
            PASSTHROUGH,
            REFRESH_RATE,
            VIVE_TRACKER_INTERACTION,
            EYE_GAZE_INTERACTION,
        ]
        .iter()
        .map(|name| ExtensionProperties {
            name: name.to_string(),
            version: 1,
        })
        .collect();

        Self {
            extensions,
            api_layers: Vec::new(),
            next_handle: 1,
            instance: None,
            enabled_extensions: Vec::new(),
            system_available: true,
            system_properties: SystemProperties {
                system_id: DUMMY_SYSTEM,
                system_name: "Dummy HMD".to_string(),
                vendor_id: 0xd0d0,
                orientation_tracking: true,
                position_tracking: true,
                supports_hand_tracking: true,
                supports_eye_gaze: true,
            },
            view_configurations: vec![
                ViewConfiguration::PrimaryStereo,
                ViewConfiguration::PrimaryMono,
            ],
            paths: Vec::new(),
            path_ids: HashMap::new(),
            events: VecDeque::new(),
            session: None,
            session_running: false,
            spaces: HashMap::new(),
            space_locations: HashMap::new(),
            action_sets: HashMap::new(),
            actions: HashMap::new(),
            attached: Vec::new(),
            active_sets: Vec::new(),
            suggested: HashMap::new(),
            scripted: HashMap::new(),
            synced: HashMap::new(),
            sync_count: 0,
            haptics: Vec::new(),
            interaction_profiles: HashMap::new(),
            frame_index: 0,
            last_layers: Vec::new(),
            failures: HashMap::new(),
            unresolvable: HashSet::new(),
            hand_trackers: HashMap::new(),
            hands_active: true,
            last_motion_range: None,
            mask_vertices: Vec::new(),
            mask_indices: Vec::new(),
            refresh_rates: vec![72.0, 90.0, 120.0],
            current_rate: 90.0,
            trackers: Vec::new(),
            passthroughs: HashSet::new(),
            passthrough_layers: HashSet::new(),
            last_style: None,
            call_log: Vec::new(),
        }
    }

    fn next(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    /// Scripted result of `verb`: error codes fail the call, success codes
    /// are handed back for verbs that report a qualified success.
    fn status(&mut self, verb: DummyVerb) -> RawResult<XrCode> {
        let code = match self.failures.get(&verb).copied() {
            Some(Failure::Once(code)) => {
                self.failures.remove(&verb);
                code
            }
            Some(Failure::Always(code)) => code,
            Some(Failure::After { skip: 0, code }) => {
                self.failures.remove(&verb);
                code
            }
            Some(Failure::After { skip, code }) => {
                self.failures
                    .insert(verb, Failure::After { skip: skip - 1, code });
                XrCode::SUCCESS
            }
            None => XrCode::SUCCESS,
        };
        if code.is_error() {
            Err(code)
        } else {
            Ok(code)
        }
    }

    fn check(&mut self, verb: DummyVerb) -> RawResult<()> {
        self.status(verb).map(|_| ())
    }

    fn log(&mut self, entry: impl Into<String>) {
        self.call_log.push(entry.into());
    }

    fn has_instance(&self, instance: InstanceHandle) -> RawResult<()> {
        match self.instance {
            Some(live) if live == instance && !instance.is_null() => Ok(()),
            _ => Err(XrCode::ERROR_HANDLE_INVALID),
        }
    }

    fn has_session(&self, session: SessionHandle) -> RawResult<()> {
        match self.session {
            Some(live) if live == session && !session.is_null() => Ok(()),
            _ => Err(XrCode::ERROR_HANDLE_INVALID),
        }
    }

    fn is_enabled(&self, name: &str) -> bool {
        self.enabled_extensions.iter().any(|e| e == name)
    }

    fn intern(&mut self, path: &str) -> RawResult<XrPath> {
        if let Some(existing) = self.path_ids.get(path) {
            return Ok(*existing);
        }
        if !well_formed_path(path) {
            return Err(XrCode::ERROR_PATH_FORMAT_INVALID);
        }
        self.paths.push(path.to_string());
        let id = XrPath(self.paths.len() as u64);
        self.path_ids.insert(path.to_string(), id);
        Ok(id)
    }

    fn predicted_time(&self) -> XrTime {
        1_000_000_000 + self.frame_index * FRAME_PERIOD_NS
    }

    fn read_value(
        &mut self,
        session: SessionHandle,
        action: ActionHandle,
        subaction_path: XrPath,
        expected: ActionType,
    ) -> RawResult<(Option<SyncedValue>, bool)> {
        self.check(DummyVerb::ActionState)?;
        self.has_session(session)?;
        let info = self
            .actions
            .get(&action)
            .cloned()
            .ok_or(XrCode::ERROR_HANDLE_INVALID)?;
        if !self.attached.contains(&info.set) {
            return Err(XrCode::ERROR_ACTIONSET_NOT_ATTACHED);
        }
        if info.action_type != expected {
            return Err(XrCode::ERROR_ACTION_TYPE_MISMATCH);
        }
        if !subaction_path.is_null() && !info.subaction_paths.contains(&subaction_path) {
            return Err(XrCode::ERROR_PATH_UNSUPPORTED);
        }
        let active = self.active_sets.contains(&info.set);
        Ok((self.synced.get(&(action, subaction_path)).copied(), active))
    }
}

fn well_formed_path(path: &str) -> bool {
    path.starts_with('/')
        && path.len() > 1
        && !path.ends_with('/')
        && !path.contains("//")
        && path
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "-_./".contains(c))
}

struct DummyShared {
    state: Mutex<DummyState>,
    reads_in_flight: AtomicUsize,
    peak_reads: AtomicUsize,
    total_reads: AtomicU64,
    read_delay_us: AtomicU64,
}

impl DummyShared {
    fn state(&self) -> MutexGuard<'_, DummyState> {
        crate::lock(&self.state)
    }

    fn begin_read(&self) {
        let now = self.reads_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_reads.fetch_max(now, Ordering::SeqCst);
        self.total_reads.fetch_add(1, Ordering::SeqCst);
        let delay = self.read_delay_us.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_micros(delay));
        }
    }

    fn end_read(&self) {
        self.reads_in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct DummyRuntime {
    shared: Arc<DummyShared>,
}

impl Default for DummyRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl DummyRuntime {
    /// A runtime advertising every extension the provider has an adapter for,
    /// plus Vulkan and headless session support.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(DummyShared {
                state: Mutex::new(DummyState::new()),
                reads_in_flight: AtomicUsize::new(0),
                peak_reads: AtomicUsize::new(0),
                total_reads: AtomicU64::new(0),
                read_delay_us: AtomicU64::new(0),
            }),
        }
    }

    /// A runtime advertising exactly `names`.
    pub fn with_extensions(names: &[&str]) -> Self {
        let runtime = Self::new();
        runtime.set_extensions(names);
        runtime
    }

    pub fn set_extensions(&self, names: &[&str]) {
        self.shared.state().extensions = names
            .iter()
            .map(|name| ExtensionProperties {
                name: name.to_string(),
                version: 1,
            })
            .collect();
    }

    pub fn set_api_layers(&self, names: &[&str]) {
        self.shared.state().api_layers = names
            .iter()
            .map(|name| ApiLayerProperties {
                name: name.to_string(),
                spec_version: Version::new(1, 0, 0),
                layer_version: 1,
                description: format!("{name} (dummy)"),
            })
            .collect();
    }

    /// Makes the next call of `verb` return `code`. A success code is
    /// returned as a qualified success by verbs that report one.
    pub fn fail_next(&self, verb: DummyVerb, code: XrCode) {
        self.shared.state().failures.insert(verb, Failure::Once(code));
    }

    /// Makes the `nth` call of `verb` from now (1-based) return `code`.
    pub fn fail_nth(&self, verb: DummyVerb, nth: u32, code: XrCode) {
        self.shared.state().failures.insert(
            verb,
            Failure::After {
                skip: nth.saturating_sub(1),
                code,
            },
        );
    }

    /// Makes every call of `verb` return `code` until cleared.
    pub fn fail_always(&self, verb: DummyVerb, code: XrCode) {
        self.shared
            .state()
            .failures
            .insert(verb, Failure::Always(code));
    }

    pub fn clear_failures(&self) {
        self.shared.state().failures.clear();
    }

    /// Makes resolution of `extension`'s entry points fail.
    pub fn make_unresolvable(&self, extension: &'static str) {
        self.shared.state().unresolvable.insert(extension);
    }

    pub fn set_system_available(&self, available: bool) {
        self.shared.state().system_available = available;
    }

    pub fn set_eye_gaze_supported(&self, supported: bool) {
        self.shared.state().system_properties.supports_eye_gaze = supported;
    }

    /// Delay inserted into every action state read, outside of any lock.
    pub fn set_read_delay(&self, delay: Duration) {
        self.shared
            .read_delay_us
            .store(delay.as_micros() as u64, Ordering::SeqCst);
    }

    pub fn push_event(&self, event: RuntimeEvent) {
        self.shared.state().events.push_back(event);
    }

    pub fn enabled_extensions(&self) -> Vec<String> {
        self.shared.state().enabled_extensions.clone()
    }

    pub fn path(&self, path: &str) -> Option<XrPath> {
        self.shared.state().path_ids.get(path).copied()
    }

    pub fn set_boolean(&self, action: ActionHandle, subaction_path: XrPath, value: bool) {
        self.shared
            .state()
            .scripted
            .insert((action, subaction_path), ScriptValue::Bool(value));
    }

    pub fn set_float(&self, action: ActionHandle, subaction_path: XrPath, value: f32) {
        self.shared
            .state()
            .scripted
            .insert((action, subaction_path), ScriptValue::Float(value));
    }

    pub fn set_vector2(&self, action: ActionHandle, subaction_path: XrPath, value: Vector2f) {
        self.shared
            .state()
            .scripted
            .insert((action, subaction_path), ScriptValue::Vector(value));
    }

    pub fn set_pose_active(&self, action: ActionHandle, subaction_path: XrPath) {
        self.shared
            .state()
            .scripted
            .insert((action, subaction_path), ScriptValue::Pose);
    }

    pub fn set_space_location(&self, space: SpaceHandle, location: SpaceLocation) {
        self.shared.state().space_locations.insert(space, location);
    }

    pub fn set_interaction_profile(&self, user_path: &str, profile: &str) -> RawResult<()> {
        let mut state = self.shared.state();
        let user = state.intern(user_path)?;
        let profile = state.intern(profile)?;
        state.interaction_profiles.insert(user, profile);
        Ok(())
    }

    pub fn set_visibility_mask(&self, vertices: Vec<Vector2f>, indices: Vec<u32>) {
        let mut state = self.shared.state();
        state.mask_vertices = vertices;
        state.mask_indices = indices;
    }

    pub fn set_refresh_rates(&self, rates: &[f32]) {
        self.shared.state().refresh_rates = rates.to_vec();
    }

    pub fn set_hands_active(&self, active: bool) {
        self.shared.state().hands_active = active;
    }

    pub fn connect_tracker(&self, persistent_path: &str, role_path: &str) -> RawResult<()> {
        let mut state = self.shared.state();
        let persistent_path = state.intern(persistent_path)?;
        let role_path = state.intern(role_path)?;
        state.trackers.push(ViveTrackerPaths {
            persistent_path,
            role_path,
        });
        Ok(())
    }

    /// Binding paths suggested for `profile`, as strings.
    pub fn suggested_bindings(&self, profile: &str) -> Vec<(ActionHandle, String)> {
        let state = self.shared.state();
        let Some(profile) = state.path_ids.get(profile) else {
            return Vec::new();
        };
        state
            .suggested
            .get(profile)
            .map(|bindings| {
                bindings
                    .iter()
                    .map(|b| {
                        let text = state
                            .paths
                            .get((b.binding.0 as usize).wrapping_sub(1))
                            .cloned()
                            .unwrap_or_default();
                        (b.action, text)
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn live_spaces(&self) -> usize {
        self.shared.state().spaces.len()
    }

    /// Action spaces created for `action`, one entry per space.
    pub fn action_spaces(&self, action: ActionHandle) -> Vec<XrPath> {
        self.shared
            .state()
            .spaces
            .values()
            .filter_map(|owner| match owner {
                Some((a, path)) if *a == action => Some(*path),
                _ => None,
            })
            .collect()
    }

    pub fn action_subaction_paths(&self, action: ActionHandle) -> Option<Vec<XrPath>> {
        self.shared
            .state()
            .actions
            .get(&action)
            .map(|a| a.subaction_paths.clone())
    }

    pub fn action_count(&self) -> usize {
        self.shared.state().actions.len()
    }

    pub fn haptic_log(&self) -> Vec<(ActionHandle, XrPath, HapticVibration)> {
        self.shared.state().haptics.clone()
    }

    pub fn sync_count(&self) -> u64 {
        self.shared.state().sync_count
    }

    pub fn peak_concurrent_reads(&self) -> usize {
        self.shared.peak_reads.load(Ordering::SeqCst)
    }

    pub fn reads_in_flight(&self) -> usize {
        self.shared.reads_in_flight.load(Ordering::SeqCst)
    }

    pub fn total_reads(&self) -> u64 {
        self.shared.total_reads.load(Ordering::SeqCst)
    }

    pub fn last_layers(&self) -> Vec<FrameLayer> {
        self.shared.state().last_layers.clone()
    }

    pub fn last_style(&self) -> Option<PassthroughStyle> {
        self.shared.state().last_style.clone()
    }

    pub fn last_motion_range(&self) -> Option<HandJointsMotionRange> {
        self.shared.state().last_motion_range
    }

    pub fn live_hand_trackers(&self) -> usize {
        self.shared.state().hand_trackers.len()
    }

    pub fn is_session_running(&self) -> bool {
        self.shared.state().session_running
    }

    pub fn has_instance(&self) -> bool {
        self.shared.state().instance.is_some()
    }

    /// Ordered log of extension object calls and destructions.
    pub fn call_log(&self) -> Vec<String> {
        self.shared.state().call_log.clone()
    }

    fn read<T>(&self, op: impl FnOnce(&mut DummyState) -> RawResult<T>) -> RawResult<T> {
        self.shared.begin_read();
        let result = op(&mut *self.shared.state());
        self.shared.end_read();
        result
    }

    fn resolve(&self, instance: InstanceHandle, extension: &'static str) -> RawResult<Arc<DummyExtensions>> {
        let state = self.shared.state();
        state.has_instance(instance)?;
        if !state.is_enabled(extension) {
            return Err(XrCode::ERROR_FUNCTION_UNSUPPORTED);
        }
        if state.unresolvable.contains(extension) {
            return Err(XrCode::ERROR_FUNCTION_UNSUPPORTED);
        }
        Ok(Arc::new(DummyExtensions {
            shared: self.shared.clone(),
        }))
    }
}

fn state_data<T: Copy + Default>(
    synced: Option<SyncedValue>,
    active: bool,
    extract: impl Fn(ScriptValue) -> Option<T>,
) -> ActionStateData<T> {
    match synced {
        Some(value) if active => ActionStateData {
            current_state: extract(value.value).unwrap_or_default(),
            changed_since_last_sync: value.changed,
            last_change_time: value.time,
            is_active: true,
        },
        _ => ActionStateData::default(),
    }
}

impl XrRuntime for DummyRuntime {
    fn enumerate_extensions(&self) -> RawResult<Vec<ExtensionProperties>> {
        let mut state = self.shared.state();
        state.check(DummyVerb::EnumerateExtensions)?;
        Ok(state.extensions.clone())
    }

    fn enumerate_api_layers(&self) -> RawResult<Vec<ApiLayerProperties>> {
        let mut state = self.shared.state();
        state.check(DummyVerb::EnumerateApiLayers)?;
        Ok(state.api_layers.clone())
    }

    fn create_instance(&self, info: &InstanceCreateInfo) -> RawResult<InstanceHandle> {
        let mut state = self.shared.state();
        state.check(DummyVerb::CreateInstance)?;
        if state.instance.is_some() {
            return Err(XrCode::ERROR_LIMIT_REACHED);
        }
        if info.app_name.is_empty() {
            return Err(XrCode::ERROR_NAME_INVALID);
        }
        for name in &info.extensions {
            if !state.extensions.iter().any(|e| &e.name == name) {
                return Err(XrCode::ERROR_EXTENSION_NOT_PRESENT);
            }
        }
        for name in &info.api_layers {
            if !state.api_layers.iter().any(|l| &l.name == name) {
                return Err(XrCode::ERROR_API_LAYER_NOT_PRESENT);
            }
        }
        let handle = InstanceHandle(state.next());
        state.instance = Some(handle);
        state.enabled_extensions = info.extensions.clone();
        Ok(handle)
    }

    fn destroy_instance(&self, instance: InstanceHandle) -> RawResult<()> {
        let mut state = self.shared.state();
        state.has_instance(instance)?;
        state.instance = None;
        state.enabled_extensions.clear();
        state.log("destroy_instance");
        Ok(())
    }

    fn instance_properties(&self, instance: InstanceHandle) -> RawResult<RuntimeProperties> {
        let mut state = self.shared.state();
        state.check(DummyVerb::InstanceProperties)?;
        state.has_instance(instance)?;
        Ok(RuntimeProperties {
            runtime_name: "Dummy Runtime".to_string(),
            runtime_version: Version::new(1, 0, 7),
        })
    }

    fn get_system(&self, instance: InstanceHandle, form_factor: FormFactor) -> RawResult<SystemId> {
        let mut state = self.shared.state();
        state.check(DummyVerb::GetSystem)?;
        state.has_instance(instance)?;
        if form_factor != FormFactor::HeadMountedDisplay {
            return Err(XrCode::ERROR_FORM_FACTOR_UNSUPPORTED);
        }
        if !state.system_available {
            return Err(XrCode::ERROR_FORM_FACTOR_UNAVAILABLE);
        }
        Ok(DUMMY_SYSTEM)
    }

    fn system_properties(
        &self,
        instance: InstanceHandle,
        system: SystemId,
    ) -> RawResult<SystemProperties> {
        let mut state = self.shared.state();
        state.check(DummyVerb::SystemProperties)?;
        state.has_instance(instance)?;
        if system != DUMMY_SYSTEM {
            return Err(XrCode::ERROR_SYSTEM_INVALID);
        }
        let mut properties = state.system_properties.clone();
        properties.supports_hand_tracking &= state.is_enabled(HAND_TRACKING);
        properties.supports_eye_gaze &= state.is_enabled(EYE_GAZE_INTERACTION);
        Ok(properties)
    }

    fn enumerate_view_configurations(
        &self,
        instance: InstanceHandle,
        _system: SystemId,
    ) -> RawResult<Vec<ViewConfiguration>> {
        let state = self.shared.state();
        state.has_instance(instance)?;
        Ok(state.view_configurations.clone())
    }

    fn string_to_path(&self, instance: InstanceHandle, path: &str) -> RawResult<XrPath> {
        let mut state = self.shared.state();
        state.check(DummyVerb::StringToPath)?;
        state.has_instance(instance)?;
        state.intern(path)
    }

    fn path_to_string(&self, instance: InstanceHandle, path: XrPath) -> RawResult<String> {
        let state = self.shared.state();
        state.has_instance(instance)?;
        if path.is_null() {
            return Err(XrCode::ERROR_PATH_INVALID);
        }
        state
            .paths
            .get(path.0 as usize - 1)
            .cloned()
            .ok_or(XrCode::ERROR_PATH_INVALID)
    }

    fn poll_event(&self, instance: InstanceHandle) -> RawResult<Option<RuntimeEvent>> {
        let mut state = self.shared.state();
        state.has_instance(instance)?;
        Ok(state.events.pop_front())
    }

    fn create_session(
        &self,
        instance: InstanceHandle,
        system: SystemId,
        graphics: &GraphicsBinding,
    ) -> RawResult<SessionHandle> {
        let mut state = self.shared.state();
        state.check(DummyVerb::CreateSession)?;
        state.has_instance(instance)?;
        if system != DUMMY_SYSTEM {
            return Err(XrCode::ERROR_SYSTEM_INVALID);
        }
        let graphics_enabled = match graphics {
            GraphicsBinding::Headless => state.is_enabled(HEADLESS),
            GraphicsBinding::Vulkan(_) => {
                state.is_enabled(VULKAN_ENABLE) || state.is_enabled(VULKAN_ENABLE2)
            }
        };
        if !graphics_enabled {
            return Err(XrCode::ERROR_GRAPHICS_DEVICE_INVALID);
        }
        if state.session.is_some() {
            return Err(XrCode::ERROR_LIMIT_REACHED);
        }
        let handle = SessionHandle(state.next());
        state.session = Some(handle);
        let time = state.predicted_time();
        for session_state in [SessionState::Idle, SessionState::Ready] {
            state.events.push_back(RuntimeEvent::SessionStateChanged {
                session: handle,
                state: session_state,
                time,
            });
        }
        Ok(handle)
    }

    fn destroy_session(&self, session: SessionHandle) -> RawResult<()> {
        let mut state = self.shared.state();
        state.has_session(session)?;
        state.session = None;
        state.session_running = false;
        state.attached.clear();
        state.active_sets.clear();
        state.log("destroy_session");
        Ok(())
    }

    fn begin_session(&self, session: SessionHandle, _view: ViewConfiguration) -> RawResult<()> {
        let mut state = self.shared.state();
        state.check(DummyVerb::BeginSession)?;
        state.has_session(session)?;
        if state.session_running {
            return Err(XrCode::ERROR_SESSION_RUNNING);
        }
        state.session_running = true;
        Ok(())
    }

    fn end_session(&self, session: SessionHandle) -> RawResult<()> {
        let mut state = self.shared.state();
        state.check(DummyVerb::EndSession)?;
        state.has_session(session)?;
        if !state.session_running {
            return Err(XrCode::ERROR_SESSION_NOT_RUNNING);
        }
        state.session_running = false;
        Ok(())
    }

    fn request_exit_session(&self, session: SessionHandle) -> RawResult<()> {
        let mut state = self.shared.state();
        state.has_session(session)?;
        if !state.session_running {
            return Err(XrCode::ERROR_SESSION_NOT_RUNNING);
        }
        let time = state.predicted_time();
        state.events.push_back(RuntimeEvent::SessionStateChanged {
            session,
            state: SessionState::Stopping,
            time,
        });
        Ok(())
    }

    fn enumerate_reference_spaces(
        &self,
        session: SessionHandle,
    ) -> RawResult<Vec<ReferenceSpace>> {
        let state = self.shared.state();
        state.has_session(session)?;
        Ok(vec![
            ReferenceSpace::View,
            ReferenceSpace::Local,
            ReferenceSpace::Stage,
        ])
    }

    fn create_reference_space(
        &self,
        session: SessionHandle,
        kind: ReferenceSpace,
        _pose: Posef,
    ) -> RawResult<SpaceHandle> {
        let mut state = self.shared.state();
        state.check(DummyVerb::CreateReferenceSpace)?;
        state.has_session(session)?;
        if kind == ReferenceSpace::LocalFloor {
            return Err(XrCode::ERROR_REFERENCE_SPACE_UNSUPPORTED);
        }
        let space = SpaceHandle(state.next());
        state.spaces.insert(space, None);
        Ok(space)
    }

    fn destroy_space(&self, space: SpaceHandle) -> RawResult<()> {
        let mut state = self.shared.state();
        state
            .spaces
            .remove(&space)
            .map(|_| ())
            .ok_or(XrCode::ERROR_HANDLE_INVALID)
    }

    fn locate_space(
        &self,
        space: SpaceHandle,
        base: SpaceHandle,
        _time: XrTime,
    ) -> RawResult<(SpaceLocation, XrCode)> {
        let mut state = self.shared.state();
        let code = state.status(DummyVerb::LocateSpace)?;
        if !state.spaces.contains_key(&space) || !state.spaces.contains_key(&base) {
            return Err(XrCode::ERROR_HANDLE_INVALID);
        }
        if let Some(location) = state.space_locations.get(&space) {
            return Ok((*location, code));
        }
        let location = SpaceLocation {
            flags: LocationFlags::ORIENTATION_VALID | LocationFlags::POSITION_VALID,
            pose: Posef::IDENTITY,
        };
        Ok((location, code))
    }

    fn wait_frame(&self, session: SessionHandle) -> RawResult<(FrameState, XrCode)> {
        let mut state = self.shared.state();
        let code = state.status(DummyVerb::WaitFrame)?;
        state.has_session(session)?;
        if !state.session_running {
            return Err(XrCode::ERROR_SESSION_NOT_RUNNING);
        }
        state.frame_index += 1;
        let frame = FrameState {
            predicted_display_time: state.predicted_time(),
            predicted_display_period: FRAME_PERIOD_NS,
            should_render: true,
        };
        Ok((frame, code))
    }

    fn begin_frame(&self, session: SessionHandle) -> RawResult<XrCode> {
        let mut state = self.shared.state();
        let code = state.status(DummyVerb::BeginFrame)?;
        state.has_session(session)?;
        if !state.session_running {
            return Err(XrCode::ERROR_SESSION_NOT_RUNNING);
        }
        Ok(code)
    }

    fn end_frame(&self, session: SessionHandle, frame: &FrameEnd<'_>) -> RawResult<XrCode> {
        let mut state = self.shared.state();
        let code = state.status(DummyVerb::EndFrame)?;
        state.has_session(session)?;
        for layer in frame.layers {
            let FrameLayer::Passthrough(handle) = layer;
            if !state.passthrough_layers.contains(handle) {
                return Err(XrCode::ERROR_LAYER_INVALID);
            }
        }
        state.last_layers = frame.layers.to_vec();
        Ok(code)
    }

    fn create_action_set(
        &self,
        instance: InstanceHandle,
        name: &str,
        _localized_name: &str,
        _priority: u32,
    ) -> RawResult<ActionSetHandle> {
        let mut state = self.shared.state();
        state.check(DummyVerb::CreateActionSet)?;
        state.has_instance(instance)?;
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "-_.".contains(c)) {
            return Err(XrCode::ERROR_NAME_INVALID);
        }
        if state.action_sets.values().any(|existing| existing == name) {
            return Err(XrCode::ERROR_NAME_DUPLICATED);
        }
        let handle = ActionSetHandle(state.next());
        state.action_sets.insert(handle, name.to_string());
        Ok(handle)
    }

    fn destroy_action_set(&self, action_set: ActionSetHandle) -> RawResult<()> {
        let mut state = self.shared.state();
        state
            .action_sets
            .remove(&action_set)
            .ok_or(XrCode::ERROR_HANDLE_INVALID)?;
        state.actions.retain(|_, action| action.set != action_set);
        Ok(())
    }

    fn create_action(
        &self,
        action_set: ActionSetHandle,
        info: &ActionCreateInfo<'_>,
    ) -> RawResult<ActionHandle> {
        let mut state = self.shared.state();
        state.check(DummyVerb::CreateAction)?;
        if !state.action_sets.contains_key(&action_set) {
            return Err(XrCode::ERROR_HANDLE_INVALID);
        }
        if state.attached.contains(&action_set) {
            return Err(XrCode::ERROR_ACTIONSETS_ALREADY_ATTACHED);
        }
        if info.name.is_empty() {
            return Err(XrCode::ERROR_NAME_INVALID);
        }
        let handle = ActionHandle(state.next());
        state.actions.insert(
            handle,
            DummyAction {
                set: action_set,
                action_type: info.action_type,
                subaction_paths: info.subaction_paths.to_vec(),
            },
        );
        Ok(handle)
    }

    fn destroy_action(&self, action: ActionHandle) -> RawResult<()> {
        let mut state = self.shared.state();
        state
            .actions
            .remove(&action)
            .map(|_| ())
            .ok_or(XrCode::ERROR_HANDLE_INVALID)
    }

    fn create_action_space(
        &self,
        session: SessionHandle,
        action: ActionHandle,
        subaction_path: XrPath,
        _pose: Posef,
    ) -> RawResult<SpaceHandle> {
        let mut state = self.shared.state();
        state.check(DummyVerb::CreateActionSpace)?;
        state.has_session(session)?;
        let info = state
            .actions
            .get(&action)
            .cloned()
            .ok_or(XrCode::ERROR_HANDLE_INVALID)?;
        if info.action_type != ActionType::Pose {
            return Err(XrCode::ERROR_ACTION_TYPE_MISMATCH);
        }
        if !subaction_path.is_null() && !info.subaction_paths.contains(&subaction_path) {
            return Err(XrCode::ERROR_PATH_UNSUPPORTED);
        }
        let space = SpaceHandle(state.next());
        state.spaces.insert(space, Some((action, subaction_path)));
        Ok(space)
    }

    fn suggest_bindings(
        &self,
        instance: InstanceHandle,
        profile: XrPath,
        bindings: &[SuggestedBinding],
    ) -> RawResult<()> {
        let mut state = self.shared.state();
        state.check(DummyVerb::SuggestBindings)?;
        state.has_instance(instance)?;
        let Some(profile_text) = state.paths.get((profile.0 as usize).wrapping_sub(1)).cloned() else {
            return Err(XrCode::ERROR_PATH_INVALID);
        };
        if !profile_text.starts_with("/interaction_profiles/") {
            return Err(XrCode::ERROR_PATH_UNSUPPORTED);
        }
        for binding in bindings {
            if !state.actions.contains_key(&binding.action) {
                return Err(XrCode::ERROR_HANDLE_INVALID);
            }
            if binding.binding.is_null() || binding.binding.0 as usize > state.paths.len() {
                return Err(XrCode::ERROR_PATH_INVALID);
            }
        }
        // Later suggestions for a profile replace earlier ones.
        state.suggested.insert(profile, bindings.to_vec());
        Ok(())
    }

    fn attach_action_sets(
        &self,
        session: SessionHandle,
        action_sets: &[ActionSetHandle],
    ) -> RawResult<()> {
        let mut state = self.shared.state();
        state.check(DummyVerb::AttachActionSets)?;
        state.has_session(session)?;
        if !state.attached.is_empty() {
            return Err(XrCode::ERROR_ACTIONSETS_ALREADY_ATTACHED);
        }
        if action_sets.iter().any(|set| !state.action_sets.contains_key(set)) {
            return Err(XrCode::ERROR_HANDLE_INVALID);
        }
        state.attached = action_sets.to_vec();
        Ok(())
    }

    fn sync_actions(
        &self,
        session: SessionHandle,
        active: &[ActiveActionSet],
    ) -> RawResult<XrCode> {
        let mut state = self.shared.state();
        let code = state.status(DummyVerb::SyncActions)?;
        state.has_session(session)?;
        if active.iter().any(|a| !state.attached.contains(&a.action_set)) {
            return Err(XrCode::ERROR_ACTIONSET_NOT_ATTACHED);
        }
        state.sync_count += 1;
        if code == XrCode::SESSION_NOT_FOCUSED {
            return Ok(code);
        }
        state.active_sets = active.iter().map(|a| a.action_set).collect();
        let time = state.predicted_time();

        let mut keys = Vec::new();
        for (handle, action) in &state.actions {
            if !state.active_sets.contains(&action.set) {
                continue;
            }
            keys.push((*handle, XrPath::NULL));
            keys.extend(action.subaction_paths.iter().map(|path| (*handle, *path)));
        }
        for key in keys {
            let Some(value) = state.scripted.get(&key).copied() else {
                continue;
            };
            let changed = state
                .synced
                .get(&key)
                .map(|previous| previous.value != value)
                .unwrap_or(true);
            let time = if changed {
                time
            } else {
                state.synced.get(&key).map(|p| p.time).unwrap_or(time)
            };
            state.synced.insert(key, SyncedValue { value, changed, time });
        }
        Ok(code)
    }

    fn action_state_boolean(
        &self,
        session: SessionHandle,
        action: ActionHandle,
        subaction_path: XrPath,
    ) -> RawResult<BoolState> {
        self.read(|state| {
            let (synced, active) =
                state.read_value(session, action, subaction_path, ActionType::Boolean)?;
            Ok(state_data(synced, active, |value| match value {
                ScriptValue::Bool(b) => Some(b),
                _ => None,
            }))
        })
    }

    fn action_state_float(
        &self,
        session: SessionHandle,
        action: ActionHandle,
        subaction_path: XrPath,
    ) -> RawResult<FloatState> {
        self.read(|state| {
            let (synced, active) =
                state.read_value(session, action, subaction_path, ActionType::Float)?;
            Ok(state_data(synced, active, |value| match value {
                ScriptValue::Float(f) => Some(f),
                _ => None,
            }))
        })
    }

    fn action_state_vector2f(
        &self,
        session: SessionHandle,
        action: ActionHandle,
        subaction_path: XrPath,
    ) -> RawResult<Vector2State> {
        self.read(|state| {
            let (synced, active) =
                state.read_value(session, action, subaction_path, ActionType::Vector2f)?;
            Ok(state_data(synced, active, |value| match value {
                ScriptValue::Vector(v) => Some(v),
                _ => None,
            }))
        })
    }

    fn action_state_pose(
        &self,
        session: SessionHandle,
        action: ActionHandle,
        subaction_path: XrPath,
    ) -> RawResult<PoseState> {
        self.read(|state| {
            let (synced, active) =
                state.read_value(session, action, subaction_path, ActionType::Pose)?;
            Ok(PoseState {
                is_active: active && matches!(synced.map(|s| s.value), Some(ScriptValue::Pose)),
            })
        })
    }

    fn apply_haptic_feedback(
        &self,
        session: SessionHandle,
        action: ActionHandle,
        subaction_path: XrPath,
        vibration: &HapticVibration,
    ) -> RawResult<XrCode> {
        let mut state = self.shared.state();
        let code = state.status(DummyVerb::ApplyHaptic)?;
        state.has_session(session)?;
        let info = state
            .actions
            .get(&action)
            .cloned()
            .ok_or(XrCode::ERROR_HANDLE_INVALID)?;
        if info.action_type != ActionType::VibrationOutput {
            return Err(XrCode::ERROR_ACTION_TYPE_MISMATCH);
        }
        if !state.attached.contains(&info.set) {
            return Err(XrCode::ERROR_ACTIONSET_NOT_ATTACHED);
        }
        state.haptics.push((action, subaction_path, *vibration));
        Ok(code)
    }

    fn stop_haptic_feedback(
        &self,
        session: SessionHandle,
        action: ActionHandle,
        subaction_path: XrPath,
    ) -> RawResult<()> {
        let mut state = self.shared.state();
        state.has_session(session)?;
        if !state.actions.contains_key(&action) {
            return Err(XrCode::ERROR_HANDLE_INVALID);
        }
        state
            .haptics
            .retain(|(a, path, _)| !(*a == action && *path == subaction_path));
        Ok(())
    }

    fn current_interaction_profile(
        &self,
        session: SessionHandle,
        user_path: XrPath,
    ) -> RawResult<XrPath> {
        let mut state = self.shared.state();
        state.check(DummyVerb::CurrentInteractionProfile)?;
        state.has_session(session)?;
        if state.attached.is_empty() {
            return Err(XrCode::ERROR_ACTIONSET_NOT_ATTACHED);
        }
        Ok(state
            .interaction_profiles
            .get(&user_path)
            .copied()
            .unwrap_or(XrPath::NULL))
    }

    fn eye_gaze_sample_time(
        &self,
        space: SpaceHandle,
        base: SpaceHandle,
        time: XrTime,
    ) -> RawResult<XrTime> {
        let state = self.shared.state();
        if !state.is_enabled(EYE_GAZE_INTERACTION) {
            return Err(XrCode::ERROR_FUNCTION_UNSUPPORTED);
        }
        if !state.spaces.contains_key(&space) || !state.spaces.contains_key(&base) {
            return Err(XrCode::ERROR_HANDLE_INVALID);
        }
        Ok(time - 1_000_000)
    }

    fn resolve_visibility_mask(
        &self,
        instance: InstanceHandle,
    ) -> RawResult<Arc<dyn VisibilityMaskFns>> {
        Ok(self.resolve(instance, VISIBILITY_MASK)?)
    }

    fn resolve_hand_tracking(
        &self,
        instance: InstanceHandle,
    ) -> RawResult<Arc<dyn HandTrackingFns>> {
        Ok(self.resolve(instance, HAND_TRACKING)?)
    }

    fn resolve_passthrough(&self, instance: InstanceHandle) -> RawResult<Arc<dyn PassthroughFns>> {
        Ok(self.resolve(instance, PASSTHROUGH)?)
    }

    fn resolve_refresh_rate(&self, instance: InstanceHandle) -> RawResult<Arc<dyn RefreshRateFns>> {
        Ok(self.resolve(instance, REFRESH_RATE)?)
    }

    fn resolve_vive_tracker(&self, instance: InstanceHandle) -> RawResult<Arc<dyn ViveTrackerFns>> {
        Ok(self.resolve(instance, VIVE_TRACKER_INTERACTION)?)
    }
}

/// Extension dispatch tables handed out by [`DummyRuntime`].
struct DummyExtensions {
    shared: Arc<DummyShared>,
}

impl VisibilityMaskFns for DummyExtensions {
    fn get_visibility_mask(
        &self,
        session: SessionHandle,
        _view: ViewConfiguration,
        view_index: u32,
        _mask_type: VisibilityMaskType,
        vertices: &mut [Vector2f],
        indices: &mut [u32],
    ) -> RawResult<MaskCounts> {
        let mut state = self.shared.state();
        state.check(DummyVerb::VisibilityMask)?;
        state.has_session(session)?;
        if view_index > 1 {
            return Err(XrCode::ERROR_VALIDATION_FAILURE);
        }
        let counts = MaskCounts {
            vertex_count: state.mask_vertices.len() as u32,
            index_count: state.mask_indices.len() as u32,
        };
        if vertices.is_empty() && indices.is_empty() {
            return Ok(counts);
        }
        if vertices.len() < state.mask_vertices.len() || indices.len() < state.mask_indices.len() {
            return Err(XrCode::ERROR_SIZE_INSUFFICIENT);
        }
        vertices[..state.mask_vertices.len()].copy_from_slice(&state.mask_vertices);
        indices[..state.mask_indices.len()].copy_from_slice(&state.mask_indices);
        Ok(counts)
    }
}

impl HandTrackingFns for DummyExtensions {
    fn create_hand_tracker(
        &self,
        session: SessionHandle,
        hand: Hand,
    ) -> RawResult<HandTrackerHandle> {
        let mut state = self.shared.state();
        state.check(DummyVerb::CreateHandTracker)?;
        state.has_session(session)?;
        let handle = HandTrackerHandle(state.next());
        state.hand_trackers.insert(handle, hand);
        state.log(format!("create_hand_tracker:{hand:?}"));
        Ok(handle)
    }

    fn destroy_hand_tracker(&self, tracker: HandTrackerHandle) -> RawResult<()> {
        let mut state = self.shared.state();
        let hand = state
            .hand_trackers
            .remove(&tracker)
            .ok_or(XrCode::ERROR_HANDLE_INVALID)?;
        state.log(format!("destroy_hand_tracker:{hand:?}"));
        Ok(())
    }

    fn locate_hand_joints(
        &self,
        tracker: HandTrackerHandle,
        base: SpaceHandle,
        _time: XrTime,
        motion_range: Option<HandJointsMotionRange>,
        locations: &mut [JointLocation],
        velocities: Option<&mut [JointVelocity]>,
    ) -> RawResult<(bool, XrCode)> {
        let mut state = self.shared.state();
        let code = state.status(DummyVerb::LocateHandJoints)?;
        if !state.hand_trackers.contains_key(&tracker) || !state.spaces.contains_key(&base) {
            return Err(XrCode::ERROR_HANDLE_INVALID);
        }
        if motion_range.is_some() && !state.is_enabled(HAND_JOINTS_MOTION_RANGE) {
            return Err(XrCode::ERROR_VALIDATION_FAILURE);
        }
        state.last_motion_range = motion_range;
        let active = state.hands_active;
        for (index, joint) in locations.iter_mut().enumerate() {
            *joint = if active {
                JointLocation {
                    flags: LocationFlags::ORIENTATION_VALID | LocationFlags::POSITION_VALID,
                    pose: Posef {
                        position: Vector3f {
                            x: 0.0,
                            y: index as f32 * 0.01,
                            z: 0.0,
                        },
                        ..Posef::IDENTITY
                    },
                    radius: 0.01,
                }
            } else {
                JointLocation::default()
            };
        }
        if let Some(velocities) = velocities {
            for joint in velocities.iter_mut() {
                *joint = JointVelocity {
                    flags: if active {
                        VelocityFlags::LINEAR_VALID | VelocityFlags::ANGULAR_VALID
                    } else {
                        VelocityFlags::empty()
                    },
                    ..JointVelocity::default()
                };
            }
        }
        Ok((active, code))
    }
}

impl PassthroughFns for DummyExtensions {
    fn create_passthrough(
        &self,
        session: SessionHandle,
        _running_at_creation: bool,
    ) -> RawResult<PassthroughHandle> {
        let mut state = self.shared.state();
        state.check(DummyVerb::CreatePassthrough)?;
        state.has_session(session)?;
        let handle = PassthroughHandle(state.next());
        state.passthroughs.insert(handle);
        state.log("create_passthrough");
        Ok(handle)
    }

    fn destroy_passthrough(&self, passthrough: PassthroughHandle) -> RawResult<()> {
        let mut state = self.shared.state();
        if !state.passthroughs.remove(&passthrough) {
            return Err(XrCode::ERROR_HANDLE_INVALID);
        }
        state.log("destroy_passthrough");
        Ok(())
    }

    fn passthrough_start(&self, passthrough: PassthroughHandle) -> RawResult<()> {
        let mut state = self.shared.state();
        state.check(DummyVerb::PassthroughStart)?;
        if !state.passthroughs.contains(&passthrough) {
            return Err(XrCode::ERROR_HANDLE_INVALID);
        }
        state.log("passthrough_start");
        Ok(())
    }

    fn passthrough_pause(&self, passthrough: PassthroughHandle) -> RawResult<()> {
        let mut state = self.shared.state();
        state.check(DummyVerb::PassthroughPause)?;
        if !state.passthroughs.contains(&passthrough) {
            return Err(XrCode::ERROR_HANDLE_INVALID);
        }
        state.log("passthrough_pause");
        Ok(())
    }

    fn create_layer(
        &self,
        session: SessionHandle,
        passthrough: PassthroughHandle,
        _running_at_creation: bool,
    ) -> RawResult<PassthroughLayerHandle> {
        let mut state = self.shared.state();
        state.check(DummyVerb::CreatePassthroughLayer)?;
        state.has_session(session)?;
        if !state.passthroughs.contains(&passthrough) {
            return Err(XrCode::ERROR_HANDLE_INVALID);
        }
        let handle = PassthroughLayerHandle(state.next());
        state.passthrough_layers.insert(handle);
        state.log("create_passthrough_layer");
        Ok(handle)
    }

    fn destroy_layer(&self, layer: PassthroughLayerHandle) -> RawResult<()> {
        let mut state = self.shared.state();
        if !state.passthrough_layers.remove(&layer) {
            return Err(XrCode::ERROR_HANDLE_INVALID);
        }
        state.log("destroy_passthrough_layer");
        Ok(())
    }

    fn layer_pause(&self, layer: PassthroughLayerHandle) -> RawResult<()> {
        let mut state = self.shared.state();
        state.check(DummyVerb::LayerPause)?;
        if !state.passthrough_layers.contains(&layer) {
            return Err(XrCode::ERROR_HANDLE_INVALID);
        }
        state.log("layer_pause");
        Ok(())
    }

    fn layer_resume(&self, layer: PassthroughLayerHandle) -> RawResult<()> {
        let mut state = self.shared.state();
        state.check(DummyVerb::LayerResume)?;
        if !state.passthrough_layers.contains(&layer) {
            return Err(XrCode::ERROR_HANDLE_INVALID);
        }
        state.log("layer_resume");
        Ok(())
    }

    fn layer_set_style(
        &self,
        layer: PassthroughLayerHandle,
        style: &PassthroughStyle,
    ) -> RawResult<()> {
        let mut state = self.shared.state();
        state.check(DummyVerb::LayerSetStyle)?;
        if !state.passthrough_layers.contains(&layer) {
            return Err(XrCode::ERROR_HANDLE_INVALID);
        }
        if !(0.0..=1.0).contains(&style.opacity) {
            return Err(XrCode::ERROR_VALIDATION_FAILURE);
        }
        state.last_style = Some(style.clone());
        state.log("layer_set_style");
        Ok(())
    }
}

impl RefreshRateFns for DummyExtensions {
    fn enumerate_refresh_rates(&self, session: SessionHandle, rates: &mut [f32]) -> RawResult<u32> {
        let mut state = self.shared.state();
        state.check(DummyVerb::RefreshRate)?;
        state.has_session(session)?;
        let count = state.refresh_rates.len();
        if rates.is_empty() {
            return Ok(count as u32);
        }
        if rates.len() < count {
            return Err(XrCode::ERROR_SIZE_INSUFFICIENT);
        }
        rates[..count].copy_from_slice(&state.refresh_rates);
        Ok(count as u32)
    }

    fn get_refresh_rate(&self, session: SessionHandle) -> RawResult<f32> {
        let mut state = self.shared.state();
        state.check(DummyVerb::RefreshRate)?;
        state.has_session(session)?;
        Ok(state.current_rate)
    }

    fn request_refresh_rate(&self, session: SessionHandle, rate: f32) -> RawResult<()> {
        let mut state = self.shared.state();
        state.check(DummyVerb::RefreshRate)?;
        state.has_session(session)?;
        if rate == 0.0 {
            state.current_rate = state.refresh_rates.first().copied().unwrap_or(0.0);
            return Ok(());
        }
        if !state.refresh_rates.contains(&rate) {
            return Err(ERROR_REFRESH_RATE_UNSUPPORTED);
        }
        state.current_rate = rate;
        Ok(())
    }
}

impl ViveTrackerFns for DummyExtensions {
    fn enumerate_tracker_paths(
        &self,
        instance: InstanceHandle,
        paths: &mut [ViveTrackerPaths],
    ) -> RawResult<u32> {
        let mut state = self.shared.state();
        state.check(DummyVerb::EnumerateTrackers)?;
        state.has_instance(instance)?;
        let count = state.trackers.len();
        if paths.is_empty() {
            return Ok(count as u32);
        }
        if paths.len() < count {
            return Err(XrCode::ERROR_SIZE_INSUFFICIENT);
        }
        paths[..count].copy_from_slice(&state.trackers);
        Ok(count as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(runtime: &DummyRuntime, extensions: &[&str]) -> InstanceHandle {
        runtime
            .create_instance(&InstanceCreateInfo {
                app_name: "test".into(),
                app_version: 1,
                engine_name: "test".into(),
                engine_version: 1,
                api_version: Version::new(1, 0, 0),
                extensions: extensions.iter().map(|s| s.to_string()).collect(),
                api_layers: Vec::new(),
            })
            .unwrap()
    }

    #[test]
    fn test_path_round_trip() {
        let runtime = DummyRuntime::new();
        let inst = instance(&runtime, &[]);
        let path = runtime.string_to_path(inst, "/user/hand/left").unwrap();
        assert_eq!(runtime.path_to_string(inst, path).unwrap(), "/user/hand/left");
        assert_eq!(runtime.string_to_path(inst, "/user/hand/left").unwrap(), path);
    }

    #[test]
    fn test_malformed_paths_rejected() {
        let runtime = DummyRuntime::new();
        let inst = instance(&runtime, &[]);
        for bad in ["", "user/hand", "/user//hand", "/user/Hand", "/user/hand/"] {
            assert_eq!(
                runtime.string_to_path(inst, bad),
                Err(XrCode::ERROR_PATH_FORMAT_INVALID),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_unadvertised_extension_refused() {
        let runtime = DummyRuntime::with_extensions(&["XR_EXT_hand_tracking"]);
        let result = runtime.create_instance(&InstanceCreateInfo {
            app_name: "test".into(),
            app_version: 1,
            engine_name: String::new(),
            engine_version: 0,
            api_version: Version::new(1, 0, 0),
            extensions: vec!["XR_FB_passthrough".into()],
            api_layers: Vec::new(),
        });
        assert_eq!(result, Err(XrCode::ERROR_EXTENSION_NOT_PRESENT));
    }

    #[test]
    fn test_fail_next_is_one_shot() {
        let runtime = DummyRuntime::new();
        runtime.fail_next(DummyVerb::EnumerateExtensions, XrCode::ERROR_RUNTIME_FAILURE);
        assert_eq!(
            runtime.enumerate_extensions().unwrap_err(),
            XrCode::ERROR_RUNTIME_FAILURE
        );
        assert!(runtime.enumerate_extensions().is_ok());
    }

    #[test]
    fn test_fail_nth_skips_earlier_calls() {
        let runtime = DummyRuntime::new();
        runtime.fail_nth(DummyVerb::EnumerateExtensions, 2, XrCode::ERROR_RUNTIME_FAILURE);
        assert!(runtime.enumerate_extensions().is_ok());
        assert_eq!(
            runtime.enumerate_extensions().unwrap_err(),
            XrCode::ERROR_RUNTIME_FAILURE
        );
        assert!(runtime.enumerate_extensions().is_ok());
    }

    #[test]
    fn test_injected_success_code_is_not_a_failure() {
        let runtime = DummyRuntime::new();
        runtime.fail_next(DummyVerb::EnumerateExtensions, XrCode::SESSION_LOSS_PENDING);
        assert!(runtime.enumerate_extensions().is_ok());
    }

    #[test]
    fn test_resolution_requires_enabled_extension() {
        let runtime = DummyRuntime::new();
        let inst = instance(&runtime, &[HAND_TRACKING]);
        assert!(runtime.resolve_hand_tracking(inst).is_ok());
        assert_eq!(
            runtime.resolve_passthrough(inst).err(),
            Some(XrCode::ERROR_FUNCTION_UNSUPPORTED)
        );
    }
}
