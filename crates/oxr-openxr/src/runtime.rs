use std::ffi::c_void;
use std::ptr;
use std::sync::{Arc, RwLock};

use openxr as xr;
use openxr::sys;
use openxr::sys::Handle;

use oxr_provider::extensions::{
    EYE_GAZE_INTERACTION, HAND_JOINTS_MOTION_RANGE, HAND_TRACKING, HEADLESS, PASSTHROUGH,
    REFRESH_RATE, VISIBILITY_MASK, VIVE_TRACKER_INTERACTION, VULKAN_ENABLE, VULKAN_ENABLE2,
};
use oxr_provider::runtime::{
    ActionCreateInfo, ActiveActionSet, FrameEnd, FrameLayer, HandTrackingFns,
    InstanceCreateInfo, PassthroughFns, RefreshRateFns, SuggestedBinding, ViveTrackerFns,
    VisibilityMaskFns,
};
use oxr_provider::types::{
    ActionHandle, ActionSetHandle, ApiLayerProperties, BoolState, ExtensionProperties,
    FloatState, FormFactor, FrameState, HapticVibration, InstanceHandle, PoseState, Posef,
    ReferenceSpace, RuntimeEvent, RuntimeProperties, SessionHandle, SpaceHandle, SpaceLocation,
    SystemId, SystemProperties, Vector2State, Version, ViewConfiguration, XrPath, XrTime,
};
use oxr_provider::{GraphicsBinding, RawResult, XrCode, XrRuntime};

use crate::convert::{self, check, code, cvt, fixed_str, flag, place_str};
use crate::extensions;
use crate::{OpenXrError, OpenXrResult};

/// Runtime backed by the OpenXR loader found on the system.
pub struct OpenXrRuntime {
    entry: xr::Entry,
    live: RwLock<Option<xr::Instance>>,
}

impl std::fmt::Debug for OpenXrRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenXrRuntime")
            .field("live", &self.current().is_ok())
            .finish()
    }
}

impl OpenXrRuntime {
    /// Loads the system loader library.
    pub fn load() -> OpenXrResult<Self> {
        let entry =
            unsafe { xr::Entry::load() }.map_err(|e| OpenXrError::Load(format!("{e:?}")))?;
        Ok(Self::from_entry(entry))
    }

    pub fn from_entry(entry: xr::Entry) -> Self {
        Self {
            entry,
            live: RwLock::new(None),
        }
    }

    fn current(&self) -> RawResult<xr::Instance> {
        let live = match self.live.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        live.clone().ok_or(XrCode::ERROR_HANDLE_INVALID)
    }

    fn instance(&self, handle: InstanceHandle) -> RawResult<xr::Instance> {
        let instance = self.current()?;
        if instance.as_raw().into_raw() != handle.raw() {
            return Err(XrCode::ERROR_HANDLE_INVALID);
        }
        Ok(instance)
    }

    fn action_state_info(action: ActionHandle, subaction_path: XrPath) -> sys::ActionStateGetInfo {
        sys::ActionStateGetInfo {
            ty: sys::ActionStateGetInfo::TYPE,
            next: ptr::null(),
            action: sys::Action::from_raw(action.raw()),
            subaction_path: sys::Path::from_raw(subaction_path.raw()),
        }
    }

    fn haptic_info(action: ActionHandle, subaction_path: XrPath) -> sys::HapticActionInfo {
        sys::HapticActionInfo {
            ty: sys::HapticActionInfo::TYPE,
            next: ptr::null(),
            action: sys::Action::from_raw(action.raw()),
            subaction_path: sys::Path::from_raw(subaction_path.raw()),
        }
    }

    fn locate(
        &self,
        space: SpaceHandle,
        base: SpaceHandle,
        time: XrTime,
        next: *mut c_void,
    ) -> RawResult<(sys::SpaceLocation, XrCode)> {
        let instance = self.current()?;
        let mut location = sys::SpaceLocation {
            ty: sys::SpaceLocation::TYPE,
            next,
            location_flags: sys::SpaceLocationFlags::EMPTY,
            pose: convert::to_sys_pose(Posef::IDENTITY),
        };
        let code = cvt(unsafe {
            (instance.fp().locate_space)(
                sys::Space::from_raw(space.raw()),
                sys::Space::from_raw(base.raw()),
                sys::Time::from_nanos(time),
                &mut location,
            )
        })?;
        Ok((location, code))
    }
}

/// Maps requested names onto the loader's extension set. Names the `openxr`
/// crate has no field for are passed through untouched.
fn extension_set(names: &[String]) -> xr::ExtensionSet {
    let mut set = xr::ExtensionSet::default();
    for name in names {
        match name.as_str() {
            VULKAN_ENABLE2 => set.khr_vulkan_enable2 = true,
            VULKAN_ENABLE => set.khr_vulkan_enable = true,
            HEADLESS => set.mnd_headless = true,
            VISIBILITY_MASK => set.khr_visibility_mask = true,
            HAND_TRACKING => set.ext_hand_tracking = true,
            HAND_JOINTS_MOTION_RANGE => set.ext_hand_joints_motion_range = true,
            EYE_GAZE_INTERACTION => set.ext_eye_gaze_interaction = true,
            PASSTHROUGH => set.fb_passthrough = true,
            REFRESH_RATE => set.fb_display_refresh_rate = true,
            VIVE_TRACKER_INTERACTION => set.htcx_vive_tracker_interaction = true,
            other => set.other.push(format!("{other}\0").into_bytes()),
        }
    }
    set
}

impl XrRuntime for OpenXrRuntime {
    fn enumerate_extensions(&self) -> RawResult<Vec<ExtensionProperties>> {
        let enumerate = self.entry.fp().enumerate_instance_extension_properties;
        let mut count = 0u32;
        check(unsafe { enumerate(ptr::null(), 0, &mut count, ptr::null_mut()) })?;
        let blank = sys::ExtensionProperties {
            ty: sys::ExtensionProperties::TYPE,
            next: ptr::null_mut(),
            extension_name: [0; sys::MAX_EXTENSION_NAME_SIZE],
            extension_version: 0,
        };
        let mut properties = vec![blank; count as usize];
        check(unsafe {
            enumerate(
                ptr::null(),
                count,
                &mut count,
                properties.as_mut_ptr(),
            )
        })?;
        properties.truncate(count as usize);
        Ok(properties
            .iter()
            .map(|p| ExtensionProperties {
                name: fixed_str(&p.extension_name),
                version: p.extension_version,
            })
            .collect())
    }

    fn enumerate_api_layers(&self) -> RawResult<Vec<ApiLayerProperties>> {
        let layers = self.entry.enumerate_layers().map_err(code)?;
        Ok(layers
            .into_iter()
            .map(|layer| ApiLayerProperties {
                name: layer.layer_name,
                spec_version: Version(layer.spec_version.into_raw()),
                layer_version: layer.layer_version,
                description: layer.description,
            })
            .collect())
    }

    fn create_instance(&self, info: &InstanceCreateInfo) -> RawResult<InstanceHandle> {
        let mut live = match self.live.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if live.is_some() {
            log::warn!("an OpenXR instance is already live");
            return Err(XrCode::ERROR_LIMIT_REACHED);
        }

        let app_info = xr::ApplicationInfo {
            application_name: &info.app_name,
            application_version: info.app_version,
            engine_name: &info.engine_name,
            engine_version: info.engine_version,
            api_version: xr::Version::from_raw(info.api_version.0),
        };
        let layers: Vec<&str> = info.api_layers.iter().map(String::as_str).collect();
        let instance = self
            .entry
            .create_instance(&app_info, &extension_set(&info.extensions), &layers)
            .map_err(code)?;
        let handle = InstanceHandle(instance.as_raw().into_raw());
        log::info!(
            "OpenXR instance created with {} extensions and {} layers",
            info.extensions.len(),
            layers.len()
        );
        *live = Some(instance);
        Ok(handle)
    }

    fn destroy_instance(&self, instance: InstanceHandle) -> RawResult<()> {
        self.instance(instance)?;
        let mut live = match self.live.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Dropping the last clone destroys the instance.
        live.take();
        log::debug!("OpenXR instance destroyed");
        Ok(())
    }

    fn instance_properties(&self, instance: InstanceHandle) -> RawResult<RuntimeProperties> {
        let properties = self.instance(instance)?.properties().map_err(code)?;
        Ok(RuntimeProperties {
            runtime_name: properties.runtime_name,
            runtime_version: Version(properties.runtime_version.into_raw()),
        })
    }

    fn get_system(&self, instance: InstanceHandle, form_factor: FormFactor) -> RawResult<SystemId> {
        let system = self
            .instance(instance)?
            .system(convert::form_factor(form_factor))
            .map_err(code)?;
        Ok(SystemId(system.into_raw()))
    }

    fn system_properties(
        &self,
        instance: InstanceHandle,
        system: SystemId,
    ) -> RawResult<SystemProperties> {
        let instance = self.instance(instance)?;
        let exts = instance.exts();

        let mut eye_gaze = sys::SystemEyeGazeInteractionPropertiesEXT {
            ty: sys::SystemEyeGazeInteractionPropertiesEXT::TYPE,
            next: ptr::null_mut(),
            supports_eye_gaze_interaction: sys::FALSE,
        };
        let mut hand_tracking = sys::SystemHandTrackingPropertiesEXT {
            ty: sys::SystemHandTrackingPropertiesEXT::TYPE,
            next: ptr::null_mut(),
            supports_hand_tracking: sys::FALSE,
        };
        // Chain only structures whose extension is enabled.
        let mut next: *mut c_void = ptr::null_mut();
        if exts.ext_eye_gaze_interaction.is_some() {
            eye_gaze.next = next;
            next = &mut eye_gaze as *mut sys::SystemEyeGazeInteractionPropertiesEXT as *mut c_void;
        }
        if exts.ext_hand_tracking.is_some() {
            hand_tracking.next = next;
            next = &mut hand_tracking as *mut sys::SystemHandTrackingPropertiesEXT as *mut c_void;
        }

        let mut properties = sys::SystemProperties {
            ty: sys::SystemProperties::TYPE,
            next,
            system_id: sys::SystemId::from_raw(system.raw()),
            vendor_id: 0,
            system_name: [0; sys::MAX_SYSTEM_NAME_SIZE],
            graphics_properties: sys::SystemGraphicsProperties {
                max_swapchain_image_height: 0,
                max_swapchain_image_width: 0,
                max_layer_count: 0,
            },
            tracking_properties: sys::SystemTrackingProperties {
                orientation_tracking: sys::FALSE,
                position_tracking: sys::FALSE,
            },
        };
        check(unsafe {
            (instance.fp().get_system_properties)(
                instance.as_raw(),
                sys::SystemId::from_raw(system.raw()),
                &mut properties,
            )
        })?;

        Ok(SystemProperties {
            system_id: system,
            system_name: fixed_str(&properties.system_name),
            vendor_id: properties.vendor_id,
            orientation_tracking: flag(properties.tracking_properties.orientation_tracking),
            position_tracking: flag(properties.tracking_properties.position_tracking),
            supports_hand_tracking: flag(hand_tracking.supports_hand_tracking),
            supports_eye_gaze: flag(eye_gaze.supports_eye_gaze_interaction),
        })
    }

    fn enumerate_view_configurations(
        &self,
        instance: InstanceHandle,
        system: SystemId,
    ) -> RawResult<Vec<ViewConfiguration>> {
        let views = self
            .instance(instance)?
            .enumerate_view_configurations(sys::SystemId::from_raw(system.raw()))
            .map_err(code)?;
        Ok(views
            .into_iter()
            .filter_map(convert::from_view_configuration)
            .collect())
    }

    fn string_to_path(&self, instance: InstanceHandle, path: &str) -> RawResult<XrPath> {
        let path = self.instance(instance)?.string_to_path(path).map_err(code)?;
        Ok(XrPath(path.into_raw()))
    }

    fn path_to_string(&self, instance: InstanceHandle, path: XrPath) -> RawResult<String> {
        self.instance(instance)?
            .path_to_string(sys::Path::from_raw(path.raw()))
            .map_err(code)
    }

    fn poll_event(&self, instance: InstanceHandle) -> RawResult<Option<RuntimeEvent>> {
        let instance = self.instance(instance)?;
        let mut buffer = xr::EventDataBuffer::new();
        let Some(event) = instance.poll_event(&mut buffer).map_err(code)? else {
            return Ok(None);
        };
        let event = match event {
            xr::Event::SessionStateChanged(e) => RuntimeEvent::SessionStateChanged {
                session: SessionHandle(e.session().into_raw()),
                state: convert::session_state(e.state()),
                time: e.time().as_nanos(),
            },
            xr::Event::EventsLost(e) => RuntimeEvent::EventsLost {
                count: e.lost_event_count(),
            },
            xr::Event::InstanceLossPending(e) => RuntimeEvent::InstanceLossPending {
                loss_time: e.loss_time().as_nanos(),
            },
            xr::Event::InteractionProfileChanged(e) => RuntimeEvent::InteractionProfileChanged {
                session: SessionHandle(e.session().into_raw()),
            },
            xr::Event::ReferenceSpaceChangePending(e) => {
                match convert::from_reference_space(e.reference_space_type()) {
                    Some(space) => RuntimeEvent::ReferenceSpaceChangePending {
                        session: SessionHandle(e.session().into_raw()),
                        space,
                    },
                    None => RuntimeEvent::Other,
                }
            }
            _ => RuntimeEvent::Other,
        };
        Ok(Some(event))
    }

    fn create_session(
        &self,
        instance: InstanceHandle,
        system: SystemId,
        graphics: &GraphicsBinding,
    ) -> RawResult<SessionHandle> {
        let instance = self.instance(instance)?;
        let system_id = sys::SystemId::from_raw(system.raw());

        let vulkan = match graphics {
            GraphicsBinding::Headless => None,
            GraphicsBinding::Vulkan(binding) => {
                // Runtimes refuse Vulkan sessions until requirements were queried.
                let requirements = instance
                    .graphics_requirements::<xr::Vulkan>(system_id)
                    .map_err(code)?;
                log::debug!(
                    "Vulkan requirements: {}..{}",
                    requirements.min_api_version_supported,
                    requirements.max_api_version_supported
                );
                Some(sys::GraphicsBindingVulkanKHR {
                    ty: sys::GraphicsBindingVulkanKHR::TYPE,
                    next: ptr::null(),
                    instance: binding.instance as usize as _,
                    physical_device: binding.physical_device as usize as _,
                    device: binding.device as usize as _,
                    queue_family_index: binding.queue_family_index,
                    queue_index: binding.queue_index,
                })
            }
        };

        let info = sys::SessionCreateInfo {
            ty: sys::SessionCreateInfo::TYPE,
            next: vulkan.as_ref().map_or(ptr::null(), |b| {
                b as *const sys::GraphicsBindingVulkanKHR as *const c_void
            }),
            create_flags: sys::SessionCreateFlags::EMPTY,
            system_id,
        };
        let mut session = sys::Session::NULL;
        check(unsafe { (instance.fp().create_session)(instance.as_raw(), &info, &mut session) })?;
        Ok(SessionHandle(session.into_raw()))
    }

    fn destroy_session(&self, session: SessionHandle) -> RawResult<()> {
        let instance = self.current()?;
        check(unsafe { (instance.fp().destroy_session)(sys::Session::from_raw(session.raw())) })
    }

    fn begin_session(&self, session: SessionHandle, view: ViewConfiguration) -> RawResult<()> {
        let instance = self.current()?;
        let info = sys::SessionBeginInfo {
            ty: sys::SessionBeginInfo::TYPE,
            next: ptr::null(),
            primary_view_configuration_type: convert::view_configuration(view),
        };
        check(unsafe {
            (instance.fp().begin_session)(sys::Session::from_raw(session.raw()), &info)
        })
    }

    fn end_session(&self, session: SessionHandle) -> RawResult<()> {
        let instance = self.current()?;
        check(unsafe { (instance.fp().end_session)(sys::Session::from_raw(session.raw())) })
    }

    fn request_exit_session(&self, session: SessionHandle) -> RawResult<()> {
        let instance = self.current()?;
        check(unsafe {
            (instance.fp().request_exit_session)(sys::Session::from_raw(session.raw()))
        })
    }

    fn enumerate_reference_spaces(
        &self,
        session: SessionHandle,
    ) -> RawResult<Vec<ReferenceSpace>> {
        let instance = self.current()?;
        let enumerate = instance.fp().enumerate_reference_spaces;
        let session = sys::Session::from_raw(session.raw());
        let mut count = 0u32;
        check(unsafe { enumerate(session, 0, &mut count, ptr::null_mut()) })?;
        let mut spaces = vec![sys::ReferenceSpaceType::VIEW; count as usize];
        check(unsafe { enumerate(session, count, &mut count, spaces.as_mut_ptr()) })?;
        spaces.truncate(count as usize);
        Ok(spaces
            .into_iter()
            .filter_map(convert::from_reference_space)
            .collect())
    }

    fn create_reference_space(
        &self,
        session: SessionHandle,
        kind: ReferenceSpace,
        pose: Posef,
    ) -> RawResult<SpaceHandle> {
        let instance = self.current()?;
        let info = sys::ReferenceSpaceCreateInfo {
            ty: sys::ReferenceSpaceCreateInfo::TYPE,
            next: ptr::null(),
            reference_space_type: convert::reference_space(kind),
            pose_in_reference_space: convert::to_sys_pose(pose),
        };
        let mut space = sys::Space::NULL;
        check(unsafe {
            (instance.fp().create_reference_space)(
                sys::Session::from_raw(session.raw()),
                &info,
                &mut space,
            )
        })?;
        Ok(SpaceHandle(space.into_raw()))
    }

    fn destroy_space(&self, space: SpaceHandle) -> RawResult<()> {
        let instance = self.current()?;
        check(unsafe { (instance.fp().destroy_space)(sys::Space::from_raw(space.raw())) })
    }

    fn locate_space(
        &self,
        space: SpaceHandle,
        base: SpaceHandle,
        time: XrTime,
    ) -> RawResult<(SpaceLocation, XrCode)> {
        let (location, code) = self.locate(space, base, time, ptr::null_mut())?;
        let location = SpaceLocation {
            flags: convert::location_flags(location.location_flags),
            pose: convert::from_sys_pose(location.pose),
        };
        Ok((location, code))
    }

    fn wait_frame(&self, session: SessionHandle) -> RawResult<(FrameState, XrCode)> {
        let instance = self.current()?;
        let info = sys::FrameWaitInfo {
            ty: sys::FrameWaitInfo::TYPE,
            next: ptr::null(),
        };
        let mut state = sys::FrameState {
            ty: sys::FrameState::TYPE,
            next: ptr::null_mut(),
            predicted_display_time: sys::Time::from_nanos(0),
            predicted_display_period: sys::Duration::from_nanos(0),
            should_render: sys::FALSE,
        };
        let code = cvt(unsafe {
            (instance.fp().wait_frame)(sys::Session::from_raw(session.raw()), &info, &mut state)
        })?;
        let frame = FrameState {
            predicted_display_time: state.predicted_display_time.as_nanos(),
            predicted_display_period: state.predicted_display_period.as_nanos(),
            should_render: flag(state.should_render),
        };
        Ok((frame, code))
    }

    fn begin_frame(&self, session: SessionHandle) -> RawResult<XrCode> {
        let instance = self.current()?;
        let info = sys::FrameBeginInfo {
            ty: sys::FrameBeginInfo::TYPE,
            next: ptr::null(),
        };
        cvt(unsafe { (instance.fp().begin_frame)(sys::Session::from_raw(session.raw()), &info) })
    }

    fn end_frame(&self, session: SessionHandle, frame: &FrameEnd<'_>) -> RawResult<XrCode> {
        let instance = self.current()?;
        let passthrough_layers: Vec<sys::CompositionLayerPassthroughFB> = frame
            .layers
            .iter()
            .map(|layer| match layer {
                FrameLayer::Passthrough(handle) => sys::CompositionLayerPassthroughFB {
                    ty: sys::CompositionLayerPassthroughFB::TYPE,
                    next: ptr::null(),
                    flags: sys::CompositionLayerFlags::BLEND_TEXTURE_SOURCE_ALPHA,
                    space: sys::Space::NULL,
                    layer_handle: sys::PassthroughLayerFB::from_raw(handle.raw()),
                },
            })
            .collect();
        let headers: Vec<*const sys::CompositionLayerBaseHeader> = passthrough_layers
            .iter()
            .map(|layer| {
                layer as *const sys::CompositionLayerPassthroughFB
                    as *const sys::CompositionLayerBaseHeader
            })
            .collect();
        let info = sys::FrameEndInfo {
            ty: sys::FrameEndInfo::TYPE,
            next: ptr::null(),
            display_time: sys::Time::from_nanos(frame.display_time),
            environment_blend_mode: convert::blend_mode(frame.blend_mode),
            layer_count: headers.len() as u32,
            layers: if headers.is_empty() {
                ptr::null()
            } else {
                headers.as_ptr()
            },
        };
        cvt(unsafe { (instance.fp().end_frame)(sys::Session::from_raw(session.raw()), &info) })
    }

    fn create_action_set(
        &self,
        instance: InstanceHandle,
        name: &str,
        localized_name: &str,
        priority: u32,
    ) -> RawResult<ActionSetHandle> {
        let instance = self.instance(instance)?;
        let mut info = sys::ActionSetCreateInfo {
            ty: sys::ActionSetCreateInfo::TYPE,
            next: ptr::null(),
            action_set_name: [0; sys::MAX_ACTION_SET_NAME_SIZE],
            localized_action_set_name: [0; sys::MAX_LOCALIZED_ACTION_SET_NAME_SIZE],
            priority,
        };
        place_str(&mut info.action_set_name, name, XrCode::ERROR_NAME_INVALID)?;
        place_str(
            &mut info.localized_action_set_name,
            localized_name,
            XrCode::ERROR_LOCALIZED_NAME_INVALID,
        )?;
        let mut set = sys::ActionSet::NULL;
        check(unsafe { (instance.fp().create_action_set)(instance.as_raw(), &info, &mut set) })?;
        Ok(ActionSetHandle(set.into_raw()))
    }

    fn destroy_action_set(&self, action_set: ActionSetHandle) -> RawResult<()> {
        let instance = self.current()?;
        check(unsafe {
            (instance.fp().destroy_action_set)(sys::ActionSet::from_raw(action_set.raw()))
        })
    }

    fn create_action(
        &self,
        action_set: ActionSetHandle,
        info: &ActionCreateInfo<'_>,
    ) -> RawResult<ActionHandle> {
        let instance = self.current()?;
        let subaction_paths: Vec<sys::Path> = info
            .subaction_paths
            .iter()
            .map(|p| sys::Path::from_raw(p.raw()))
            .collect();
        let mut raw_info = sys::ActionCreateInfo {
            ty: sys::ActionCreateInfo::TYPE,
            next: ptr::null(),
            action_name: [0; sys::MAX_ACTION_NAME_SIZE],
            action_type: convert::action_type(info.action_type),
            count_subaction_paths: subaction_paths.len() as u32,
            subaction_paths: if subaction_paths.is_empty() {
                ptr::null()
            } else {
                subaction_paths.as_ptr()
            },
            localized_action_name: [0; sys::MAX_LOCALIZED_ACTION_NAME_SIZE],
        };
        place_str(&mut raw_info.action_name, info.name, XrCode::ERROR_NAME_INVALID)?;
        place_str(
            &mut raw_info.localized_action_name,
            info.localized_name,
            XrCode::ERROR_LOCALIZED_NAME_INVALID,
        )?;
        let mut action = sys::Action::NULL;
        check(unsafe {
            (instance.fp().create_action)(
                sys::ActionSet::from_raw(action_set.raw()),
                &raw_info,
                &mut action,
            )
        })?;
        Ok(ActionHandle(action.into_raw()))
    }

    fn destroy_action(&self, action: ActionHandle) -> RawResult<()> {
        let instance = self.current()?;
        check(unsafe { (instance.fp().destroy_action)(sys::Action::from_raw(action.raw())) })
    }

    fn create_action_space(
        &self,
        session: SessionHandle,
        action: ActionHandle,
        subaction_path: XrPath,
        pose: Posef,
    ) -> RawResult<SpaceHandle> {
        let instance = self.current()?;
        let info = sys::ActionSpaceCreateInfo {
            ty: sys::ActionSpaceCreateInfo::TYPE,
            next: ptr::null(),
            action: sys::Action::from_raw(action.raw()),
            subaction_path: sys::Path::from_raw(subaction_path.raw()),
            pose_in_action_space: convert::to_sys_pose(pose),
        };
        let mut space = sys::Space::NULL;
        check(unsafe {
            (instance.fp().create_action_space)(
                sys::Session::from_raw(session.raw()),
                &info,
                &mut space,
            )
        })?;
        Ok(SpaceHandle(space.into_raw()))
    }

    fn suggest_bindings(
        &self,
        instance: InstanceHandle,
        profile: XrPath,
        bindings: &[SuggestedBinding],
    ) -> RawResult<()> {
        let instance = self.instance(instance)?;
        let raw_bindings: Vec<sys::ActionSuggestedBinding> = bindings
            .iter()
            .map(|b| sys::ActionSuggestedBinding {
                action: sys::Action::from_raw(b.action.raw()),
                binding: sys::Path::from_raw(b.binding.raw()),
            })
            .collect();
        let info = sys::InteractionProfileSuggestedBinding {
            ty: sys::InteractionProfileSuggestedBinding::TYPE,
            next: ptr::null(),
            interaction_profile: sys::Path::from_raw(profile.raw()),
            count_suggested_bindings: raw_bindings.len() as u32,
            suggested_bindings: raw_bindings.as_ptr(),
        };
        check(unsafe {
            (instance.fp().suggest_interaction_profile_bindings)(instance.as_raw(), &info)
        })
    }

    fn attach_action_sets(
        &self,
        session: SessionHandle,
        action_sets: &[ActionSetHandle],
    ) -> RawResult<()> {
        let instance = self.current()?;
        let sets: Vec<sys::ActionSet> = action_sets
            .iter()
            .map(|s| sys::ActionSet::from_raw(s.raw()))
            .collect();
        let info = sys::SessionActionSetsAttachInfo {
            ty: sys::SessionActionSetsAttachInfo::TYPE,
            next: ptr::null(),
            count_action_sets: sets.len() as u32,
            action_sets: sets.as_ptr(),
        };
        check(unsafe {
            (instance.fp().attach_session_action_sets)(sys::Session::from_raw(session.raw()), &info)
        })
    }

    fn sync_actions(
        &self,
        session: SessionHandle,
        active: &[ActiveActionSet],
    ) -> RawResult<XrCode> {
        let instance = self.current()?;
        let sets: Vec<sys::ActiveActionSet> = active
            .iter()
            .map(|a| sys::ActiveActionSet {
                action_set: sys::ActionSet::from_raw(a.action_set.raw()),
                subaction_path: sys::Path::from_raw(a.subaction_path.raw()),
            })
            .collect();
        let info = sys::ActionsSyncInfo {
            ty: sys::ActionsSyncInfo::TYPE,
            next: ptr::null(),
            count_active_action_sets: sets.len() as u32,
            active_action_sets: if sets.is_empty() {
                ptr::null()
            } else {
                sets.as_ptr()
            },
        };
        cvt(unsafe { (instance.fp().sync_actions)(sys::Session::from_raw(session.raw()), &info) })
    }

    fn action_state_boolean(
        &self,
        session: SessionHandle,
        action: ActionHandle,
        subaction_path: XrPath,
    ) -> RawResult<BoolState> {
        let instance = self.current()?;
        let info = Self::action_state_info(action, subaction_path);
        let mut state = sys::ActionStateBoolean {
            ty: sys::ActionStateBoolean::TYPE,
            next: ptr::null_mut(),
            current_state: sys::FALSE,
            changed_since_last_sync: sys::FALSE,
            last_change_time: sys::Time::from_nanos(0),
            is_active: sys::FALSE,
        };
        check(unsafe {
            (instance.fp().get_action_state_boolean)(
                sys::Session::from_raw(session.raw()),
                &info,
                &mut state,
            )
        })?;
        Ok(BoolState {
            current_state: flag(state.current_state),
            changed_since_last_sync: flag(state.changed_since_last_sync),
            last_change_time: state.last_change_time.as_nanos(),
            is_active: flag(state.is_active),
        })
    }

    fn action_state_float(
        &self,
        session: SessionHandle,
        action: ActionHandle,
        subaction_path: XrPath,
    ) -> RawResult<FloatState> {
        let instance = self.current()?;
        let info = Self::action_state_info(action, subaction_path);
        let mut state = sys::ActionStateFloat {
            ty: sys::ActionStateFloat::TYPE,
            next: ptr::null_mut(),
            current_state: 0.0,
            changed_since_last_sync: sys::FALSE,
            last_change_time: sys::Time::from_nanos(0),
            is_active: sys::FALSE,
        };
        check(unsafe {
            (instance.fp().get_action_state_float)(
                sys::Session::from_raw(session.raw()),
                &info,
                &mut state,
            )
        })?;
        Ok(FloatState {
            current_state: state.current_state,
            changed_since_last_sync: flag(state.changed_since_last_sync),
            last_change_time: state.last_change_time.as_nanos(),
            is_active: flag(state.is_active),
        })
    }

    fn action_state_vector2f(
        &self,
        session: SessionHandle,
        action: ActionHandle,
        subaction_path: XrPath,
    ) -> RawResult<Vector2State> {
        let instance = self.current()?;
        let info = Self::action_state_info(action, subaction_path);
        let mut state = sys::ActionStateVector2f {
            ty: sys::ActionStateVector2f::TYPE,
            next: ptr::null_mut(),
            current_state: sys::Vector2f { x: 0.0, y: 0.0 },
            changed_since_last_sync: sys::FALSE,
            last_change_time: sys::Time::from_nanos(0),
            is_active: sys::FALSE,
        };
        check(unsafe {
            (instance.fp().get_action_state_vector2f)(
                sys::Session::from_raw(session.raw()),
                &info,
                &mut state,
            )
        })?;
        Ok(Vector2State {
            current_state: convert::from_sys_vec2(state.current_state),
            changed_since_last_sync: flag(state.changed_since_last_sync),
            last_change_time: state.last_change_time.as_nanos(),
            is_active: flag(state.is_active),
        })
    }

    fn action_state_pose(
        &self,
        session: SessionHandle,
        action: ActionHandle,
        subaction_path: XrPath,
    ) -> RawResult<PoseState> {
        let instance = self.current()?;
        let info = Self::action_state_info(action, subaction_path);
        let mut state = sys::ActionStatePose {
            ty: sys::ActionStatePose::TYPE,
            next: ptr::null_mut(),
            is_active: sys::FALSE,
        };
        check(unsafe {
            (instance.fp().get_action_state_pose)(
                sys::Session::from_raw(session.raw()),
                &info,
                &mut state,
            )
        })?;
        Ok(PoseState {
            is_active: flag(state.is_active),
        })
    }

    fn apply_haptic_feedback(
        &self,
        session: SessionHandle,
        action: ActionHandle,
        subaction_path: XrPath,
        vibration: &HapticVibration,
    ) -> RawResult<XrCode> {
        let instance = self.current()?;
        let info = Self::haptic_info(action, subaction_path);
        let raw_vibration = sys::HapticVibration {
            ty: sys::HapticVibration::TYPE,
            next: ptr::null(),
            duration: sys::Duration::from_nanos(vibration.duration),
            frequency: vibration.frequency,
            amplitude: vibration.amplitude,
        };
        cvt(unsafe {
            (instance.fp().apply_haptic_feedback)(
                sys::Session::from_raw(session.raw()),
                &info,
                &raw_vibration as *const sys::HapticVibration as *const sys::HapticBaseHeader,
            )
        })
    }

    fn stop_haptic_feedback(
        &self,
        session: SessionHandle,
        action: ActionHandle,
        subaction_path: XrPath,
    ) -> RawResult<()> {
        let instance = self.current()?;
        let info = Self::haptic_info(action, subaction_path);
        check(unsafe {
            (instance.fp().stop_haptic_feedback)(sys::Session::from_raw(session.raw()), &info)
        })
    }

    fn current_interaction_profile(
        &self,
        session: SessionHandle,
        user_path: XrPath,
    ) -> RawResult<XrPath> {
        let instance = self.current()?;
        let mut state = sys::InteractionProfileState {
            ty: sys::InteractionProfileState::TYPE,
            next: ptr::null_mut(),
            interaction_profile: sys::Path::from_raw(0),
        };
        check(unsafe {
            (instance.fp().get_current_interaction_profile)(
                sys::Session::from_raw(session.raw()),
                sys::Path::from_raw(user_path.raw()),
                &mut state,
            )
        })?;
        Ok(XrPath(state.interaction_profile.into_raw()))
    }

    fn eye_gaze_sample_time(
        &self,
        space: SpaceHandle,
        base: SpaceHandle,
        time: XrTime,
    ) -> RawResult<XrTime> {
        if self.current()?.exts().ext_eye_gaze_interaction.is_none() {
            return Err(XrCode::ERROR_FUNCTION_UNSUPPORTED);
        }
        let mut sample = sys::EyeGazeSampleTimeEXT {
            ty: sys::EyeGazeSampleTimeEXT::TYPE,
            next: ptr::null_mut(),
            time: sys::Time::from_nanos(0),
        };
        self.locate(
            space,
            base,
            time,
            &mut sample as *mut sys::EyeGazeSampleTimeEXT as *mut c_void,
        )?;
        Ok(sample.time.as_nanos())
    }

    fn resolve_visibility_mask(
        &self,
        instance: InstanceHandle,
    ) -> RawResult<Arc<dyn VisibilityMaskFns>> {
        let table = self
            .instance(instance)?
            .exts()
            .khr_visibility_mask
            .ok_or(XrCode::ERROR_FUNCTION_UNSUPPORTED)?;
        Ok(Arc::new(extensions::VisibilityMask(table)))
    }

    fn resolve_hand_tracking(
        &self,
        instance: InstanceHandle,
    ) -> RawResult<Arc<dyn HandTrackingFns>> {
        let table = self
            .instance(instance)?
            .exts()
            .ext_hand_tracking
            .ok_or(XrCode::ERROR_FUNCTION_UNSUPPORTED)?;
        Ok(Arc::new(extensions::HandTracking(table)))
    }

    fn resolve_passthrough(&self, instance: InstanceHandle) -> RawResult<Arc<dyn PassthroughFns>> {
        let table = self
            .instance(instance)?
            .exts()
            .fb_passthrough
            .ok_or(XrCode::ERROR_FUNCTION_UNSUPPORTED)?;
        Ok(Arc::new(extensions::Passthrough(table)))
    }

    fn resolve_refresh_rate(&self, instance: InstanceHandle) -> RawResult<Arc<dyn RefreshRateFns>> {
        let table = self
            .instance(instance)?
            .exts()
            .fb_display_refresh_rate
            .ok_or(XrCode::ERROR_FUNCTION_UNSUPPORTED)?;
        Ok(Arc::new(extensions::RefreshRate(table)))
    }

    fn resolve_vive_tracker(&self, instance: InstanceHandle) -> RawResult<Arc<dyn ViveTrackerFns>> {
        let table = self
            .instance(instance)?
            .exts()
            .htcx_vive_tracker_interaction
            .ok_or(XrCode::ERROR_FUNCTION_UNSUPPORTED)?;
        Ok(Arc::new(extensions::ViveTracker(table)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_extensions_map_to_fields() {
        let names: Vec<String> = [HEADLESS, PASSTHROUGH, VIVE_TRACKER_INTERACTION, VULKAN_ENABLE2]
            .map(String::from)
            .to_vec();
        let set = extension_set(&names);
        assert!(set.mnd_headless);
        assert!(set.fb_passthrough);
        assert!(set.htcx_vive_tracker_interaction);
        assert!(set.khr_vulkan_enable2);
        assert!(!set.khr_vulkan_enable);
        assert!(set.other.is_empty());
    }

    #[test]
    fn test_unknown_extensions_pass_through() {
        let names = vec!["XR_VENDOR_custom".to_string(), HAND_TRACKING.to_string()];
        let set = extension_set(&names);
        assert!(set.ext_hand_tracking);
        assert_eq!(set.other, vec!["XR_VENDOR_custom".to_string()]);
    }
}
