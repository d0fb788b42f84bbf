//! Extension dispatch tables backed by the loader's resolved entry points.
//!
//! Each table is a copy of the function pointers `openxr` resolved when the
//! instance was created with the matching extension enabled, so resolution
//! succeeding means every entry is callable.

use std::ffi::c_void;
use std::ptr;

use openxr::raw;
use openxr::sys;
use openxr::sys::Handle;

use oxr_provider::runtime::{
    HandTrackingFns, MaskCounts, PassthroughColorMap, PassthroughFns, PassthroughStyle,
    RefreshRateFns, ViveTrackerFns, VisibilityMaskFns,
};
use oxr_provider::types::{
    Hand, HandJointsMotionRange, HandTrackerHandle, InstanceHandle, JointLocation, JointVelocity,
    PassthroughHandle, PassthroughLayerHandle, SessionHandle, SpaceHandle, Vector2f,
    ViewConfiguration, ViveTrackerPaths, VisibilityMaskType, XrPath, XrTime,
};
use oxr_provider::{RawResult, XrCode};

use crate::convert::{self, check, cvt};

pub(crate) struct VisibilityMask(pub raw::VisibilityMaskKHR);

impl VisibilityMaskFns for VisibilityMask {
    fn get_visibility_mask(
        &self,
        session: SessionHandle,
        view: ViewConfiguration,
        view_index: u32,
        mask_type: VisibilityMaskType,
        vertices: &mut [Vector2f],
        indices: &mut [u32],
    ) -> RawResult<MaskCounts> {
        let mut raw_vertices = vec![sys::Vector2f { x: 0.0, y: 0.0 }; vertices.len()];
        let mut mask = sys::VisibilityMaskKHR {
            ty: sys::VisibilityMaskKHR::TYPE,
            next: ptr::null_mut(),
            vertex_capacity_input: vertices.len() as u32,
            vertex_count_output: 0,
            vertices: if vertices.is_empty() {
                ptr::null_mut()
            } else {
                raw_vertices.as_mut_ptr()
            },
            index_capacity_input: indices.len() as u32,
            index_count_output: 0,
            indices: if indices.is_empty() {
                ptr::null_mut()
            } else {
                indices.as_mut_ptr()
            },
        };
        check(unsafe {
            (self.0.get_visibility_mask)(
                sys::Session::from_raw(session.raw()),
                convert::view_configuration(view),
                view_index,
                convert::mask_type(mask_type),
                &mut mask,
            )
        })?;
        for (dst, src) in vertices.iter_mut().zip(&raw_vertices) {
            *dst = convert::from_sys_vec2(*src);
        }
        Ok(MaskCounts {
            vertex_count: mask.vertex_count_output,
            index_count: mask.index_count_output,
        })
    }
}

pub(crate) struct HandTracking(pub raw::HandTrackingEXT);

impl HandTrackingFns for HandTracking {
    fn create_hand_tracker(
        &self,
        session: SessionHandle,
        hand: Hand,
    ) -> RawResult<HandTrackerHandle> {
        let info = sys::HandTrackerCreateInfoEXT {
            ty: sys::HandTrackerCreateInfoEXT::TYPE,
            next: ptr::null(),
            hand: convert::hand(hand),
            hand_joint_set: sys::HandJointSetEXT::DEFAULT,
        };
        let mut tracker = sys::HandTrackerEXT::NULL;
        check(unsafe {
            (self.0.create_hand_tracker)(sys::Session::from_raw(session.raw()), &info, &mut tracker)
        })?;
        Ok(HandTrackerHandle(tracker.into_raw()))
    }

    fn destroy_hand_tracker(&self, tracker: HandTrackerHandle) -> RawResult<()> {
        check(unsafe { (self.0.destroy_hand_tracker)(sys::HandTrackerEXT::from_raw(tracker.raw())) })
    }

    fn locate_hand_joints(
        &self,
        tracker: HandTrackerHandle,
        base: SpaceHandle,
        time: XrTime,
        motion_range: Option<HandJointsMotionRange>,
        locations: &mut [JointLocation],
        velocities: Option<&mut [JointVelocity]>,
    ) -> RawResult<(bool, XrCode)> {
        let range_info = motion_range.map(|range| sys::HandJointsMotionRangeInfoEXT {
            ty: sys::HandJointsMotionRangeInfoEXT::TYPE,
            next: ptr::null(),
            hand_joints_motion_range: convert::motion_range(range),
        });
        let info = sys::HandJointsLocateInfoEXT {
            ty: sys::HandJointsLocateInfoEXT::TYPE,
            next: range_info.as_ref().map_or(ptr::null(), |r| {
                r as *const sys::HandJointsMotionRangeInfoEXT as *const c_void
            }),
            base_space: sys::Space::from_raw(base.raw()),
            time: sys::Time::from_nanos(time),
        };

        let mut raw_locations = vec![
            sys::HandJointLocationEXT {
                location_flags: sys::SpaceLocationFlags::EMPTY,
                pose: convert::to_sys_pose(Default::default()),
                radius: 0.0,
            };
            locations.len()
        ];
        let zero = sys::Vector3f {
            x: 0.0,
            y: 0.0,
            z: 0.0,
        };
        let mut raw_velocities = vec![
            sys::HandJointVelocityEXT {
                velocity_flags: sys::SpaceVelocityFlags::EMPTY,
                linear_velocity: zero,
                angular_velocity: zero,
            };
            velocities.as_ref().map_or(0, |v| v.len())
        ];
        let mut velocity_out = sys::HandJointVelocitiesEXT {
            ty: sys::HandJointVelocitiesEXT::TYPE,
            next: ptr::null_mut(),
            joint_count: raw_velocities.len() as u32,
            joint_velocities: raw_velocities.as_mut_ptr(),
        };
        let mut location_out = sys::HandJointLocationsEXT {
            ty: sys::HandJointLocationsEXT::TYPE,
            next: if velocities.is_some() {
                &mut velocity_out as *mut sys::HandJointVelocitiesEXT as *mut c_void
            } else {
                ptr::null_mut()
            },
            is_active: sys::FALSE,
            joint_count: raw_locations.len() as u32,
            joint_locations: raw_locations.as_mut_ptr(),
        };

        let code = cvt(unsafe {
            (self.0.locate_hand_joints)(
                sys::HandTrackerEXT::from_raw(tracker.raw()),
                &info,
                &mut location_out,
            )
        })?;

        for (dst, src) in locations.iter_mut().zip(&raw_locations) {
            *dst = JointLocation {
                flags: convert::location_flags(src.location_flags),
                pose: convert::from_sys_pose(src.pose),
                radius: src.radius,
            };
        }
        if let Some(velocities) = velocities {
            for (dst, src) in velocities.iter_mut().zip(&raw_velocities) {
                *dst = JointVelocity {
                    flags: convert::velocity_flags(src.velocity_flags),
                    linear: convert::from_sys_vec3(src.linear_velocity),
                    angular: convert::from_sys_vec3(src.angular_velocity),
                };
            }
        }
        Ok((convert::flag(location_out.is_active), code))
    }
}

pub(crate) struct Passthrough(pub raw::PassthroughFB);

impl Passthrough {
    fn running_flags(running: bool) -> sys::PassthroughFlagsFB {
        if running {
            sys::PassthroughFlagsFB::IS_RUNNING_AT_CREATION
        } else {
            sys::PassthroughFlagsFB::EMPTY
        }
    }
}

impl PassthroughFns for Passthrough {
    fn create_passthrough(
        &self,
        session: SessionHandle,
        running_at_creation: bool,
    ) -> RawResult<PassthroughHandle> {
        let info = sys::PassthroughCreateInfoFB {
            ty: sys::PassthroughCreateInfoFB::TYPE,
            next: ptr::null(),
            flags: Self::running_flags(running_at_creation),
        };
        let mut handle = sys::PassthroughFB::NULL;
        check(unsafe {
            (self.0.create_passthrough)(sys::Session::from_raw(session.raw()), &info, &mut handle)
        })?;
        Ok(PassthroughHandle(handle.into_raw()))
    }

    fn destroy_passthrough(&self, passthrough: PassthroughHandle) -> RawResult<()> {
        check(unsafe {
            (self.0.destroy_passthrough)(sys::PassthroughFB::from_raw(passthrough.raw()))
        })
    }

    fn passthrough_start(&self, passthrough: PassthroughHandle) -> RawResult<()> {
        check(unsafe { (self.0.passthrough_start)(sys::PassthroughFB::from_raw(passthrough.raw())) })
    }

    fn passthrough_pause(&self, passthrough: PassthroughHandle) -> RawResult<()> {
        check(unsafe { (self.0.passthrough_pause)(sys::PassthroughFB::from_raw(passthrough.raw())) })
    }

    fn create_layer(
        &self,
        session: SessionHandle,
        passthrough: PassthroughHandle,
        running_at_creation: bool,
    ) -> RawResult<PassthroughLayerHandle> {
        let info = sys::PassthroughLayerCreateInfoFB {
            ty: sys::PassthroughLayerCreateInfoFB::TYPE,
            next: ptr::null(),
            passthrough: sys::PassthroughFB::from_raw(passthrough.raw()),
            flags: Self::running_flags(running_at_creation),
            purpose: sys::PassthroughLayerPurposeFB::RECONSTRUCTION,
        };
        let mut layer = sys::PassthroughLayerFB::NULL;
        check(unsafe {
            (self.0.create_passthrough_layer)(
                sys::Session::from_raw(session.raw()),
                &info,
                &mut layer,
            )
        })?;
        Ok(PassthroughLayerHandle(layer.into_raw()))
    }

    fn destroy_layer(&self, layer: PassthroughLayerHandle) -> RawResult<()> {
        check(unsafe {
            (self.0.destroy_passthrough_layer)(sys::PassthroughLayerFB::from_raw(layer.raw()))
        })
    }

    fn layer_pause(&self, layer: PassthroughLayerHandle) -> RawResult<()> {
        check(unsafe {
            (self.0.passthrough_layer_pause)(sys::PassthroughLayerFB::from_raw(layer.raw()))
        })
    }

    fn layer_resume(&self, layer: PassthroughLayerHandle) -> RawResult<()> {
        check(unsafe {
            (self.0.passthrough_layer_resume)(sys::PassthroughLayerFB::from_raw(layer.raw()))
        })
    }

    fn layer_set_style(
        &self,
        layer: PassthroughLayerHandle,
        style: &PassthroughStyle,
    ) -> RawResult<()> {
        // Only one of these is chained, depending on the color map.
        let mono = match &style.color_map {
            Some(PassthroughColorMap::MonoToMono(map)) => Some(sys::PassthroughColorMapMonoToMonoFB {
                ty: sys::PassthroughColorMapMonoToMonoFB::TYPE,
                next: ptr::null(),
                texture_color_map: **map,
            }),
            _ => None,
        };
        let rgba = match &style.color_map {
            Some(PassthroughColorMap::MonoToRgba(map)) => Some(sys::PassthroughColorMapMonoToRgbaFB {
                ty: sys::PassthroughColorMapMonoToRgbaFB::TYPE,
                next: ptr::null(),
                texture_color_map: (**map).map(convert::to_sys_color),
            }),
            _ => None,
        };
        let bcs = match &style.color_map {
            Some(PassthroughColorMap::BrightnessContrastSaturation {
                brightness,
                contrast,
                saturation,
            }) => Some(sys::PassthroughBrightnessContrastSaturationFB {
                ty: sys::PassthroughBrightnessContrastSaturationFB::TYPE,
                next: ptr::null(),
                brightness: *brightness,
                contrast: *contrast,
                saturation: *saturation,
            }),
            _ => None,
        };
        let next: *const c_void = if let Some(mono) = &mono {
            mono as *const sys::PassthroughColorMapMonoToMonoFB as *const c_void
        } else if let Some(rgba) = &rgba {
            rgba as *const sys::PassthroughColorMapMonoToRgbaFB as *const c_void
        } else if let Some(bcs) = &bcs {
            bcs as *const sys::PassthroughBrightnessContrastSaturationFB as *const c_void
        } else {
            ptr::null()
        };

        let raw_style = sys::PassthroughStyleFB {
            ty: sys::PassthroughStyleFB::TYPE,
            next,
            texture_opacity_factor: style.opacity,
            edge_color: convert::to_sys_color(style.edge_color),
        };
        check(unsafe {
            (self.0.passthrough_layer_set_style)(
                sys::PassthroughLayerFB::from_raw(layer.raw()),
                &raw_style,
            )
        })
    }
}

pub(crate) struct RefreshRate(pub raw::DisplayRefreshRateFB);

impl RefreshRateFns for RefreshRate {
    fn enumerate_refresh_rates(&self, session: SessionHandle, rates: &mut [f32]) -> RawResult<u32> {
        let mut count = 0u32;
        check(unsafe {
            (self.0.enumerate_display_refresh_rates)(
                sys::Session::from_raw(session.raw()),
                rates.len() as u32,
                &mut count,
                if rates.is_empty() {
                    ptr::null_mut()
                } else {
                    rates.as_mut_ptr()
                },
            )
        })?;
        Ok(count)
    }

    fn get_refresh_rate(&self, session: SessionHandle) -> RawResult<f32> {
        let mut rate = 0.0f32;
        check(unsafe {
            (self.0.get_display_refresh_rate)(sys::Session::from_raw(session.raw()), &mut rate)
        })?;
        Ok(rate)
    }

    fn request_refresh_rate(&self, session: SessionHandle, rate: f32) -> RawResult<()> {
        check(unsafe {
            (self.0.request_display_refresh_rate)(sys::Session::from_raw(session.raw()), rate)
        })
    }
}

pub(crate) struct ViveTracker(pub raw::ViveTrackerInteractionHTCX);

impl ViveTrackerFns for ViveTracker {
    fn enumerate_tracker_paths(
        &self,
        instance: InstanceHandle,
        paths: &mut [ViveTrackerPaths],
    ) -> RawResult<u32> {
        let mut raw_paths = vec![
            sys::ViveTrackerPathsHTCX {
                ty: sys::ViveTrackerPathsHTCX::TYPE,
                next: ptr::null_mut(),
                persistent_path: sys::Path::from_raw(0),
                role_path: sys::Path::from_raw(0),
            };
            paths.len()
        ];
        let mut count = 0u32;
        check(unsafe {
            (self.0.enumerate_vive_tracker_paths)(
                sys::Instance::from_raw(instance.raw()),
                raw_paths.len() as u32,
                &mut count,
                if raw_paths.is_empty() {
                    ptr::null_mut()
                } else {
                    raw_paths.as_mut_ptr()
                },
            )
        })?;
        for (dst, src) in paths.iter_mut().zip(&raw_paths) {
            *dst = ViveTrackerPaths {
                persistent_path: XrPath(src.persistent_path.into_raw()),
                role_path: XrPath(src.role_path.into_raw()),
            };
        }
        Ok(count)
    }
}
