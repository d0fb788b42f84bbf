//! Conversions between provider types and `openxr::sys` values.

use std::os::raw::c_char;

use openxr as xr;
use openxr::sys;

use oxr_provider::types::{
    ActionType, BlendMode, Color4f, FormFactor, Hand, HandJointsMotionRange, LocationFlags,
    Posef, Quaternionf, ReferenceSpace, SessionState, Vector2f, Vector3f, VelocityFlags,
    ViewConfiguration, VisibilityMaskType,
};
use oxr_provider::{RawResult, XrCode};

/// `XR_REFERENCE_SPACE_TYPE_LOCAL_FLOOR` (core since 1.1, `_EXT` before).
const LOCAL_FLOOR: i32 = 1_000_426_000;

pub fn code(result: sys::Result) -> XrCode {
    XrCode(result.into_raw())
}

/// Errors are kept verbatim; successes carry their code so qualified ones
/// (`XR_SESSION_NOT_FOCUSED`, `XR_FRAME_DISCARDED`, ...) reach the caller.
pub fn cvt(result: sys::Result) -> RawResult<XrCode> {
    let code = code(result);
    if code.is_error() {
        Err(code)
    } else {
        Ok(code)
    }
}

/// [`cvt`] for verbs that have no qualified success worth reporting.
pub fn check(result: sys::Result) -> RawResult<()> {
    cvt(result).map(|_| ())
}

pub fn flag(value: sys::Bool32) -> bool {
    value != sys::FALSE
}

/// Copies `value` into a fixed-size, NUL-terminated name buffer.
pub fn place_str(out: &mut [c_char], value: &str, invalid: XrCode) -> RawResult<()> {
    let bytes = value.as_bytes();
    if bytes.len() >= out.len() || bytes.contains(&0) {
        return Err(invalid);
    }
    for (dst, src) in out.iter_mut().zip(bytes) {
        *dst = *src as c_char;
    }
    out[bytes.len()] = 0;
    Ok(())
}

/// Reads a NUL-terminated name out of a fixed-size buffer.
pub fn fixed_str(buf: &[c_char]) -> String {
    let bytes: Vec<u8> = buf
        .iter()
        .take_while(|c| **c != 0)
        .map(|c| *c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

pub fn to_sys_pose(pose: Posef) -> sys::Posef {
    sys::Posef {
        orientation: sys::Quaternionf {
            x: pose.orientation.x,
            y: pose.orientation.y,
            z: pose.orientation.z,
            w: pose.orientation.w,
        },
        position: sys::Vector3f {
            x: pose.position.x,
            y: pose.position.y,
            z: pose.position.z,
        },
    }
}

pub fn from_sys_pose(pose: sys::Posef) -> Posef {
    Posef {
        orientation: Quaternionf {
            x: pose.orientation.x,
            y: pose.orientation.y,
            z: pose.orientation.z,
            w: pose.orientation.w,
        },
        position: from_sys_vec3(pose.position),
    }
}

pub fn from_sys_vec3(v: sys::Vector3f) -> Vector3f {
    Vector3f {
        x: v.x,
        y: v.y,
        z: v.z,
    }
}

pub fn from_sys_vec2(v: sys::Vector2f) -> Vector2f {
    Vector2f { x: v.x, y: v.y }
}

pub fn to_sys_color(c: Color4f) -> sys::Color4f {
    sys::Color4f {
        r: c.r,
        g: c.g,
        b: c.b,
        a: c.a,
    }
}

pub fn location_flags(flags: sys::SpaceLocationFlags) -> LocationFlags {
    LocationFlags::from_bits_truncate(flags.into_raw())
}

pub fn velocity_flags(flags: sys::SpaceVelocityFlags) -> VelocityFlags {
    VelocityFlags::from_bits_truncate(flags.into_raw())
}

pub fn form_factor(form_factor: FormFactor) -> xr::FormFactor {
    match form_factor {
        FormFactor::HeadMountedDisplay => xr::FormFactor::HEAD_MOUNTED_DISPLAY,
        FormFactor::HandheldDisplay => xr::FormFactor::HANDHELD_DISPLAY,
    }
}

pub fn view_configuration(view: ViewConfiguration) -> sys::ViewConfigurationType {
    match view {
        ViewConfiguration::PrimaryMono => sys::ViewConfigurationType::PRIMARY_MONO,
        ViewConfiguration::PrimaryStereo => sys::ViewConfigurationType::PRIMARY_STEREO,
    }
}

pub fn from_view_configuration(view: sys::ViewConfigurationType) -> Option<ViewConfiguration> {
    match view {
        sys::ViewConfigurationType::PRIMARY_MONO => Some(ViewConfiguration::PrimaryMono),
        sys::ViewConfigurationType::PRIMARY_STEREO => Some(ViewConfiguration::PrimaryStereo),
        _ => None,
    }
}

pub fn reference_space(space: ReferenceSpace) -> sys::ReferenceSpaceType {
    match space {
        ReferenceSpace::View => sys::ReferenceSpaceType::VIEW,
        ReferenceSpace::Local => sys::ReferenceSpaceType::LOCAL,
        ReferenceSpace::Stage => sys::ReferenceSpaceType::STAGE,
        ReferenceSpace::LocalFloor => sys::ReferenceSpaceType::from_raw(LOCAL_FLOOR),
    }
}

pub fn from_reference_space(space: sys::ReferenceSpaceType) -> Option<ReferenceSpace> {
    match space {
        sys::ReferenceSpaceType::VIEW => Some(ReferenceSpace::View),
        sys::ReferenceSpaceType::LOCAL => Some(ReferenceSpace::Local),
        sys::ReferenceSpaceType::STAGE => Some(ReferenceSpace::Stage),
        other if other.into_raw() == LOCAL_FLOOR => Some(ReferenceSpace::LocalFloor),
        _ => None,
    }
}

pub fn session_state(state: xr::SessionState) -> SessionState {
    match state {
        xr::SessionState::IDLE => SessionState::Idle,
        xr::SessionState::READY => SessionState::Ready,
        xr::SessionState::SYNCHRONIZED => SessionState::Synchronized,
        xr::SessionState::VISIBLE => SessionState::Visible,
        xr::SessionState::FOCUSED => SessionState::Focused,
        xr::SessionState::STOPPING => SessionState::Stopping,
        xr::SessionState::LOSS_PENDING => SessionState::LossPending,
        xr::SessionState::EXITING => SessionState::Exiting,
        _ => SessionState::Unknown,
    }
}

pub fn blend_mode(mode: BlendMode) -> sys::EnvironmentBlendMode {
    match mode {
        BlendMode::Opaque => sys::EnvironmentBlendMode::OPAQUE,
        BlendMode::Additive => sys::EnvironmentBlendMode::ADDITIVE,
        BlendMode::AlphaBlend => sys::EnvironmentBlendMode::ALPHA_BLEND,
    }
}

pub fn action_type(action_type: ActionType) -> sys::ActionType {
    match action_type {
        ActionType::Boolean => sys::ActionType::BOOLEAN_INPUT,
        ActionType::Float => sys::ActionType::FLOAT_INPUT,
        ActionType::Vector2f => sys::ActionType::VECTOR2F_INPUT,
        ActionType::Pose => sys::ActionType::POSE_INPUT,
        ActionType::VibrationOutput => sys::ActionType::VIBRATION_OUTPUT,
    }
}

pub fn hand(hand: Hand) -> sys::HandEXT {
    match hand {
        Hand::Left => sys::HandEXT::LEFT,
        Hand::Right => sys::HandEXT::RIGHT,
    }
}

pub fn motion_range(range: HandJointsMotionRange) -> sys::HandJointsMotionRangeEXT {
    match range {
        HandJointsMotionRange::Unobstructed => sys::HandJointsMotionRangeEXT::UNOBSTRUCTED,
        HandJointsMotionRange::ConformingToController => {
            sys::HandJointsMotionRangeEXT::CONFORMING_TO_CONTROLLER
        }
    }
}

pub fn mask_type(mask: VisibilityMaskType) -> sys::VisibilityMaskTypeKHR {
    match mask {
        VisibilityMaskType::HiddenTriangleMesh => sys::VisibilityMaskTypeKHR::HIDDEN_TRIANGLE_MESH,
        VisibilityMaskType::VisibleTriangleMesh => {
            sys::VisibilityMaskTypeKHR::VISIBLE_TRIANGLE_MESH
        }
        VisibilityMaskType::LineLoop => sys::VisibilityMaskTypeKHR::LINE_LOOP,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_place_str_terminates() {
        let mut buf = [1 as c_char; 8];
        place_str(&mut buf, "grip", XrCode::ERROR_NAME_INVALID).unwrap();
        assert_eq!(fixed_str(&buf), "grip");
        assert_eq!(buf[4], 0);
    }

    #[test]
    fn test_place_str_rejects_overflow_and_nul() {
        let mut buf = [0 as c_char; 4];
        assert_eq!(
            place_str(&mut buf, "four", XrCode::ERROR_NAME_INVALID),
            Err(XrCode::ERROR_NAME_INVALID)
        );
        assert_eq!(
            place_str(&mut buf, "a\0b", XrCode::ERROR_LOCALIZED_NAME_INVALID),
            Err(XrCode::ERROR_LOCALIZED_NAME_INVALID)
        );
    }

    #[test]
    fn test_check_keeps_qualified_success() {
        assert!(check(sys::Result::SESSION_LOSS_PENDING).is_ok());
        assert_eq!(
            check(sys::Result::ERROR_HANDLE_INVALID),
            Err(XrCode::ERROR_HANDLE_INVALID)
        );
    }

    #[test]
    fn test_reference_space_round_trip() {
        for space in [
            ReferenceSpace::View,
            ReferenceSpace::Local,
            ReferenceSpace::Stage,
            ReferenceSpace::LocalFloor,
        ] {
            assert_eq!(from_reference_space(reference_space(space)), Some(space));
        }
    }

    #[test]
    fn test_pose_conversion() {
        let pose = Posef {
            orientation: Quaternionf::IDENTITY,
            position: Vector3f {
                x: 1.0,
                y: 2.0,
                z: 3.0,
            },
        };
        assert_eq!(from_sys_pose(to_sys_pose(pose)), pose);
    }
}
