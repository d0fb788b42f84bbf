use bitflags::bitflags;
use serde::Serialize;

macro_rules! handle {
    ($($(#[$meta:meta])* $name:ident;)*) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize)]
            pub struct $name(pub u64);

            impl $name {
                pub const NULL: Self = Self(0);

                pub fn is_null(self) -> bool {
                    self.0 == 0
                }

                pub fn raw(self) -> u64 {
                    self.0
                }
            }
        )*
    };
}

handle! {
    InstanceHandle;
    SessionHandle;
    ActionSetHandle;
    ActionHandle;
    SpaceHandle;
    HandTrackerHandle;
    PassthroughHandle;
    PassthroughLayerHandle;
    /// Interned path identifier (`XrPath`).
    XrPath;
    SystemId;
}

/// Runtime time stamp in nanoseconds.
pub type XrTime = i64;

/// Lets the runtime pick the shortest haptic pulse it supports.
pub const MIN_HAPTIC_DURATION: i64 = -1;
pub const FREQUENCY_UNSPECIFIED: f32 = 0.0;
pub const HAND_JOINT_COUNT: usize = 26;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Vector2f {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Vector3f {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Quaternionf {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quaternionf {
    pub const IDENTITY: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };
}

impl Default for Quaternionf {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Posef {
    pub orientation: Quaternionf,
    pub position: Vector3f,
}

impl Posef {
    pub const IDENTITY: Self = Self {
        orientation: Quaternionf::IDENTITY,
        position: Vector3f {
            x: 0.0,
            y: 0.0,
            z: 0.0,
        },
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Color4f {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color4f {
    pub const TRANSPARENT: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };
}

/// Packed runtime version (major 16 bits, minor 16 bits, patch 32 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
pub struct Version(pub u64);

impl Version {
    pub const fn new(major: u16, minor: u16, patch: u32) -> Self {
        Self(((major as u64) << 48) | ((minor as u64) << 32) | patch as u64)
    }

    pub fn major(self) -> u16 {
        (self.0 >> 48) as u16
    }

    pub fn minor(self) -> u16 {
        ((self.0 >> 32) & 0xffff) as u16
    }

    pub fn patch(self) -> u32 {
        (self.0 & 0xffff_ffff) as u32
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major(), self.minor(), self.patch())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Hand {
    Left,
    Right,
}

impl Hand {
    pub const ALL: [Hand; 2] = [Hand::Left, Hand::Right];

    pub fn user_path(self) -> &'static str {
        match self {
            Hand::Left => "/user/hand/left",
            Hand::Right => "/user/hand/right",
        }
    }

    pub fn index(self) -> usize {
        match self {
            Hand::Left => 0,
            Hand::Right => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FormFactor {
    HeadMountedDisplay,
    HandheldDisplay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ViewConfiguration {
    PrimaryMono,
    PrimaryStereo,
}

impl ViewConfiguration {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "primary_mono" => Some(Self::PrimaryMono),
            "primary_stereo" => Some(Self::PrimaryStereo),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ReferenceSpace {
    View,
    Local,
    Stage,
    LocalFloor,
}

impl ReferenceSpace {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "view" => Some(Self::View),
            "local" => Some(Self::Local),
            "stage" => Some(Self::Stage),
            "local_floor" => Some(Self::LocalFloor),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SessionState {
    #[default]
    Unknown,
    Idle,
    Ready,
    Synchronized,
    Visible,
    Focused,
    Stopping,
    LossPending,
    Exiting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum BlendMode {
    #[default]
    Opaque,
    Additive,
    AlphaBlend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VisibilityMaskType {
    HiddenTriangleMesh,
    VisibleTriangleMesh,
    LineLoop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HandJointsMotionRange {
    Unobstructed,
    ConformingToController,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ActionType {
    Boolean,
    Float,
    Vector2f,
    Pose,
    VibrationOutput,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LocationFlags: u64 {
        const ORIENTATION_VALID = 0x1;
        const POSITION_VALID = 0x2;
        const ORIENTATION_TRACKED = 0x4;
        const POSITION_TRACKED = 0x8;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct VelocityFlags: u64 {
        const LINEAR_VALID = 0x1;
        const ANGULAR_VALID = 0x2;
    }
}

/// Polled state of a boolean, float or vector action for one subaction path.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ActionStateData<T> {
    pub current_state: T,
    pub changed_since_last_sync: bool,
    pub last_change_time: XrTime,
    pub is_active: bool,
}

pub type BoolState = ActionStateData<bool>;
pub type FloatState = ActionStateData<f32>;
pub type Vector2State = ActionStateData<Vector2f>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoseState {
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SpaceLocation {
    pub flags: LocationFlags,
    pub pose: Posef,
}

impl SpaceLocation {
    pub fn is_valid(&self) -> bool {
        self.flags
            .contains(LocationFlags::ORIENTATION_VALID | LocationFlags::POSITION_VALID)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JointLocation {
    pub flags: LocationFlags,
    pub pose: Posef,
    pub radius: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JointVelocity {
    pub flags: VelocityFlags,
    pub linear: Vector3f,
    pub angular: Vector3f,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FrameState {
    pub predicted_display_time: XrTime,
    pub predicted_display_period: i64,
    pub should_render: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HapticVibration {
    /// Nanoseconds, or [`MIN_HAPTIC_DURATION`].
    pub duration: i64,
    pub frequency: f32,
    pub amplitude: f32,
}

impl Default for HapticVibration {
    fn default() -> Self {
        Self {
            duration: MIN_HAPTIC_DURATION,
            frequency: FREQUENCY_UNSPECIFIED,
            amplitude: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtensionProperties {
    pub name: String,
    pub version: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiLayerProperties {
    pub name: String,
    pub spec_version: Version,
    pub layer_version: u32,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuntimeProperties {
    pub runtime_name: String,
    pub runtime_version: Version,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SystemProperties {
    pub system_id: SystemId,
    pub system_name: String,
    pub vendor_id: u32,
    pub orientation_tracking: bool,
    pub position_tracking: bool,
    pub supports_hand_tracking: bool,
    pub supports_eye_gaze: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViveTrackerPaths {
    pub persistent_path: XrPath,
    pub role_path: XrPath,
}

/// Events drained from the runtime's event queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeEvent {
    SessionStateChanged {
        session: SessionHandle,
        state: SessionState,
        time: XrTime,
    },
    EventsLost {
        count: u32,
    },
    InstanceLossPending {
        loss_time: XrTime,
    },
    InteractionProfileChanged {
        session: SessionHandle,
    },
    ReferenceSpaceChangePending {
        session: SessionHandle,
        space: ReferenceSpace,
    },
    /// Event types this layer does not decode.
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_packing() {
        let version = Version::new(1, 2, 345);
        assert_eq!(version.major(), 1);
        assert_eq!(version.minor(), 2);
        assert_eq!(version.patch(), 345);
        assert_eq!(version.to_string(), "1.2.345");
    }

    #[test]
    fn test_null_handles() {
        assert!(SessionHandle::NULL.is_null());
        assert!(!XrPath(7).is_null());
        assert_eq!(SpaceHandle::default(), SpaceHandle::NULL);
    }

    #[test]
    fn test_identity_pose_default() {
        assert_eq!(Posef::default(), Posef::IDENTITY);
        assert_eq!(Posef::IDENTITY.orientation.w, 1.0);
    }

    #[test]
    fn test_space_location_validity() {
        let mut location = SpaceLocation::default();
        assert!(!location.is_valid());
        location.flags = LocationFlags::ORIENTATION_VALID | LocationFlags::POSITION_VALID;
        assert!(location.is_valid());
    }
}
