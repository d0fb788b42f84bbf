//! Controller profile taxonomy.
//!
//! A profile turns a device-neutral `(hand, component, qualifier)` tuple into
//! its own binding path vocabulary, records the resulting suggestions, and
//! submits them under its interaction profile path. Tuples a controller has
//! no equivalent for are skipped, so generic binding code can fan out over
//! every profile.

use serde::Serialize;
use tracing::{debug, error, info};

use crate::action::Action;
use crate::context::InstanceContext;
use crate::runtime::SuggestedBinding;
use crate::types::{ActionHandle, Hand, XrPath};
use crate::{ProviderError, ProviderResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Component {
    GripPose,
    AimPose,
    Trigger,
    PrimaryButton,
    SecondaryButton,
    AxisControl,
    Squeeze,
    Menu,
    System,
    Haptic,
}

impl Component {
    pub const ALL: [Component; 10] = [
        Component::GripPose,
        Component::AimPose,
        Component::Trigger,
        Component::PrimaryButton,
        Component::SecondaryButton,
        Component::AxisControl,
        Component::Squeeze,
        Component::Menu,
        Component::System,
        Component::Haptic,
    ];

    /// Whether `qualifier` is meaningful for this component.
    /// [`Qualifier::None`] always is and selects the profile's default.
    pub fn allows(self, qualifier: Qualifier) -> bool {
        use Qualifier as Q;
        match self {
            Component::GripPose | Component::AimPose | Component::Haptic => qualifier == Q::None,
            Component::Trigger => matches!(qualifier, Q::None | Q::Value | Q::Click | Q::Touch),
            Component::PrimaryButton | Component::SecondaryButton | Component::System => {
                matches!(qualifier, Q::None | Q::Click | Q::Touch)
            }
            Component::AxisControl => {
                matches!(qualifier, Q::None | Q::X | Q::Y | Q::Click | Q::Touch)
            }
            Component::Squeeze => matches!(qualifier, Q::None | Q::Value | Q::Force | Q::Click),
            Component::Menu => matches!(qualifier, Q::None | Q::Click),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Qualifier {
    None,
    Value,
    Click,
    Touch,
    Force,
    X,
    Y,
}

impl Qualifier {
    pub const ALL: [Qualifier; 7] = [
        Qualifier::None,
        Qualifier::Value,
        Qualifier::Click,
        Qualifier::Touch,
        Qualifier::Force,
        Qualifier::X,
        Qualifier::Y,
    ];

    fn segment(self) -> Option<&'static str> {
        match self {
            Qualifier::None => None,
            Qualifier::Value => Some("value"),
            Qualifier::Click => Some("click"),
            Qualifier::Touch => Some("touch"),
            Qualifier::Force => Some("force"),
            Qualifier::X => Some("x"),
            Qualifier::Y => Some("y"),
        }
    }
}

/// Tracker sites known to `XR_HTCX_vive_tracker_interaction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TrackerRole {
    HandheldObject,
    LeftFoot,
    RightFoot,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftKnee,
    RightKnee,
    Waist,
    Chest,
    Camera,
    Keyboard,
}

pub const TRACKER_USER_PATH: &str = "/user/vive_tracker_htcx";

impl TrackerRole {
    pub const ALL: [TrackerRole; 13] = [
        TrackerRole::HandheldObject,
        TrackerRole::LeftFoot,
        TrackerRole::RightFoot,
        TrackerRole::LeftShoulder,
        TrackerRole::RightShoulder,
        TrackerRole::LeftElbow,
        TrackerRole::RightElbow,
        TrackerRole::LeftKnee,
        TrackerRole::RightKnee,
        TrackerRole::Waist,
        TrackerRole::Chest,
        TrackerRole::Camera,
        TrackerRole::Keyboard,
    ];

    pub fn segment(self) -> &'static str {
        match self {
            TrackerRole::HandheldObject => "handheld_object",
            TrackerRole::LeftFoot => "left_foot",
            TrackerRole::RightFoot => "right_foot",
            TrackerRole::LeftShoulder => "left_shoulder",
            TrackerRole::RightShoulder => "right_shoulder",
            TrackerRole::LeftElbow => "left_elbow",
            TrackerRole::RightElbow => "right_elbow",
            TrackerRole::LeftKnee => "left_knee",
            TrackerRole::RightKnee => "right_knee",
            TrackerRole::Waist => "waist",
            TrackerRole::Chest => "chest",
            TrackerRole::Camera => "camera",
            TrackerRole::Keyboard => "keyboard",
        }
    }

    /// Role user path, e.g. `/user/vive_tracker_htcx/role/waist`.
    pub fn path(self) -> String {
        format!("{TRACKER_USER_PATH}/role/{}", self.segment())
    }

    pub fn from_segment(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.segment() == segment)
    }
}

/// A suggestion recorded by a profile, kept with its string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RecordedBinding {
    pub action: ActionHandle,
    pub path: String,
    pub binding: XrPath,
}

impl RecordedBinding {
    fn suggestion(&self) -> SuggestedBinding {
        SuggestedBinding {
            action: self.action,
            binding: self.binding,
        }
    }
}

fn record_unique(bindings: &mut Vec<RecordedBinding>, binding: RecordedBinding) {
    if bindings
        .iter()
        .any(|b| b.action == binding.action && b.binding == binding.binding)
    {
        debug!("binding {} already recorded", binding.path);
        return;
    }
    bindings.push(binding);
}

/// `<hand>/input/<tail>`, or `<hand>/output/<tail>` for haptics.
fn hand_path(hand: Hand, component: Component, tail: &str) -> String {
    let io = if component == Component::Haptic {
        "output"
    } else {
        "input"
    };
    format!("{}/{io}/{tail}", hand.user_path())
}

fn qualified(base: &str, qualifier: Qualifier) -> String {
    match qualifier.segment() {
        Some(q) => format!("{base}/{q}"),
        None => base.to_string(),
    }
}

pub trait ControllerProfile: Send + Sync {
    /// Interaction profile path, e.g. `/interaction_profiles/valve/index_controller`.
    fn path(&self) -> &str;

    /// Profile-specific mapping; only called for qualifiers the component allows.
    fn component_path(&self, hand: Hand, component: Component, qualifier: Qualifier)
        -> Option<String>;

    fn recorded(&self) -> &[RecordedBinding];
    fn record(&mut self, binding: RecordedBinding);
    fn clear(&mut self);

    /// Full binding path for a tuple, or `None` if this controller has no equivalent.
    fn binding_path(
        &self,
        hand: Hand,
        component: Component,
        qualifier: Qualifier,
    ) -> Option<String> {
        if !component.allows(qualifier) {
            return None;
        }
        self.component_path(hand, component, qualifier)
    }

    /// Records a suggestion for `action`. Returns `Ok(false)` when the tuple
    /// has no mapping on this controller.
    fn suggest_binding(
        &mut self,
        instance: &InstanceContext,
        action: &Action,
        hand: Hand,
        component: Component,
        qualifier: Qualifier,
    ) -> ProviderResult<bool> {
        let Some(path) = self.binding_path(hand, component, qualifier) else {
            info!(
                "skipping {component:?}/{qualifier:?} for {}: no equivalent controller component",
                self.path()
            );
            return Ok(false);
        };
        self.add_binding_path(instance, action, &path)?;
        Ok(true)
    }

    /// Records `path` verbatim.
    fn add_binding_path(
        &mut self,
        instance: &InstanceContext,
        action: &Action,
        path: &str,
    ) -> ProviderResult<()> {
        let binding = instance.string_to_path(path).map_err(|e| {
            error!("unable to add binding path {path} for {}: {e}", self.path());
            e
        })?;
        info!("added binding path {path} for {}", self.path());
        self.record(RecordedBinding {
            action: action.handle(),
            path: path.to_string(),
            binding,
        });
        Ok(())
    }

    /// Submits every recorded suggestion under [`ControllerProfile::path`].
    fn suggest_all(&self, instance: &InstanceContext) -> ProviderResult<()> {
        if self.recorded().is_empty() {
            debug!("no bindings recorded for {}", self.path());
            return Ok(());
        }
        let bindings: Vec<_> = self.recorded().iter().map(RecordedBinding::suggestion).collect();
        instance.suggest_bindings(self.path(), &bindings)?;
        info!("all action bindings sent to runtime for {}", self.path());
        Ok(())
    }
}

macro_rules! hand_profile {
    ($(#[$meta:meta])* $name:ident, $path:expr) => {
        $(#[$meta])*
        #[derive(Debug, Default, Clone)]
        pub struct $name {
            bindings: Vec<RecordedBinding>,
        }

        impl $name {
            pub const PATH: &'static str = $path;

            pub fn new() -> Self {
                Self::default()
            }
        }
    };
}

macro_rules! recorded_bindings {
    () => {
        fn recorded(&self) -> &[RecordedBinding] {
            &self.bindings
        }

        fn record(&mut self, binding: RecordedBinding) {
            record_unique(&mut self.bindings, binding)
        }

        fn clear(&mut self) {
            self.bindings.clear()
        }
    };
}

hand_profile!(
    /// Valve Index controllers.
    ValveIndex,
    "/interaction_profiles/valve/index_controller"
);
hand_profile!(
    /// Oculus Touch controllers.
    OculusTouch,
    "/interaction_profiles/oculus/touch_controller"
);
hand_profile!(HtcVive, "/interaction_profiles/htc/vive_controller");
hand_profile!(
    /// Windows Mixed Reality motion controllers.
    MicrosoftMotion,
    "/interaction_profiles/microsoft/motion_controller"
);
hand_profile!(
    /// The generic profile every runtime supports.
    KhrSimple,
    "/interaction_profiles/khr/simple_controller"
);
hand_profile!(
    /// HTC wrist trackers; input only, no haptics.
    HtcViveWrist,
    "/interaction_profiles/htc/vive_wrist_tracker"
);

impl ControllerProfile for ValveIndex {
    fn path(&self) -> &str {
        Self::PATH
    }

    fn component_path(&self, hand: Hand, component: Component, qualifier: Qualifier) -> Option<String> {
        use Qualifier as Q;
        let tail = match component {
            Component::GripPose => "grip/pose".to_string(),
            Component::AimPose => "aim/pose".to_string(),
            Component::Haptic => "haptic".to_string(),
            Component::Trigger => match qualifier {
                Q::Value | Q::Touch => qualified("trigger", qualifier),
                _ => "trigger/click".to_string(),
            },
            Component::PrimaryButton | Component::SecondaryButton => {
                let button = if component == Component::PrimaryButton { "a" } else { "b" };
                match qualifier {
                    Q::Touch => format!("{button}/touch"),
                    _ => format!("{button}/click"),
                }
            }
            Component::AxisControl => qualified("thumbstick", qualifier),
            Component::Squeeze => match qualifier {
                Q::Value => "squeeze/value".to_string(),
                _ => "squeeze/force".to_string(),
            },
            Component::Menu | Component::System => match qualifier {
                Q::Touch => "system/touch".to_string(),
                _ => "system/click".to_string(),
            },
        };
        Some(hand_path(hand, component, &tail))
    }

    recorded_bindings!();
}

impl ControllerProfile for OculusTouch {
    fn path(&self) -> &str {
        Self::PATH
    }

    fn component_path(&self, hand: Hand, component: Component, qualifier: Qualifier) -> Option<String> {
        use Qualifier as Q;
        let tail = match component {
            Component::GripPose => "grip/pose".to_string(),
            Component::AimPose => "aim/pose".to_string(),
            Component::Haptic => "haptic".to_string(),
            Component::Trigger => match qualifier {
                Q::Touch => "trigger/touch".to_string(),
                _ => "trigger/value".to_string(),
            },
            Component::PrimaryButton | Component::SecondaryButton => {
                let button = match (component, hand) {
                    (Component::PrimaryButton, Hand::Left) => "x",
                    (Component::PrimaryButton, Hand::Right) => "a",
                    (_, Hand::Left) => "y",
                    (_, Hand::Right) => "b",
                };
                match qualifier {
                    Q::Touch => format!("{button}/touch"),
                    _ => format!("{button}/click"),
                }
            }
            Component::AxisControl => qualified("thumbstick", qualifier),
            Component::Squeeze => match qualifier {
                Q::Value => "squeeze/value".to_string(),
                _ => "squeeze".to_string(),
            },
            Component::Menu if hand == Hand::Left => "menu/click".to_string(),
            Component::System if hand == Hand::Right => "system/click".to_string(),
            Component::Menu | Component::System => return None,
        };
        Some(hand_path(hand, component, &tail))
    }

    recorded_bindings!();
}

impl ControllerProfile for HtcVive {
    fn path(&self) -> &str {
        Self::PATH
    }

    fn component_path(&self, hand: Hand, component: Component, qualifier: Qualifier) -> Option<String> {
        let tail = match component {
            Component::GripPose => "grip/pose".to_string(),
            Component::AimPose => "aim/pose".to_string(),
            Component::Haptic => "haptic".to_string(),
            Component::Trigger => match qualifier {
                Qualifier::Click => "trigger/click".to_string(),
                _ => "trigger/value".to_string(),
            },
            Component::PrimaryButton | Component::SecondaryButton => return None,
            Component::AxisControl => qualified("trackpad", qualifier),
            Component::Squeeze => "squeeze/click".to_string(),
            Component::Menu => "menu/click".to_string(),
            Component::System => "system/click".to_string(),
        };
        Some(hand_path(hand, component, &tail))
    }

    recorded_bindings!();
}

impl ControllerProfile for MicrosoftMotion {
    fn path(&self) -> &str {
        Self::PATH
    }

    fn component_path(&self, hand: Hand, component: Component, qualifier: Qualifier) -> Option<String> {
        use Qualifier as Q;
        let tail = match component {
            Component::GripPose => "grip/pose".to_string(),
            Component::AimPose => "aim/pose".to_string(),
            Component::Haptic => "haptic".to_string(),
            Component::Trigger => "trigger/value".to_string(),
            Component::PrimaryButton | Component::SecondaryButton => return None,
            Component::AxisControl => match qualifier {
                Q::X | Q::Y | Q::None => qualified("thumbstick", qualifier),
                _ => "thumbstick/click".to_string(),
            },
            Component::Squeeze => "squeeze/click".to_string(),
            Component::Menu => "menu/click".to_string(),
            Component::System => "system/click".to_string(),
        };
        Some(hand_path(hand, component, &tail))
    }

    recorded_bindings!();
}

impl ControllerProfile for KhrSimple {
    fn path(&self) -> &str {
        Self::PATH
    }

    fn component_path(&self, hand: Hand, component: Component, _qualifier: Qualifier) -> Option<String> {
        let tail = match component {
            Component::GripPose => "grip/pose",
            Component::AimPose => "aim/pose",
            Component::Haptic => "haptic",
            Component::Trigger | Component::PrimaryButton => "select/click",
            Component::Menu => "menu/click",
            _ => return None,
        };
        Some(hand_path(hand, component, tail))
    }

    recorded_bindings!();
}

impl ControllerProfile for HtcViveWrist {
    fn path(&self) -> &str {
        Self::PATH
    }

    fn component_path(&self, hand: Hand, component: Component, _qualifier: Qualifier) -> Option<String> {
        let tail = match (component, hand) {
            (Component::GripPose | Component::AimPose, _) => "entity_htc/pose",
            (Component::Trigger | Component::PrimaryButton, Hand::Left) => "x/click",
            (Component::Trigger | Component::PrimaryButton, Hand::Right) => "a/click",
            (Component::Menu | Component::System, Hand::Left) => "menu/click",
            (Component::Menu | Component::System, Hand::Right) => "system/click",
            _ => return None,
        };
        let wrist = match hand {
            Hand::Left => "/user/wrist_htc/left",
            Hand::Right => "/user/wrist_htc/right",
        };
        Some(format!("{wrist}/input/{tail}"))
    }

    recorded_bindings!();
}

/// `XR_HTCX_vive_tracker_interaction` profile. Keyed by tracker role rather
/// than hand; hand tuples never map.
#[derive(Debug, Default, Clone)]
pub struct ViveTracker {
    bindings: Vec<RecordedBinding>,
}

impl ViveTracker {
    pub const PATH: &'static str = "/interaction_profiles/htc/vive_tracker_htcx";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn role_binding_path(
        &self,
        role: TrackerRole,
        component: Component,
        qualifier: Qualifier,
    ) -> Option<String> {
        use Qualifier as Q;
        if !component.allows(qualifier) {
            return None;
        }
        let tail = match component {
            Component::GripPose => "input/grip/pose".to_string(),
            Component::Haptic => "output/haptic".to_string(),
            Component::Trigger => match qualifier {
                Q::Value => "input/trigger/value".to_string(),
                _ => "input/trigger/click".to_string(),
            },
            Component::AxisControl => qualified("input/trackpad", qualifier),
            Component::Squeeze => "input/squeeze/click".to_string(),
            Component::Menu => "input/menu/click".to_string(),
            Component::System => "input/power/click".to_string(),
            Component::AimPose | Component::PrimaryButton | Component::SecondaryButton => {
                return None
            }
        };
        Some(format!("{}/{tail}", role.path()))
    }

    pub fn suggest_role_binding(
        &mut self,
        instance: &InstanceContext,
        action: &Action,
        role: TrackerRole,
        component: Component,
        qualifier: Qualifier,
    ) -> ProviderResult<bool> {
        let Some(path) = self.role_binding_path(role, component, qualifier) else {
            info!("skipping {component:?} for tracker role {}", role.segment());
            return Ok(false);
        };
        self.add_binding_path(instance, action, &path)?;
        Ok(true)
    }
}

impl ControllerProfile for ViveTracker {
    fn path(&self) -> &str {
        Self::PATH
    }

    fn component_path(&self, _hand: Hand, _component: Component, _qualifier: Qualifier) -> Option<String> {
        None
    }

    recorded_bindings!();
}

/// Fans suggestions out to several profiles at once.
///
/// `recorded` is the union of what the contained profiles recorded, and
/// `suggest_all` submits each of them under its own profile path.
#[derive(Default)]
pub struct ProfileSet {
    profiles: Vec<Box<dyn ControllerProfile>>,
    bindings: Vec<RecordedBinding>,
}

impl ProfileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index, Touch, Vive and WMR controllers.
    pub fn common() -> Self {
        let mut set = Self::new();
        set.push(Box::new(ValveIndex::new()));
        set.push(Box::new(OculusTouch::new()));
        set.push(Box::new(HtcVive::new()));
        set.push(Box::new(MicrosoftMotion::new()));
        set
    }

    pub fn push(&mut self, profile: Box<dyn ControllerProfile>) {
        self.profiles.push(profile);
        self.collect();
    }

    pub fn profiles(&self) -> &[Box<dyn ControllerProfile>] {
        &self.profiles
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Records `path` on the contained profile whose interaction profile
    /// path is `profile` only.
    pub fn add_profile_binding_path(
        &mut self,
        instance: &InstanceContext,
        action: &Action,
        profile: &str,
        path: &str,
    ) -> ProviderResult<()> {
        let target = self
            .profiles
            .iter_mut()
            .find(|p| p.path() == profile)
            .ok_or_else(|| ProviderError::validation(format!("{profile} is not in this set")))?;
        let result = target.add_binding_path(instance, action, path);
        self.collect();
        result
    }

    fn collect(&mut self) {
        let mut union = Vec::new();
        for binding in self.profiles.iter().flat_map(|p| p.recorded()) {
            record_unique(&mut union, binding.clone());
        }
        self.bindings = union;
    }
}

impl ControllerProfile for ProfileSet {
    fn path(&self) -> &str {
        "base"
    }

    fn component_path(&self, _hand: Hand, _component: Component, _qualifier: Qualifier) -> Option<String> {
        None
    }

    fn recorded(&self) -> &[RecordedBinding] {
        &self.bindings
    }

    /// Recorded on every contained profile.
    fn record(&mut self, binding: RecordedBinding) {
        for profile in &mut self.profiles {
            profile.record(binding.clone());
        }
        self.collect();
    }

    fn clear(&mut self) {
        for profile in &mut self.profiles {
            profile.clear();
        }
        self.bindings.clear();
    }

    /// `Ok(true)` if at least one contained profile recorded the tuple.
    fn suggest_binding(
        &mut self,
        instance: &InstanceContext,
        action: &Action,
        hand: Hand,
        component: Component,
        qualifier: Qualifier,
    ) -> ProviderResult<bool> {
        let mut any = false;
        let mut result = Ok(());
        for profile in &mut self.profiles {
            match profile.suggest_binding(instance, action, hand, component, qualifier) {
                Ok(recorded) => any |= recorded,
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }
        self.collect();
        result.map(|()| any)
    }

    /// Adds `path` to every contained profile. Use
    /// [`ProfileSet::add_profile_binding_path`] for a path only one
    /// controller understands; the runtime rejects a profile's whole
    /// suggestion if one of its paths is foreign to it.
    fn add_binding_path(
        &mut self,
        instance: &InstanceContext,
        action: &Action,
        path: &str,
    ) -> ProviderResult<()> {
        let mut result = Ok(());
        for profile in &mut self.profiles {
            if let Err(e) = profile.add_binding_path(instance, action, path) {
                result = Err(e);
                break;
            }
        }
        self.collect();
        result
    }

    fn suggest_all(&self, instance: &InstanceContext) -> ProviderResult<()> {
        for profile in &self.profiles {
            profile.suggest_all(instance)?;
        }
        Ok(())
    }
}

/// Looks a profile up by its short name (`index`, `touch`, `vive`, `wmr`,
/// `simple`, `wrist`, `tracker`) or by its full interaction profile path.
pub fn profile_by_name(name: &str) -> Option<Box<dyn ControllerProfile>> {
    let profile: Box<dyn ControllerProfile> = match name {
        "index" | ValveIndex::PATH => Box::new(ValveIndex::new()),
        "touch" | OculusTouch::PATH => Box::new(OculusTouch::new()),
        "vive" | HtcVive::PATH => Box::new(HtcVive::new()),
        "wmr" | MicrosoftMotion::PATH => Box::new(MicrosoftMotion::new()),
        "simple" | KhrSimple::PATH => Box::new(KhrSimple::new()),
        "wrist" | HtcViveWrist::PATH => Box::new(HtcViveWrist::new()),
        "tracker" | ViveTracker::PATH => Box::new(ViveTracker::new()),
        _ => return None,
    };
    Some(profile)
}
