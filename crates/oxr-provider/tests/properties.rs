//! Invariants, round trips and boundary behaviour of the public API.

use std::collections::BTreeSet;
use std::sync::Arc;

use oxr_provider::dummy::DummyRuntime;
use oxr_provider::extensions::{
    RefreshRate, VisibilityMask, HEADLESS, REFRESH_RATE, VISIBILITY_MASK,
};
use oxr_provider::profiles::{
    HtcVive, KhrSimple, MicrosoftMotion, OculusTouch, ProfileSet, ValveIndex,
};
use oxr_provider::types::{
    ActionType, Hand, SessionHandle, ViewConfiguration, VisibilityMaskType,
};
use oxr_provider::{
    ActionStates, AppInfo, Component, ControllerProfile, GraphicsBinding, Provider,
    ProviderError, Qualifier, SessionOptions, XrCode,
};

const COMPONENTS: [Component; 10] = [
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

const QUALIFIERS: [Qualifier; 7] = [
    Qualifier::None,
    Qualifier::Value,
    Qualifier::Click,
    Qualifier::Touch,
    Qualifier::Force,
    Qualifier::X,
    Qualifier::Y,
];

fn headless(runtime: &Arc<DummyRuntime>, extensions: &[&str]) -> Provider {
    let mut wishlist = vec![HEADLESS];
    wishlist.extend_from_slice(extensions);
    let mut provider = Provider::new(runtime.clone());
    provider
        .init(&AppInfo::new("properties").with_extensions(wishlist))
        .unwrap();
    provider
        .create_session(&GraphicsBinding::Headless, SessionOptions::default())
        .unwrap();
    provider
}

fn hand_profiles() -> Vec<Box<dyn ControllerProfile>> {
    vec![
        Box::new(ValveIndex::new()),
        Box::new(OculusTouch::new()),
        Box::new(HtcVive::new()),
        Box::new(MicrosoftMotion::new()),
        Box::new(KhrSimple::new()),
    ]
}

#[test]
fn test_enabled_is_ordered_subset_of_request() {
    let wishlists: [&[&str]; 4] = [
        &[],
        &["XR_A", "XR_B"],
        &["XR_D", "XR_B", "XR_X", "XR_C"],
        &["XR_C", "XR_C", "XR_B"],
    ];
    for wishlist in wishlists {
        let runtime = Arc::new(DummyRuntime::with_extensions(&["XR_B", "XR_C", "XR_D"]));
        let mut provider = Provider::new(runtime);
        provider
            .init(&AppInfo::new("subset").with_extensions(wishlist.iter().copied()))
            .unwrap();

        let enabled = provider.enabled_extensions();
        let mut cursor = 0;
        for name in enabled {
            let position = wishlist[cursor..]
                .iter()
                .position(|w| *w == name.as_str())
                .expect("enabled name must come from the request, in order");
            cursor += position + 1;
        }
    }
}

#[test]
fn test_synced_state_matches_declared_type() {
    let runtime = Arc::new(DummyRuntime::new());
    let mut provider = headless(&runtime, &[]);
    let input = provider.session_mut().unwrap().input_mut();
    let set = input.create_action_set("typed", "Typed", 0).unwrap();
    let types = [
        ActionType::Boolean,
        ActionType::Float,
        ActionType::Vector2f,
        ActionType::Pose,
    ];
    let actions: Vec<_> = types
        .iter()
        .enumerate()
        .map(|(i, t)| {
            input
                .create_action(&set, &format!("action_{i}"), "Action", *t, &[])
                .unwrap()
        })
        .collect();
    input.attach_action_sets(&[&*set]).unwrap();
    input.add_action_set_for_sync(&set, None).unwrap();
    input.sync_action_sets().unwrap();

    for action in &actions {
        let states = action.states();
        assert_eq!(states.action_type(), action.action_type());
        assert_eq!(states.len(), 1);
        assert!(matches!(
            (action.action_type(), &states),
            (ActionType::Boolean, ActionStates::Boolean(_))
                | (ActionType::Float, ActionStates::Float(_))
                | (ActionType::Vector2f, ActionStates::Vector2f(_))
                | (ActionType::Pose, ActionStates::Pose(_))
        ));
    }
    assert!(matches!(
        actions[0].float(0),
        Err(ProviderError::TypeMismatch { .. })
    ));
}

#[test]
fn test_recorded_paths_start_with_hand() {
    let runtime = Arc::new(DummyRuntime::new());
    let provider = headless(&runtime, &[]);
    let input = provider.session().unwrap().input();
    let set = input.create_action_set("bindings", "Bindings", 0).unwrap();
    let action = input
        .create_action(&set, "any", "Any", ActionType::Float, &[])
        .unwrap();

    for mut profile in hand_profiles() {
        for hand in Hand::ALL {
            for component in COMPONENTS {
                for qualifier in QUALIFIERS {
                    let before = profile.recorded().len();
                    let recorded = input
                        .add_binding(&mut *profile, &action, hand, component, qualifier)
                        .unwrap();
                    if !recorded || profile.recorded().len() == before {
                        continue;
                    }
                    let path = &profile.recorded().last().unwrap().path;
                    assert!(
                        path.starts_with(hand.user_path()),
                        "{path} for {hand:?} in {}",
                        profile.path()
                    );
                }
            }
        }
    }
}

#[test]
fn test_path_round_trip() {
    let runtime = Arc::new(DummyRuntime::new());
    let provider = headless(&runtime, &[]);
    let input = provider.session().unwrap().input();
    for path in [
        "/user/hand/left",
        "/user/hand/right/input/trigger/value",
        "/interaction_profiles/valve/index_controller",
        "/user/vive_tracker_htcx/role/left_foot",
    ] {
        let xr_path = input.string_to_path(path).unwrap();
        assert_eq!(input.path_to_string(xr_path).unwrap(), path);
    }
    assert!(input.string_to_path("not a path").is_err());
}

#[test]
fn test_suggest_all_sends_what_was_recorded() {
    let runtime = Arc::new(DummyRuntime::new());
    let provider = headless(&runtime, &[]);
    let input = provider.session().unwrap().input();
    let set = input.create_action_set("gameplay", "Gameplay", 0).unwrap();
    let select = input
        .create_action(&set, "select", "Select", ActionType::Boolean, &[])
        .unwrap();
    let grip = input
        .create_action(&set, "grip", "Grip", ActionType::Pose, &[])
        .unwrap();

    let mut touch = OculusTouch::new();
    for hand in Hand::ALL {
        input
            .add_binding(&mut touch, &select, hand, Component::Trigger, Qualifier::Click)
            .unwrap();
        input
            .add_binding(&mut touch, &grip, hand, Component::GripPose, Qualifier::None)
            .unwrap();
    }
    input.suggest_bindings(&touch).unwrap();

    let mut sent = runtime.suggested_bindings(OculusTouch::PATH);
    let mut recorded: Vec<_> = touch
        .recorded()
        .iter()
        .map(|b| (b.action, b.path.clone()))
        .collect();
    sent.sort();
    recorded.sort();
    assert_eq!(sent, recorded);
}

#[test]
fn test_profile_set_sends_what_was_recorded() {
    let runtime = Arc::new(DummyRuntime::new());
    let provider = headless(&runtime, &[]);
    let input = provider.session().unwrap().input();
    let set = input.create_action_set("gameplay", "Gameplay", 0).unwrap();
    let select = input
        .create_action(&set, "select", "Select", ActionType::Boolean, &[])
        .unwrap();
    let menu = input
        .create_action(&set, "menu", "Menu", ActionType::Boolean, &[])
        .unwrap();
    let grip = input
        .create_action(&set, "grip", "Grip", ActionType::Pose, &[])
        .unwrap();

    let mut profiles = ProfileSet::common();
    for hand in Hand::ALL {
        input
            .add_binding(&mut profiles, &select, hand, Component::Trigger, Qualifier::Click)
            .unwrap();
        input
            .add_binding(&mut profiles, &menu, hand, Component::Menu, Qualifier::Click)
            .unwrap();
        input
            .add_binding(&mut profiles, &grip, hand, Component::GripPose, Qualifier::None)
            .unwrap();
    }
    input
        .add_binding_path(&mut profiles, &select, "/user/hand/left/input/squeeze/value")
        .unwrap();
    profiles
        .add_profile_binding_path(
            input.instance(),
            &select,
            OculusTouch::PATH,
            "/user/hand/right/input/a/click",
        )
        .unwrap();
    assert!(!profiles.recorded().is_empty());
    input.suggest_bindings(&profiles).unwrap();

    let sent: BTreeSet<_> = profiles
        .profiles()
        .iter()
        .flat_map(|p| runtime.suggested_bindings(p.path()))
        .collect();
    let recorded: BTreeSet<_> = profiles
        .recorded()
        .iter()
        .map(|b| (b.action, b.path.clone()))
        .collect();
    assert_eq!(sent, recorded);
    assert!(recorded.contains(&(select.handle(), "/user/hand/right/input/a/click".to_string())));
    assert!(runtime
        .suggested_bindings(ValveIndex::PATH)
        .iter()
        .all(|(_, path)| path != "/user/hand/right/input/a/click"));

    let err = profiles
        .add_profile_binding_path(input.instance(), &select, KhrSimple::PATH, "/user/hand/left")
        .unwrap_err();
    assert_eq!(err.code(), XrCode::ERROR_VALIDATION_FAILURE);

    profiles.clear();
    assert!(profiles.recorded().is_empty());
    assert!(profiles.profiles().iter().all(|p| p.recorded().is_empty()));
}

#[test]
fn test_empty_visibility_mask() {
    let runtime = Arc::new(DummyRuntime::new());
    runtime.set_visibility_mask(Vec::new(), Vec::new());
    let provider = headless(&runtime, &[VISIBILITY_MASK]);
    let mask = provider
        .extensions()
        .get::<VisibilityMask>()
        .unwrap()
        .mask(
            ViewConfiguration::PrimaryStereo,
            0,
            VisibilityMaskType::HiddenTriangleMesh,
        )
        .unwrap();
    assert!(mask.vertices.is_empty());
    assert!(mask.indices.is_empty());
}

#[test]
fn test_refresh_rate_without_session() {
    let runtime = Arc::new(DummyRuntime::new());
    let provider = headless(&runtime, &[REFRESH_RATE]);
    let detached = RefreshRate::new(provider.instance().unwrap(), SessionHandle::NULL);
    for err in [
        detached.supported_rates().unwrap_err(),
        detached.current_rate().unwrap_err(),
        detached.request_rate(90.0).unwrap_err(),
    ] {
        assert_eq!(err.code(), XrCode::ERROR_VALIDATION_FAILURE);
    }
}

#[test]
fn test_action_after_attach_refused() {
    let runtime = Arc::new(DummyRuntime::new());
    let mut provider = headless(&runtime, &[]);
    let input = provider.session_mut().unwrap().input_mut();
    let set = input.create_action_set("locked", "Locked", 0).unwrap();
    input.attach_action_sets(&[&*set]).unwrap();
    let err = input
        .create_action(&set, "late", "Late", ActionType::Boolean, &[])
        .unwrap_err();
    assert_eq!(err.code(), XrCode::ERROR_ACTIONSETS_ALREADY_ATTACHED);
}
