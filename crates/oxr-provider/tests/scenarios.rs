//! End-to-end flows through the public API against the in-memory runtime.

use std::sync::Arc;

use oxr_provider::dummy::{DummyRuntime, DummyVerb};
use oxr_provider::extensions::{
    Passthrough, PassthroughMode, ViveTrackerInteraction, HEADLESS, PASSTHROUGH,
    VIVE_TRACKER_INTERACTION,
};
use oxr_provider::profiles::{TrackerRole, ValveIndex, ViveTracker};
use oxr_provider::types::{ActionType, Hand, XrPath};
use oxr_provider::{
    AppInfo, Component, ControllerProfile, GraphicsBinding, Provider, Qualifier, SessionOptions,
    XrCode, MAX_READERS,
};

fn headless(runtime: &Arc<DummyRuntime>, extensions: &[&str]) -> Provider {
    let mut wishlist = vec![HEADLESS];
    wishlist.extend_from_slice(extensions);
    let mut provider = Provider::new(runtime.clone());
    provider
        .init(&AppInfo::new("scenario").with_extensions(wishlist))
        .unwrap();
    provider
        .create_session(&GraphicsBinding::Headless, SessionOptions::default())
        .unwrap();
    provider
}

#[test]
fn test_filter_then_init_enables_intersection() {
    let runtime = Arc::new(DummyRuntime::with_extensions(&["XR_B", "XR_C", "XR_D"]));
    let mut provider = Provider::new(runtime.clone());

    let mut wishlist: Vec<String> = ["XR_A", "XR_B", "XR_C"].map(String::from).to_vec();
    provider.filter_requested(&mut wishlist).unwrap();
    assert_eq!(wishlist, ["XR_B", "XR_C"]);

    provider
        .init(&AppInfo::new("scenario").with_extensions(wishlist))
        .unwrap();
    assert_eq!(provider.enabled_extensions(), ["XR_B", "XR_C"]);
}

#[test]
fn test_thousand_frames_stay_within_reader_bound() {
    let runtime = Arc::new(DummyRuntime::new());
    let mut provider = headless(&runtime, &[]);
    let input = provider.session_mut().unwrap().input_mut();

    let set = input.create_action_set("gameplay", "Gameplay", 0).unwrap();
    let fire = input
        .create_action(&set, "fire", "Fire", ActionType::Boolean, &[])
        .unwrap();
    let jump = input
        .create_action(&set, "jump", "Jump", ActionType::Boolean, &[])
        .unwrap();
    input.attach_action_sets(&[&*set]).unwrap();
    input.add_action_set_for_sync(&set, None).unwrap();

    for frame in 0..1000 {
        runtime.set_boolean(fire.handle(), XrPath::NULL, frame % 2 == 0);
        input.sync_action_sets().unwrap();
        assert_eq!(runtime.reads_in_flight(), 0);
        assert_eq!(fire.boolean(0).unwrap().current_state, frame % 2 == 0);
        assert!(!jump.boolean(0).unwrap().current_state);
    }
    assert!(runtime.peak_concurrent_reads() <= MAX_READERS);
    assert_eq!(runtime.total_reads(), 2000);
    assert_eq!(runtime.sync_count(), 1000);
}

#[test]
fn test_index_trigger_value_binding() {
    let runtime = Arc::new(DummyRuntime::new());
    let provider = headless(&runtime, &[]);
    let input = provider.session().unwrap().input();

    let set = input.create_action_set("gameplay", "Gameplay", 0).unwrap();
    let trigger = input
        .create_action(&set, "trigger", "Trigger", ActionType::Float, &[])
        .unwrap();

    let mut index = ValveIndex::new();
    assert!(input
        .add_binding(&mut index, &trigger, Hand::Left, Component::Trigger, Qualifier::Value)
        .unwrap());
    let recorded = &index.recorded()[0].path;
    assert!(recorded.starts_with(Hand::Left.user_path()));
    assert!(recorded.ends_with("/input/trigger/value"));

    input.suggest_bindings(&index).unwrap();
    assert_eq!(
        runtime.suggested_bindings(ValveIndex::PATH),
        vec![(trigger.handle(), recorded.clone())]
    );
}

#[test]
fn test_passthrough_state_machine() {
    let runtime = Arc::new(DummyRuntime::new());
    let mut provider = headless(&runtime, &[PASSTHROUGH]);
    let pt = provider.extensions_mut().get_mut::<Passthrough>().unwrap();

    assert_eq!(pt.mode(), PassthroughMode::Stopped);
    runtime.fail_next(DummyVerb::PassthroughStart, XrCode::ERROR_RUNTIME_FAILURE);
    assert!(pt.start().is_err());
    assert_eq!(pt.mode(), PassthroughMode::Stopped);

    pt.start().unwrap();
    assert_eq!(pt.mode(), PassthroughMode::Started);

    let identity: [u8; 256] = std::array::from_fn(|i| i as u8);
    runtime.fail_next(DummyVerb::LayerSetStyle, XrCode::ERROR_RUNTIME_FAILURE);
    assert!(pt.set_mode_mono(identity).is_err());
    assert_eq!(pt.mode(), PassthroughMode::Started);
    pt.set_mode_mono(identity).unwrap();
    assert_eq!(pt.mode(), PassthroughMode::Mono);

    runtime.fail_next(DummyVerb::PassthroughPause, XrCode::ERROR_RUNTIME_FAILURE);
    assert!(pt.stop().is_err());
    assert_eq!(pt.mode(), PassthroughMode::Mono);
    pt.stop().unwrap();
    assert_eq!(pt.mode(), PassthroughMode::Stopped);
}

#[test]
fn test_tracker_roles_get_one_action_and_a_space_each() {
    let runtime = Arc::new(DummyRuntime::new());
    let mut provider = headless(&runtime, &[VIVE_TRACKER_INTERACTION]);
    let (registry, session) = provider.extensions_and_session();
    let input = session.unwrap().input();
    let set = input.create_action_set("body", "Body", 0).unwrap();

    let trackers = registry.get_mut::<ViveTrackerInteraction>().unwrap();
    let action = trackers.init_with_roles(input, &set, "Tracker pose").unwrap();

    assert_eq!(action.action_type(), ActionType::Pose);
    assert_eq!(set.len(), 1);
    let subactions = action.subaction_names();
    assert_eq!(subactions.len(), TrackerRole::ALL.len());
    for role in TrackerRole::ALL {
        assert!(subactions.contains(&role.path()));
    }
    assert_eq!(runtime.action_spaces(action.handle()).len(), TrackerRole::ALL.len());
    assert_eq!(
        runtime.suggested_bindings(ViveTracker::PATH).len(),
        TrackerRole::ALL.len()
    );
}

#[test]
fn test_add_then_remove_for_sync_leaves_nothing() {
    let runtime = Arc::new(DummyRuntime::new());
    let mut provider = headless(&runtime, &[]);
    let input = provider.session_mut().unwrap().input_mut();
    let set = input.create_action_set("menu", "Menu", 0).unwrap();

    input
        .add_action_set_for_sync(&set, Some("/user/hand/right"))
        .unwrap();
    assert_eq!(input.active_action_sets().len(), 1);
    assert!(input
        .remove_action_set_for_sync(&set, Some("/user/hand/right"))
        .unwrap());
    assert!(input.active_action_sets().is_empty());
}
