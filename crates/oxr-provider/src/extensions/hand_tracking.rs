//! `XR_EXT_hand_tracking` with optional `XR_EXT_hand_joints_motion_range`.

use tracing::{debug, error, info, warn};

use super::{adapter_common, fns, resolved, Extension, ExtensionAdapter, Resolved};
use crate::code::XrCode;
use crate::context::InstanceContext;
use crate::runtime::HandTrackingFns;
use crate::types::{
    Hand, HandJointsMotionRange, HandTrackerHandle, JointLocation, JointVelocity, SessionHandle,
    SpaceHandle, XrTime, HAND_JOINT_COUNT,
};
use crate::{ProviderError, ProviderResult};

struct HandData {
    tracker: HandTrackerHandle,
    active: bool,
    include_velocities: bool,
    locations: [JointLocation; HAND_JOINT_COUNT],
    velocities: [JointVelocity; HAND_JOINT_COUNT],
}

impl Default for HandData {
    fn default() -> Self {
        Self {
            tracker: HandTrackerHandle::NULL,
            active: true,
            include_velocities: true,
            locations: [JointLocation::default(); HAND_JOINT_COUNT],
            velocities: [JointVelocity::default(); HAND_JOINT_COUNT],
        }
    }
}

/// One tracker per hand plus preallocated joint buffers that
/// [`HandTracking::locate`] writes into.
pub struct HandTracking {
    session: SessionHandle,
    fns: Resolved<dyn HandTrackingFns>,
    hands: [HandData; 2],
}

impl HandTracking {
    pub fn new(instance: &InstanceContext, session: SessionHandle) -> Self {
        let fns = resolved(
            Extension::HandTracking,
            instance.runtime().resolve_hand_tracking(instance.handle()),
        );
        Self {
            session,
            fns,
            hands: [HandData::default(), HandData::default()],
        }
    }

    pub fn tracker(&self, hand: Hand) -> HandTrackerHandle {
        self.hands[hand.index()].tracker
    }

    /// Whether `locate` queries the runtime for this hand.
    pub fn is_active(&self, hand: Hand) -> bool {
        self.hands[hand.index()].active
    }

    pub fn set_active(&mut self, hand: Hand, active: bool) {
        self.hands[hand.index()].active = active;
    }

    pub fn includes_velocities(&self, hand: Hand) -> bool {
        self.hands[hand.index()].include_velocities
    }

    /// Opting out leaves the velocity buffer untouched on `locate`.
    pub fn set_include_velocities(&mut self, hand: Hand, include: bool) {
        self.hands[hand.index()].include_velocities = include;
    }

    pub fn joints(&self, hand: Hand) -> &[JointLocation; HAND_JOINT_COUNT] {
        &self.hands[hand.index()].locations
    }

    pub fn joint(&self, hand: Hand, index: usize) -> Option<&JointLocation> {
        self.hands[hand.index()].locations.get(index)
    }

    pub fn velocities(&self, hand: Hand) -> &[JointVelocity; HAND_JOINT_COUNT] {
        &self.hands[hand.index()].velocities
    }

    /// Locates every joint of `hand` in `base` at `time`.
    ///
    /// Returns the runtime's activity flag with its success code: `false`
    /// means the call succeeded but the hand is not tracked this frame. An
    /// inactive hand is skipped and yields `(false, XR_SUCCESS)`. A motion
    /// range is forwarded as-is and needs `XR_EXT_hand_joints_motion_range`
    /// enabled.
    pub fn locate(
        &mut self,
        hand: Hand,
        base: SpaceHandle,
        time: XrTime,
        motion_range: Option<HandJointsMotionRange>,
    ) -> ProviderResult<(bool, XrCode)> {
        let fns = fns(&self.fns)?.clone();
        let data = &mut self.hands[hand.index()];
        if !data.active {
            return Ok((false, XrCode::SUCCESS));
        }
        if data.tracker.is_null() {
            return Err(ProviderError::validation(format!(
                "no {hand:?} hand tracker; init did not complete"
            )));
        }

        let velocities = if data.include_velocities {
            Some(&mut data.velocities[..])
        } else {
            None
        };
        fns.locate_hand_joints(
            data.tracker,
            base,
            time,
            motion_range,
            &mut data.locations,
            velocities,
        )
        .map_err(|code| {
            warn!("unable to retrieve {hand:?} hand joints this frame: {code}");
            ProviderError::Runtime(code)
        })
    }

    fn destroy_trackers(&mut self) {
        let Ok(fns) = &self.fns else {
            return;
        };
        for hand in Hand::ALL {
            let data = &mut self.hands[hand.index()];
            if data.tracker.is_null() {
                continue;
            }
            match fns.destroy_hand_tracker(data.tracker) {
                Ok(()) => debug!("{hand:?} hand tracker destroyed"),
                Err(code) => warn!("unable to destroy {hand:?} hand tracker: {code}"),
            }
            data.tracker = HandTrackerHandle::NULL;
        }
    }
}

impl ExtensionAdapter for HandTracking {
    adapter_common!(Extension::HandTracking);

    /// Creates both hand trackers.
    fn init(&mut self) -> ProviderResult<()> {
        let fns = fns(&self.fns)?.clone();
        for hand in Hand::ALL {
            if !self.tracker(hand).is_null() {
                continue;
            }
            match fns.create_hand_tracker(self.session, hand) {
                Ok(tracker) => self.hands[hand.index()].tracker = tracker,
                Err(code) => {
                    error!("unable to create {hand:?} hand tracker: {code}");
                    self.destroy_trackers();
                    return Err(ProviderError::Runtime(code));
                }
            }
        }
        info!("hand trackers created");
        Ok(())
    }
}

impl Drop for HandTracking {
    fn drop(&mut self) {
        self.destroy_trackers();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::dummy::{DummyRuntime, DummyVerb};
    use crate::extensions::{HAND_JOINTS_MOTION_RANGE, HAND_TRACKING, HEADLESS};
    use crate::provider::{AppInfo, Provider};
    use crate::runtime::GraphicsBinding;
    use crate::session::SessionOptions;
    use crate::types::LocationFlags;

    fn provider(runtime: &Arc<DummyRuntime>, extensions: &[&str]) -> Provider {
        let mut wishlist = vec![HEADLESS];
        wishlist.extend_from_slice(extensions);
        let mut provider = Provider::new(runtime.clone());
        provider
            .init(&AppInfo::new("hands-test").with_extensions(wishlist))
            .unwrap();
        provider
            .create_session(&GraphicsBinding::Headless, SessionOptions::default())
            .unwrap();
        provider
    }

    fn split(provider: &mut Provider) -> (&mut HandTracking, SpaceHandle) {
        let (registry, session) = provider.extensions_and_session();
        let space = session.unwrap().app_space();
        (registry.get_mut::<HandTracking>().unwrap(), space)
    }

    #[test]
    fn test_trackers_created_on_init() {
        let runtime = Arc::new(DummyRuntime::new());
        let mut provider = provider(&runtime, &[HAND_TRACKING]);
        assert_eq!(runtime.live_hand_trackers(), 2);
        let (hands, _) = split(&mut provider);
        assert!(!hands.tracker(Hand::Left).is_null());
        assert_ne!(hands.tracker(Hand::Left), hands.tracker(Hand::Right));
        drop(provider);
        assert_eq!(runtime.live_hand_trackers(), 0);
    }

    #[test]
    fn test_locate_writes_joints() {
        let runtime = Arc::new(DummyRuntime::new());
        let mut provider = provider(&runtime, &[HAND_TRACKING]);
        let (hands, space) = split(&mut provider);

        assert_eq!(
            hands.locate(Hand::Right, space, 1, None).unwrap(),
            (true, XrCode::SUCCESS)
        );
        let tip = hands.joint(Hand::Right, HAND_JOINT_COUNT - 1).unwrap();
        assert!(tip.flags.contains(LocationFlags::POSITION_VALID));
        assert!(tip.pose.position.y > 0.0);
        assert!(hands.velocities(Hand::Right)[0].flags.bits() != 0);
    }

    #[test]
    fn test_untracked_hand_is_not_an_error() {
        let runtime = Arc::new(DummyRuntime::new());
        runtime.set_hands_active(false);
        let mut provider = provider(&runtime, &[HAND_TRACKING]);
        let (hands, space) = split(&mut provider);
        assert!(!hands.locate(Hand::Left, space, 1, None).unwrap().0);
    }

    #[test]
    fn test_opt_out_of_velocities() {
        let runtime = Arc::new(DummyRuntime::new());
        let mut provider = provider(&runtime, &[HAND_TRACKING]);
        let (hands, space) = split(&mut provider);
        hands.set_include_velocities(Hand::Left, false);
        assert!(hands.locate(Hand::Left, space, 1, None).unwrap().0);
        assert!(hands.velocities(Hand::Left)[0].flags.is_empty());

        hands.set_active(Hand::Left, false);
        runtime.fail_next(DummyVerb::LocateHandJoints, XrCode::ERROR_RUNTIME_FAILURE);
        assert!(!hands.locate(Hand::Left, space, 1, None).unwrap().0);
    }

    #[test]
    fn test_qualified_success_surfaces() {
        let runtime = Arc::new(DummyRuntime::new());
        let mut provider = provider(&runtime, &[HAND_TRACKING]);
        let (hands, space) = split(&mut provider);
        runtime.fail_next(DummyVerb::LocateHandJoints, XrCode::SESSION_LOSS_PENDING);
        assert_eq!(
            hands.locate(Hand::Left, space, 1, None).unwrap(),
            (true, XrCode::SESSION_LOSS_PENDING)
        );
    }

    #[test]
    fn test_motion_range_forwarded() {
        let runtime = Arc::new(DummyRuntime::new());
        let mut provider = provider(&runtime, &[HAND_TRACKING, HAND_JOINTS_MOTION_RANGE]);
        let (hands, space) = split(&mut provider);
        hands
            .locate(
                Hand::Left,
                space,
                1,
                Some(HandJointsMotionRange::ConformingToController),
            )
            .unwrap();
        assert_eq!(
            runtime.last_motion_range(),
            Some(HandJointsMotionRange::ConformingToController)
        );
    }

    #[test]
    fn test_motion_range_needs_its_extension() {
        let runtime = Arc::new(DummyRuntime::new());
        let mut provider = provider(&runtime, &[HAND_TRACKING]);
        let (hands, space) = split(&mut provider);
        let err = hands
            .locate(Hand::Left, space, 1, Some(HandJointsMotionRange::Unobstructed))
            .unwrap_err();
        assert_eq!(err.code(), XrCode::ERROR_VALIDATION_FAILURE);
    }

    #[test]
    fn test_failed_init_leaves_no_trackers() {
        let runtime = Arc::new(DummyRuntime::new());
        let provider = provider(&runtime, &[HAND_TRACKING]);
        let before = runtime.live_hand_trackers();

        let mut hands = HandTracking::new(
            provider.instance().unwrap(),
            provider.session().unwrap().handle(),
        );
        runtime.fail_next(DummyVerb::CreateHandTracker, XrCode::ERROR_LIMIT_REACHED);
        assert_eq!(hands.init().unwrap_err().code(), XrCode::ERROR_LIMIT_REACHED);
        assert!(hands.tracker(Hand::Left).is_null());
        assert_eq!(runtime.live_hand_trackers(), before);
    }
}
