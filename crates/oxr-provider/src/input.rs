//! Action-set lifecycle and per-frame state polling.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Weak};
use std::thread::{self, ScopedJoinHandle};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::action::{Action, ActionSet};
use crate::code::XrCode;
use crate::context::{InstanceContext, SessionContext};
use crate::profiles::{Component, ControllerProfile, Qualifier};
use crate::runtime::{ActionCreateInfo, ActiveActionSet};
use crate::types::{
    ActionType, Hand, HapticVibration, Posef, SessionHandle, SpaceHandle, SpaceLocation, XrPath,
    XrTime,
};
use crate::{lock, ProviderError, ProviderResult};

/// Upper bound on concurrent state reads during a sync.
pub const MAX_READERS: usize = 4;

/// Figures from the most recent [`Input::sync_action_sets`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SyncStats {
    pub action_sets: usize,
    pub reads: usize,
    pub peak_in_flight: usize,
    pub failures: usize,
}

#[derive(Default)]
struct ReaderSlots {
    in_flight: usize,
    peak: usize,
    total: usize,
}

struct ActiveEntry {
    set: Weak<ActionSet>,
    name: String,
    active: ActiveActionSet,
}

pub struct Input {
    ctx: SessionContext,
    active: Vec<ActiveEntry>,
    attached: bool,
    last_stats: SyncStats,
}

impl Input {
    pub(crate) fn new(ctx: SessionContext) -> Self {
        Self {
            ctx,
            active: Vec::new(),
            attached: false,
            last_stats: SyncStats::default(),
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn instance(&self) -> &InstanceContext {
        self.ctx.instance()
    }

    pub fn string_to_path(&self, path: &str) -> ProviderResult<XrPath> {
        self.ctx.instance().string_to_path(path)
    }

    pub fn path_to_string(&self, path: XrPath) -> ProviderResult<String> {
        self.ctx.instance().path_to_string(path)
    }

    pub fn create_action_set(
        &self,
        name: &str,
        localized_name: &str,
        priority: u32,
    ) -> ProviderResult<Arc<ActionSet>> {
        let instance = self.ctx.instance();
        let handle = instance
            .runtime()
            .create_action_set(instance.handle(), name, localized_name, priority)
            .map_err(|code| {
                error!("unable to create action set {name}: {code}");
                ProviderError::Runtime(code)
            })?;
        info!("action set created: {name} ({localized_name}), priority {priority}");
        Ok(Arc::new(ActionSet::new(
            instance.runtime().clone(),
            handle,
            name,
            localized_name,
            priority,
        )))
    }

    /// Creates an action in `set`. Fails once the set is attached.
    pub fn create_action(
        &self,
        set: &ActionSet,
        name: &str,
        localized_name: &str,
        action_type: ActionType,
        subaction_paths: &[&str],
    ) -> ProviderResult<Arc<Action>> {
        if set.is_attached() {
            error!(
                "action {name} not created: action set {} is already attached",
                set.name()
            );
            return Err(ProviderError::ActionSetAttached(set.name().to_string()));
        }

        let mut subactions = Vec::with_capacity(subaction_paths.len());
        for path in subaction_paths {
            subactions.push((path.to_string(), self.string_to_path(path)?));
        }
        let paths: Vec<XrPath> = subactions.iter().map(|(_, p)| *p).collect();

        let runtime = self.ctx.runtime();
        let handle = runtime
            .create_action(
                set.handle(),
                &ActionCreateInfo {
                    name,
                    localized_name,
                    action_type,
                    subaction_paths: &paths,
                },
            )
            .map_err(|code| {
                error!("unable to create action {name}: {code}");
                ProviderError::Runtime(code)
            })?;

        let action = Arc::new(Action::new(
            runtime.clone(),
            handle,
            action_type,
            name,
            localized_name,
            subactions,
        ));
        set.push(action.clone())?;
        debug!(
            "action created: {name} ({action_type:?}) in {} with {} subaction path(s)",
            set.name(),
            subaction_paths.len()
        );
        Ok(action)
    }

    /// Creates an action space for a pose action. `subaction` must be one of
    /// the paths the action was declared with, or `None` for actions without any.
    pub fn create_action_space(
        &self,
        action: &Action,
        pose: Posef,
        subaction: Option<&str>,
    ) -> ProviderResult<SpaceHandle> {
        if action.action_type() != ActionType::Pose {
            return Err(ProviderError::TypeMismatch {
                action: action.name().to_string(),
                actual: action.action_type(),
                requested: ActionType::Pose,
            });
        }
        let index = action.subaction_index_by_name(subaction).ok_or_else(|| {
            ProviderError::validation(format!(
                "{} is not a subaction path of {}",
                subaction.unwrap_or("<null>"),
                action.name()
            ))
        })?;
        self.create_space_for_slot(action, pose, index)
    }

    /// One action space per subaction slot.
    pub fn create_action_spaces(
        &self,
        action: &Action,
        pose: Posef,
    ) -> ProviderResult<Vec<SpaceHandle>> {
        if action.action_type() != ActionType::Pose {
            return Err(ProviderError::TypeMismatch {
                action: action.name().to_string(),
                actual: action.action_type(),
                requested: ActionType::Pose,
            });
        }
        (0..action.slot_count())
            .map(|index| self.create_space_for_slot(action, pose, index))
            .collect()
    }

    fn create_space_for_slot(
        &self,
        action: &Action,
        pose: Posef,
        index: usize,
    ) -> ProviderResult<SpaceHandle> {
        let runtime = self.ctx.runtime();
        let space = runtime
            .create_action_space(self.ctx.session(), action.handle(), action.slot_path(index), pose)
            .map_err(|code| {
                error!("unable to create action space for {}: {code}", action.name());
                ProviderError::Runtime(code)
            })?;
        if let Some(previous) = action.set_space(index, space) {
            if let Err(code) = runtime.destroy_space(previous) {
                warn!("replaced action space could not be destroyed: {code}");
            }
        }
        Ok(space)
    }

    /// Adds `set` to the list synced every frame, filtered by `subaction`.
    /// Adding the same pair twice is a no-op.
    pub fn add_action_set_for_sync(
        &mut self,
        set: &Arc<ActionSet>,
        subaction: Option<&str>,
    ) -> ProviderResult<()> {
        let subaction_path = self.ctx.instance().optional_path(subaction)?;
        let active = ActiveActionSet {
            action_set: set.handle(),
            subaction_path,
        };
        if self.active.iter().any(|e| e.active == active) {
            debug!("action set {} already active for sync", set.name());
            return Ok(());
        }
        self.active.push(ActiveEntry {
            set: Arc::downgrade(set),
            name: set.name().to_string(),
            active,
        });
        Ok(())
    }

    /// Removes the `(set, subaction)` pair. Returns whether it was present.
    pub fn remove_action_set_for_sync(
        &mut self,
        set: &ActionSet,
        subaction: Option<&str>,
    ) -> ProviderResult<bool> {
        let subaction_path = self.ctx.instance().optional_path(subaction)?;
        let before = self.active.len();
        self.active.retain(|e| {
            !(e.active.action_set == set.handle() && e.active.subaction_path == subaction_path)
        });
        Ok(self.active.len() != before)
    }

    /// `(set name, subaction path)` for every active entry, in sync order.
    pub fn active_action_sets(&self) -> Vec<(String, XrPath)> {
        self.active
            .iter()
            .map(|e| (e.name.clone(), e.active.subaction_path))
            .collect()
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Attaches `sets` to the session. One shot: the session's attached sets
    /// can never change afterwards.
    pub fn attach_action_sets(&mut self, sets: &[&ActionSet]) -> ProviderResult<()> {
        if self.attached {
            let names: Vec<_> = sets.iter().map(|s| s.name()).collect();
            error!("action sets already attached to this session");
            return Err(ProviderError::ActionSetAttached(names.join(", ")));
        }
        let handles: Vec<_> = sets.iter().map(|s| s.handle()).collect();
        self.ctx
            .runtime()
            .attach_action_sets(self.ctx.session(), &handles)
            .map_err(|code| {
                error!("error attaching action sets to this session: {code}");
                ProviderError::Runtime(code)
            })?;
        for set in sets {
            set.mark_attached();
        }
        self.attached = true;
        info!("{} action set(s) attached to this session", sets.len());
        Ok(())
    }

    /// Syncs the active action sets with the runtime, then reads every
    /// action's state with at most [`MAX_READERS`] reads in flight.
    ///
    /// Returns the runtime's sync code. On a qualified success such as
    /// `XR_SESSION_NOT_FOCUSED` nothing was refreshed, so no state is read.
    /// Otherwise all reads are attempted; the first failure is returned and
    /// the rest are logged.
    pub fn sync_action_sets(&mut self) -> ProviderResult<XrCode> {
        let mut sets: Vec<Arc<ActionSet>> = Vec::new();
        let mut active = Vec::with_capacity(self.active.len());
        for entry in &self.active {
            let Some(set) = entry.set.upgrade() else {
                warn!("action set {} was dropped while active for sync", entry.name);
                continue;
            };
            active.push(entry.active);
            if !sets.iter().any(|s| s.handle() == set.handle()) {
                sets.push(set);
            }
        }

        if active.is_empty() {
            self.last_stats = SyncStats::default();
            return Ok(XrCode::SUCCESS);
        }

        let session = self.ctx.session();
        let synced = self
            .ctx
            .runtime()
            .sync_actions(session, &active)
            .map_err(|code| {
                error!("unable to sync action sets: {code}");
                ProviderError::Runtime(code)
            })?;
        if !synced.is_unqualified_success() {
            debug!("action sets not refreshed: {synced}");
            self.last_stats = SyncStats {
                action_sets: sets.len(),
                ..SyncStats::default()
            };
            return Ok(synced);
        }

        let actions: Vec<Arc<Action>> = sets
            .iter()
            .flat_map(|set| set.actions())
            .filter(|action| action.action_type() != ActionType::VibrationOutput)
            .collect();

        let (mut stats, mut failures) = read_all(&actions, session);
        stats.action_sets = sets.len();
        stats.failures = failures.len();
        self.last_stats = stats;

        if failures.is_empty() {
            return Ok(synced);
        }
        failures.sort_by_key(|(index, _)| *index);
        let mut failures = failures.into_iter();
        let first = failures.next();
        for (index, err) in failures {
            error!("state read failed for {}: {err}", actions[index].name());
        }
        match first {
            Some((_, err)) => Err(err),
            None => Ok(synced),
        }
    }

    pub fn last_sync_stats(&self) -> SyncStats {
        self.last_stats
    }

    /// Reads one action's state outside of a sync.
    pub fn get_action_state(&self, action: &Action) -> ProviderResult<()> {
        action.read_state(self.ctx.session())
    }

    /// Locates the action space of slot `index` in the app space.
    pub fn get_action_pose(
        &self,
        action: &Action,
        index: usize,
        time: XrTime,
    ) -> ProviderResult<(SpaceLocation, XrCode)> {
        let space = action.space(index).ok_or_else(|| {
            ProviderError::validation(format!("{} has no action space at {index}", action.name()))
        })?;
        self.ctx
            .runtime()
            .locate_space(space, self.ctx.app_space(), time)
            .map_err(ProviderError::Runtime)
    }

    /// Interaction profile currently bound to `user_path`; empty if none.
    pub fn current_interaction_profile(&self, user_path: &str) -> ProviderResult<String> {
        let path = self.string_to_path(user_path)?;
        let profile = self
            .ctx
            .runtime()
            .current_interaction_profile(self.ctx.session(), path)
            .map_err(ProviderError::Runtime)?;
        if profile.is_null() {
            return Ok(String::new());
        }
        let profile = self.path_to_string(profile)?;
        info!("current interaction profile ({user_path}): {profile}");
        Ok(profile)
    }

    pub fn generate_haptic(
        &self,
        action: &Action,
        subaction: Option<&str>,
        vibration: HapticVibration,
    ) -> ProviderResult<XrCode> {
        self.require_output(action)?;
        let path = self.ctx.instance().optional_path(subaction)?;
        self.ctx
            .runtime()
            .apply_haptic_feedback(self.ctx.session(), action.handle(), path, &vibration)
            .map_err(ProviderError::Runtime)
    }

    pub fn stop_haptic(&self, action: &Action, subaction: Option<&str>) -> ProviderResult<()> {
        self.require_output(action)?;
        let path = self.ctx.instance().optional_path(subaction)?;
        self.ctx
            .runtime()
            .stop_haptic_feedback(self.ctx.session(), action.handle(), path)
            .map_err(ProviderError::Runtime)
    }

    fn require_output(&self, action: &Action) -> ProviderResult<()> {
        if action.action_type() != ActionType::VibrationOutput {
            return Err(ProviderError::TypeMismatch {
                action: action.name().to_string(),
                actual: action.action_type(),
                requested: ActionType::VibrationOutput,
            });
        }
        Ok(())
    }

    pub fn add_binding(
        &self,
        profile: &mut dyn ControllerProfile,
        action: &Action,
        hand: Hand,
        component: Component,
        qualifier: Qualifier,
    ) -> ProviderResult<bool> {
        profile.suggest_binding(self.ctx.instance(), action, hand, component, qualifier)
    }

    pub fn add_binding_path(
        &self,
        profile: &mut dyn ControllerProfile,
        action: &Action,
        path: &str,
    ) -> ProviderResult<()> {
        profile.add_binding_path(self.ctx.instance(), action, path)
    }

    pub fn suggest_bindings(&self, profile: &dyn ControllerProfile) -> ProviderResult<()> {
        profile.suggest_all(self.ctx.instance())
    }
}

type Pending<'scope> = VecDeque<(usize, ScopedJoinHandle<'scope, ProviderResult<()>>)>;

/// Reads every action on scoped threads, never more than [`MAX_READERS`] at
/// once. When all slots are busy the oldest read is joined first.
fn read_all(
    actions: &[Arc<Action>],
    session: SessionHandle,
) -> (SyncStats, Vec<(usize, ProviderError)>) {
    let slots = Mutex::new(ReaderSlots::default());
    let mut failures = Vec::new();

    thread::scope(|scope| {
        let mut pending: Pending<'_> = VecDeque::with_capacity(MAX_READERS);

        for (index, action) in actions.iter().enumerate() {
            if pending.len() >= MAX_READERS {
                if let Some((oldest, handle)) = pending.pop_front() {
                    settle(&mut failures, oldest, handle);
                }
            }
            {
                let mut s = lock(&slots);
                s.in_flight += 1;
                s.peak = s.peak.max(s.in_flight);
                s.total += 1;
            }
            let slots = &slots;
            let handle = scope.spawn(move || {
                let result = action.read_state(session);
                lock(slots).in_flight -= 1;
                result
            });
            pending.push_back((index, handle));
        }

        while let Some((index, handle)) = pending.pop_front() {
            settle(&mut failures, index, handle);
        }
    });

    let slots = lock(&slots);
    (
        SyncStats {
            action_sets: 0,
            reads: slots.total,
            peak_in_flight: slots.peak,
            failures: 0,
        },
        failures,
    )
}

fn settle(
    failures: &mut Vec<(usize, ProviderError)>,
    index: usize,
    handle: ScopedJoinHandle<'_, ProviderResult<()>>,
) {
    let result = handle
        .join()
        .unwrap_or_else(|_| Err(ProviderError::Runtime(XrCode::ERROR_RUNTIME_FAILURE)));
    if let Err(err) = result {
        failures.push((index, err));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use crate::action::ActionStates;
    use crate::dummy::{DummyRuntime, DummyVerb};
    use crate::provider::{AppInfo, Provider};
    use crate::runtime::GraphicsBinding;
    use crate::session::SessionOptions;
    use crate::types::Vector2f;

    fn provider(runtime: Arc<DummyRuntime>) -> Provider {
        let mut provider = Provider::new(runtime);
        provider
            .init(&AppInfo::new("input-test").with_extensions(["XR_MND_headless"]))
            .unwrap();
        provider
            .create_session(&GraphicsBinding::Headless, SessionOptions::default())
            .unwrap();
        provider
    }

    fn input(provider: &mut Provider) -> &mut Input {
        provider.session_mut().unwrap().input_mut()
    }

    #[test]
    fn test_create_action_after_attach_fails() {
        let runtime = Arc::new(DummyRuntime::new());
        let mut provider = provider(runtime.clone());
        let input = input(&mut provider);
        let set = input.create_action_set("gameplay", "Gameplay", 0).unwrap();
        input
            .create_action(&set, "select", "Select", ActionType::Boolean, &[])
            .unwrap();
        input.attach_action_sets(&[&*set]).unwrap();
        assert!(set.is_attached());

        let err = input
            .create_action(&set, "late", "Late", ActionType::Boolean, &[])
            .unwrap_err();
        assert!(matches!(err, ProviderError::ActionSetAttached(_)));
        assert_eq!(set.len(), 1);
        assert_eq!(runtime.action_count(), 1);
    }

    #[test]
    fn test_attach_is_one_shot() {
        let runtime = Arc::new(DummyRuntime::new());
        let mut provider = provider(runtime);
        let input = input(&mut provider);
        let set = input.create_action_set("menu", "Menu", 0).unwrap();
        input.attach_action_sets(&[&*set]).unwrap();
        assert!(input.attach_action_sets(&[&*set]).is_err());
    }

    #[test]
    fn test_add_remove_for_sync() {
        let runtime = Arc::new(DummyRuntime::new());
        let mut provider = provider(runtime);
        let input = input(&mut provider);
        let set = input.create_action_set("gameplay", "Gameplay", 0).unwrap();

        input
            .add_action_set_for_sync(&set, Some("/user/hand/left"))
            .unwrap();
        input
            .add_action_set_for_sync(&set, Some("/user/hand/left"))
            .unwrap();
        input.add_action_set_for_sync(&set, None).unwrap();
        assert_eq!(input.active_action_sets().len(), 2);

        assert!(input
            .remove_action_set_for_sync(&set, Some("/user/hand/left"))
            .unwrap());
        assert!(!input
            .remove_action_set_for_sync(&set, Some("/user/hand/left"))
            .unwrap());
        assert_eq!(input.active_action_sets(), vec![("gameplay".to_string(), XrPath::NULL)]);
    }

    #[test]
    fn test_sync_reads_and_fires_callback() {
        let runtime = Arc::new(DummyRuntime::new());
        let mut provider = provider(runtime.clone());
        let input = input(&mut provider);
        let set = input.create_action_set("gameplay", "Gameplay", 0).unwrap();
        let select = input
            .create_action(
                &set,
                "select",
                "Select",
                ActionType::Boolean,
                &["/user/hand/left", "/user/hand/right"],
            )
            .unwrap();
        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = fired.clone();
        select.set_callback(move |_, index| sink.lock().unwrap().push(index));

        input.attach_action_sets(&[&*set]).unwrap();
        input.add_action_set_for_sync(&set, None).unwrap();

        let right = input.string_to_path("/user/hand/right").unwrap();
        runtime.set_boolean(select.handle(), right, true);
        input.sync_action_sets().unwrap();

        let state = select.boolean(1).unwrap();
        assert!(state.current_state);
        assert!(state.is_active);
        assert!(state.changed_since_last_sync);
        assert!(!select.boolean(0).unwrap().current_state);
        assert_eq!(*fired.lock().unwrap(), vec![1]);

        // Unchanged on the next frame: no callback.
        input.sync_action_sets().unwrap();
        assert!(!select.boolean(1).unwrap().changed_since_last_sync);
        assert_eq!(fired.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_sync_bounded_readers() {
        let runtime = Arc::new(DummyRuntime::new());
        runtime.set_read_delay(Duration::from_millis(2));
        let mut provider = provider(runtime.clone());
        let input = input(&mut provider);
        let set = input.create_action_set("many", "Many", 0).unwrap();
        for i in 0..10 {
            input
                .create_action(&set, &format!("button_{i}"), "Button", ActionType::Boolean, &[])
                .unwrap();
        }
        input.attach_action_sets(&[&*set]).unwrap();
        input.add_action_set_for_sync(&set, None).unwrap();

        for _ in 0..5 {
            input.sync_action_sets().unwrap();
            let stats = input.last_sync_stats();
            assert_eq!(stats.reads, 10);
            assert!(stats.peak_in_flight <= MAX_READERS);
            assert_eq!(runtime.reads_in_flight(), 0);
        }
        assert!(runtime.peak_concurrent_reads() <= MAX_READERS);
        assert_eq!(runtime.total_reads(), 50);
    }

    #[test]
    fn test_sync_returns_first_failure() {
        let runtime = Arc::new(DummyRuntime::new());
        let mut provider = provider(runtime.clone());
        let input = input(&mut provider);
        let set = input.create_action_set("gameplay", "Gameplay", 0).unwrap();
        input
            .create_action(&set, "a", "A", ActionType::Float, &[])
            .unwrap();
        input
            .create_action(&set, "b", "B", ActionType::Float, &[])
            .unwrap();
        input.attach_action_sets(&[&*set]).unwrap();
        input.add_action_set_for_sync(&set, None).unwrap();

        runtime.fail_always(DummyVerb::ActionState, XrCode::ERROR_SESSION_LOST);
        let err = input.sync_action_sets().unwrap_err();
        assert_eq!(err.code(), XrCode::ERROR_SESSION_LOST);
        assert_eq!(input.last_sync_stats().failures, 2);
    }

    #[test]
    fn test_unfocused_sync_skips_reads() {
        let runtime = Arc::new(DummyRuntime::new());
        let mut provider = provider(runtime.clone());
        let input = input(&mut provider);
        let set = input.create_action_set("gameplay", "Gameplay", 0).unwrap();
        let select = input
            .create_action(&set, "select", "Select", ActionType::Boolean, &[])
            .unwrap();
        input.attach_action_sets(&[&*set]).unwrap();
        input.add_action_set_for_sync(&set, None).unwrap();
        runtime.set_boolean(select.handle(), XrPath::NULL, true);

        runtime.fail_next(DummyVerb::SyncActions, XrCode::SESSION_NOT_FOCUSED);
        assert_eq!(input.sync_action_sets().unwrap(), XrCode::SESSION_NOT_FOCUSED);
        assert_eq!(runtime.total_reads(), 0);
        assert_eq!(input.last_sync_stats().reads, 0);
        assert_eq!(input.last_sync_stats().action_sets, 1);
        assert!(!select.boolean(0).unwrap().current_state);

        assert_eq!(input.sync_action_sets().unwrap(), XrCode::SUCCESS);
        assert_eq!(input.last_sync_stats().reads, 1);
        assert!(select.boolean(0).unwrap().current_state);
    }

    #[test]
    fn test_app_reads_serialize_with_sync() {
        let runtime = Arc::new(DummyRuntime::new());
        runtime.set_read_delay(Duration::from_micros(200));
        let mut provider = provider(runtime.clone());
        let input = input(&mut provider);
        let set = input.create_action_set("sticks", "Sticks", 0).unwrap();
        let stick = input
            .create_action(
                &set,
                "stick",
                "Stick",
                ActionType::Vector2f,
                &["/user/hand/left", "/user/hand/right"],
            )
            .unwrap();
        input.attach_action_sets(&[&*set]).unwrap();
        input.add_action_set_for_sync(&set, None).unwrap();
        let left = input.string_to_path("/user/hand/left").unwrap();
        let right = input.string_to_path("/user/hand/right").unwrap();

        let done = AtomicBool::new(false);
        let snapshots = thread::scope(|scope| {
            let reader = scope.spawn(|| {
                let mut snapshots = 0usize;
                loop {
                    assert!(matches!(
                        stick.boolean(0),
                        Err(ProviderError::TypeMismatch { .. })
                    ));
                    let ActionStates::Vector2f(slots) = stick.states() else {
                        panic!("vector action holds another payload");
                    };
                    // Both slots are written under one lock, so they always
                    // come from the same sync.
                    let first = slots[0].current_state;
                    assert_eq!(first.x, first.y);
                    assert!(slots.iter().all(|slot| slot.current_state == first));
                    snapshots += 1;
                    if done.load(Ordering::SeqCst) {
                        break snapshots;
                    }
                }
            });

            for frame in 1..=50 {
                let value = Vector2f {
                    x: frame as f32,
                    y: frame as f32,
                };
                runtime.set_vector2(stick.handle(), left, value);
                runtime.set_vector2(stick.handle(), right, value);
                input.sync_action_sets().unwrap();
            }
            done.store(true, Ordering::SeqCst);
            reader.join().unwrap()
        });

        assert!(snapshots > 0);
        assert_eq!(
            stick.vector2f(1).unwrap().current_state,
            Vector2f { x: 50.0, y: 50.0 }
        );
    }

    #[test]
    fn test_dropped_set_is_skipped() {
        let runtime = Arc::new(DummyRuntime::new());
        let mut provider = provider(runtime.clone());
        let input = input(&mut provider);
        let set = input.create_action_set("temp", "Temp", 0).unwrap();
        input.add_action_set_for_sync(&set, None).unwrap();
        drop(set);
        input.sync_action_sets().unwrap();
        assert_eq!(runtime.sync_count(), 0);
    }

    #[test]
    fn test_action_pose_requires_space() {
        let runtime = Arc::new(DummyRuntime::new());
        let mut provider = provider(runtime.clone());
        let input = input(&mut provider);
        let set = input.create_action_set("poses", "Poses", 0).unwrap();
        let grip = input
            .create_action(&set, "grip", "Grip", ActionType::Pose, &["/user/hand/left"])
            .unwrap();
        assert!(matches!(
            input.get_action_pose(&grip, 0, 0),
            Err(ProviderError::Validation(_))
        ));
        input
            .create_action_space(&grip, Posef::IDENTITY, Some("/user/hand/left"))
            .unwrap();
        let (location, code) = input.get_action_pose(&grip, 0, 0).unwrap();
        assert!(location.is_valid());
        assert_eq!(code, XrCode::SUCCESS);
        assert!(input
            .create_action_space(&grip, Posef::IDENTITY, Some("/user/hand/right"))
            .is_err());
    }

    #[test]
    fn test_haptics_need_output_action() {
        let runtime = Arc::new(DummyRuntime::new());
        let mut provider = provider(runtime.clone());
        let input = input(&mut provider);
        let set = input.create_action_set("feedback", "Feedback", 0).unwrap();
        let buzz = input
            .create_action(&set, "buzz", "Buzz", ActionType::VibrationOutput, &[])
            .unwrap();
        let select = input
            .create_action(&set, "select", "Select", ActionType::Boolean, &[])
            .unwrap();
        input.attach_action_sets(&[&*set]).unwrap();

        runtime.fail_next(DummyVerb::ApplyHaptic, XrCode::SESSION_NOT_FOCUSED);
        assert_eq!(
            input
                .generate_haptic(&buzz, None, HapticVibration::default())
                .unwrap(),
            XrCode::SESSION_NOT_FOCUSED
        );
        assert_eq!(runtime.haptic_log().len(), 1);
        input.stop_haptic(&buzz, None).unwrap();
        assert!(runtime.haptic_log().is_empty());
        assert!(matches!(
            input.generate_haptic(&select, None, HapticVibration::default()),
            Err(ProviderError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_current_interaction_profile() {
        let runtime = Arc::new(DummyRuntime::new());
        let mut provider = provider(runtime.clone());
        let input = input(&mut provider);
        let set = input.create_action_set("gameplay", "Gameplay", 0).unwrap();
        input.attach_action_sets(&[&*set]).unwrap();
        assert_eq!(input.current_interaction_profile("/user/hand/left").unwrap(), "");
        runtime
            .set_interaction_profile(
                "/user/hand/left",
                "/interaction_profiles/valve/index_controller",
            )
            .unwrap();
        assert_eq!(
            input.current_interaction_profile("/user/hand/left").unwrap(),
            "/interaction_profiles/valve/index_controller"
        );
    }
}
