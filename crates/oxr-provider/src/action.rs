use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, warn};

use crate::runtime::XrRuntime;
use crate::types::{
    ActionHandle, ActionSetHandle, ActionType, BoolState, FloatState, PoseState, SessionHandle,
    SpaceHandle, Vector2State, XrPath,
};
use crate::{lock, read_lock, write_lock, ProviderError, ProviderResult};

/// Invoked with the action and the subaction index whose state changed.
pub type ActionCallback = Arc<dyn Fn(&Action, usize) + Send + Sync>;

/// Last polled state of an action, one entry per subaction slot.
///
/// The variant always matches the action's [`ActionType`].
#[derive(Debug, Clone, PartialEq)]
pub enum ActionStates {
    Boolean(Vec<BoolState>),
    Float(Vec<FloatState>),
    Vector2f(Vec<Vector2State>),
    Pose(Vec<PoseState>),
    /// Output actions carry no polled state.
    Vibration,
}

impl ActionStates {
    pub fn new(action_type: ActionType, slots: usize) -> Self {
        match action_type {
            ActionType::Boolean => Self::Boolean(vec![BoolState::default(); slots]),
            ActionType::Float => Self::Float(vec![FloatState::default(); slots]),
            ActionType::Vector2f => Self::Vector2f(vec![Vector2State::default(); slots]),
            ActionType::Pose => Self::Pose(vec![PoseState::default(); slots]),
            ActionType::VibrationOutput => Self::Vibration,
        }
    }

    pub fn action_type(&self) -> ActionType {
        match self {
            Self::Boolean(_) => ActionType::Boolean,
            Self::Float(_) => ActionType::Float,
            Self::Vector2f(_) => ActionType::Vector2f,
            Self::Pose(_) => ActionType::Pose,
            Self::Vibration => ActionType::VibrationOutput,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Boolean(v) => v.len(),
            Self::Float(v) => v.len(),
            Self::Vector2f(v) => v.len(),
            Self::Pose(v) => v.len(),
            Self::Vibration => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_active(&self, index: usize) -> bool {
        match self {
            Self::Boolean(v) => v.get(index).is_some_and(|s| s.is_active),
            Self::Float(v) => v.get(index).is_some_and(|s| s.is_active),
            Self::Vector2f(v) => v.get(index).is_some_and(|s| s.is_active),
            Self::Pose(v) => v.get(index).is_some_and(|s| s.is_active),
            Self::Vibration => false,
        }
    }
}

/// An input or output endpoint inside an [`ActionSet`].
///
/// State is written only by [`crate::Input`]; applications read it through
/// the typed getters, which take the same per-action lock the sync uses.
pub struct Action {
    handle: ActionHandle,
    action_type: ActionType,
    name: String,
    localized_name: String,
    subaction_names: Vec<String>,
    subaction_paths: Vec<XrPath>,
    states: Mutex<ActionStates>,
    spaces: Mutex<Vec<SpaceHandle>>,
    callback: RwLock<Option<ActionCallback>>,
    runtime: Arc<dyn XrRuntime>,
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Action")
            .field("handle", &self.handle)
            .field("action_type", &self.action_type)
            .field("name", &self.name)
            .field("subaction_names", &self.subaction_names)
            .finish_non_exhaustive()
    }
}

impl Action {
    pub(crate) fn new(
        runtime: Arc<dyn XrRuntime>,
        handle: ActionHandle,
        action_type: ActionType,
        name: &str,
        localized_name: &str,
        subactions: Vec<(String, XrPath)>,
    ) -> Self {
        let (subaction_names, subaction_paths): (Vec<_>, Vec<_>) = subactions.into_iter().unzip();
        let slots = subaction_paths.len().max(1);
        Self {
            handle,
            action_type,
            name: name.to_string(),
            localized_name: localized_name.to_string(),
            subaction_names,
            subaction_paths,
            states: Mutex::new(ActionStates::new(action_type, slots)),
            spaces: Mutex::new(vec![SpaceHandle::NULL; slots]),
            callback: RwLock::new(None),
            runtime,
        }
    }

    pub fn handle(&self) -> ActionHandle {
        self.handle
    }

    pub fn action_type(&self) -> ActionType {
        self.action_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn localized_name(&self) -> &str {
        &self.localized_name
    }

    pub fn subaction_names(&self) -> &[String] {
        &self.subaction_names
    }

    pub fn subaction_paths(&self) -> &[XrPath] {
        &self.subaction_paths
    }

    /// Number of state slots: one per subaction path, or one when none were declared.
    pub fn slot_count(&self) -> usize {
        self.subaction_paths.len().max(1)
    }

    /// Subaction path read into slot `index`.
    pub fn slot_path(&self, index: usize) -> XrPath {
        self.subaction_paths
            .get(index)
            .copied()
            .unwrap_or(XrPath::NULL)
    }

    /// Slot index for `path`. The null path addresses slot 0 of an action
    /// without subaction paths.
    pub fn subaction_index(&self, path: XrPath) -> Option<usize> {
        if path.is_null() && self.subaction_paths.is_empty() {
            return Some(0);
        }
        self.subaction_paths.iter().position(|p| *p == path)
    }

    /// Slot index for a subaction path given by name; `None` or `""` is the null path.
    pub fn subaction_index_by_name(&self, name: Option<&str>) -> Option<usize> {
        match name {
            Some(n) if !n.is_empty() => self.subaction_names.iter().position(|s| s == n),
            _ if self.subaction_paths.is_empty() => Some(0),
            _ => None,
        }
    }

    /// Snapshot of every slot.
    pub fn states(&self) -> ActionStates {
        lock(&self.states).clone()
    }

    fn mismatch(&self, requested: ActionType) -> ProviderError {
        ProviderError::TypeMismatch {
            action: self.name.clone(),
            actual: self.action_type,
            requested,
        }
    }

    fn out_of_range(&self, index: usize) -> ProviderError {
        ProviderError::validation(format!(
            "action '{}' has {} slot(s), index {index} requested",
            self.name,
            self.slot_count()
        ))
    }

    pub fn boolean(&self, index: usize) -> ProviderResult<BoolState> {
        match &*lock(&self.states) {
            ActionStates::Boolean(v) => v.get(index).copied().ok_or_else(|| self.out_of_range(index)),
            _ => Err(self.mismatch(ActionType::Boolean)),
        }
    }

    pub fn float(&self, index: usize) -> ProviderResult<FloatState> {
        match &*lock(&self.states) {
            ActionStates::Float(v) => v.get(index).copied().ok_or_else(|| self.out_of_range(index)),
            _ => Err(self.mismatch(ActionType::Float)),
        }
    }

    pub fn vector2f(&self, index: usize) -> ProviderResult<Vector2State> {
        match &*lock(&self.states) {
            ActionStates::Vector2f(v) => {
                v.get(index).copied().ok_or_else(|| self.out_of_range(index))
            }
            _ => Err(self.mismatch(ActionType::Vector2f)),
        }
    }

    pub fn pose(&self, index: usize) -> ProviderResult<PoseState> {
        match &*lock(&self.states) {
            ActionStates::Pose(v) => v.get(index).copied().ok_or_else(|| self.out_of_range(index)),
            _ => Err(self.mismatch(ActionType::Pose)),
        }
    }

    /// Action space of slot `index`, if one was created.
    pub fn space(&self, index: usize) -> Option<SpaceHandle> {
        lock(&self.spaces)
            .get(index)
            .copied()
            .filter(|space| !space.is_null())
    }

    pub fn spaces(&self) -> Vec<SpaceHandle> {
        lock(&self.spaces).clone()
    }

    /// Stores `space` in slot `index`, returning the space it replaced.
    pub(crate) fn set_space(&self, index: usize, space: SpaceHandle) -> Option<SpaceHandle> {
        let mut spaces = lock(&self.spaces);
        let slot = spaces.get_mut(index)?;
        let previous = std::mem::replace(slot, space);
        (!previous.is_null()).then_some(previous)
    }

    pub fn set_callback(&self, callback: impl Fn(&Action, usize) + Send + Sync + 'static) {
        *write_lock(&self.callback) = Some(Arc::new(callback));
    }

    pub fn clear_callback(&self) {
        *write_lock(&self.callback) = None;
    }

    /// Reads every slot from the runtime.
    ///
    /// All slots are attempted; the first failure is returned. The callback
    /// runs after the state lock is released.
    pub(crate) fn read_state(&self, session: SessionHandle) -> ProviderResult<()> {
        if self.action_type == ActionType::VibrationOutput {
            return Ok(());
        }

        let mut first_error = None;
        let mut changed = Vec::new();
        {
            let mut states = lock(&self.states);
            for index in 0..self.slot_count() {
                let path = self.slot_path(index);
                let runtime = &self.runtime;
                let result = match &mut *states {
                    ActionStates::Boolean(v) => runtime
                        .action_state_boolean(session, self.handle, path)
                        .map(|state| {
                            v[index] = state;
                            state.is_active && state.changed_since_last_sync
                        }),
                    ActionStates::Float(v) => runtime
                        .action_state_float(session, self.handle, path)
                        .map(|state| {
                            v[index] = state;
                            state.is_active && state.changed_since_last_sync
                        }),
                    ActionStates::Vector2f(v) => runtime
                        .action_state_vector2f(session, self.handle, path)
                        .map(|state| {
                            v[index] = state;
                            state.is_active && state.changed_since_last_sync
                        }),
                    ActionStates::Pose(v) => runtime
                        .action_state_pose(session, self.handle, path)
                        .map(|state| {
                            v[index] = state;
                            state.is_active
                        }),
                    ActionStates::Vibration => Ok(false),
                };

                match result {
                    Ok(true) => changed.push(index),
                    Ok(false) => {}
                    Err(code) if first_error.is_none() => first_error = Some(code),
                    Err(code) => warn!("{} slot {index}: state read failed: {code}", self.name),
                }
            }
        }

        if !changed.is_empty() {
            let callback = read_lock(&self.callback).clone();
            if let Some(callback) = callback {
                for index in changed {
                    callback(self, index);
                }
            }
        }

        match first_error {
            Some(code) => Err(ProviderError::Runtime(code)),
            None => Ok(()),
        }
    }
}

impl Drop for Action {
    fn drop(&mut self) {
        for space in lock(&self.spaces).drain(..).filter(|s| !s.is_null()) {
            if let Err(code) = self.runtime.destroy_space(space) {
                debug!("action space of '{}' already gone: {code}", self.name);
            }
        }
        if let Err(code) = self.runtime.destroy_action(self.handle) {
            debug!("action '{}' already destroyed: {code}", self.name);
        }
    }
}

/// A named bundle of actions, synchronized as a unit.
///
/// Owns its actions. Frozen once attached to a session.
pub struct ActionSet {
    handle: ActionSetHandle,
    name: String,
    localized_name: String,
    priority: u32,
    actions: RwLock<Vec<Arc<Action>>>,
    attached: AtomicBool,
    runtime: Arc<dyn XrRuntime>,
}

impl std::fmt::Debug for ActionSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionSet")
            .field("handle", &self.handle)
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("attached", &self.is_attached())
            .finish_non_exhaustive()
    }
}

impl ActionSet {
    pub(crate) fn new(
        runtime: Arc<dyn XrRuntime>,
        handle: ActionSetHandle,
        name: &str,
        localized_name: &str,
        priority: u32,
    ) -> Self {
        Self {
            handle,
            name: name.to_string(),
            localized_name: localized_name.to_string(),
            priority,
            actions: RwLock::new(Vec::new()),
            attached: AtomicBool::new(false),
            runtime,
        }
    }

    pub fn handle(&self) -> ActionSetHandle {
        self.handle
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn localized_name(&self) -> &str {
        &self.localized_name
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    pub(crate) fn mark_attached(&self) {
        self.attached.store(true, Ordering::Release);
    }

    /// Actions in creation order.
    pub fn actions(&self) -> Vec<Arc<Action>> {
        read_lock(&self.actions).clone()
    }

    pub fn action(&self, name: &str) -> Option<Arc<Action>> {
        read_lock(&self.actions)
            .iter()
            .find(|a| a.name() == name)
            .cloned()
    }

    pub fn len(&self) -> usize {
        read_lock(&self.actions).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn push(&self, action: Arc<Action>) -> ProviderResult<()> {
        if self.is_attached() {
            return Err(ProviderError::ActionSetAttached(self.name.clone()));
        }
        write_lock(&self.actions).push(action);
        Ok(())
    }
}

impl Drop for ActionSet {
    fn drop(&mut self) {
        write_lock(&self.actions).clear();
        if let Err(code) = self.runtime.destroy_action_set(self.handle) {
            debug!("action set '{}' already destroyed: {code}", self.name);
        }
    }
}
