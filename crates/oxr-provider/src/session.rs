use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::code::XrCode;
use crate::context::{InstanceContext, SessionContext};
use crate::input::Input;
use crate::runtime::{FrameEnd, FrameLayer, GraphicsBinding, XrRuntime};
use crate::types::{
    BlendMode, FrameState, Posef, ReferenceSpace, SessionHandle, SessionState, SpaceHandle,
    SpaceLocation, SystemId, ViewConfiguration, XrTime,
};
use crate::{ProviderError, ProviderResult};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SessionOptions {
    /// Type of both the reference space and the app space.
    pub reference_space: ReferenceSpace,
    pub reference_pose: Posef,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            reference_space: ReferenceSpace::Local,
            reference_pose: Posef::IDENTITY,
        }
    }
}

/// A live presentation context with the runtime.
///
/// Owns its [`Input`], the reference space poses are resolved against, and
/// a separate app space of the same type.
pub struct Session {
    runtime: Arc<dyn XrRuntime>,
    handle: SessionHandle,
    reference_space_type: ReferenceSpace,
    reference_space: SpaceHandle,
    app_space: SpaceHandle,
    state: SessionState,
    view_configuration: Option<ViewConfiguration>,
    frame: FrameState,
    input: Input,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("handle", &self.handle)
            .field("reference_space_type", &self.reference_space_type)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub(crate) fn create(
        instance: &InstanceContext,
        system: SystemId,
        graphics: &GraphicsBinding,
        options: SessionOptions,
    ) -> ProviderResult<Self> {
        let runtime = instance.runtime().clone();
        let handle = runtime
            .create_session(instance.handle(), system, graphics)
            .map_err(|code| {
                error!("unable to create session: {code}");
                ProviderError::Runtime(code)
            })?;

        match runtime.enumerate_reference_spaces(handle) {
            Ok(spaces) => {
                debug!("this session supports {} reference space type(s):", spaces.len());
                for space in spaces {
                    debug!("\t{space:?}");
                }
            }
            Err(code) => warn!("unable to enumerate reference spaces: {code}"),
        }

        let spaces = runtime
            .create_reference_space(handle, options.reference_space, options.reference_pose)
            .and_then(|reference| {
                match runtime.create_reference_space(
                    handle,
                    options.reference_space,
                    options.reference_pose,
                ) {
                    Ok(app) => Ok((reference, app)),
                    Err(code) => {
                        if let Err(destroy) = runtime.destroy_space(reference) {
                            warn!("reference space cleanup failed: {destroy}");
                        }
                        Err(code)
                    }
                }
            });
        let (reference_space, app_space) = match spaces {
            Ok(pair) => pair,
            Err(code) => {
                error!(
                    "unable to create {:?} reference space: {code}",
                    options.reference_space
                );
                if let Err(destroy) = runtime.destroy_session(handle) {
                    warn!("session cleanup failed: {destroy}");
                }
                return Err(ProviderError::Runtime(code));
            }
        };
        debug!(
            "reference space {:?} created ({}), app space ({})",
            options.reference_space,
            reference_space.raw(),
            app_space.raw()
        );

        let ctx = SessionContext::new(instance.clone(), handle, app_space);
        Ok(Self {
            runtime,
            handle,
            reference_space_type: options.reference_space,
            reference_space,
            app_space,
            state: SessionState::Unknown,
            view_configuration: None,
            frame: FrameState::default(),
            input: Input::new(ctx),
        })
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle
    }

    pub fn app_space(&self) -> SpaceHandle {
        self.app_space
    }

    pub fn reference_space(&self) -> SpaceHandle {
        self.reference_space
    }

    pub fn reference_space_type(&self) -> ReferenceSpace {
        self.reference_space_type
    }

    /// Last state reported by the runtime's event queue.
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: SessionState) {
        self.state = state;
    }

    pub fn view_configuration(&self) -> Option<ViewConfiguration> {
        self.view_configuration
    }

    pub fn input(&self) -> &Input {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut Input {
        &mut self.input
    }

    pub fn begin(&mut self, view_configuration: ViewConfiguration) -> ProviderResult<()> {
        self.runtime
            .begin_session(self.handle, view_configuration)
            .map_err(|code| {
                error!("unable to begin session: {code}");
                ProviderError::Runtime(code)
            })?;
        self.view_configuration = Some(view_configuration);
        info!("session started");
        Ok(())
    }

    pub fn end(&mut self) -> ProviderResult<()> {
        self.runtime.end_session(self.handle).map_err(|code| {
            error!("unable to end session: {code}");
            ProviderError::Runtime(code)
        })?;
        info!("session ended");
        Ok(())
    }

    pub fn request_exit(&self) -> ProviderResult<()> {
        self.runtime
            .request_exit_session(self.handle)
            .map_err(ProviderError::Runtime)
    }

    pub fn supported_reference_spaces(&self) -> ProviderResult<Vec<ReferenceSpace>> {
        self.runtime
            .enumerate_reference_spaces(self.handle)
            .map_err(|code| {
                error!("error getting supported reference space types: {code}");
                ProviderError::Runtime(code)
            })
    }

    /// Creates an extra reference space; the caller owns it and releases it
    /// with [`Session::destroy_space`].
    pub fn create_reference_space(
        &self,
        kind: ReferenceSpace,
        pose: Posef,
    ) -> ProviderResult<SpaceHandle> {
        let space = self
            .runtime
            .create_reference_space(self.handle, kind, pose)
            .map_err(ProviderError::Runtime)?;
        debug!("reference space created of type {kind:?} ({})", space.raw());
        Ok(space)
    }

    pub fn destroy_space(&self, space: SpaceHandle) -> ProviderResult<()> {
        if space == self.reference_space || space == self.app_space {
            return Err(ProviderError::validation(
                "the session's own spaces are released with the session",
            ));
        }
        self.runtime
            .destroy_space(space)
            .map_err(ProviderError::Runtime)
    }

    /// Pose of `target` expressed in `base`, with the runtime's success code.
    pub fn locate_space(
        &self,
        base: SpaceHandle,
        target: SpaceHandle,
        time: XrTime,
    ) -> ProviderResult<(SpaceLocation, XrCode)> {
        self.runtime
            .locate_space(target, base, time)
            .map_err(ProviderError::Runtime)
    }

    pub fn locate_reference_space(&self, time: XrTime) -> ProviderResult<(SpaceLocation, XrCode)> {
        self.locate_space(self.reference_space, self.reference_space, time)
    }

    /// App space located in the reference space.
    pub fn locate_app_space(&self, time: XrTime) -> ProviderResult<(SpaceLocation, XrCode)> {
        self.locate_space(self.reference_space, self.app_space, time)
    }

    /// Waits for the next frame and caches its predicted timing.
    pub fn wait_frame(&mut self) -> ProviderResult<(FrameState, XrCode)> {
        let (frame, code) = self
            .runtime
            .wait_frame(self.handle)
            .map_err(ProviderError::Runtime)?;
        self.frame = frame;
        Ok((frame, code))
    }

    /// Returns `XR_FRAME_DISCARDED` when the previous frame was dropped.
    pub fn begin_frame(&self) -> ProviderResult<XrCode> {
        self.runtime
            .begin_frame(self.handle)
            .map_err(ProviderError::Runtime)
    }

    /// Ends the frame at the cached predicted display time.
    pub fn end_frame(
        &self,
        layers: &[FrameLayer],
        blend_mode: BlendMode,
    ) -> ProviderResult<XrCode> {
        self.runtime
            .end_frame(
                self.handle,
                &FrameEnd {
                    display_time: self.frame.predicted_display_time,
                    blend_mode,
                    layers,
                },
            )
            .map_err(ProviderError::Runtime)
    }

    /// Wait, begin and end one frame with no layers. The code is the first
    /// qualified success of the three calls, or `XR_SUCCESS`.
    pub fn render_headless_frame(&mut self) -> ProviderResult<(FrameState, XrCode)> {
        let (frame, waited) = self.wait_frame()?;
        let begun = self.begin_frame()?;
        let ended = self.end_frame(&[], BlendMode::Opaque)?;
        let code = [waited, begun, ended]
            .into_iter()
            .find(|code| !code.is_unqualified_success())
            .unwrap_or(XrCode::SUCCESS);
        if code != XrCode::SUCCESS {
            debug!("headless frame: {code}");
        }
        Ok((frame, code))
    }

    pub fn predicted_display_time(&self) -> XrTime {
        self.frame.predicted_display_time
    }

    pub fn predicted_display_period(&self) -> i64 {
        self.frame.predicted_display_period
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        for space in [self.app_space, self.reference_space] {
            if let Err(code) = self.runtime.destroy_space(space) {
                warn!("unable to destroy session space: {code}");
            }
        }
        match self.runtime.destroy_session(self.handle) {
            Ok(()) => debug!("session destroyed"),
            Err(code) => warn!("unable to destroy session: {code}"),
        }
    }
}
