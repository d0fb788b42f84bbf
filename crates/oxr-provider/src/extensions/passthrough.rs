//! `XR_FB_passthrough` driven as a small state machine.
//!
//! ```text
//! Stopped --start--> Started --set_mode_*--> Default | Mono | ColorMapped | Bcs
//!    ^                                             |
//!    +------------------- stop --------------------+
//! ```
//!
//! Every transition touches the runtime; a refused call leaves the mode
//! where it was.

use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::{adapter_common, fns, resolved, Extension, ExtensionAdapter, Resolved};
use crate::context::InstanceContext;
use crate::runtime::{FrameLayer, PassthroughColorMap, PassthroughFns, PassthroughStyle};
use crate::types::{Color4f, PassthroughHandle, PassthroughLayerHandle, SessionHandle};
use crate::{ProviderError, ProviderResult};

pub const DEFAULT_OPACITY: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum PassthroughMode {
    #[default]
    Stopped,
    /// Running on the runtime, no layer style applied yet.
    Started,
    Default,
    Mono,
    ColorMapped,
    Bcs,
}

impl PassthroughMode {
    pub fn is_styled(self) -> bool {
        !matches!(self, PassthroughMode::Stopped | PassthroughMode::Started)
    }
}

pub struct Passthrough {
    session: SessionHandle,
    fns: Resolved<dyn PassthroughFns>,
    passthrough: PassthroughHandle,
    layer: PassthroughLayerHandle,
    mode: PassthroughMode,
    opacity: f32,
    edge_color: Color4f,
    color_map: Option<PassthroughColorMap>,
}

impl Passthrough {
    pub fn new(instance: &InstanceContext, session: SessionHandle) -> Self {
        let fns = resolved(
            Extension::Passthrough,
            instance.runtime().resolve_passthrough(instance.handle()),
        );
        Self {
            session,
            fns,
            passthrough: PassthroughHandle::NULL,
            layer: PassthroughLayerHandle::NULL,
            mode: PassthroughMode::Stopped,
            opacity: DEFAULT_OPACITY,
            edge_color: Color4f::TRANSPARENT,
            color_map: None,
        }
    }

    pub fn mode(&self) -> PassthroughMode {
        self.mode
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn edge_color(&self) -> Color4f {
        self.edge_color
    }

    pub fn layer(&self) -> PassthroughLayerHandle {
        self.layer
    }

    /// Layer to hand to `Session::end_frame` while passthrough runs.
    pub fn composition_layer(&self) -> Option<FrameLayer> {
        if self.mode == PassthroughMode::Stopped || self.layer.is_null() {
            None
        } else {
            Some(FrameLayer::Passthrough(self.layer))
        }
    }

    fn handles(&self) -> ProviderResult<(&std::sync::Arc<dyn PassthroughFns>, PassthroughHandle)> {
        let fns = fns(&self.fns)?;
        if self.passthrough.is_null() || self.layer.is_null() {
            return Err(ProviderError::validation(
                "passthrough objects missing; init did not complete",
            ));
        }
        Ok((fns, self.passthrough))
    }

    /// `Stopped -> Started`. No-op when already running.
    pub fn start(&mut self) -> ProviderResult<()> {
        let (fns, passthrough) = self.handles()?;
        if self.mode != PassthroughMode::Stopped {
            return Ok(());
        }
        fns.passthrough_start(passthrough).map_err(|code| {
            error!("unable to start passthrough: {code}");
            ProviderError::Runtime(code)
        })?;
        self.mode = PassthroughMode::Started;
        info!("passthrough started");
        Ok(())
    }

    /// Any mode `-> Stopped`.
    pub fn stop(&mut self) -> ProviderResult<()> {
        let (fns, passthrough) = self.handles()?;
        if self.mode == PassthroughMode::Stopped {
            return Ok(());
        }
        fns.passthrough_pause(passthrough).map_err(|code| {
            error!("unable to pause passthrough: {code}");
            ProviderError::Runtime(code)
        })?;
        self.mode = PassthroughMode::Stopped;
        info!("passthrough stopped");
        Ok(())
    }

    /// Pauses only the layer; the mode is kept and the next style change
    /// resumes it.
    pub fn pause_layer(&self) -> ProviderResult<()> {
        let (fns, _) = self.handles()?;
        fns.layer_pause(self.layer).map_err(ProviderError::Runtime)
    }

    /// Stores opacity (clamped to `0..=1`) and edge color, re-applying the
    /// current style when one is active.
    pub fn set_params(&mut self, opacity: f32, edge_color: Color4f) -> ProviderResult<()> {
        let previous = (self.opacity, self.edge_color);
        self.opacity = opacity.clamp(0.0, 1.0);
        self.edge_color = edge_color;
        if !self.mode.is_styled() {
            return Ok(());
        }
        let map = self.color_map.clone();
        if let Err(err) = self.apply_style(self.mode, map) {
            (self.opacity, self.edge_color) = previous;
            return Err(err);
        }
        Ok(())
    }

    pub fn set_opacity(&mut self, opacity: f32) -> ProviderResult<()> {
        self.set_params(opacity, self.edge_color)
    }

    pub fn set_edge_color(&mut self, edge_color: Color4f) -> ProviderResult<()> {
        self.set_params(self.opacity, edge_color)
    }

    /// Plain passthrough with the stored opacity and edge color.
    pub fn set_mode_default(&mut self) -> ProviderResult<()> {
        self.transition(PassthroughMode::Default, None)
    }

    /// Maps each input luminance to an output luminance.
    pub fn set_mode_mono(&mut self, map: [u8; 256]) -> ProviderResult<()> {
        self.transition(
            PassthroughMode::Mono,
            Some(PassthroughColorMap::MonoToMono(Box::new(map))),
        )
    }

    /// Tints the luminance ramp into the enabled channels.
    pub fn set_mode_color_map(
        &mut self,
        red: bool,
        green: bool,
        blue: bool,
        alpha: f32,
    ) -> ProviderResult<()> {
        let channel = |on: bool, value: f32| if on { value } else { 0.0 };
        let mut map = Box::new([Color4f::TRANSPARENT; 256]);
        for (i, color) in map.iter_mut().enumerate() {
            let value = i as f32 / 255.0;
            *color = Color4f {
                r: channel(red, value),
                g: channel(green, value),
                b: channel(blue, value),
                a: alpha,
            };
        }
        self.transition(
            PassthroughMode::ColorMapped,
            Some(PassthroughColorMap::MonoToRgba(map)),
        )
    }

    pub fn set_mode_bcs(
        &mut self,
        brightness: f32,
        contrast: f32,
        saturation: f32,
    ) -> ProviderResult<()> {
        self.transition(
            PassthroughMode::Bcs,
            Some(PassthroughColorMap::BrightnessContrastSaturation {
                brightness,
                contrast,
                saturation,
            }),
        )
    }

    /// Starts if needed, then resumes the layer and applies the style. A
    /// start done here is undone when the style fails.
    fn transition(
        &mut self,
        target: PassthroughMode,
        color_map: Option<PassthroughColorMap>,
    ) -> ProviderResult<()> {
        let auto_started = self.mode == PassthroughMode::Stopped;
        if auto_started {
            self.start()?;
        }
        if let Err(err) = self.apply_style(target, color_map) {
            if auto_started {
                if let Err(stop) = self.stop() {
                    warn!("passthrough left running after failed style: {stop}");
                }
            }
            return Err(err);
        }
        Ok(())
    }

    fn apply_style(
        &mut self,
        target: PassthroughMode,
        color_map: Option<PassthroughColorMap>,
    ) -> ProviderResult<()> {
        let (fns, _) = self.handles()?;
        fns.layer_resume(self.layer).map_err(|code| {
            error!("unable to resume passthrough layer: {code}");
            ProviderError::Runtime(code)
        })?;
        let style = PassthroughStyle {
            opacity: self.opacity,
            edge_color: self.edge_color,
            color_map,
        };
        fns.layer_set_style(self.layer, &style).map_err(|code| {
            error!("unable to set {target:?} passthrough style: {code}");
            ProviderError::Runtime(code)
        })?;
        debug!("passthrough {:?} -> {target:?}", self.mode);
        self.mode = target;
        self.color_map = style.color_map;
        Ok(())
    }

    fn destroy_objects(&mut self) {
        let Ok(fns) = &self.fns else {
            return;
        };
        if !self.layer.is_null() {
            if let Err(code) = fns.destroy_layer(self.layer) {
                warn!("unable to destroy passthrough layer: {code}");
            }
            self.layer = PassthroughLayerHandle::NULL;
        }
        if !self.passthrough.is_null() {
            if let Err(code) = fns.destroy_passthrough(self.passthrough) {
                warn!("unable to destroy passthrough: {code}");
            }
            self.passthrough = PassthroughHandle::NULL;
        }
        self.mode = PassthroughMode::Stopped;
    }
}

impl ExtensionAdapter for Passthrough {
    adapter_common!(Extension::Passthrough);

    /// Creates the passthrough feature and its reconstruction layer, both
    /// paused.
    fn init(&mut self) -> ProviderResult<()> {
        let fns = fns(&self.fns)?.clone();
        if !self.passthrough.is_null() {
            return Ok(());
        }
        self.passthrough = fns.create_passthrough(self.session, false).map_err(|code| {
            error!("unable to create passthrough: {code}");
            ProviderError::Runtime(code)
        })?;
        match fns.create_layer(self.session, self.passthrough, false) {
            Ok(layer) => self.layer = layer,
            Err(code) => {
                error!("unable to create passthrough layer: {code}");
                self.destroy_objects();
                return Err(ProviderError::Runtime(code));
            }
        }
        info!("passthrough initialized");
        Ok(())
    }
}

impl Drop for Passthrough {
    fn drop(&mut self) {
        self.destroy_objects();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::code::XrCode;
    use crate::dummy::{DummyRuntime, DummyVerb};
    use crate::extensions::{HEADLESS, PASSTHROUGH};
    use crate::provider::{AppInfo, Provider};
    use crate::runtime::GraphicsBinding;
    use crate::session::SessionOptions;

    fn provider(runtime: &Arc<DummyRuntime>) -> Provider {
        let mut provider = Provider::new(runtime.clone());
        provider
            .init(&AppInfo::new("passthrough-test").with_extensions([HEADLESS, PASSTHROUGH]))
            .unwrap();
        provider
            .create_session(&GraphicsBinding::Headless, SessionOptions::default())
            .unwrap();
        provider
    }

    fn passthrough(provider: &mut Provider) -> &mut Passthrough {
        provider.extensions_mut().get_mut::<Passthrough>().unwrap()
    }

    #[test]
    fn test_start_mono_stop() {
        let runtime = Arc::new(DummyRuntime::new());
        let mut provider = provider(&runtime);
        let pt = passthrough(&mut provider);
        assert_eq!(pt.mode(), PassthroughMode::Stopped);
        assert_eq!(pt.composition_layer(), None);

        pt.start().unwrap();
        assert_eq!(pt.mode(), PassthroughMode::Started);

        let mut ramp = [0u8; 256];
        for (i, v) in ramp.iter_mut().enumerate() {
            *v = 255 - i as u8;
        }
        pt.set_mode_mono(ramp).unwrap();
        assert_eq!(pt.mode(), PassthroughMode::Mono);
        assert!(pt.composition_layer().is_some());
        assert!(matches!(
            runtime.last_style().unwrap().color_map,
            Some(PassthroughColorMap::MonoToMono(_))
        ));

        pt.stop().unwrap();
        assert_eq!(pt.mode(), PassthroughMode::Stopped);
    }

    #[test]
    fn test_failed_calls_keep_mode() {
        let runtime = Arc::new(DummyRuntime::new());
        let mut provider = provider(&runtime);
        let pt = passthrough(&mut provider);

        runtime.fail_next(DummyVerb::PassthroughStart, XrCode::ERROR_RUNTIME_FAILURE);
        assert!(pt.start().is_err());
        assert_eq!(pt.mode(), PassthroughMode::Stopped);

        pt.start().unwrap();
        runtime.fail_next(DummyVerb::LayerResume, XrCode::ERROR_RUNTIME_FAILURE);
        assert!(pt.set_mode_default().is_err());
        assert_eq!(pt.mode(), PassthroughMode::Started);

        pt.set_mode_bcs(0.0, 1.0, 1.5).unwrap();
        runtime.fail_next(DummyVerb::LayerSetStyle, XrCode::ERROR_RUNTIME_FAILURE);
        assert!(pt.set_mode_color_map(false, true, false, 1.0).is_err());
        assert_eq!(pt.mode(), PassthroughMode::Bcs);

        runtime.fail_next(DummyVerb::PassthroughPause, XrCode::ERROR_RUNTIME_FAILURE);
        assert!(pt.stop().is_err());
        assert_eq!(pt.mode(), PassthroughMode::Bcs);
    }

    #[test]
    fn test_style_auto_starts() {
        let runtime = Arc::new(DummyRuntime::new());
        let mut provider = provider(&runtime);
        let pt = passthrough(&mut provider);
        pt.set_mode_default().unwrap();
        assert_eq!(pt.mode(), PassthroughMode::Default);
        assert!(runtime.call_log().contains(&"passthrough_start".to_string()));
    }

    #[test]
    fn test_failed_auto_start_style_rolls_back() {
        let runtime = Arc::new(DummyRuntime::new());
        let mut provider = provider(&runtime);
        let pt = passthrough(&mut provider);
        runtime.fail_next(DummyVerb::LayerSetStyle, XrCode::ERROR_RUNTIME_FAILURE);
        assert!(pt.set_mode_default().is_err());
        assert_eq!(pt.mode(), PassthroughMode::Stopped);
    }

    #[test]
    fn test_params_reapplied_when_styled() {
        let runtime = Arc::new(DummyRuntime::new());
        let mut provider = provider(&runtime);
        let pt = passthrough(&mut provider);
        pt.set_params(2.0, Color4f::TRANSPARENT).unwrap();
        assert_eq!(pt.opacity(), 1.0);
        assert!(runtime.last_style().is_none());

        pt.set_mode_color_map(true, false, false, 0.5).unwrap();
        let edge = Color4f {
            r: 1.0,
            g: 1.0,
            b: 0.0,
            a: 0.5,
        };
        pt.set_params(0.25, edge).unwrap();
        let style = runtime.last_style().unwrap();
        assert_eq!(style.opacity, 0.25);
        assert_eq!(style.edge_color, edge);
        assert!(matches!(style.color_map, Some(PassthroughColorMap::MonoToRgba(_))));
    }

    #[test]
    fn test_layer_submitted_with_frame() {
        let runtime = Arc::new(DummyRuntime::new());
        let mut provider = provider(&runtime);
        passthrough(&mut provider).set_mode_default().unwrap();
        let layer = passthrough(&mut provider).composition_layer().unwrap();

        let session = provider.session_mut().unwrap();
        session
            .begin(crate::types::ViewConfiguration::PrimaryStereo)
            .unwrap();
        session.wait_frame().unwrap();
        session.begin_frame().unwrap();
        session
            .end_frame(&[layer], crate::types::BlendMode::AlphaBlend)
            .unwrap();
        assert_eq!(runtime.last_layers(), vec![layer]);
    }
}
