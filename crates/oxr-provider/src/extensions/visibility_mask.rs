//! `XR_KHR_visibility_mask`: per-view stencil meshes.

use tracing::{debug, error};

use super::{adapter_common, fns, resolved, Extension, ExtensionAdapter, Resolved};
use crate::context::InstanceContext;
use crate::runtime::VisibilityMaskFns;
use crate::types::{SessionHandle, Vector2f, ViewConfiguration, VisibilityMaskType};
use crate::{ProviderError, ProviderResult};

/// Mesh returned by the runtime for one view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisibilityMaskData {
    pub vertices: Vec<Vector2f>,
    pub indices: Vec<u32>,
}

impl VisibilityMaskData {
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() && self.indices.is_empty()
    }
}

pub struct VisibilityMask {
    session: SessionHandle,
    fns: Resolved<dyn VisibilityMaskFns>,
}

impl VisibilityMask {
    pub fn new(instance: &InstanceContext, session: SessionHandle) -> Self {
        let fns = resolved(
            Extension::VisibilityMask,
            instance.runtime().resolve_visibility_mask(instance.handle()),
        );
        Self { session, fns }
    }

    /// Queries the mask for `view_index` of `view`.
    ///
    /// A runtime with no mask for the view reports zero counts; that comes
    /// back as an empty [`VisibilityMaskData`], not an error.
    pub fn mask(
        &self,
        view: ViewConfiguration,
        view_index: u32,
        mask_type: VisibilityMaskType,
    ) -> ProviderResult<VisibilityMaskData> {
        let fns = fns(&self.fns)?;

        let counts = fns
            .get_visibility_mask(self.session, view, view_index, mask_type, &mut [], &mut [])
            .map_err(|code| {
                error!("unable to query visibility mask counts: {code}");
                ProviderError::Runtime(code)
            })?;
        if counts.vertex_count == 0 && counts.index_count == 0 {
            debug!("runtime has no {mask_type:?} mask for view {view_index} of {view:?}");
            return Ok(VisibilityMaskData::default());
        }

        let mut data = VisibilityMaskData {
            vertices: vec![Vector2f::default(); counts.vertex_count as usize],
            indices: vec![0; counts.index_count as usize],
        };
        let written = fns
            .get_visibility_mask(
                self.session,
                view,
                view_index,
                mask_type,
                &mut data.vertices,
                &mut data.indices,
            )
            .map_err(|code| {
                error!("unable to retrieve visibility mask: {code}");
                ProviderError::Runtime(code)
            })?;
        data.vertices.truncate(written.vertex_count as usize);
        data.indices.truncate(written.index_count as usize);
        Ok(data)
    }
}

impl ExtensionAdapter for VisibilityMask {
    adapter_common!(Extension::VisibilityMask);

    fn init(&mut self) -> ProviderResult<()> {
        if self.session.is_null() {
            return Err(ProviderError::validation("visibility mask needs a session"));
        }
        fns(&self.fns).map(|_| ())
    }
}

impl std::fmt::Debug for VisibilityMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisibilityMask")
            .field("session", &self.session)
            .field("resolved", &self.fns.is_ok())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::code::XrCode;
    use crate::dummy::{DummyRuntime, DummyVerb};
    use crate::extensions::{HEADLESS, VISIBILITY_MASK};
    use crate::provider::{AppInfo, Provider};
    use crate::runtime::GraphicsBinding;
    use crate::session::SessionOptions;

    fn provider(runtime: &Arc<DummyRuntime>) -> Provider {
        let mut provider = Provider::new(runtime.clone());
        provider
            .init(&AppInfo::new("mask-test").with_extensions([HEADLESS, VISIBILITY_MASK]))
            .unwrap();
        provider
            .create_session(&GraphicsBinding::Headless, SessionOptions::default())
            .unwrap();
        provider
    }

    #[test]
    fn test_empty_mask_is_success() {
        let runtime = Arc::new(DummyRuntime::new());
        runtime.set_visibility_mask(Vec::new(), Vec::new());
        let provider = provider(&runtime);
        let mask = provider.extensions().get::<VisibilityMask>().unwrap();
        let data = mask
            .mask(
                ViewConfiguration::PrimaryStereo,
                0,
                VisibilityMaskType::HiddenTriangleMesh,
            )
            .unwrap();
        assert!(data.is_empty());
    }

    #[test]
    fn test_two_call_fetch() {
        let runtime = Arc::new(DummyRuntime::new());
        let vertices = vec![
            Vector2f { x: -1.0, y: -1.0 },
            Vector2f { x: 1.0, y: -1.0 },
            Vector2f { x: 0.0, y: 1.0 },
        ];
        runtime.set_visibility_mask(vertices.clone(), vec![0, 1, 2]);
        let provider = provider(&runtime);
        let mask = provider.extensions().get::<VisibilityMask>().unwrap();
        let data = mask
            .mask(ViewConfiguration::PrimaryStereo, 1, VisibilityMaskType::LineLoop)
            .unwrap();
        assert_eq!(data.vertices, vertices);
        assert_eq!(data.indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_runtime_code_surfaces_unchanged() {
        let runtime = Arc::new(DummyRuntime::new());
        let provider = provider(&runtime);
        let mask = provider.extensions().get::<VisibilityMask>().unwrap();
        runtime.fail_next(DummyVerb::VisibilityMask, XrCode::ERROR_SESSION_LOST);
        let err = mask
            .mask(
                ViewConfiguration::PrimaryStereo,
                0,
                VisibilityMaskType::VisibleTriangleMesh,
            )
            .unwrap_err();
        assert_eq!(err.code(), XrCode::ERROR_SESSION_LOST);
    }
}
