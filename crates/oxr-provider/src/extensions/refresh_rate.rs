//! `XR_FB_display_refresh_rate`

use tracing::{debug, error, info};

use super::{adapter_common, fns, resolved, Extension, ExtensionAdapter, Resolved};
use crate::context::InstanceContext;
use crate::runtime::RefreshRateFns;
use crate::types::SessionHandle;
use crate::{ProviderError, ProviderResult};

pub struct RefreshRate {
    session: SessionHandle,
    fns: Resolved<dyn RefreshRateFns>,
}

impl RefreshRate {
    pub fn new(instance: &InstanceContext, session: SessionHandle) -> Self {
        let fns = resolved(
            Extension::RefreshRate,
            instance.runtime().resolve_refresh_rate(instance.handle()),
        );
        Self { session, fns }
    }

    fn ready(&self) -> ProviderResult<&std::sync::Arc<dyn RefreshRateFns>> {
        if self.session.is_null() {
            return Err(ProviderError::validation("refresh rate needs a session"));
        }
        fns(&self.fns)
    }

    /// Rates the display can run at, in Hz.
    pub fn supported_rates(&self) -> ProviderResult<Vec<f32>> {
        let fns = self.ready()?;
        let count = fns
            .enumerate_refresh_rates(self.session, &mut [])
            .map_err(|code| {
                error!("unable to query refresh rate count: {code}");
                ProviderError::Runtime(code)
            })?;
        let mut rates = vec![0.0; count as usize];
        if rates.is_empty() {
            return Ok(rates);
        }
        let written = fns
            .enumerate_refresh_rates(self.session, &mut rates)
            .map_err(|code| {
                error!("unable to enumerate refresh rates: {code}");
                ProviderError::Runtime(code)
            })?;
        rates.truncate(written as usize);
        debug!("supported refresh rates: {rates:?}");
        Ok(rates)
    }

    pub fn current_rate(&self) -> ProviderResult<f32> {
        let fns = self.ready()?;
        fns.get_refresh_rate(self.session)
            .map_err(ProviderError::Runtime)
    }

    /// Asks for `rate` Hz. Zero lets the runtime choose.
    pub fn request_rate(&self, rate: f32) -> ProviderResult<()> {
        let fns = self.ready()?;
        fns.request_refresh_rate(self.session, rate).map_err(|code| {
            error!("refresh rate {rate} refused: {code}");
            ProviderError::Runtime(code)
        })?;
        info!("refresh rate requested: {rate}");
        Ok(())
    }
}

impl ExtensionAdapter for RefreshRate {
    adapter_common!(Extension::RefreshRate);

    fn init(&mut self) -> ProviderResult<()> {
        fns(&self.fns).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::code::XrCode;
    use crate::extensions::{HEADLESS, REFRESH_RATE};
    use crate::provider::{AppInfo, Provider};
    use crate::runtime::GraphicsBinding;
    use crate::session::SessionOptions;
    use crate::DummyRuntime;

    fn provider(runtime: &Arc<DummyRuntime>) -> Provider {
        let mut provider = Provider::new(runtime.clone());
        provider
            .init(&AppInfo::new("refresh-test").with_extensions([HEADLESS, REFRESH_RATE]))
            .unwrap();
        provider
            .create_session(&GraphicsBinding::Headless, SessionOptions::default())
            .unwrap();
        provider
    }

    #[test]
    fn test_rates_and_request() {
        let runtime = Arc::new(DummyRuntime::new());
        let provider = provider(&runtime);
        let rates = provider.extensions().get::<RefreshRate>().unwrap();
        assert_eq!(rates.supported_rates().unwrap(), vec![72.0, 90.0, 120.0]);
        assert_eq!(rates.current_rate().unwrap(), 90.0);
        rates.request_rate(120.0).unwrap();
        assert_eq!(rates.current_rate().unwrap(), 120.0);
        rates.request_rate(0.0).unwrap();
        assert_eq!(rates.current_rate().unwrap(), 72.0);
    }

    #[test]
    fn test_unsupported_rate_keeps_current() {
        let runtime = Arc::new(DummyRuntime::new());
        let provider = provider(&runtime);
        let rates = provider.extensions().get::<RefreshRate>().unwrap();
        let err = rates.request_rate(61.0).unwrap_err();
        assert!(matches!(err, ProviderError::Runtime(code) if code.is_error()));
        assert_eq!(rates.current_rate().unwrap(), 90.0);
    }

    #[test]
    fn test_no_rates_is_empty() {
        let runtime = Arc::new(DummyRuntime::new());
        runtime.set_refresh_rates(&[]);
        let provider = provider(&runtime);
        let rates = provider.extensions().get::<RefreshRate>().unwrap();
        assert!(rates.supported_rates().unwrap().is_empty());
    }

    #[test]
    fn test_null_session_rejected() {
        let runtime = Arc::new(DummyRuntime::new());
        let provider = provider(&runtime);
        let rates = RefreshRate::new(provider.instance().unwrap(), SessionHandle::NULL);
        assert_eq!(
            rates.current_rate().unwrap_err().code(),
            XrCode::ERROR_VALIDATION_FAILURE
        );
    }
}
