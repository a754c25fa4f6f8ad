use crate::http::{run_onboarding_http_server, AppState, HttpServerConfig};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// HTTP surface of the onboarding service, packaged as a runner process
pub struct OnboardingApi {
    state: AppState,
    config: HttpServerConfig,
}

impl OnboardingApi {
    pub fn new(state: AppState, config: HttpServerConfig) -> Self {
        debug!("Initializing Onboarding API module");
        Self { state, config }
    }

    pub fn into_runner_process(
        self,
    ) -> impl FnOnce(
        CancellationToken,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>,
    > {
        move |ctx| {
            Box::pin(async move { run_onboarding_http_server(self.config, self.state, ctx).await })
        }
    }
}
