use calarm_caldav::CalDavClient;
use calarm_core::CalarmResult;
use calarm_core::config::CalarmConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    // Unauthenticated template; credentials are bound per request
    caldav: CalDavClient,
}

impl AppState {
    pub fn new(config: &CalarmConfig) -> CalarmResult<Self> {
        Ok(AppState {
            caldav: CalDavClient::from_config(&config.caldav)?,
        })
    }

    /// CalDAV client that forwards the caller's `Authorization` header.
    pub fn caldav(&self, authorization: Option<String>) -> CalDavClient {
        self.caldav.clone().with_authorization(authorization)
    }
}
