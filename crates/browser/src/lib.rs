use base64::{engine::general_purpose::STANDARD, Engine as _};
use headless_chrome::protocol::cdp::Network::events::ResponseReceivedEventParams;
use headless_chrome::protocol::cdp::Network::GetResponseBodyReturnObject;
use headless_chrome::Browser as ChromeBrowser;
use headless_chrome::{LaunchOptions, Tab};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

const RESPONSE_HANDLER_NAME: &str = "video-collector";
const BODY_FETCH_ATTEMPTS: u32 = 3;
const BODY_FETCH_BACKOFF: Duration = Duration::from_millis(300);

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),
    #[error("Navigation error: {0}")]
    NavigationError(String),
    #[error("Failed to read response body: {0}")]
    BodyUnavailable(String),
    #[error("Browser error: {0}")]
    BrowserError(#[from] anyhow::Error),
}

/// A network response observed on a page. The body is only fetched when asked for.
pub trait NetworkResponse {
    fn url(&self) -> &str;
    fn body(&self) -> Result<String, BrowserError>;
}

pub type ResponseCallback = Box<dyn Fn(&dyn NetworkResponse) + Send + Sync>;

/// The capabilities the collector needs from an open page.
///
/// Response callbacks run on whatever thread the browser delivers events on,
/// so they must not touch state owned by the caller directly.
pub trait PageSession: Send + Sync {
    fn on_response(&self, callback: ResponseCallback) -> Result<(), BrowserError>;
    fn navigate(&self, url: &str) -> Result<(), BrowserError>;
    fn scroll_by(&self, delta_y: i64) -> Result<(), BrowserError>;
    /// Closes the page. Calling it more than once is not an error.
    fn close(&self) -> Result<(), BrowserError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchSettings {
    pub headless: bool,
    pub window_size: (u32, u32),
    pub idle_timeout_secs: u64,
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self {
            headless: false,
            window_size: (1920, 1080),
            idle_timeout_secs: 300,
        }
    }
}

/// Lets exactly one caller perform a teardown; later callers see `false`.
#[derive(Debug, Default)]
pub struct CloseOnce(AtomicBool);

impl CloseOnce {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` for the first caller only.
    pub fn begin(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }
}

pub struct ChromeSession {
    // Dropping the browser kills the Chrome process, so it lives as long as the tab.
    _browser: ChromeBrowser,
    tab: Arc<Tab>,
    closed: CloseOnce,
}

impl ChromeSession {
    pub fn launch(settings: &LaunchSettings) -> Result<Self, BrowserError> {
        let launch_options = LaunchOptions::default_builder()
            .headless(settings.headless)
            .window_size(Some(settings.window_size))
            .idle_browser_timeout(Duration::from_secs(settings.idle_timeout_secs))
            .build()
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        let browser = ChromeBrowser::new(launch_options)
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        let tab = browser
            .new_tab()
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        if settings.headless {
            info!("Headless browser launched successfully");
        } else {
            info!("Browser launched successfully");
        }

        Ok(Self {
            _browser: browser,
            tab,
            closed: CloseOnce::new(),
        })
    }
}

impl PageSession for ChromeSession {
    fn on_response(&self, callback: ResponseCallback) -> Result<(), BrowserError> {
        self.tab
            .register_response_handling(
                RESPONSE_HANDLER_NAME,
                Box::new(
                    move |params: ResponseReceivedEventParams,
                          fetch_body: &dyn Fn() -> anyhow::Result<GetResponseBodyReturnObject>| {
                        let response = ChromeResponse {
                            url: params.response.url,
                            fetch_body,
                        };
                        callback(&response);
                    },
                ),
            )
            .map_err(|e| BrowserError::BrowserError(anyhow::anyhow!(e.to_string())))?;
        debug!("Response handler registered");
        Ok(())
    }

    fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        info!("Navigating to: {}", url);

        self.tab
            .navigate_to(url)
            .map_err(|e| BrowserError::NavigationError(e.to_string()))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| BrowserError::NavigationError(e.to_string()))?;

        debug!("Navigation complete");
        Ok(())
    }

    fn scroll_by(&self, delta_y: i64) -> Result<(), BrowserError> {
        let script = format!("window.scrollBy(0, {});", delta_y);
        self.tab
            .evaluate(&script, false)
            .map_err(|e| BrowserError::BrowserError(anyhow::anyhow!(e.to_string())))?;
        Ok(())
    }

    fn close(&self) -> Result<(), BrowserError> {
        if !self.closed.begin() {
            debug!("Session already closed");
            return Ok(());
        }

        if let Err(e) = self.tab.deregister_response_handling(RESPONSE_HANDLER_NAME) {
            warn!("Failed to deregister response handler: {}", e);
        }
        self.tab
            .close(true)
            .map_err(|e| BrowserError::BrowserError(anyhow::anyhow!(e.to_string())))?;

        info!("Browser session closed");
        Ok(())
    }
}

struct ChromeResponse<'a> {
    url: String,
    fetch_body: &'a dyn Fn() -> anyhow::Result<GetResponseBodyReturnObject>,
}

impl NetworkResponse for ChromeResponse<'_> {
    fn url(&self) -> &str {
        &self.url
    }

    fn body(&self) -> Result<String, BrowserError> {
        // The response event can arrive before the body finished loading.
        let mut last_error = String::new();
        for attempt in 1..=BODY_FETCH_ATTEMPTS {
            match (self.fetch_body)() {
                Ok(object) => return decode_body(object),
                Err(e) => {
                    debug!("Body fetch attempt {} for {} failed: {}", attempt, self.url, e);
                    last_error = e.to_string();
                    if attempt < BODY_FETCH_ATTEMPTS {
                        std::thread::sleep(BODY_FETCH_BACKOFF);
                    }
                }
            }
        }
        Err(BrowserError::BodyUnavailable(last_error))
    }
}

fn decode_body(object: GetResponseBodyReturnObject) -> Result<String, BrowserError> {
    if !object.base_64_encoded {
        return Ok(object.body);
    }
    let bytes = STANDARD
        .decode(object.body.as_bytes())
        .map_err(|e| BrowserError::BodyUnavailable(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| BrowserError::BodyUnavailable(e.to_string()))
}
