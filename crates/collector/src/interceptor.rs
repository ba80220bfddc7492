use crate::payload::ItemListPage;
use browser::{BrowserError, NetworkResponse, PageSession};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Path fragment of the paginated listing endpoint.
pub const DEFAULT_ENDPOINT_PATTERN: &str = "/api/post/item_list/";

/// Picks listing-endpoint responses out of the page's traffic.
#[derive(Debug, Clone)]
pub struct ResponseInterceptor {
    pattern: String,
}

impl Default for ResponseInterceptor {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT_PATTERN)
    }
}

impl ResponseInterceptor {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn matches(&self, url: &str) -> bool {
        url.contains(&self.pattern)
    }

    /// Decodes a matching response. Anything that cannot be read or decoded
    /// is reported and dropped.
    pub fn intercept(&self, response: &dyn NetworkResponse) -> Option<ItemListPage> {
        let url = response.url();
        if !self.matches(url) {
            return None;
        }
        debug!("Found listing response: {}", url);

        let body = match response.body() {
            Ok(body) => body,
            Err(e) => {
                warn!("Could not read listing response {}: {}", url, e);
                return None;
            }
        };

        match ItemListPage::decode(&body) {
            Ok(page) => Some(page),
            Err(e) => {
                warn!("Failed to parse listing response {}: {}", url, e);
                None
            }
        }
    }

    /// Forwards every decoded listing payload seen on `page` into `payloads`.
    pub fn attach<P>(
        &self,
        page: &P,
        payloads: mpsc::UnboundedSender<ItemListPage>,
    ) -> Result<(), BrowserError>
    where
        P: PageSession + ?Sized,
    {
        let interceptor = self.clone();
        page.on_response(Box::new(move |response: &dyn NetworkResponse| {
            if let Some(payload) = interceptor.intercept(response) {
                if payloads.send(payload).is_err() {
                    debug!("Collection finished, dropping listing payload");
                }
            }
        }))
    }
}
