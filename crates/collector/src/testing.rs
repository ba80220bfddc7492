//! In-memory page session used by the collector tests.

use browser::{BrowserError, CloseOnce, NetworkResponse, PageSession, ResponseCallback};
use std::cell::Cell;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

pub const LISTING_URL: &str = "https://www.tiktok.com/api/post/item_list/?aid=1988&count=35";

#[derive(Debug, Clone)]
pub struct FakeResponse {
    url: String,
    body: Option<String>,
    reads: Cell<usize>,
}

impl FakeResponse {
    pub fn new(url: &str, body: &str) -> Self {
        Self {
            url: url.to_string(),
            body: Some(body.to_string()),
            reads: Cell::new(0),
        }
    }

    pub fn unreadable(url: &str) -> Self {
        Self {
            url: url.to_string(),
            body: None,
            reads: Cell::new(0),
        }
    }

    /// A listing response carrying entries with the given ids.
    pub fn listing(ids: &[u64]) -> Self {
        let items: Vec<String> = ids
            .iter()
            .map(|id| format!(r#"{{"id":"{}","desc":"video {}","stats":{{"playCount":{}}}}}"#, id, id, id * 100))
            .collect();
        Self::new(LISTING_URL, &format!(r#"{{"itemList":[{}],"hasMore":true}}"#, items.join(",")))
    }

    pub fn last_listing(ids: &[u64]) -> Self {
        let mut response = Self::listing(ids);
        response.body = response
            .body
            .map(|body| body.replace(r#""hasMore":true"#, r#""hasMore":false"#));
        response
    }

    pub fn body_reads(&self) -> usize {
        self.reads.get()
    }
}

impl NetworkResponse for FakeResponse {
    fn url(&self) -> &str {
        &self.url
    }

    fn body(&self) -> Result<String, BrowserError> {
        self.reads.set(self.reads.get() + 1);
        self.body
            .clone()
            .ok_or_else(|| BrowserError::BodyUnavailable("No resource with given identifier found".to_string()))
    }
}

/// Emits scripted responses: one batch on navigation, then one batch per scroll.
#[derive(Default)]
pub struct FakePage {
    callback: Mutex<Option<ResponseCallback>>,
    on_navigate: Mutex<Vec<FakeResponse>>,
    on_scroll: Mutex<VecDeque<Vec<FakeResponse>>>,
    scrolls: AtomicUsize,
    closed: CloseOnce,
    closes: AtomicUsize,
    fail_navigation: AtomicBool,
    fail_scrolls: AtomicBool,
    fail_registration: AtomicBool,
}

impl FakePage {
    pub fn new(on_navigate: Vec<FakeResponse>, on_scroll: Vec<Vec<FakeResponse>>) -> Self {
        Self {
            on_navigate: Mutex::new(on_navigate),
            on_scroll: Mutex::new(on_scroll.into()),
            ..Self::default()
        }
    }

    pub fn failing_navigation(self) -> Self {
        self.fail_navigation.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_scrolls(self) -> Self {
        self.fail_scrolls.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_registration(self) -> Self {
        self.fail_registration.store(true, Ordering::SeqCst);
        self
    }

    pub fn emit(&self, response: &dyn NetworkResponse) {
        if let Some(callback) = self.callback.lock().unwrap().as_ref() {
            callback(response);
        }
    }

    pub fn scrolls(&self) -> usize {
        self.scrolls.load(Ordering::SeqCst)
    }

    /// Number of teardowns actually performed.
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl PageSession for FakePage {
    fn on_response(&self, callback: ResponseCallback) -> Result<(), BrowserError> {
        if self.fail_registration.load(Ordering::SeqCst) {
            return Err(BrowserError::LaunchFailed("Network.enable failed".to_string()));
        }
        *self.callback.lock().unwrap() = Some(callback);
        Ok(())
    }

    fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        let batch = std::mem::take(&mut *self.on_navigate.lock().unwrap());
        for response in &batch {
            self.emit(response);
        }
        if self.fail_navigation.load(Ordering::SeqCst) {
            return Err(BrowserError::NavigationError(format!("net::ERR_NAME_NOT_RESOLVED at {}", url)));
        }
        Ok(())
    }

    fn scroll_by(&self, _delta_y: i64) -> Result<(), BrowserError> {
        self.scrolls.fetch_add(1, Ordering::SeqCst);
        if self.fail_scrolls.load(Ordering::SeqCst) {
            return Err(BrowserError::NavigationError("Target closed".to_string()));
        }
        let batch = self.on_scroll.lock().unwrap().pop_front().unwrap_or_default();
        for response in &batch {
            self.emit(response);
        }
        Ok(())
    }

    fn close(&self) -> Result<(), BrowserError> {
        if !self.closed.begin() {
            return Ok(());
        }
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.callback.lock().unwrap().take();
        Ok(())
    }
}
