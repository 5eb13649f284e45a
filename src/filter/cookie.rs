// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Cookie cache scoped by domain and path
//!
//! Cookies are stored under a `domain + path` key. A lookup visits the
//! domain root and then each `/` boundary of the request path (up to a
//! configurable depth), so a cookie stored for `/api` is sent with
//! `/api/users/1`. Expired cookies are evicted whenever a scope is read, and
//! optionally by a background purge task.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeDelta, TimeZone, Utc};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use url::Url;

use super::{Filter, Next};
use crate::error::{Error, Result};
use crate::http::{headers, Request, Response};

/// Default interval between background purges
pub const DEFAULT_PURGE_INTERVAL: Duration = Duration::from_millis(50);
/// Default number of path boundaries visited per lookup
pub const DEFAULT_DEPTH: usize = 5;

/// A single HTTP cookie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    /// Cookie name
    pub name: String,
    /// Cookie value
    pub value: String,
    /// Domain; empty means the request host
    pub domain: String,
    /// Path; empty means derived from the request path
    pub path: String,
    /// Expiration time (None = never expires)
    pub expires: Option<DateTime<Utc>>,
    /// Seconds to live; negative means delete, zero means unset
    pub max_age: i64,
}

impl Cookie {
    /// Create a new cookie
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: String::new(),
            path: String::new(),
            expires: None,
            max_age: 0,
        }
    }

    /// Set the domain
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    /// Set the path
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set expiration time
    pub fn expires(mut self, expires: DateTime<Utc>) -> Self {
        self.expires = Some(expires);
        self
    }

    /// Set max-age in seconds
    pub fn max_age(mut self, seconds: i64) -> Self {
        self.max_age = seconds;
        self
    }

    /// Whether the cookie has expired at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires.map_or(false, |exp| exp <= now)
    }

    /// Check if the cookie is expired
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Parse a Set-Cookie header value.
    ///
    /// Domain and path are left empty unless the header names them. A
    /// `Max-Age` of zero or less becomes a delete directive.
    pub fn parse(header: &str) -> Option<Self> {
        let mut parts = header.split(';');
        let first = parts.next()?.trim();

        let (name, value) = first.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let mut cookie = Cookie::new(name, value.trim().trim_matches('"'));

        for part in parts {
            let Some((attr, val)) = part.trim().split_once('=') else {
                continue;
            };
            let val = val.trim();
            match attr.trim().to_ascii_lowercase().as_str() {
                "domain" => cookie.domain = val.trim_start_matches('.').to_ascii_lowercase(),
                "path" => cookie.path = val.to_string(),
                "expires" => cookie.expires = parse_cookie_date(val),
                "max-age" => {
                    if let Ok(secs) = val.parse::<i64>() {
                        cookie.max_age = if secs <= 0 { -1 } else { secs };
                    }
                }
                _ => {}
            }
        }

        Some(cookie)
    }

    /// Convert to cookie header format
    pub fn to_header_value(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

fn parse_cookie_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }
    // Netscape format: "Wed, 21-Oct-2015 07:28:00 GMT"
    NaiveDateTime::parse_from_str(value, "%a, %d-%b-%Y %H:%M:%S GMT")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// `now + max_age`, saturating at the latest representable time
fn expiry_after(now: DateTime<Utc>, max_age: i64) -> DateTime<Utc> {
    TimeDelta::try_seconds(max_age)
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Default cookie path for a request path: everything before the last `/`
fn default_path(request_path: &str) -> String {
    match request_path.rfind('/') {
        Some(index) if index > 0 => request_path[..index].to_string(),
        _ => "/".to_string(),
    }
}

/// Cookie cache configuration
#[derive(Debug, Clone)]
pub struct CookieCacheConfig {
    /// Interval between background purges; zero polls continuously
    pub purge_interval: Duration,
    /// Path boundaries visited per lookup, not counting the domain root
    pub depth: usize,
}

impl Default for CookieCacheConfig {
    fn default() -> Self {
        Self {
            purge_interval: DEFAULT_PURGE_INTERVAL,
            depth: DEFAULT_DEPTH,
        }
    }
}

struct Shared {
    entries: Mutex<HashMap<String, Vec<Cookie>>>,
    config: CookieCacheConfig,
    shutdown: CancellationToken,
    purging: AtomicBool,
}

impl Shared {
    /// Collect live cookies stored under `key`, evicting expired ones
    fn collect_scope(
        entries: &mut HashMap<String, Vec<Cookie>>,
        key: &str,
        now: DateTime<Utc>,
        out: &mut Vec<Cookie>,
    ) {
        let Some(list) = entries.get_mut(key) else {
            return;
        };
        let before = list.len();
        list.retain(|c| !c.is_expired_at(now));
        if list.len() != before {
            trace!(key, evicted = before - list.len(), "Evicted expired cookies");
        }
        out.extend(list.iter().cloned());
        if list.is_empty() {
            entries.remove(key);
        }
    }

    fn purge_at(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.lock();
        let mut removed = 0;
        entries.retain(|_, list| {
            let before = list.len();
            list.retain(|c| !c.is_expired_at(now));
            removed += before - list.len();
            !list.is_empty()
        });
        removed
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Thread-safe cookie cache with expiry
#[derive(Clone)]
pub struct CookieCache {
    shared: Arc<Shared>,
}

impl Default for CookieCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CookieCache {
    /// Create a new empty cache
    pub fn new() -> Self {
        Self::with_config(CookieCacheConfig::default())
    }

    pub fn with_config(config: CookieCacheConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                entries: Mutex::new(HashMap::new()),
                config,
                shutdown: CancellationToken::new(),
                purging: AtomicBool::new(false),
            }),
        }
    }

    /// Store `cookie` as set by a response to `url`
    pub fn set(&self, url: &Url, cookie: Cookie) {
        self.set_at(url, cookie, Utc::now());
    }

    /// [`CookieCache::set`] with an explicit clock
    pub fn set_at(&self, url: &Url, mut cookie: Cookie, now: DateTime<Utc>) {
        if cookie.domain.is_empty() {
            cookie.domain = url.host_str().unwrap_or_default().to_ascii_lowercase();
        }
        if cookie.path.is_empty() {
            cookie.path = default_path(url.path());
        }
        if cookie.max_age > 0 && cookie.expires.is_none() {
            cookie.expires = Some(expiry_after(now, cookie.max_age));
        }

        let key = format!("{}{}", cookie.domain, cookie.path);
        let mut entries = self.shared.entries.lock();

        if cookie.max_age < 0 {
            if let Some(list) = entries.get_mut(&key) {
                list.retain(|c| c.name != cookie.name);
                if list.is_empty() {
                    entries.remove(&key);
                }
            }
            debug!(key = %key, name = %cookie.name, "Cookie deleted");
            return;
        }

        let list = entries.entry(key).or_default();
        match list.iter_mut().find(|c| c.name == cookie.name) {
            Some(existing) => *existing = cookie,
            None => list.push(cookie),
        }
    }

    /// Cookies to send with a request to `url`
    pub fn get(&self, url: &Url) -> Vec<Cookie> {
        self.get_at(url, Utc::now())
    }

    /// [`CookieCache::get`] with an explicit clock
    pub fn get_at(&self, url: &Url, now: DateTime<Utc>) -> Vec<Cookie> {
        let domain = url.host_str().unwrap_or_default().to_ascii_lowercase();
        let path = url.path();
        let depth = self.shared.config.depth;

        let mut entries = self.shared.entries.lock();
        let mut found = Vec::new();
        Shared::collect_scope(&mut entries, &format!("{}/", domain), now, &mut found);

        let mut visited = 0;
        for (index, _) in path.match_indices('/').filter(|(i, _)| *i > 0) {
            if visited >= depth {
                break;
            }
            let key = format!("{}{}", domain, &path[..index]);
            Shared::collect_scope(&mut entries, &key, now, &mut found);
            visited += 1;
        }

        found
    }

    /// `Cookie` header value for `url`, if any cookies apply
    pub fn header_value(&self, url: &Url) -> Option<String> {
        let cookies = self.get(url);
        if cookies.is_empty() {
            return None;
        }
        Some(
            cookies
                .iter()
                .map(Cookie::to_header_value)
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Evict every expired cookie now; returns how many were removed
    pub fn purge(&self) -> usize {
        self.shared.purge_at(Utc::now())
    }

    /// Start the background purge task.
    ///
    /// Returns `Ok(false)` if it is already running or the cache has been
    /// closed. Needs a tokio runtime.
    pub fn auto_purge(&self) -> Result<bool> {
        if self.is_closed() {
            return Ok(false);
        }
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Config(format!("cookie purge needs a tokio runtime: {e}")))?;
        if self.shared.purging.swap(true, Ordering::SeqCst) {
            return Ok(false);
        }

        let shared = Arc::downgrade(&self.shared);
        let shutdown = self.shared.shutdown.clone();
        let interval = self.shared.config.purge_interval;
        handle.spawn(purge_loop(shared, shutdown, interval));

        debug!(interval_ms = interval.as_millis() as u64, "Cookie purge started");
        Ok(true)
    }

    /// Stop the background purge. Safe to call any number of times.
    pub fn close(&self) {
        if !self.shared.shutdown.is_cancelled() {
            debug!("Cookie cache closed");
        }
        self.shared.shutdown.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.shutdown.is_cancelled()
    }

    /// Total number of stored cookies, expired or not
    pub fn len(&self) -> usize {
        self.shared.entries.lock().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every cookie
    pub fn clear(&self) {
        self.shared.entries.lock().clear();
    }
}

async fn purge_loop(shared: Weak<Shared>, shutdown: CancellationToken, interval: Duration) {
    loop {
        if interval.is_zero() {
            if shutdown.is_cancelled() {
                break;
            }
            tokio::task::yield_now().await;
        } else {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        let Some(shared) = shared.upgrade() else {
            break;
        };
        let removed = shared.purge_at(Utc::now());
        if removed > 0 {
            trace!(removed, "Purged expired cookies");
        }
    }
    trace!("Cookie purge stopped");
}

impl std::fmt::Debug for CookieCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieCache")
            .field("len", &self.len())
            .field("config", &self.shared.config)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[async_trait]
impl Filter for CookieCache {
    async fn filter(&self, mut request: Request, next: Next<'_>) -> Result<Response> {
        let url = request.url.clone();

        if let Some(cookies) = self.header_value(&url) {
            let value = match request.header_value(headers::COOKIE) {
                Some(existing) if !existing.is_empty() => format!("{}; {}", existing, cookies),
                _ => cookies,
            };
            request.set_header(headers::COOKIE, value)?;
        }

        let response = next.run(request).await?;
        for header in response.set_cookies() {
            match Cookie::parse(header) {
                Some(cookie) => self.set(&url, cookie),
                None => warn!(url = %url, header, "Ignoring malformed Set-Cookie"),
            }
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::testing::{response, MockTransport};
    use crate::filter::FilterChain;
    use reqwest::header::{HeaderMap, HeaderValue};
    use reqwest::StatusCode;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn names(cookies: &[Cookie]) -> Vec<&str> {
        cookies.iter().map(|c| c.name.as_str()).collect()
    }

    fn values(cookies: &[Cookie]) -> Vec<&str> {
        cookies.iter().map(|c| c.value.as_str()).collect()
    }

    #[test]
    fn test_parse_set_cookie() {
        let cookie = Cookie::parse(
            "session=abc123; Path=/api; Domain=.Example.com; Max-Age=60; HttpOnly; Secure",
        )
        .unwrap();
        assert_eq!(cookie.name, "session");
        assert_eq!(cookie.value, "abc123");
        assert_eq!(cookie.path, "/api");
        assert_eq!(cookie.domain, "example.com");
        assert_eq!(cookie.max_age, 60);

        let expires = Cookie::parse("a=1; Expires=Wed, 21 Oct 2015 07:28:00 GMT").unwrap();
        assert_eq!(
            expires.expires,
            Some(Utc.with_ymd_and_hms(2015, 10, 21, 7, 28, 0).unwrap())
        );
        let netscape = Cookie::parse("a=1; expires=Wed, 21-Oct-2015 07:28:00 GMT").unwrap();
        assert_eq!(netscape.expires, expires.expires);

        assert_eq!(Cookie::parse("gone=; Max-Age=0").unwrap().max_age, -1);
        assert!(Cookie::parse("no-equals-sign").is_none());
        assert!(Cookie::parse("=value").is_none());
    }

    #[test]
    fn test_default_path() {
        assert_eq!(default_path(""), "/");
        assert_eq!(default_path("/"), "/");
        assert_eq!(default_path("/page"), "/");
        assert_eq!(default_path("/a/b/page"), "/a/b");
    }

    #[test]
    fn test_max_age_scope_and_expiry() {
        let cache = CookieCache::new();
        let now = Utc::now();
        cache.set_at(
            &url("http://example.com/"),
            Cookie::new("token", "t").path("/test").max_age(1),
            now,
        );

        let deeper = url("http://example.com/test/deeper/page");
        assert_eq!(names(&cache.get_at(&deeper, now)), vec!["token"]);
        assert!(cache
            .get_at(&deeper, now + chrono::Duration::milliseconds(500))
            .iter()
            .any(|c| c.name == "token"));

        assert!(cache
            .get_at(&deeper, now + chrono::Duration::seconds(2))
            .is_empty());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_negative_max_age_deletes() {
        let cache = CookieCache::new();
        let site = url("http://example.com/test/page");
        cache.set(&site, Cookie::new("a", "1"));
        cache.set(&site, Cookie::new("b", "2"));
        assert_eq!(cache.len(), 2);

        cache.set(&site, Cookie::new("a", "").max_age(-1));
        assert_eq!(names(&cache.get(&site)), vec!["b"]);
    }

    #[test]
    fn test_overwrite_in_place() {
        let cache = CookieCache::new();
        let site = url("http://example.com/");
        cache.set(&site, Cookie::new("a", "1"));
        cache.set(&site, Cookie::new("b", "2"));
        cache.set(&site, Cookie::new("a", "3"));

        let cookies = cache.get(&site);
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies[0].value, "3");
    }

    #[test]
    fn test_scopes_accumulate() {
        let cache = CookieCache::new();
        cache.set(&url("http://example.com/"), Cookie::new("id", "root").path("/"));
        cache.set(&url("http://example.com/"), Cookie::new("id", "api").path("/api"));
        cache.set(&url("http://other.com/"), Cookie::new("id", "other"));

        assert_eq!(values(&cache.get(&url("http://example.com/api/users"))), vec!["root", "api"]);

        assert_eq!(values(&cache.get(&url("http://example.com/api/"))), vec!["root", "api"]);
        assert_eq!(values(&cache.get(&url("http://example.com/api"))), vec!["root"]);
        assert_eq!(values(&cache.get(&url("http://example.com/apis"))), vec!["root"]);
    }

    #[test]
    fn test_huge_max_age_saturates() {
        let cache = CookieCache::new();
        let site = url("http://example.com/");
        let cookie = Cookie::parse("a=1; Max-Age=9999999999999999").unwrap();
        assert_eq!(cookie.max_age, 9_999_999_999_999_999);

        cache.set(&site, cookie);
        let stored = cache.get(&site);
        assert_eq!(names(&stored), vec!["a"]);
        assert_eq!(stored[0].expires, Some(DateTime::<Utc>::MAX_UTC));

        let next_year = Utc::now() + chrono::Duration::days(365);
        assert_eq!(expiry_after(next_year, i64::MAX), DateTime::<Utc>::MAX_UTC);
        assert_eq!(
            expiry_after(next_year, 60),
            next_year + chrono::Duration::seconds(60)
        );
    }

    #[test]
    fn test_depth_limit() {
        let cache = CookieCache::with_config(CookieCacheConfig {
            depth: 2,
            ..Default::default()
        });
        let deep = url("http://example.com/a/b/c/d/page");
        cache.set(&deep, Cookie::new("deep", "1"));

        assert!(cache.get(&deep).is_empty());

        let unlimited = CookieCache::new();
        unlimited.set(&deep, Cookie::new("deep", "1"));
        assert_eq!(unlimited.get(&deep).len(), 1);
    }

    #[test]
    fn test_purge_removes_expired() {
        let cache = CookieCache::new();
        let site = url("http://example.com/");
        cache.set(&site, Cookie::new("old", "1").expires(Utc::now() - chrono::Duration::seconds(5)));
        cache.set(&site, Cookie::new("forever", "1"));

        assert_eq!(cache.purge(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_auto_purge_and_close() {
        let cache = CookieCache::with_config(CookieCacheConfig {
            purge_interval: Duration::from_millis(10),
            ..Default::default()
        });
        let site = url("http://example.com/");
        cache.set(&site, Cookie::new("old", "1").expires(Utc::now() - chrono::Duration::seconds(1)));

        assert!(cache.auto_purge().unwrap());
        assert!(!cache.auto_purge().unwrap());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(cache.is_empty());

        cache.close();
        cache.close();
        assert!(cache.is_closed());
        assert!(!cache.auto_purge().unwrap());
    }

    #[test]
    fn test_auto_purge_needs_runtime() {
        let cache = CookieCache::new();
        assert!(matches!(cache.auto_purge(), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_filter_round_trip() {
        let transport = MockTransport::new(|req, index| {
            let mut headers = HeaderMap::new();
            if index == 0 {
                headers.append("set-cookie", HeaderValue::from_static("session=s1; Path=/"));
                headers.append("set-cookie", HeaderValue::from_static("pref=dark"));
            }
            response(req, StatusCode::OK, headers, "")
        });
        let cache = CookieCache::new();
        let mut chain = FilterChain::new();
        chain.add(cache.clone());

        chain
            .run(&transport, Request::get("http://example.com/app/login").unwrap())
            .await
            .unwrap();
        assert_eq!(cache.len(), 2);

        let request = Request::get("http://example.com/app/home")
            .unwrap()
            .header("cookie", "manual=1");
        chain.run(&transport, request).await.unwrap();

        let requests = transport.requests.lock();
        assert!(requests[0].header_value("cookie").is_none());
        assert_eq!(
            requests[1].header_value("cookie"),
            Some("manual=1; session=s1; pref=dark")
        );
    }
}
