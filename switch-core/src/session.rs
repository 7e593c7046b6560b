//! HTTP plumbing shared by every adapter.
//!
//! Adapters never talk to `reqwest` directly: they build a [`Request`] and hand
//! it to a [`Transport`]. The production transport is [`HttpTransport`], a
//! blocking client with a cookie jar that adapters can also write into (several
//! switches authenticate purely through a client-computed cookie).

use std::sync::Arc;
use std::time::Duration;

use log::{trace, warn};
use reqwest::blocking::Client;
use reqwest::cookie::Jar;
use reqwest::Url;
use serde_json::Value;

use crate::error::Result;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/140.0.0.0 Safari/537.36";
pub(crate) const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7";
pub(crate) const ACCEPT_JSON: &str = "application/json, text/javascript, */*; q=0.01";
pub(crate) const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9,fr;q=0.8";
pub(crate) const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Body {
    Empty,
    Form(Vec<(String, String)>),
    /// Sent verbatim; the caller sets the content type.
    Raw(String),
    Json(Value),
}

#[derive(Clone, Debug)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Body,
    pub timeout: Option<Duration>,
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            body: Body::Empty,
            timeout: None,
        }
    }

    pub fn post(url: impl Into<String>, body: Body) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            headers: Vec::new(),
            body,
            timeout: None,
        }
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Headers a desktop browser sends when navigating the admin pages.
    pub(crate) fn browser(self, referer: impl Into<String>) -> Self {
        self.header("Accept", ACCEPT_HTML)
            .header("Accept-Language", ACCEPT_LANGUAGE)
            .header("Connection", "keep-alive")
            .header("Referer", referer)
            .header("Upgrade-Insecure-Requests", "1")
            .header("User-Agent", USER_AGENT)
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn form_value(&self, name: &str) -> Option<&str> {
        match &self.body {
            Body::Form(fields) => fields
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub body: String,
}

impl Reply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    pub fn json(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }

    pub fn mentions(&self, needle: &str) -> bool {
        self.body.to_lowercase().contains(needle)
    }

    pub fn mentions_any(&self, needles: &[&str]) -> bool {
        let lower = self.body.to_lowercase();
        needles.iter().any(|needle| lower.contains(needle))
    }
}

pub trait Transport: Send + Sync {
    fn send(&self, request: Request) -> Result<Reply>;

    /// Store a cookie for `url`'s host so later requests carry it.
    fn set_cookie(&self, url: &str, name: &str, value: &str);
}

pub struct HttpTransport {
    client: Client,
    jar: Arc<Jar>,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .cookie_provider(jar.clone())
            .danger_accept_invalid_certs(true)
            .timeout(timeout)
            .build()?;
        Ok(Self { client, jar })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: Request) -> Result<Reply> {
        trace!("{:?} {}", request.method, request.url);
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(*name, value);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        builder = match request.body {
            Body::Empty => builder,
            Body::Form(fields) => builder.form(&fields),
            Body::Raw(data) => builder.body(data),
            Body::Json(value) => builder.json(&value),
        };
        let response = builder.send()?;
        let status = response.status().as_u16();
        let body = response.text()?;
        Ok(Reply { status, body })
    }

    fn set_cookie(&self, url: &str, name: &str, value: &str) {
        match Url::parse(url) {
            Ok(parsed) => self
                .jar
                .add_cookie_str(&format!("{}={}; Path=/", name, value), &parsed),
            Err(err) => warn!("cannot set cookie {} for {}: {}", name, url, err),
        }
    }
}

/// Add a scheme when missing and drop trailing slashes.
pub fn normalize_base_url(address: &str) -> String {
    let mut base = address.trim().trim_end_matches('/').to_string();
    if !base.starts_with("http") {
        base = format!("http://{}", base);
    }
    base
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use super::{Method, Reply, Request, Transport};
    use crate::error::Result;

    struct Route {
        method: Method,
        needle: String,
        replies: VecDeque<Reply>,
    }

    /// In-memory transport serving recorded switch responses.
    ///
    /// Routes match when the request URL contains the route's needle; the
    /// longest matching needle wins. Queued replies are consumed in order and
    /// the last one keeps being served. Unrouted requests get a 404.
    #[derive(Default)]
    pub struct ScriptedTransport {
        routes: Mutex<Vec<Route>>,
        requests: Mutex<Vec<Request>>,
        cookies: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedTransport {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn on(&self, method: Method, needle: &str, status: u16, body: &str) -> &Self {
            let mut routes = self.routes.lock().unwrap();
            let reply = Reply::new(status, body);
            match routes
                .iter_mut()
                .find(|route| route.method == method && route.needle == needle)
            {
                Some(route) => route.replies.push_back(reply),
                None => routes.push(Route {
                    method,
                    needle: needle.to_string(),
                    replies: VecDeque::from([reply]),
                }),
            }
            self
        }

        pub fn get(&self, needle: &str, status: u16, body: &str) -> &Self {
            self.on(Method::Get, needle, status, body)
        }

        pub fn post(&self, needle: &str, status: u16, body: &str) -> &Self {
            self.on(Method::Post, needle, status, body)
        }

        pub fn requests(&self) -> Vec<Request> {
            self.requests.lock().unwrap().clone()
        }

        pub fn requests_to(&self, method: Method, needle: &str) -> Vec<Request> {
            self.requests()
                .into_iter()
                .filter(|request| request.method == method && request.url.contains(needle))
                .collect()
        }

        pub fn cookie(&self, name: &str) -> Option<String> {
            self.cookies
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.clone())
        }
    }

    impl Transport for ScriptedTransport {
        fn send(&self, request: Request) -> Result<Reply> {
            self.requests.lock().unwrap().push(request.clone());
            let mut routes = self.routes.lock().unwrap();
            let route = routes
                .iter_mut()
                .filter(|route| route.method == request.method && request.url.contains(&route.needle))
                .max_by_key(|route| route.needle.len());
            let reply = match route {
                Some(route) if route.replies.len() > 1 => route.replies.pop_front(),
                Some(route) => route.replies.front().cloned(),
                None => None,
            };
            Ok(reply.unwrap_or_else(|| Reply::new(404, "")))
        }

        fn set_cookie(&self, _url: &str, name: &str, value: &str) {
            self.cookies
                .lock()
                .unwrap()
                .push((name.to_string(), value.to_string()));
        }
    }
}
