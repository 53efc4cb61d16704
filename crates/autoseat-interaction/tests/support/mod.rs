//! Scripted fakes for the HTTP transport and the browser page.

#![allow(dead_code)]

use async_trait::async_trait;
use autoseat_core::config::{BrowserConfig, CampaignConfig, CodesConfig, EndpointsConfig};
use autoseat_core::{AutoseatError, Result};
use autoseat_interaction::{BrowserPage, HttpBody, HttpRequest, HttpResponse, HttpTransport, PlatformClient};
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

pub const BASE_URL: &str = "https://dialer.example.com";

/// Transport answering per-path queues; the last queued response repeats.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<String, VecDeque<HttpResponse>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on(&self, path: &str, response: HttpResponse) -> &Self {
        self.routes
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(response);
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.requests().iter().map(|r| path_of(&r.url)).collect()
    }

    pub fn requests_to(&self, path: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| path_of(&r.url) == path)
            .collect()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let path = path_of(&request.url);
        self.requests.lock().unwrap().push(request);

        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(&path) {
            Some(queue) if queue.len() > 1 => Ok(queue.pop_front().unwrap()),
            Some(queue) if !queue.is_empty() => Ok(queue.front().unwrap().clone()),
            _ => Ok(HttpResponse {
                status: 404,
                headers: vec![],
                body: String::new(),
            }),
        }
    }
}

pub fn path_of(url: &str) -> String {
    reqwest::Url::parse(url).unwrap().path().to_string()
}

pub fn json_response(status: u16, body: Value) -> HttpResponse {
    HttpResponse {
        status,
        headers: vec![("Content-Type".into(), "application/json".into())],
        body: body.to_string(),
    }
}

pub fn ok(data: Value) -> HttpResponse {
    json_response(200, json!({ "success": true, "data": data }))
}

pub fn redirect(location: &str, cookie: &str) -> HttpResponse {
    HttpResponse {
        status: 302,
        headers: vec![
            ("Location".into(), location.into()),
            ("Set-Cookie".into(), format!("{}; Path=/; HttpOnly", cookie)),
        ],
        body: String::new(),
    }
}

pub fn with_cookie(mut response: HttpResponse, cookie: &str) -> HttpResponse {
    response.headers.push(("Set-Cookie".into(), cookie.into()));
    response
}

pub fn json_body(request: &HttpRequest) -> Value {
    match &request.body {
        HttpBody::Json(value) => value.clone(),
        other => panic!("expected JSON body, got {:?}", other),
    }
}

pub fn campaign() -> CampaignConfig {
    CampaignConfig {
        id: "77".into(),
        name: "Spring Outreach".into(),
        ..Default::default()
    }
}

pub fn client(transport: Arc<ScriptedTransport>) -> PlatformClient {
    PlatformClient::new(
        transport,
        BASE_URL,
        EndpointsConfig::default(),
        campaign(),
        CodesConfig::default(),
    )
}

pub fn controls() -> BrowserConfig {
    BrowserConfig::default()
}

/// Page fake: click outcomes per label, a setter result and a live state.
#[derive(Default)]
pub struct FakePage {
    clicks: Mutex<HashMap<String, VecDeque<&'static str>>>,
    setter_result: Mutex<Option<&'static str>>,
    state: Mutex<Value>,
    /// Only read-state scripts containing this text see the state.
    state_filter: Mutex<Option<&'static str>>,
    cookies: Mutex<Vec<(String, String)>>,
    scripts: Mutex<Vec<String>>,
    closed: Mutex<bool>,
    /// Every call fails as if Chrome had gone away.
    disconnected: Mutex<bool>,
}

impl FakePage {
    pub fn new() -> Arc<Self> {
        let page = Self::default();
        *page.state.lock().unwrap() = Value::Null;
        Arc::new(page)
    }

    /// Queues click outcomes for a label; the last one repeats.
    pub fn on_click(&self, label: &str, outcomes: &[&'static str]) {
        self.clicks
            .lock()
            .unwrap()
            .insert(label.to_string(), outcomes.iter().copied().collect());
    }

    pub fn set_setter_result(&self, result: &'static str) {
        *self.setter_result.lock().unwrap() = Some(result);
    }

    pub fn set_state(&self, state: Value) {
        *self.state.lock().unwrap() = state;
    }

    pub fn only_visible_through(&self, fragment: &'static str) {
        *self.state_filter.lock().unwrap() = Some(fragment);
    }

    pub fn set_cookies(&self, cookies: &[(&str, &str)]) {
        *self.cookies.lock().unwrap() = cookies
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect();
    }

    pub fn clicks_on(&self, label: &str) -> usize {
        let literal = Value::String(label.to_string()).to_string();
        self.scripts
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.contains("querySelectorAll") && s.ends_with(&format!("({})", literal)))
            .count()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap()
    }

    pub fn disconnect(&self) {
        *self.disconnected.lock().unwrap() = true;
    }

    fn check_connected(&self) -> Result<()> {
        if *self.disconnected.lock().unwrap() {
            return Err(AutoseatError::browser_disconnected("DevTools connection closed"));
        }
        Ok(())
    }
}

#[async_trait]
impl BrowserPage for FakePage {
    async fn evaluate(&self, expression: &str) -> Result<Value> {
        self.check_connected()?;
        self.scripts.lock().unwrap().push(expression.to_string());

        if expression.contains("querySelectorAll") {
            let mut clicks = self.clicks.lock().unwrap();
            for (label, queue) in clicks.iter_mut() {
                let literal = Value::String(label.clone()).to_string();
                if expression.ends_with(&format!("({})", literal)) {
                    let outcome = if queue.len() > 1 {
                        queue.pop_front().unwrap()
                    } else {
                        queue.front().copied().unwrap_or("missing")
                    };
                    return Ok(json!(outcome));
                }
            }
            return Ok(json!("missing"));
        }

        if expression.contains("changeAvailability(") {
            return Ok(json!(self.setter_result.lock().unwrap().unwrap_or("missing")));
        }

        if expression.contains("currentLeadId") {
            if let Some(fragment) = *self.state_filter.lock().unwrap() {
                if !expression.contains(fragment) {
                    return Ok(Value::Null);
                }
            }
            return Ok(self.state.lock().unwrap().clone());
        }

        Err(AutoseatError::browser("unexpected script"))
    }

    async fn cookies(&self) -> Result<Vec<(String, String)>> {
        self.check_connected()?;
        Ok(self.cookies.lock().unwrap().clone())
    }

    async fn close(&self) -> Result<()> {
        *self.closed.lock().unwrap() = true;
        Ok(())
    }
}
