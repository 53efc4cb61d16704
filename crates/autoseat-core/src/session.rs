//! Agent session state: platform identifiers, cookies and availability.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use strum::Display;

/// Cookie storage for the platform's cookie-based session.
///
/// The platform hands out session cookies progressively (across redirect
/// hops and on later API calls), so the jar is merged after every response
/// and the request header is rendered from it right before every request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    cookies: BTreeMap<String, String>,
}

impl CookieJar {
    /// Creates an empty jar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a single cookie.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.cookies.insert(name.into(), value.into());
    }

    /// Inserts a cookie given as `name=value`. Returns false when malformed.
    pub fn insert_pair(&mut self, pair: &str) -> bool {
        match pair.split_once('=') {
            Some((name, value)) if !name.trim().is_empty() => {
                self.insert(name.trim(), value.trim());
                true
            }
            _ => false,
        }
    }

    /// Merges one `Set-Cookie` header value into the jar.
    ///
    /// Attributes after the first `;` are ignored except `Max-Age=0`, which
    /// (like an empty value) removes the cookie.
    pub fn merge_set_cookie(&mut self, header: &str) {
        let mut parts = header.split(';');
        let Some((name, value)) = parts.next().and_then(|p| p.split_once('=')) else {
            return;
        };
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        let value = value.trim().trim_matches('"');

        let expired = parts.any(|attr| {
            attr.split_once('=').is_some_and(|(key, val)| {
                key.trim().eq_ignore_ascii_case("max-age") && val.trim() == "0"
            })
        });

        if expired || value.is_empty() {
            self.cookies.remove(name);
        } else {
            self.cookies.insert(name.to_string(), value.to_string());
        }
    }

    /// Returns a cookie value by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Renders the `Cookie` request header, or `None` for an empty jar.
    pub fn header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// Whether the agent currently receives calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum Availability {
    #[default]
    NotReady,
    Available,
}

/// One logged-in automation run.
///
/// Owned by the call-session controller and passed explicitly into every
/// client and driver operation, which update it in place right after each
/// response.
#[derive(Debug, Clone)]
pub struct AgentSession {
    pub session_id: Option<String>,
    pub agent_log_id: Option<String>,
    pub cookies: CookieJar,
    pub availability: Availability,
    pub started_at: DateTime<Utc>,
}

impl Default for AgentSession {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentSession {
    pub fn new() -> Self {
        Self {
            session_id: None,
            agent_log_id: None,
            cookies: CookieJar::new(),
            availability: Availability::NotReady,
            started_at: Utc::now(),
        }
    }

    /// True once both platform identifiers are known.
    pub fn is_established(&self) -> bool {
        self.session_id.is_some() && self.agent_log_id.is_some()
    }

    /// Absorbs session identifiers from a response `data` object.
    ///
    /// Accepts `session_id`, `agent_log_id` and the camel-cased
    /// `agentLogId` the disposition endpoint returns, as strings or numbers.
    /// Returns true when anything changed.
    pub fn absorb_identifiers(&mut self, data: &Value) -> bool {
        let mut changed = false;

        if let Some(session_id) = data.get("session_id").and_then(value_to_id)
            && self.session_id.as_deref() != Some(session_id.as_str())
        {
            self.session_id = Some(session_id);
            changed = true;
        }

        let agent_log_id = data
            .get("agent_log_id")
            .or_else(|| data.get("agentLogId"))
            .and_then(value_to_id);
        if let Some(agent_log_id) = agent_log_id
            && self.agent_log_id.as_deref() != Some(agent_log_id.as_str())
        {
            self.agent_log_id = Some(agent_log_id);
            changed = true;
        }

        changed
    }

    /// Clears the platform identifiers after logout.
    pub fn clear(&mut self) {
        self.session_id = None;
        self.agent_log_id = None;
        self.availability = Availability::NotReady;
    }
}

/// Reads an opaque platform identifier that may arrive as a string or a number.
pub fn value_to_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
