//! PlatformClient behavior against a scripted transport.

mod support;

use autoseat_core::{AgentSession, AutoseatError, Availability, CallIdentity, CallRecord};
use autoseat_interaction::{CallDetector, HttpMethod, HttpResponse, PollOutcome, PollingDetector};
use serde_json::json;
use std::time::Duration;
use support::*;

fn established_session() -> AgentSession {
    let mut session = AgentSession::new();
    session.session_id = Some("S-1".into());
    session.agent_log_id = Some("A-1".into());
    session.cookies.insert("SESSION", "abc");
    session
}

#[tokio::test]
async fn test_login_follows_redirects_and_keeps_every_cookie() {
    let transport = ScriptedTransport::new();
    transport
        .on("/login", redirect("/sso/step", "a=1"))
        .on("/sso/step", redirect("https://dialer.example.com/agent", "b=2"))
        .on("/agent", with_cookie(json_response(200, json!({})), "c=3; Path=/"));
    let client = client(transport.clone());
    let mut session = AgentSession::new();

    client.login(&mut session, "agent", "secret").await.unwrap();

    assert_eq!(session.cookies.get("a"), Some("1"));
    assert_eq!(session.cookies.get("b"), Some("2"));
    assert_eq!(session.cookies.get("c"), Some("3"));

    let requests = transport.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0].method, HttpMethod::Post);
    assert_eq!(requests[0].header_value("Cookie"), None);
    assert_eq!(requests[1].method, HttpMethod::Get);
    assert_eq!(requests[1].header_value("Cookie"), Some("a=1"));
    assert_eq!(requests[2].header_value("Cookie"), Some("a=1; b=2"));
}

#[tokio::test]
async fn test_login_without_redirect_is_authentication_error() {
    let transport = ScriptedTransport::new();
    transport.on("/login", json_response(200, json!({ "error": "bad credentials" })));
    let client = client(transport.clone());
    let mut session = AgentSession::new();

    let err = client.login(&mut session, "agent", "wrong").await.unwrap_err();
    assert!(matches!(
        err,
        AutoseatError::Authentication { status: Some(200), .. }
    ));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_login_redirect_without_location_fails() {
    let transport = ScriptedTransport::new();
    transport.on(
        "/login",
        HttpResponse {
            status: 302,
            headers: vec![],
            body: String::new(),
        },
    );
    let client = client(transport);
    let mut session = AgentSession::new();

    let err = client.login(&mut session, "agent", "secret").await.unwrap_err();
    assert!(matches!(err, AutoseatError::Authentication { .. }));
}

#[tokio::test]
async fn test_phone_login_sends_campaign_and_stores_ids() {
    let transport = ScriptedTransport::new();
    transport.on(
        "/api/agent/phone/login",
        ok(json!({ "session_id": "S-9", "agent_log_id": 314 })),
    );
    let client = client(transport.clone());
    let mut session = AgentSession::new();

    client.phone_login(&mut session).await.unwrap();

    assert_eq!(session.session_id.as_deref(), Some("S-9"));
    assert_eq!(session.agent_log_id.as_deref(), Some("314"));
    let body = json_body(&transport.requests()[0]);
    assert_eq!(body["campaign_id"], "77");
    assert_eq!(body["campaign_name"], "Spring Outreach");
    assert_eq!(body["dial_method"], "RATIO");
    assert_eq!(body["channels"], json!(["voice"]));
}

#[tokio::test]
async fn test_phone_login_without_identifiers_fails() {
    let transport = ScriptedTransport::new();
    transport.on("/api/agent/phone/login", ok(json!({})));
    let client = client(transport);
    let mut session = AgentSession::new();

    let err = client.phone_login(&mut session).await.unwrap_err();
    assert!(matches!(err, AutoseatError::PhoneLogin(_)));
}

#[tokio::test]
async fn test_ready_issues_resume_before_availability() {
    let transport = ScriptedTransport::new();
    transport
        .on("/api/agent/resume", ok(json!({})))
        .on("/api/agent/availability", ok(json!({})));
    let client = client(transport.clone());
    let mut session = established_session();

    client.change_availability(&mut session, "1").await.unwrap();

    assert_eq!(
        transport.paths(),
        vec!["/api/agent/resume", "/api/agent/availability"]
    );
    let body = json_body(&transport.requests()[1]);
    assert_eq!(body["availability_code"], "1");
    assert_eq!(body["campaigns"], json!(["77"]));
    assert!(body["uid"].as_str().is_some_and(|uid| !uid.is_empty()));
    assert_eq!(session.availability, Availability::Available);
}

#[tokio::test]
async fn test_failed_resume_does_not_block_availability() {
    let transport = ScriptedTransport::new();
    transport
        .on("/api/agent/resume", json_response(500, json!({})))
        .on("/api/agent/availability", ok(json!({})));
    let client = client(transport.clone());
    let mut session = established_session();

    client.change_availability(&mut session, "1").await.unwrap();

    assert_eq!(transport.requests_to("/api/agent/availability").len(), 1);
    assert_eq!(session.availability, Availability::Available);
}

#[tokio::test]
async fn test_not_ready_skips_resume() {
    let transport = ScriptedTransport::new();
    transport.on("/api/agent/availability", ok(json!({})));
    let client = client(transport.clone());
    let mut session = established_session();
    session.availability = Availability::Available;

    client.change_availability(&mut session, "2").await.unwrap();

    assert_eq!(transport.paths(), vec!["/api/agent/availability"]);
    assert_eq!(session.availability, Availability::NotReady);
}

#[tokio::test]
async fn test_poll_reports_idle_until_a_call_arrives() {
    let transport = ScriptedTransport::new();
    let idle = ok(json!({ "found": 0 }));
    transport
        .on("/api/agent/call/incoming", idle.clone())
        .on("/api/agent/call/incoming", idle.clone())
        .on("/api/agent/call/incoming", idle)
        .on(
            "/api/agent/call/incoming",
            ok(json!({
                "found": 1,
                "info": {
                    "lead_id": 42,
                    "call_log_id": "900",
                    "phone_code": "1",
                    "phone_number": "5551234567",
                    "first_name": "Ada",
                    "last_name": "Lovelace"
                }
            })),
        );
    let client = client(transport.clone());
    let mut session = established_session();

    let mut outcomes = Vec::new();
    for _ in 0..4 {
        outcomes.push(client.poll_for_call(&mut session).await.unwrap());
    }

    assert!(outcomes[..3].iter().all(|o| matches!(o, PollOutcome::Idle)));
    match &outcomes[3] {
        PollOutcome::Found(call) => {
            assert_eq!(call.identity(), CallIdentity::new("42", Some("900".into())));
            assert_eq!(call.display_name(), "Ada Lovelace");
        }
        other => panic!("expected a call, got {:?}", other),
    }
}

#[tokio::test]
async fn test_disposition_rotates_agent_log_id_for_later_requests() {
    let transport = ScriptedTransport::new();
    transport
        .on("/api/agent/call/disposition", ok(json!({ "agentLogId": "9" })))
        .on("/api/agent/call/incoming", ok(json!({ "found": 0 })));
    let client = client(transport.clone());
    let mut session = established_session();
    let call = CallRecord::minimal(CallIdentity::new("42", Some("900".into())));

    client.set_disposition(&mut session, &call, "NC").await.unwrap();
    client.poll_for_call(&mut session).await.unwrap();

    assert_eq!(session.agent_log_id.as_deref(), Some("9"));
    let disposition = &transport.requests()[0];
    assert_eq!(disposition.method, HttpMethod::Put);
    let body = json_body(disposition);
    assert_eq!(body["status"], "NC");
    assert_eq!(body["lead_id"], "42");
    assert_eq!(body["agent_log_id"], "A-1");

    let poll = json_body(&transport.requests_to("/api/agent/call/incoming")[0]);
    assert_eq!(poll["agent_log_id"], "9");
}

#[tokio::test]
async fn test_cookie_header_tracks_jar_changes() {
    let transport = ScriptedTransport::new();
    transport
        .on(
            "/api/agent/call/incoming",
            with_cookie(ok(json!({ "found": 0 })), "XSRF=new; Path=/"),
        )
        .on(
            "/api/agent/call/incoming",
            with_cookie(ok(json!({ "found": 0 })), "SESSION=; Max-Age=0"),
        )
        .on("/api/agent/call/incoming", ok(json!({ "found": 0 })));
    let client = client(transport.clone());
    let mut session = established_session();

    for _ in 0..3 {
        client.poll_for_call(&mut session).await.unwrap();
    }

    let cookies: Vec<_> = transport
        .requests()
        .iter()
        .map(|r| r.header_value("Cookie").map(str::to_string))
        .collect();
    assert_eq!(
        cookies,
        vec![
            Some("SESSION=abc".to_string()),
            Some("SESSION=abc; XSRF=new".to_string()),
            Some("XSRF=new".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_end_call_sends_whole_seconds_and_accepts_nested_ack() {
    let transport = ScriptedTransport::new();
    transport.on("/api/agent/call/hangup", ok(json!({ "ishangup": true })));
    let client = client(transport.clone());
    let mut session = established_session();
    let call = CallRecord::minimal(CallIdentity::new("42", None));

    client
        .end_call(&mut session, &call, Duration::from_millis(30_700))
        .await
        .unwrap();

    let body = json_body(&transport.requests()[0]);
    assert_eq!(body["call_time"], 30);
    assert_eq!(body["term_reason"], "AGENT");
    assert_eq!(body["lead_info"]["lead_id"], "42");
}

#[tokio::test]
async fn test_end_call_without_ack_fails() {
    let transport = ScriptedTransport::new();
    transport.on("/api/agent/call/hangup", ok(json!({ "ishangup": false })));
    let client = client(transport);
    let mut session = established_session();
    let call = CallRecord::minimal(CallIdentity::new("42", None));

    let err = client
        .end_call(&mut session, &call, Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, AutoseatError::Hangup(_)));
}

#[tokio::test]
async fn test_expired_session_surfaces_through_polling_detector() {
    let transport = ScriptedTransport::new();
    transport.on("/api/agent/call/incoming", json_response(401, json!({})));
    let detector = PollingDetector::new(client(transport));
    let mut session = established_session();

    let err = detector.detect(&mut session).await.unwrap_err();
    assert!(err.is_session_expired());
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_transient_poll_failure_reads_as_no_call() {
    let transport = ScriptedTransport::new();
    transport.on("/api/agent/call/incoming", json_response(502, json!({})));
    let detector = PollingDetector::new(client(transport));
    let mut session = established_session();

    assert!(detector.detect(&mut session).await.unwrap().is_none());
}

#[tokio::test]
async fn test_logout_accepts_plain_success_status() {
    let transport = ScriptedTransport::new();
    transport.on(
        "/api/agent/logout",
        HttpResponse {
            status: 204,
            headers: vec![],
            body: String::new(),
        },
    );
    let client = client(transport.clone());
    let mut session = established_session();

    client.logout(&mut session).await.unwrap();

    assert!(!session.is_established());
    let body = json_body(&transport.requests()[0]);
    assert_eq!(body["logout_code"], "1");
    assert_eq!(body["session_id"], "S-1");
}
