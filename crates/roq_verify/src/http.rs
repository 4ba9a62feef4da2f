//! Templated HTTP request strategy.

use std::collections::HashMap;
use std::error::Error as _;

use roq_core::template::{KEY_VAR, USER_AGENT_VAR};
use roq_core::{Auth, HttpMethod, HttpSpec, ResponseSpec, Verdict, flatten, random_user_agent, render};
use reqwest::header::AUTHORIZATION;
use serde_json::{Map, Value};
#[cfg(feature = "tracing")]
use tracing::{debug, trace};

const FAILED_TO_CREATE_REQUEST: &str = "failed to create request";
const INVALID_RESPONSE_FORMAT: &str = "invalid response format";
const INVALID_KEY: &str = "invalid key";

/// Sends the request described by `spec` for `credential` and interprets the
/// response. Every failure mode ends in a verdict rather than an error.
pub(crate) async fn verify_http(client: &reqwest::Client, spec: &HttpSpec, credential: &str) -> Verdict {
    let request = match build_request(client, spec, credential) {
        Ok(request) => request,
        Err(e) => {
            #[cfg(feature = "tracing")]
            debug!(error = %e.without_url(), "could not build request");
            #[cfg(not(feature = "tracing"))]
            let _ = e;
            return Verdict::invalid(FAILED_TO_CREATE_REQUEST);
        }
    };

    #[cfg(feature = "tracing")]
    debug!(
        method = %spec.method,
        host = request.url().host_str().unwrap_or_default(),
        "sending verification request"
    );

    let response = match client.execute(request).await {
        Ok(response) => response,
        Err(e) => return Verdict::invalid(format!("request failed: {}", error_chain(e))),
    };

    let status = response.status().as_u16();

    #[cfg(feature = "tracing")]
    debug!(status, expected = spec.success_status, "received response");

    if status != spec.success_status {
        return Verdict::invalid(format!("invalid (http {status})"));
    }

    if !spec.response.inspects_body() {
        return Verdict::valid(None);
    }

    // An unreadable body is treated like an unparseable one.
    let body = response.bytes().await.unwrap_or_default();
    interpret_body(&spec.response, &body)
}

fn build_request(client: &reqwest::Client, spec: &HttpSpec, credential: &str) -> reqwest::Result<reqwest::Request> {
    let key_vars = HashMap::from([(KEY_VAR, credential)]);
    let url = render(&spec.url, &key_vars);

    let mut builder = client.request(to_reqwest_method(spec.method), url);

    let basic_auth = matches!(spec.auth, Auth::Basic { .. });

    for (name, template) in &spec.headers {
        // Basic credentials replace an explicit Authorization header.
        if basic_auth && name.eq_ignore_ascii_case(AUTHORIZATION.as_str()) {
            continue;
        }
        let vars = HashMap::from([(KEY_VAR, credential), (USER_AGENT_VAR, random_user_agent())]);
        builder = builder.header(name.as_ref(), render(template, &vars));
    }

    if let Auth::Basic { username, password } = &spec.auth {
        builder = builder.basic_auth(render(username, &key_vars), Some(render(password, &key_vars)));
    }

    builder.build()
}

const fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
    }
}

/// Decides validity from a response body that arrived with the success status.
///
/// An error field with a non-empty string value always wins. Otherwise a
/// configured success field must be boolean `true`; without one, any declared
/// field present in the flattened body is enough.
pub(crate) fn interpret_body(response: &ResponseSpec, body: &[u8]) -> Verdict {
    let Ok(object) = serde_json::from_slice::<Map<String, Value>>(body) else {
        return Verdict::invalid(INVALID_RESPONSE_FORMAT);
    };

    if let Some(message) = error_message(response, &object) {
        return Verdict::invalid(message.to_lowercase());
    }

    let flattened = flatten(&object);

    let accepted = match response.success_field.as_deref() {
        Some(field) => object.get(field).and_then(Value::as_bool) == Some(true),
        None => response.fields.iter().any(|f| flattened.contains_key(f.as_ref())),
    };

    #[cfg(feature = "tracing")]
    trace!(accepted, fields = flattened.len(), "interpreted response body");

    if !accepted {
        return Verdict::invalid(INVALID_KEY);
    }

    let details = response
        .details_format
        .as_deref()
        .map(|format| render(format, &flattened));
    Verdict::valid(details)
}

fn error_message<'a>(response: &ResponseSpec, object: &'a Map<String, Value>) -> Option<&'a str> {
    let field = response.error_field.as_deref()?;
    object.get(field).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Formats a transport error with its full source chain.
///
/// The URL is stripped first since templated URLs may carry the credential.
fn error_chain(error: reqwest::Error) -> String {
    let error = error.without_url();
    let mut message = error.to_string();
    let mut source = error.source();

    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.contains(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        source = cause.source();
    }

    message
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use roq_core::ResponseKind;
    use wiremock::matchers::{header, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn json_response(fields: &[&str]) -> ResponseSpec {
        ResponseSpec {
            kind: ResponseKind::Json,
            fields: fields.iter().map(|&f| f.into()).collect(),
            ..ResponseSpec::default()
        }
    }

    fn http_spec(url: String, response: ResponseSpec) -> HttpSpec {
        HttpSpec {
            method: HttpMethod::Get,
            url: url.into(),
            headers: BTreeMap::new(),
            auth: Auth::None,
            success_status: 200,
            response,
        }
    }

    fn create_test_client() -> reqwest::Client {
        reqwest::Client::builder().build().unwrap()
    }

    #[test]
    fn presence_of_declared_field_is_valid() {
        let mut response = json_response(&["login"]);
        response.details_format = Some("user: {{.login}}".into());

        let verdict = interpret_body(&response, br#"{"login":"octocat","name":"The Octocat"}"#);

        assert_eq!(verdict, Verdict::valid(Some("user: octocat".into())));
    }

    #[test]
    fn absence_of_declared_fields_is_invalid() {
        let verdict = interpret_body(&json_response(&["login"]), br#"{"message":"Bad credentials"}"#);
        assert_eq!(verdict, Verdict::invalid("invalid key"));
    }

    #[test]
    fn presence_check_sees_nested_string_fields() {
        let mut response = json_response(&["account.email"]);
        response.details_format = Some(r#"email: {{index . "account.email"}}"#.into());

        let verdict = interpret_body(&response, br#"{"account":{"email":"a@example.com","droplet_limit":25}}"#);

        assert_eq!(verdict.details.as_deref(), Some("email: a@example.com"));
        assert!(verdict.valid);
    }

    #[test]
    fn presence_check_ignores_non_string_nested_fields() {
        let verdict = interpret_body(&json_response(&["account.limit"]), br#"{"account":{"limit":25}}"#);
        assert!(!verdict.valid);
    }

    #[test]
    fn non_json_body_is_invalid_response_format() {
        let verdict = interpret_body(&json_response(&["login"]), b"<html>ok</html>");
        assert_eq!(verdict, Verdict::invalid("invalid response format"));
    }

    #[test]
    fn json_array_body_is_invalid_response_format() {
        let verdict = interpret_body(&json_response(&["login"]), br#"[{"login":"octocat"}]"#);
        assert_eq!(verdict.message, "invalid response format");
    }

    #[test]
    fn success_field_true_is_valid() {
        let mut response = json_response(&["ok"]);
        response.success_field = Some("ok".into());
        response.details_format = Some("team: {{.team}}".into());

        let verdict = interpret_body(&response, br#"{"ok":true,"team":"Acme"}"#);

        assert_eq!(verdict, Verdict::valid(Some("team: Acme".into())));
    }

    #[test]
    fn success_field_false_or_missing_is_invalid() {
        let mut response = json_response(&["ok"]);
        response.success_field = Some("ok".into());

        assert_eq!(interpret_body(&response, br#"{"ok":false}"#).message, "invalid key");
        assert_eq!(interpret_body(&response, br#"{"team":"Acme"}"#).message, "invalid key");
        assert_eq!(interpret_body(&response, br#"{"ok":"true"}"#).message, "invalid key");
    }

    #[test]
    fn error_field_wins_over_success_field() {
        let mut response = json_response(&["ok"]);
        response.success_field = Some("ok".into());
        response.error_field = Some("error".into());

        let verdict = interpret_body(&response, br#"{"ok":true,"error":"Invalid_Auth"}"#);

        assert_eq!(verdict, Verdict::invalid("invalid_auth"));
    }

    #[test]
    fn error_field_wins_over_field_presence() {
        let mut response = json_response(&["results"]);
        response.error_field = Some("error_message".into());

        let verdict = interpret_body(&response, br#"{"results":[],"error_message":"The provided API key is invalid."}"#);

        assert_eq!(verdict.message, "the provided api key is invalid.");
        assert!(!verdict.valid);
    }

    #[test]
    fn empty_or_non_string_error_field_is_ignored() {
        let mut response = json_response(&["ok"]);
        response.success_field = Some("ok".into());
        response.error_field = Some("error".into());

        assert!(interpret_body(&response, br#"{"ok":true,"error":""}"#).valid);
        assert!(interpret_body(&response, br#"{"ok":true,"error":null}"#).valid);
    }

    #[test]
    fn details_render_non_string_values() {
        let mut response = json_response(&["plan"]);
        response.details_format = Some("plan: {{.plan}}, credits: {{.query_credits}}".into());

        let verdict = interpret_body(&response, br#"{"plan":"dev","query_credits":100}"#);

        assert_eq!(verdict.details.as_deref(), Some("plan: dev, credits: 100"));
    }

    #[test]
    fn details_render_null_and_arrays_as_json_text() {
        let mut response = json_response(&["login"]);
        response.details_format = Some("user: {{.login}}, company: {{.company}}, scopes: {{.scopes}}".into());

        let verdict = interpret_body(&response, br#"{"login":"octocat","company":null,"scopes":["repo","gist"]}"#);

        assert_eq!(
            verdict.details.as_deref(),
            Some(r#"user: octocat, company: null, scopes: ["repo","gist"]"#)
        );
    }

    #[tokio::test]
    async fn matching_status_with_raw_response_is_valid() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let spec = http_spec(format!("{}/v1/models", server.uri()), ResponseSpec::default());
        let verdict = verify_http(&create_test_client(), &spec, "sk-test").await;

        assert_eq!(verdict, Verdict::valid(None));
    }

    #[tokio::test]
    async fn mismatched_status_is_invalid_with_code() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let spec = http_spec(format!("{}/user", server.uri()), json_response(&["login"]));
        let verdict = verify_http(&create_test_client(), &spec, "ghp_test").await;

        assert_eq!(verdict, Verdict::invalid("invalid (http 401)"));
    }

    #[tokio::test]
    async fn credential_is_rendered_into_url_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api-info"))
            .and(query_param("key", "abc123"))
            .and(header("Authorization", "token abc123"))
            .and(header_exists("User-Agent"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut spec = http_spec(format!("{}/api-info?key={{{{.Key}}}}", server.uri()), ResponseSpec::default());
        spec.headers.insert("Authorization".into(), "token {{.Key}}".into());
        spec.headers.insert("User-Agent".into(), "{{.UserAgent}}".into());

        let verdict = verify_http(&create_test_client(), &spec, "abc123").await;

        assert!(verdict.valid);
    }

    #[tokio::test]
    async fn basic_auth_is_applied() {
        let server = MockServer::start().await;
        // api:key-123
        Mock::given(method("GET"))
            .and(header("Authorization", "Basic YXBpOmtleS0xMjM="))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let mut spec = http_spec(format!("{}/v3/domains", server.uri()), ResponseSpec::default());
        spec.auth = Auth::Basic {
            username: "api".into(),
            password: "{{.Key}}".into(),
        };

        let verdict = verify_http(&create_test_client(), &spec, "key-123").await;

        assert!(verdict.valid, "unexpected verdict: {verdict:?}");
    }

    #[tokio::test]
    async fn basic_auth_replaces_authorization_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("Authorization", "Basic YXBpOmtleS0xMjM="))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let mut spec = http_spec(format!("{}/v3/domains", server.uri()), ResponseSpec::default());
        spec.headers.insert("authorization".into(), "token {{.Key}}".into());
        spec.headers.insert("X-Api-Key".into(), "{{.Key}}".into());
        spec.auth = Auth::Basic {
            username: "api".into(),
            password: "{{.Key}}".into(),
        };

        let verdict = verify_http(&create_test_client(), &spec, "key-123").await;

        assert!(verdict.valid, "unexpected verdict: {verdict:?}");
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].headers.get_all("authorization").iter().count(), 1);
        assert_eq!(requests[0].headers.get("x-api-key").unwrap(), "key-123");
    }

    #[tokio::test]
    async fn post_method_is_used() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth.test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let mut response = json_response(&["ok"]);
        response.success_field = Some("ok".into());
        let mut spec = http_spec(format!("{}/api/auth.test", server.uri()), response);
        spec.method = HttpMethod::Post;

        let verdict = verify_http(&create_test_client(), &spec, "xoxb-test").await;

        assert_eq!(verdict, Verdict::valid(None));
    }

    #[tokio::test]
    async fn unparseable_url_fails_to_create_request() {
        let spec = http_spec("{{.Domain}}/api".into(), ResponseSpec::default());
        let verdict = verify_http(&create_test_client(), &spec, "abc").await;
        assert_eq!(verdict, Verdict::invalid("failed to create request"));
    }

    #[tokio::test]
    async fn invalid_header_value_fails_to_create_request() {
        let mut spec = http_spec("https://example.com".into(), ResponseSpec::default());
        spec.headers.insert("Authorization".into(), "Bearer {{.Key}}".into());

        let verdict = verify_http(&create_test_client(), &spec, "bad\nkey").await;

        assert_eq!(verdict.message, "failed to create request");
    }

    #[tokio::test]
    async fn connection_failure_is_request_failed() {
        // Nothing listens on port 1.
        let spec = http_spec("http://127.0.0.1:1/user?key={{.Key}}".into(), ResponseSpec::default());
        let verdict = verify_http(&create_test_client(), &spec, "supersecretvalue").await;

        assert!(!verdict.valid);
        assert!(verdict.message.starts_with("request failed: "), "{}", verdict.message);
        assert!(!verdict.message.contains("supersecretvalue"));
        assert!(verdict.details.is_none());
    }
}
