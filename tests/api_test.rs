use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt; // for `oneshot`

use subhub::api::{self, state::AppState};
use subhub::config::Config;
use subhub::delivery::{
    ConversionRequest, ConvertError, Converter, SubscriptionService, token::callback_token,
};
use subhub::fetch::{self, FetchError, Orchestrator, SourceFetcher};
use subhub::link::b64;
use subhub::model::{Profile, SettingsOverride, Source, TrafficInfo};
use subhub::observability::Metrics;
use subhub::store::{FjallStore, StoreExport};

const SECRET: &str = "test-callback-secret";

const FEED_A: &str = "https://feed-a.example.com/sub";
const FEED_B: &str = "https://feed-b.example.com/sub";
const LINK_A: &str = "trojan://secret@a.example.com:443#A";
const LINK_B: &str = "trojan://secret@b.example.com:443#B";
const LINK_MANUAL: &str = "trojan://secret@m.example.com:443#M";

/// In-memory feeds; unknown urls answer 404.
#[derive(Default)]
struct StubFetcher {
    bodies: HashMap<String, (String, Duration)>,
}

impl StubFetcher {
    fn with_body(mut self, url: &str, body: &str, delay: Duration) -> Self {
        self.bodies.insert(url.to_string(), (body.to_string(), delay));
        self
    }
}

#[async_trait]
impl SourceFetcher for StubFetcher {
    async fn fetch(&self, url: &str, _user_agent: &str) -> fetch::Result<String> {
        let (body, delay) = self.bodies.get(url).cloned().ok_or(FetchError::Status(404))?;
        tokio::time::sleep(delay).await;
        Ok(body)
    }

    async fn probe(&self, _url: &str, _user_agent: &str) -> fetch::Result<Option<String>> {
        Ok(None)
    }
}

/// Records every conversion and answers with a fixed body or error.
#[derive(Default)]
struct StubConverter {
    requests: Mutex<Vec<ConversionRequest>>,
    fail: bool,
}

impl StubConverter {
    fn failing() -> Self {
        Self { fail: true, ..Default::default() }
    }

    fn requests(&self) -> Vec<ConversionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Converter for StubConverter {
    async fn convert(&self, request: &ConversionRequest) -> Result<String, ConvertError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(ConvertError::Status { status: 500, body: "backend down".into() });
        }
        Ok(format!("converted:{}", request.target))
    }
}

fn source(id: &str, name: &str, url: &str) -> Source {
    Source {
        id: id.to_string(),
        name: name.to_string(),
        url: url.to_string(),
        enabled: true,
        user_info: None,
    }
}

fn default_sources() -> Vec<Source> {
    vec![
        source("manual", "", LINK_MANUAL),
        source("a", "Feed A", FEED_A),
        source("b", "Feed B", FEED_B),
    ]
}

fn default_fetcher() -> StubFetcher {
    StubFetcher::default()
        // Feed A answers last; its links must still come first
        .with_body(FEED_A, &format!("{}\n{}", LINK_A, LINK_MANUAL), Duration::from_millis(50))
        .with_body(FEED_B, LINK_B, Duration::ZERO)
}

/// Settings with source-name prefixing off, so links come back verbatim.
fn plain_settings() -> SettingsOverride {
    SettingsOverride {
        prepend_source_name: Some(false),
        ..Default::default()
    }
}

struct TestApp {
    router: Router,
    converter: Arc<StubConverter>,
    _temp_dir: TempDir,
}

fn create_test_config(temp_dir: &TempDir) -> Config {
    let config_toml = format!(
        r#"
[server]
bind_addr = "127.0.0.1:0"
store_path = "{}"
public_url = "https://hub.example.com"

[fetch]
body_timeout_secs = 2
"#,
        temp_dir.path().join("store").display()
    );

    toml::from_str(&config_toml).expect("Failed to parse test config")
}

fn build_test_app(export: StoreExport, fetcher: StubFetcher, converter: StubConverter) -> TestApp {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(&temp_dir);

    let store = FjallStore::open(&config.server.store_path).expect("Failed to open test store");
    store.import(&export).expect("Failed to seed store");

    let metrics = Arc::new(Metrics::new());
    let orchestrator =
        Orchestrator::new(Arc::new(fetcher), config.fetch.body_timeout(), metrics.clone());
    let converter = Arc::new(converter);
    let service = SubscriptionService::new(
        store,
        orchestrator,
        converter.clone(),
        config.subscription.clone(),
        SECRET,
        metrics.clone(),
    );

    TestApp {
        router: api::router(AppState::new(config, service, metrics)),
        converter,
        _temp_dir: temp_dir,
    }
}

fn default_app(settings: SettingsOverride) -> TestApp {
    let export = StoreExport {
        subscriptions: Some(default_sources()),
        profiles: None,
        settings: Some(settings),
    };
    build_test_app(export, default_fetcher(), StubConverter::default())
}

async fn get(router: &Router, uri: &str, user_agent: &str) -> axum::response::Response {
    let request = Request::builder()
        .uri(uri)
        .header(header::USER_AGENT, user_agent)
        .header(header::HOST, "internal:8080")
        .body(Body::empty())
        .unwrap();
    router.clone().oneshot(request).await.unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

fn decoded_lines(body: &str) -> Vec<String> {
    b64::decode_text(body)
        .expect("body is base64")
        .lines()
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn test_health() {
    let app = default_app(plain_settings());

    let response = get(&app.router, "/health", "curl/8.0").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["components"]["store"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["metrics"]["subscriptions_served"], 0);
}

#[tokio::test]
async fn test_base64_merges_in_source_order() {
    let app = default_app(plain_settings());

    let response = get(&app.router, "/auto?target=base64", "curl/8.0").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store, no-cache");
    assert!(response.headers().get(header::CONTENT_DISPOSITION).is_none());

    let lines = decoded_lines(&body_text(response).await);
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("trojan://00000000-0000-0000-0000-000000000000@127.0.0.1:443#"));
    // manual first, then feeds in source order, the duplicate of the manual link dropped
    assert_eq!(&lines[1..], &[LINK_MANUAL, LINK_A, LINK_B]);
    assert!(app.converter.requests().is_empty());
}

#[tokio::test]
async fn test_source_names_prefixed_by_default() {
    let app = default_app(SettingsOverride::default());

    let response = get(&app.router, "/auto", "v2rayN/6.0").await;
    assert_eq!(response.status(), StatusCode::OK);

    let lines = decoded_lines(&body_text(response).await);
    assert!(lines.iter().any(|l| l.ends_with("#Manual%20-%20M")));
    assert!(lines.iter().any(|l| l.ends_with("#Feed%20A%20-%20A")));
    assert!(lines.iter().any(|l| l.ends_with("#Feed%20B%20-%20B")));
}

#[tokio::test]
async fn test_remaining_traffic_placeholder() {
    let mut sources = default_sources();
    sources[1].user_info = Some(TrafficInfo {
        upload: 0,
        download: 1024 * 1024 * 1024,
        total: 3 * 1024 * 1024 * 1024,
        expire: None,
    });
    let export = StoreExport {
        subscriptions: Some(sources),
        profiles: None,
        settings: Some(plain_settings()),
    };
    let app = build_test_app(export, default_fetcher(), StubConverter::default());

    let response = get(&app.router, "/auto?base64", "curl/8.0").await;
    let lines = decoded_lines(&body_text(response).await);
    assert!(lines[0].ends_with("#Remaining%20Traffic%20%E2%89%AB%202%20GB"));
}

#[tokio::test]
async fn test_callback_short_circuits_converter() {
    let app = default_app(plain_settings());

    let uri = format!("/auto?target=clash&callback_token={}", callback_token(SECRET));
    let response = get(&app.router, &uri, "subconverter").await;
    assert_eq!(response.status(), StatusCode::OK);

    let lines = decoded_lines(&body_text(response).await);
    assert_eq!(&lines[1..], &[LINK_MANUAL, LINK_A, LINK_B]);
    assert!(app.converter.requests().is_empty());
}

#[tokio::test]
async fn test_delegates_to_converter_with_callback() {
    let app = default_app(plain_settings());

    let response = get(&app.router, "/auto", "Surge iOS/3000").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename*=utf-8''SubHub"
    );
    assert_eq!(body_text(response).await, "converted:surge");

    let requests = app.converter.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].target, "surge");
    assert_eq!(
        requests[0].source_url,
        format!(
            "https://hub.example.com/auto?target=base64&callback_token={}",
            callback_token(SECRET)
        )
    );
}

#[tokio::test]
async fn test_load_balance_synthesizes_clash_config() {
    let settings = SettingsOverride {
        load_balance: Some(true),
        load_balance_strategy: Some("consistent-hashing".into()),
        ..plain_settings()
    };
    let app = default_app(settings);

    let response = get(&app.router, "/auto", "clash-verge/1.7").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename*=utf-8''SubHub.yaml"
    );

    let body = body_text(response).await;
    let config: serde_yaml::Value = serde_yaml::from_str(&body).unwrap();
    let proxies = config["proxies"].as_sequence().unwrap();
    assert_eq!(proxies.len(), 3);
    assert!(body.contains("consistent-hashing"));
    assert!(app.converter.requests().is_empty());
}

#[tokio::test]
async fn test_load_balance_with_no_nodes_falls_back_to_converter() {
    let export = StoreExport {
        subscriptions: Some(vec![]),
        profiles: None,
        settings: Some(SettingsOverride { load_balance: Some(true), ..Default::default() }),
    };
    let app = build_test_app(export, StubFetcher::default(), StubConverter::default());

    let response = get(&app.router, "/auto?target=clash", "curl/8.0").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "converted:clash");
    assert_eq!(app.converter.requests().len(), 1);
}

#[tokio::test]
async fn test_failed_source_is_skipped() {
    let export = StoreExport {
        subscriptions: Some(vec![
            source("dead", "Dead", "https://dead.example.com/sub"),
            source("b", "Feed B", FEED_B),
        ]),
        profiles: None,
        settings: Some(plain_settings()),
    };
    let app = build_test_app(export, default_fetcher(), StubConverter::default());

    let response = get(&app.router, "/auto?target=base64", "curl/8.0").await;
    assert_eq!(response.status(), StatusCode::OK);
    let lines = decoded_lines(&body_text(response).await);
    assert_eq!(&lines[1..], &[LINK_B]);
}

#[tokio::test]
async fn test_invalid_token_forbidden() {
    let app = default_app(plain_settings());

    let response = get(&app.router, "/wrong", "curl/8.0").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_query_token_route() {
    let app = default_app(plain_settings());

    let response = get(&app.router, "/?token=auto&target=base64", "curl/8.0").await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = get(&app.router, "/", "curl/8.0").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(&app.router, "/favicon.ico", "curl/8.0").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

fn team_profile() -> Profile {
    Profile {
        id: "p1".to_string(),
        custom_id: Some("team".to_string()),
        name: "Team Nodes".to_string(),
        enabled: true,
        subscriptions: vec!["b".to_string()],
        manual_nodes: vec![],
        sub_converter: None,
        sub_config: None,
    }
}

#[tokio::test]
async fn test_profile_sharing_requires_custom_token() {
    let export = StoreExport {
        subscriptions: Some(default_sources()),
        profiles: Some(vec![team_profile()]),
        settings: Some(plain_settings()),
    };
    let app = build_test_app(export, default_fetcher(), StubConverter::default());

    let response = get(&app.router, "/profiles/team", "curl/8.0").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_profile_subscription() {
    let settings = SettingsOverride {
        profile_token: Some("share".into()),
        ..plain_settings()
    };
    let export = StoreExport {
        subscriptions: Some(default_sources()),
        profiles: Some(vec![team_profile()]),
        settings: Some(settings),
    };
    let app = build_test_app(export, default_fetcher(), StubConverter::default());

    let response = get(&app.router, "/sub/share/team?target=base64", "curl/8.0").await;
    assert_eq!(response.status(), StatusCode::OK);
    let lines = decoded_lines(&body_text(response).await);
    assert_eq!(&lines[1..], &[LINK_B]);

    let response = get(&app.router, "/share/p1", "Surge iOS/3000").await;
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename*=utf-8''Team%20Nodes"
    );
    let requests = app.converter.requests();
    assert!(requests[0].source_url.starts_with("https://hub.example.com/share/p1?target=base64"));

    let response = get(&app.router, "/share/ghost", "curl/8.0").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_missing_converter_is_server_error() {
    let settings = SettingsOverride {
        converter_host: Some(String::new()),
        ..plain_settings()
    };
    let app = default_app(settings);

    let response = get(&app.router, "/auto?target=base64", "curl/8.0").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Subconverter backend is not configured.");
}

#[tokio::test]
async fn test_converter_failure_is_bad_gateway() {
    let export = StoreExport {
        subscriptions: Some(default_sources()),
        profiles: None,
        settings: Some(plain_settings()),
    };
    let app = build_test_app(export, default_fetcher(), StubConverter::failing());

    let response = get(&app.router, "/auto?target=surge", "curl/8.0").await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["code"], "UPSTREAM_ERROR");
}

#[tokio::test]
async fn test_metrics_reported_on_health() {
    let app = default_app(plain_settings());

    get(&app.router, "/auto?target=base64", "curl/8.0").await;
    let uri = format!("/auto?callback_token={}", callback_token(SECRET));
    get(&app.router, &uri, "curl/8.0").await;

    let body = body_json(get(&app.router, "/health", "curl/8.0").await).await;
    assert_eq!(body["metrics"]["subscriptions_served"], json!(2));
    assert_eq!(body["metrics"]["callback_short_circuits"], json!(1));
}
