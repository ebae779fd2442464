//! Estate gateway: Twilio voice webhook in front of the call session engine.
//!
//! `POST /voice` receives every call event (first contact and each finished
//! recording) and answers with TwiML. Synthesized replies are served back to
//! Twilio from the `/audio` directory.

mod twiml;

use axum::{
    body::Body,
    extract::{ConnectInfo, Form, State},
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use estate_core::{
    config::SessionConfig, AudioStore, CallEngine, Directive, EngineConfig, EstateConfig,
    PropertyTable, WebhookEvent,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tower_http::services::ServeDir;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

struct AppState {
    engine: Arc<CallEngine>,
    public_base_url: String,
}

/// Twilio webhook fields we use; everything else in the form is ignored.
#[derive(Debug, Deserialize)]
struct VoiceWebhook {
    #[serde(rename = "From")]
    from: Option<String>,
    #[serde(rename = "RecordingUrl")]
    recording_url: Option<String>,
    #[serde(rename = "CallSid")]
    call_sid: Option<String>,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = match EstateConfig::load() {
        Ok(cfg) => cfg,
        Err(e) => fatal("configuration", e),
    };

    let properties = match PropertyTable::from_csv_path(&cfg.dataset.path) {
        Ok(t) => t,
        Err(e) => fatal(&format!("property dataset {}", cfg.dataset.path), e),
    };

    let audio = match AudioStore::open(&cfg.audio.dir).await {
        Ok(a) => a,
        Err(e) => fatal(&format!("audio directory {}", cfg.audio.dir), e),
    };

    let services = match estate_voice::services_from_config(&cfg) {
        Ok(s) => s,
        Err(e) => fatal("HTTP clients", e),
    };

    let engine = Arc::new(CallEngine::new(
        EngineConfig::from_config(&cfg),
        Arc::new(properties),
        audio,
        services,
    ));
    spawn_sweeper(Arc::clone(&engine), cfg.sessions.clone());

    let state = Arc::new(AppState {
        engine,
        public_base_url: cfg.server.public_base_url.clone(),
    });
    let app = build_app(state);

    let addr = format!("{}:{}", cfg.server.host, cfg.server.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => fatal(&format!("bind {addr}"), e),
    };
    info!(
        addr = %addr,
        public = %cfg.server.public_base_url,
        version = estate_core::version(),
        "estate gateway listening"
    );

    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    {
        error!(error = %e, "server stopped");
        std::process::exit(1);
    }
}

fn fatal(what: &str, err: impl std::fmt::Display) -> ! {
    error!(error = %err, "startup failed: {}", what);
    std::process::exit(1);
}

fn build_app(state: Arc<AppState>) -> Router {
    // Clips are served straight from the audio store's directory.
    let clips = ServeDir::new(state.engine.audio().dir());
    Router::new()
        .route("/health", get(health))
        .route("/voice", post(voice_webhook))
        .nest_service("/audio", clips)
        .with_state(state)
        .layer(axum::middleware::from_fn(log_call_traffic))
}

/// Periodically drops idle sessions and clips older than the idle timeout.
/// The first sweep runs immediately.
fn spawn_sweeper(engine: Arc<CallEngine>, sessions: SessionConfig) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(sessions.sweep_interval());
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tick.tick().await;
            sweep_once(&engine, sessions.idle_timeout()).await;
        }
    })
}

/// One sweep: returns (sessions evicted, clips purged).
async fn sweep_once(engine: &CallEngine, max_idle: Duration) -> (usize, usize) {
    let idle = chrono::Duration::milliseconds(max_idle.as_millis() as i64);
    let evicted = engine.sessions().evict_idle(idle);
    if evicted > 0 {
        info!(evicted, remaining = engine.sessions().len(), "idle sessions evicted");
    }
    let purged = match engine.audio().purge_older_than(max_idle).await {
        Ok(n) => n,
        Err(e) => {
            warn!(error = %e, "audio clip purge failed");
            0
        }
    };
    if purged > 0 {
        info!(purged, "stale audio clips removed");
    }
    (evicted, purged)
}

async fn log_call_traffic(
    connect: Option<ConnectInfo<SocketAddr>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let remote = connect
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "-".to_string());
    let started = Instant::now();
    let response = next.run(request).await;
    info!(
        %method,
        path = %path,
        remote = %remote,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );
    response
}

async fn health() -> &'static str {
    "OK"
}

async fn voice_webhook(
    State(state): State<Arc<AppState>>,
    Form(hook): Form<VoiceWebhook>,
) -> Response {
    let caller = match hook.from.as_deref().map(str::trim) {
        Some(from) if !from.is_empty() => from.to_string(),
        _ => {
            warn!(call_sid = ?hook.call_sid, "webhook without From, rejecting");
            return (StatusCode::BAD_REQUEST, "missing From").into_response();
        }
    };
    info!(
        caller = %caller,
        call_sid = hook.call_sid.as_deref().unwrap_or("-"),
        has_recording = hook.recording_url.is_some(),
        "voice webhook"
    );

    // The step runs on its own task so a dropped connection cannot cancel it
    // halfway through a session update.
    let engine = Arc::clone(&state.engine);
    let event = WebhookEvent::new(caller, hook.recording_url);
    let directive = match tokio::spawn(async move { engine.handle(event).await }).await {
        Ok(d) => d,
        Err(e) => {
            error!(error = %e, "call step task failed");
            Directive::Fallback(state.engine.config().retry_text.clone())
        }
    };

    xml(twiml::render(&directive, &state.public_base_url))
}

fn xml(body: String) -> Response {
    (StatusCode::OK, [(header::CONTENT_TYPE, "application/xml")], body).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use estate_core::{
        GenerationError, Generator, PropertyRecord, RecordingSource, Services, SynthesisError,
        Synthesizer, TranscriptionError, Transcriber,
    };
    use tower::ServiceExt;

    const BASE: &str = "https://calls.example.com";

    struct Canned;

    #[async_trait]
    impl RecordingSource for Canned {
        async fn fetch(&self, _url: &str) -> Result<Vec<u8>, TranscriptionError> {
            Ok(b"RIFF".to_vec())
        }
    }

    #[async_trait]
    impl Transcriber for Canned {
        async fn transcribe(&self, _audio: Vec<u8>) -> Result<String, TranscriptionError> {
            Ok("Villa".to_string())
        }
    }

    #[async_trait]
    impl Generator for Canned {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            Ok("We have a villa in Dubai Marina.".to_string())
        }
    }

    #[async_trait]
    impl Synthesizer for Canned {
        async fn synthesize(&self, _text: &str) -> Result<Vec<u8>, SynthesisError> {
            Ok(b"ID3-fake-mp3".to_vec())
        }
    }

    async fn test_app() -> (Router, Arc<AppState>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let audio = AudioStore::open(dir.path().join("clips")).await.unwrap();
        let table: PropertyTable =
            vec![PropertyRecord::simple("Villa", "Dubai Marina", "2500000")]
                .into_iter()
                .collect();
        let services = Services {
            recordings: Box::new(Canned),
            transcriber: Box::new(Canned),
            generator: Box::new(Canned),
            synthesizer: Box::new(Canned),
        };
        let engine = CallEngine::new(EngineConfig::default(), Arc::new(table), audio, services);
        let state = Arc::new(AppState {
            engine: Arc::new(engine),
            public_base_url: BASE.to_string(),
        });
        (build_app(Arc::clone(&state)), state, dir)
    }

    fn voice_post(form: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/voice")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(form.to_string()))
            .unwrap()
    }

    async fn body_string(res: Response) -> String {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (app, _, _dir) = test_app().await;
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_string(res).await, "OK");
    }

    #[tokio::test]
    async fn first_contact_gets_welcome_and_record() {
        let (app, _, _dir) = test_app().await;
        let res = app
            .oneshot(voice_post("From=%2B971501234567&CallSid=CA1&AccountSid=AC1"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[header::CONTENT_TYPE], "application/xml");
        let xml = body_string(res).await;
        assert!(xml.contains(
            "<Say>Welcome to Dubai Real Estate assistant. Please ask your question after the beep.</Say>"
        ));
        assert!(xml.contains(
            r#"<Record maxLength="10" transcribe="false" playBeep="true" action="/voice"/>"#
        ));
    }

    #[tokio::test]
    async fn missing_from_is_a_bad_request() {
        let (app, state, _dir) = test_app().await;
        let res = app.oneshot(voice_post("CallSid=CA1")).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(state.engine.sessions().is_empty());
    }

    #[tokio::test]
    async fn recording_reply_is_played_then_served() {
        let (app, state, _dir) = test_app().await;
        let res = app
            .clone()
            .oneshot(voice_post(
                "From=%2B971501234567&CallSid=CA1&RecordingUrl=https%3A%2F%2Fapi.twilio.com%2FRecordings%2FRE1",
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let xml = body_string(res).await;
        let start = xml.find("<Play>").unwrap() + "<Play>".len();
        let end = xml.find("</Play>").unwrap();
        let url = &xml[start..end];
        assert!(url.starts_with("https://calls.example.com/audio/"));
        assert!(url.ends_with(".mp3"));

        let session = state.engine.sessions().get("+971501234567").unwrap();
        assert_eq!(session.lock().await.turns().len(), 2);

        let path = url.trim_start_matches(BASE);
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[header::CONTENT_TYPE], "audio/mpeg");
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"ID3-fake-mp3");
    }

    #[tokio::test]
    async fn unknown_clip_is_not_found() {
        let (app, _, _dir) = test_app().await;
        let req = Request::builder()
            .uri("/audio/doesnotexist.mp3")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn clip_directory_cannot_be_escaped() {
        let (app, _, dir) = test_app().await;
        std::fs::write(dir.path().join("secret.txt"), "api keys").unwrap();
        let req = Request::builder()
            .uri("/audio/../secret.txt")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn sweep_evicts_idle_sessions_and_purges_clips() {
        let (_, state, _dir) = test_app().await;
        let engine = &state.engine;
        {
            let idle = engine.sessions().get_or_create("+971500000001");
            idle.lock().await.last_activity = chrono::Utc::now() - chrono::Duration::hours(2);
        }
        engine.audio().save(b"old clip").await.unwrap();

        // Nothing is older than an hour yet except the idle session.
        assert_eq!(sweep_once(engine, Duration::from_secs(3600)).await, (1, 0));
        assert!(engine.sessions().is_empty());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(sweep_once(engine, Duration::ZERO).await, (0, 1));
    }

    #[tokio::test]
    async fn spawned_sweeper_runs_on_its_first_tick() {
        let (_, state, _dir) = test_app().await;
        let engine = Arc::clone(&state.engine);
        {
            let idle = engine.sessions().get_or_create("+971500000002");
            idle.lock().await.last_activity = chrono::Utc::now() - chrono::Duration::hours(2);
        }
        let clip = engine.audio().save(b"clip").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let sessions = SessionConfig {
            idle_timeout_secs: 0,
            sweep_interval_secs: 60,
        };
        let task = spawn_sweeper(Arc::clone(&engine), sessions);
        tokio::time::sleep(Duration::from_millis(200)).await;
        task.abort();

        assert!(engine.sessions().is_empty());
        assert!(!engine.audio().path_of(&clip).exists());
    }
}
