//! Axum-based API gateway for Present OS. Config-driven via CoreConfig.

mod auth;
mod error;
mod handlers;

use axum::{
    extract::State,
    http::Method,
    routing::{delete, get, post},
    Router,
};
use present_core::{
    ActionOrchestrator, CalendarMaterializer, CoreConfig, PlanGenerator, SledStore, TokenCipher,
};
use present_skills::{GoogleCalendar, GoogleOAuth, LlmMode};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Pre-flight check: config, cipher key, store and port.
fn run_verify() -> Result<(), String> {
    let config = CoreConfig::load().map_err(|e| format!("Config load failed: {}", e))?;

    print!("Checking token_encryption_key... ");
    TokenCipher::from_hex_key(&config.token_encryption_key).map_err(|e| e.to_string())?;
    println!("OK");

    print!("Checking present_store... ");
    let store = SledStore::open_path(config.store_path())
        .map_err(|e| format!("present_store LOCKED or inaccessible: {}", e))?;
    store.flush().map_err(|e| format!("present_store not writable: {}", e))?;
    drop(store);
    println!("OK");

    print!("Checking completion provider... ");
    let has_key = config
        .gemini_api_key
        .as_deref()
        .map_or(false, |k| !k.trim().is_empty());
    match LlmMode::from_config(&config.llm_mode) {
        LlmMode::Live if has_key => println!("OK (live, {})", config.gemini_model),
        LlmMode::Live => println!("WARN (live requested, no gemini_api_key; mock plans will be used)"),
        LlmMode::Mock => println!("OK (mock)"),
    }

    print!("Checking Google OAuth client... ");
    if GoogleOAuth::from_config(&config).is_configured() {
        println!("OK");
    } else {
        println!("WARN (google_client_id/secret/redirect_uri not set; calendar connect disabled)");
    }

    let port = config.port;
    print!("Checking port {}... ", port);
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], port));
    match std::net::TcpListener::bind(addr) {
        Ok(listener) => {
            drop(listener);
            println!("OK (available)");
        }
        Err(e) => {
            return Err(format!("Port {} BLOCKED: {}", port, e));
        }
    }

    println!("\n✅ SUCCESS: All systems GO. Ready to start gateway.");
    Ok(())
}

/// Opens the store and wires providers into the orchestrator.
fn build_state(config: Arc<CoreConfig>) -> Result<AppState, String> {
    let store = Arc::new(
        SledStore::open_path(config.store_path())
            .map_err(|e| format!("open present_store: {}", e))?,
    );
    let cipher = Arc::new(
        TokenCipher::from_hex_key(&config.token_encryption_key).map_err(|e| e.to_string())?,
    );
    let completion = present_skills::completion_provider(&config);
    tracing::info!(
        target: "present::gateway",
        provider = completion.name(),
        plan_mode = ?config.plan_mode,
        "Completion provider ready"
    );
    let planner = PlanGenerator::new(completion, config.plan_mode);
    let calendar = CalendarMaterializer::new(Arc::new(GoogleCalendar::from_config(&config)));
    let orchestrator = ActionOrchestrator::new(
        store.clone(),
        store.clone(),
        Arc::clone(&cipher),
        planner,
        calendar,
    );
    let oauth = Arc::new(GoogleOAuth::from_config(&config));

    Ok(AppState {
        config,
        orchestrator: Arc::new(orchestrator),
        store,
        cipher,
        oauth,
    })
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env::var calls)
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[present-gateway] .env not loaded: {} (using system environment)", e);
    }

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--generate-key") {
        println!("{}", TokenCipher::generate_hex_key());
        return;
    }
    if args.iter().any(|a| a == "--verify") {
        match run_verify() {
            Ok(()) => std::process::exit(0),
            Err(e) => {
                eprintln!("❌ PRE-FLIGHT FAILED: {}", e);
                std::process::exit(1);
            }
        }
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match CoreConfig::load() {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("❌ Config load failed: {}", e);
            std::process::exit(1);
        }
    };
    let state = match build_state(Arc::clone(&config)) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(target: "present::gateway", "Startup failed: {}", e);
            std::process::exit(1);
        }
    };

    let app = build_app(state);
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(target: "present::gateway", "Bind {} failed: {}", addr, e);
            std::process::exit(1);
        }
    };
    tracing::info!(target: "present::gateway", "{} listening on {}", config.app_name, addr);
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(target: "present::gateway", "Server error: {}", e);
    }
}

fn build_app(state: AppState) -> Router {
    // CORS: allow Backend/API (8001-8099) and Frontend/UI (3001-3099) port ranges.
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(|origin: &axum::http::HeaderValue, _| {
            let s = origin.to_str().unwrap_or("");
            let port = s
                .rsplit(':')
                .next()
                .and_then(|p| p.parse::<u16>().ok())
                .unwrap_or(0);
            (3001..=3099).contains(&port) || (8001..=8099).contains(&port)
        }))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS, Method::DELETE])
        .allow_headers(tower_http::cors::Any);

    Router::new()
        .route("/v1/status", get(status))
        .route("/api/v1/health", get(health))
        .route("/actions", post(handlers::actions::create_action))
        .route("/actions/", post(handlers::actions::create_action))
        .route(
            "/api/v1/goals",
            post(handlers::goals::create_goal).get(handlers::goals::list_goals),
        )
        .route("/api/v1/goals/:goal_id", get(handlers::goals::get_goal))
        .route("/api/v1/google/auth-url", get(handlers::google::auth_url))
        .route("/api/v1/google/callback", post(handlers::google::callback))
        .route("/api/v1/google/credential", delete(handlers::google::disconnect))
        .with_state(state)
        .layer(cors)
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) config: Arc<CoreConfig>,
    pub(crate) orchestrator: Arc<ActionOrchestrator>,
    pub(crate) store: Arc<SledStore>,
    pub(crate) cipher: Arc<TokenCipher>,
    pub(crate) oauth: Arc<GoogleOAuth>,
}

/// GET /api/v1/health – liveness check for UI and scripts.
async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

/// GET /v1/status – app identity and generation settings from config.
async fn status(State(state): State<AppState>) -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "app_name": state.config.app_name,
        "port": state.config.port,
        "llm_mode": state.config.llm_mode,
        "plan_mode": state.orchestrator.planner().mode(),
    }))
}
