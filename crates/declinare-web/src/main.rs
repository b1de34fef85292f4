use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{Level, info, warn};
use tracing_subscriber::EnvFilter;

use declinare_corpus::sampler::DEFAULT_MAX_ATTEMPTS;
use declinare_corpus::{Languages, Tier};
use declinare_web::session::{DEFAULT_MAX_SESSIONS, DEFAULT_TTL};
use declinare_web::{AppState, SessionStore, router};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_HOST: &str = "0.0.0.0";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = load_config();
    info!("binding to {}:{}", config.host, config.port);
    if config.disable_cache {
        info!("cache headers disabled");
    }

    let languages = match &config.languages_path {
        Some(path) => {
            info!("using language table at {}", path.display());
            Languages::load(path)?
        }
        None => {
            info!("using built-in language table");
            Languages::builtin()
        }
    };
    report_sources(&languages);
    info!(
        "default language {}, {} attempts per question, up to {} sessions expiring after {}s",
        languages.default_code(),
        config.max_attempts,
        config.max_sessions,
        config.session_ttl.as_secs()
    );

    let sessions = SessionStore::with_capacity(config.session_ttl, config.max_sessions);
    let mut state = AppState::new(Arc::new(languages), config.max_attempts, sessions);
    state.disable_cache = config.disable_cache;

    let app = router(state).layer(TraceLayer::new_for_http());
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("invalid listen address");
    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Debug, Clone)]
struct Config {
    host: String,
    port: u16,
    languages_path: Option<PathBuf>,
    session_ttl: Duration,
    max_sessions: usize,
    max_attempts: usize,
    disable_cache: bool,
}

fn load_config() -> Config {
    let mut disable_cache = false;
    let mut cli_config: Option<PathBuf> = None;
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--no-cache" => disable_cache = true,
            "--config" => {
                if let Some(path) = args.next() {
                    cli_config = Some(PathBuf::from(path));
                }
            }
            _ => {
                if let Some(path) = arg.strip_prefix("--config=") {
                    cli_config = Some(PathBuf::from(path));
                } else {
                    warn!("ignoring unknown argument {arg:?}");
                }
            }
        }
    }

    let host = env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
    let port = env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT);
    let languages_path =
        cli_config.or_else(|| env::var("DECLINARE_CONFIG").ok().map(PathBuf::from));
    let session_ttl = env::var("SESSION_TTL_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_TTL);
    let max_sessions = env::var("MAX_SESSIONS")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_MAX_SESSIONS);
    let max_attempts = env::var("MAX_ATTEMPTS")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_MAX_ATTEMPTS);

    Config {
        host,
        port,
        languages_path,
        session_ttl,
        max_sessions,
        max_attempts,
        disable_cache,
    }
}

/// Warn about quiz files that are missing; sampling from them will fail.
fn report_sources(languages: &Languages) {
    for (code, lang) in languages.iter() {
        for tier in [Tier::Full, Tier::Top] {
            match lang.source(tier) {
                Some((path, lines)) if path.exists() => {
                    info!("{code} {tier:?}: {} ({lines} lines)", path.display());
                }
                Some((path, _)) => warn!("{code} {tier:?}: {} not found", path.display()),
                None => info!("{code} {tier:?}: not configured"),
            }
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let max_level = env_filter
        .max_level_hint()
        .and_then(|hint| hint.into_level())
        .unwrap_or(Level::INFO);
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(true)
        .with_max_level(max_level)
        .init();
}
