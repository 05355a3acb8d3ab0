//! catman HTTP gateway
//!
//! The intake for article XML.
//! Handles:
//! - Article submission and status lookup
//! - Liveness and readiness checks
//! - Observability (logging, metrics, request ids)

mod handlers;
mod middleware;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use catman_common::{
    config::{AppConfig, ObservabilityConfig},
    db::{DbPool, Repository},
    metrics,
    pipeline::{ArticleEvents, ArticleStore, Interlock},
    queue::Queue,
    xml::Schema,
    CatalogStore,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::oneshot;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn CatalogStore>,
    pub articles: Arc<ArticleStore>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;
    init_tracing(&config.observability);

    info!("Starting catman gateway v{}", catman_common::VERSION);

    let config = Arc::new(config);

    // Initialize metrics
    metrics::install_exporter(config.observability.metrics_port)?;
    metrics::register_metrics();

    // Initialize database connection
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    let store: Arc<dyn CatalogStore> = Arc::new(Repository::new(db));

    let queue = Arc::new(Queue::new(&config.queue).await?);
    let interlock = Arc::new(Interlock::new());
    let events = Arc::new(ArticleEvents::with_default_hooks(interlock.clone(), queue));
    let articles = Arc::new(ArticleStore::new(
        store.clone(),
        Arc::new(Schema::basic_article_meta()),
        interlock,
        events,
    ));

    // Create app state
    let state = AppState {
        config: config.clone(),
        store,
        articles,
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let host: std::net::IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::new(host, config.server.port);
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;

    if serve(listener, app, shutdown_signal(), config.shutdown_timeout()).await? {
        info!("Server shutdown complete");
    } else {
        warn!(
            timeout_secs = config.server.shutdown_timeout_secs,
            "Requests still in flight at the shutdown timeout, exiting anyway"
        );
    }
    Ok(())
}

/// Serve until `signal` resolves, then give in-flight requests up to
/// `drain_timeout` to finish. Returns `false` when the deadline cut the
/// drain short.
async fn serve(
    listener: TcpListener,
    app: Router,
    signal: impl Future<Output = ()> + Send + 'static,
    drain_timeout: Duration,
) -> std::io::Result<bool> {
    let (draining_tx, draining_rx) = oneshot::channel();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        signal.await;
        let _ = draining_tx.send(());
    });

    let deadline = async move {
        match draining_rx.await {
            Ok(()) => tokio::time::sleep(drain_timeout).await,
            // the server stopped on its own
            Err(_) => std::future::pending().await,
        }
    };

    tokio::select! {
        result = async { server.await } => result.map(|()| true),
        () = deadline => Ok(false),
    }
}

fn init_tracing(observability: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&observability.log_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if observability.json_logging {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let body_limit = DefaultBodyLimit::max(state.config.server.max_body_bytes);
    let timeout = TimeoutLayer::new(state.config.request_timeout());

    // API routes
    let api_routes = Router::new()
        .route(
            "/articles",
            post(handlers::articles::create_article).layer(body_limit),
        )
        .route("/articles/{aid}", get(handlers::articles::get_article))
        .route_layer(axum::middleware::from_fn(middleware::track_requests));

    // Compose the app
    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(timeout)
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use catman_common::db::MemoryStore;
    use catman_common::queue::{Job, MemoryQueue};
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpStream;
    use tokio_test::assert_ok;
    use tower::ServiceExt;

    const ARTICLE: &str = r#"<article article-type="research-article" xml:lang="en">
  <front>
    <journal-meta>
      <abbrev-journal-title>Braz. J. Biol.</abbrev-journal-title>
      <issn pub-type="ppub">1519-6984</issn>
    </journal-meta>
    <article-meta>
      <article-id pub-id-type="doi">10.1590/bjb.0001</article-id>
      <title-group><article-title>Riverine fish assemblages</article-title></title-group>
      <pub-date pub-type="epub-ppub"><year>2019</year></pub-date>
      <volume>79</volume>
      <issue>2</issue>
      <fpage>10</fpage>
    </article-meta>
  </front>
</article>"#;

    fn app() -> (Router, Arc<MemoryQueue>) {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(MemoryQueue::new());
        let interlock = Arc::new(Interlock::new());
        let events = Arc::new(ArticleEvents::with_default_hooks(
            interlock.clone(),
            queue.clone(),
        ));
        let articles = Arc::new(ArticleStore::new(
            store.clone(),
            Arc::new(Schema::basic_article_meta()),
            interlock,
            events,
        ));
        let mut config = AppConfig::default();
        config.server.max_body_bytes = 4096;

        let state = AppState {
            config: Arc::new(config),
            store,
            articles,
        };
        (create_router(state), queue)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    fn post_article(body: impl Into<Body>) -> Request<Body> {
        Request::post("/v1/articles")
            .header("content-type", "application/xml")
            .body(body.into())
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_then_lookup() {
        let (app, queue) = app();

        let (status, created) = send(&app, post_article(ARTICLE)).await;
        assert_eq!(status, StatusCode::CREATED);
        let aid = created["aid"].as_str().unwrap().to_string();
        assert_eq!(queue.len().await, 2);

        let lookup = Request::get(format!("/v1/articles/{}", aid))
            .body(Body::empty())
            .unwrap();
        let (status, article) = send(&app, lookup).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(article["aid"], aid.as_str());
        assert_eq!(article["es_is_dirty"], true);
        assert!(article["journal_id"].is_null());
        assert!(matches!(
            queue.pop().await,
            Some(Job::LinkToJournal { .. })
        ));
    }

    #[tokio::test]
    async fn test_rejections_map_to_status_codes() {
        let (app, _queue) = app();

        let (status, body) = send(&app, post_article("<article>")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "XML_SYNTAX_ERROR");

        let untitled = ARTICLE.replace("article-title>", "subtitle>");
        let (status, _) = send(&app, post_article(untitled)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = send(&app, post_article(vec![0x3c, 0xff])).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);

        send(&app, post_article(ARTICLE)).await;
        let (status, _) = send(&app, post_article(ARTICLE)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(&app, post_article(vec![b' '; 8192])).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_unknown_article_is_not_found() {
        let (app, _queue) = app();
        let request = Request::get("/v1/articles/nope").body(Body::empty()).unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health_and_readiness() {
        let (app, _queue) = app();
        let (status, body) = send(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");

        let (status, body) = send(&app, Request::get("/ready").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ready");
    }

    fn slow_app() -> Router {
        Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                "late"
            }),
        )
    }

    #[tokio::test]
    async fn test_drain_is_cut_at_the_shutdown_timeout() {
        let listener = assert_ok!(TcpListener::bind("127.0.0.1:0").await);
        let addr = assert_ok!(listener.local_addr());
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(serve(
            listener,
            slow_app(),
            async move {
                let _ = stop_rx.await;
            },
            Duration::from_millis(100),
        ));

        let mut client = assert_ok!(TcpStream::connect(addr).await);
        assert_ok!(client.write_all(b"GET /slow HTTP/1.1\r\nhost: test\r\n\r\n").await);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_ok!(stop_tx.send(()));

        let finished = assert_ok!(tokio::time::timeout(Duration::from_secs(5), server).await);
        let drained = assert_ok!(assert_ok!(finished));
        assert!(!drained);
    }

    #[tokio::test]
    async fn test_idle_server_stops_cleanly() {
        let listener = assert_ok!(TcpListener::bind("127.0.0.1:0").await);
        let drained = assert_ok!(
            serve(listener, slow_app(), async {}, Duration::from_secs(30)).await
        );
        assert!(drained);
    }
}
