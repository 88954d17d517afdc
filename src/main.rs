use std::{future::IntoFuture, net::SocketAddr, process, sync::Arc};

use page_cache::{
    application::{
        content::ContentService,
        error::AppError,
        session::{SessionPrincipalResolver, SessionStore},
    },
    cache::{
        CacheConfig, CacheState, ContentNotifier, InvalidationSentry, MemoryStore,
        PrincipalResolver, SharedStore, evict_all,
    },
    config,
    infra::{
        error::InfraError,
        http::{self, AdminState, HttpState},
        telemetry,
    },
};
use tokio::{net::TcpListener, sync::watch, try_join};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let notifier = ContentNotifier::default();
    let content = ContentService::seeded(notifier.clone());
    let sessions = Arc::new(SessionStore::new());

    let cache_config = CacheConfig::from(&settings);
    let (cache_state, cache_store, sentry_handle) = if cache_config.enabled {
        let store = MemoryStore::shared(&cache_config);
        let principals: Arc<dyn PrincipalResolver> = Arc::new(SessionPrincipalResolver::new(
            sessions.clone(),
            settings.auth.session_cookie.clone(),
        ));
        let sentry = InvalidationSentry::new(store.clone()).spawn(notifier.subscribe());
        info!(
            max_entries = cache_config.max_entries,
            max_body_bytes = cache_config.max_body_bytes,
            cache_control = %cache_config.cache_control_value(),
            "Page cache enabled"
        );
        let state = CacheState::new(cache_config, store.clone(), principals);
        (Some(state), Some(store), Some(sentry))
    } else {
        info!("Page cache disabled");
        (None, None, None)
    };

    let http_state = HttpState {
        content: content.clone(),
        cache: cache_state,
    };
    let admin_state = AdminState {
        content,
        sessions,
        session_cookie: settings.auth.session_cookie.clone(),
        cache: cache_store.clone(),
    };

    let result = serve_http(&settings, http_state, admin_state).await;

    if let Some(handle) = sentry_handle {
        handle.abort();
        let _ = handle.await;
    }
    if let Some(store) = cache_store {
        release_cache(&store);
    }

    result
}

fn release_cache(store: &SharedStore) {
    if let Err(err) = evict_all(store, "shutdown") {
        warn!(error = %err, "Failed to clear page cache on shutdown");
    }
}

async fn serve_http(
    settings: &config::Settings,
    http_state: HttpState,
    admin_state: AdminState,
) -> Result<(), AppError> {
    let public_router = http::build_router(http_state);
    let admin_router = http::build_admin_router(admin_state);

    let public_listener = bind(settings.server.public_addr).await?;
    let admin_listener = bind(settings.server.admin_addr).await?;
    info!(
        public_addr = %settings.server.public_addr,
        admin_addr = %settings.server.admin_addr,
        "Listening"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let public_server = axum::serve(public_listener, public_router.into_make_service())
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx.clone()));
    let admin_server = axum::serve(admin_listener, admin_router.into_make_service())
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx));

    let servers = async {
        try_join!(public_server.into_future(), admin_server.into_future())
            .map(|_| ())
            .map_err(|err| AppError::unexpected(format!("server error: {err}")))
    };
    tokio::pin!(servers);

    tokio::select! {
        result = &mut servers => return result,
        () = shutdown_signal() => {
            info!("Shutdown requested; draining connections");
            let _ = shutdown_tx.send(true);
        }
    }

    match tokio::time::timeout(settings.server.graceful_shutdown, servers).await {
        Ok(result) => result,
        Err(_) => {
            warn!(
                timeout_secs = settings.server.graceful_shutdown.as_secs(),
                "Graceful shutdown timed out"
            );
            Ok(())
        }
    }
}

async fn bind(addr: SocketAddr) -> Result<TcpListener, AppError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| AppError::from(InfraError::Bind { addr, source }))
}

async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
