use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_election_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chat_poll::config::AppConfig;
use chat_poll::election::{
    CommandDispatcher, ElectionApi, EligibleVoterSet, PollEngine, SqliteStore,
};
use chat_poll::error::AppError;
use chat_poll::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(database) = args.database.take() {
        config.store.database_path = database;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let eligible = EligibleVoterSet::from_path(&config.election.eligible_voters_path)?;
    info!(
        path = %config.election.eligible_voters_path.display(),
        voters = eligible.len(),
        "eligible voter list loaded"
    );

    let store = Arc::new(SqliteStore::open(&config.store.database_path)?);
    let engine = PollEngine::new(store, eligible);
    let dispatcher = CommandDispatcher::new(engine, config.election.access_policy());
    let api = Arc::new(ElectionApi::new(dispatcher, config.webhook.secret_token.clone()));

    let app = with_election_routes(api)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        database = %config.store.database_path.display(),
        "chat poll bot ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
