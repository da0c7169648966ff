use std::{future::IntoFuture, process, sync::Arc};

use apalis::{
    layers::WorkerBuilderExt,
    prelude::{Monitor, WorkerBuilder, WorkerFactoryFn},
};
use apalis_cron::CronStream;
use missive::{
    application::{
        api_keys::{ApiKeyService, IssueApiKeyCommand},
        documents::DocumentGenerator,
        error::AppError,
        jobs::{
            BatchWorker, CycleContext, EnqueueService, RetryService, WorkerSettings,
            cycle_schedule, process_cycle_tick,
        },
        mail::Mailer,
        render::{AssetCache, AssetSource, DocumentRenderer, PdfRenderer},
        repos::{ApiKeysRepo, BatchesRepo, DocumentsRepo, JobsRepo, MissionSourceRepo},
        verification::VerificationService,
    },
    config::{self, AssetLocation},
    domain::api_keys::ApiScope,
    infra::{
        assets::{FsAssetSource, HttpAssetSource},
        db::PostgresRepositories,
        error::InfraError,
        http::{self, ApiState, HttpState, RouterState},
        mailer::SmtpMailer,
        storage::DocumentStorage,
        telemetry,
    },
};
use time::{Duration as TimeDuration, OffsetDateTime};
use tokio::sync::Notify;
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
        config::Command::RunCycle(_) => run_single_cycle(settings).await,
        config::Command::IssueKey(args) => run_issue_key(settings, args).await,
        config::Command::RevokeKey(args) => run_revoke_key(settings, args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let app = build_application_context(repositories, &settings)?;

    let monitor_handle = if settings.jobs.run_scheduler {
        Some(spawn_cycle_monitor(app.cycle_context.clone(), &settings.jobs)?)
    } else {
        info!(
            target = "missive::serve",
            "Cycle scheduler disabled; run `missive run-cycle` externally"
        );
        None
    };

    let result = serve_http(&settings, app.http_state, app.api_state).await;

    if let Some(handle) = monitor_handle {
        handle.abort();
        let _ = handle.await;
    }

    result
}

async fn run_single_cycle(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let app = build_application_context(repositories, &settings)?;
    let ctx = app.cycle_context;

    info!(
        target = "missive::run_cycle",
        max_batches = ctx.max_batches,
        "Starting processing cycle"
    );

    let report = ctx
        .worker
        .run_cycle(ctx.max_batches)
        .await
        .map_err(AppError::from)?;

    info!(
        target = "missive::run_cycle",
        eligible = report.eligible,
        completed = report.completed,
        failed = report.failed,
        skipped = report.skipped,
        "Processing cycle finished"
    );
    Ok(())
}

async fn run_issue_key(
    settings: config::Settings,
    args: config::IssueKeyArgs,
) -> Result<(), AppError> {
    let scopes = if args.scopes.is_empty() {
        ApiScope::all().to_vec()
    } else {
        args.scopes
            .iter()
            .map(|raw| {
                raw.parse::<ApiScope>()
                    .map_err(|_| AppError::validation(format!("unknown scope `{raw}`")))
            })
            .collect::<Result<Vec<_>, _>>()?
    };
    let expires_at = args
        .expires_in_days
        .map(|days| OffsetDateTime::now_utc() + TimeDuration::days(i64::from(days)));

    let repositories = init_repositories(&settings).await?;
    let api_keys_repo: Arc<dyn ApiKeysRepo> = repositories;
    let service = ApiKeyService::new(api_keys_repo);

    let issued = service
        .issue(IssueApiKeyCommand {
            name: args.name,
            scopes,
            expires_at,
        })
        .await
        .map_err(|err| AppError::unexpected(format!("failed to issue API key: {err}")))?;

    // The token is shown once; only its hash is stored.
    println!("{}", issued.token);
    Ok(())
}

async fn run_revoke_key(
    settings: config::Settings,
    args: config::RevokeKeyArgs,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let api_keys_repo: Arc<dyn ApiKeysRepo> = repositories;
    let service = ApiKeyService::new(api_keys_repo);

    service
        .revoke(args.id)
        .await
        .map_err(|err| AppError::unexpected(format!("failed to revoke API key: {err}")))?;

    info!(target = "missive::revoke_key", key_id = %args.id, "API key revoked");
    Ok(())
}

struct ApplicationContext {
    http_state: HttpState,
    api_state: ApiState,
    cycle_context: CycleContext,
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(InfraError::Connect)?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(InfraError::from)?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_application_context(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<ApplicationContext, AppError> {
    let jobs_repo: Arc<dyn JobsRepo> = repositories.clone();
    let documents_repo: Arc<dyn DocumentsRepo> = repositories.clone();
    let batches_repo: Arc<dyn BatchesRepo> = repositories.clone();
    let sources_repo: Arc<dyn MissionSourceRepo> = repositories.clone();
    let api_keys_repo: Arc<dyn ApiKeysRepo> = repositories.clone();

    let storage = Arc::new(
        DocumentStorage::new(settings.storage.directory.clone())
            .map_err(|err| AppError::from(InfraError::Io(err)))?,
    );

    let asset_source: Arc<dyn AssetSource> = match &settings.assets.location {
        AssetLocation::Directory(path) => Arc::new(FsAssetSource::new(path.clone())),
        AssetLocation::Remote(base) => Arc::new(
            HttpAssetSource::new(base.clone(), settings.assets.fetch_timeout).map_err(|err| {
                AppError::from(InfraError::configuration(format!("asset client: {err}")))
            })?,
        ),
    };
    let renderer: Arc<dyn DocumentRenderer> = Arc::new(PdfRenderer::new(
        Arc::new(AssetCache::new(asset_source)),
        settings.assets.names.clone(),
    ));

    let generator = Arc::new(DocumentGenerator::new(
        sources_repo,
        documents_repo.clone(),
        storage.clone(),
        renderer,
        settings.documents.clone(),
    ));

    let mailer: Option<Arc<dyn Mailer>> = match settings.mail.as_ref() {
        Some(mail) => Some(Arc::new(SmtpMailer::new(mail).map_err(|err| {
            AppError::from(InfraError::configuration(format!("mail transport: {err}")))
        })?)),
        None => None,
    };

    let worker = Arc::new(BatchWorker::new(
        jobs_repo.clone(),
        batches_repo,
        generator,
        storage.clone(),
        mailer,
        WorkerSettings {
            stale_after: settings.jobs.stale_after,
            fan_out: settings.jobs.fan_out.get() as usize,
        },
    ));

    let http_state = HttpState {
        verification: Arc::new(VerificationService::new(documents_repo)),
        health: repositories,
    };
    let api_state = ApiState {
        api_keys: Arc::new(ApiKeyService::new(api_keys_repo)),
        enqueue: Arc::new(EnqueueService::new(jobs_repo.clone())),
        retry: Arc::new(RetryService::new(jobs_repo.clone())),
        jobs: jobs_repo,
        storage,
    };
    let cycle_context = CycleContext {
        worker,
        max_batches: settings.jobs.max_batches.get() as usize,
    };

    Ok(ApplicationContext {
        http_state,
        api_state,
        cycle_context,
    })
}

fn spawn_cycle_monitor(
    context: CycleContext,
    jobs: &config::JobsSettings,
) -> Result<tokio::task::JoinHandle<()>, AppError> {
    let schedule = cycle_schedule(&jobs.cycle_schedule)
        .map_err(|err| AppError::from(InfraError::configuration(err.to_string())))?;

    // One tick at a time; a slow cycle delays the next rather than overlapping it.
    let cycle_worker = WorkerBuilder::new("mission-order-cycle")
        .concurrency(1)
        .data(context)
        .backend(CronStream::new(schedule))
        .build_fn(process_cycle_tick);

    let monitor = Monitor::new().register(cycle_worker);

    info!(
        target = "missive::serve",
        schedule = %jobs.cycle_schedule,
        "Cycle scheduler started"
    );

    Ok(tokio::spawn(async move {
        if let Err(err) = monitor.run().await {
            error!(error = %err, "cycle monitor stopped");
        }
    }))
}

async fn serve_http(
    settings: &config::Settings,
    http_state: HttpState,
    api_state: ApiState,
) -> Result<(), AppError> {
    let router = http::build_app(RouterState {
        http: http_state,
        api: api_state,
    });

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|source| InfraError::Bind {
            addr: settings.server.addr,
            source,
        })?;

    info!(
        target = "missive::serve",
        addr = %settings.server.addr,
        "HTTP server listening"
    );

    let shutdown = Arc::new(Notify::new());
    let server_shutdown = shutdown.clone();
    let mut server = tokio::spawn(
        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(async move { server_shutdown.notified().await })
            .into_future(),
    );

    tokio::select! {
        joined = &mut server => return server_outcome(joined),
        _ = shutdown_signal() => {}
    }

    info!(target = "missive::serve", "Shutdown requested; draining requests");
    shutdown.notify_one();

    match tokio::time::timeout(settings.server.graceful_shutdown, server).await {
        Ok(joined) => server_outcome(joined),
        Err(_) => {
            warn!(
                target = "missive::serve",
                timeout_secs = settings.server.graceful_shutdown.as_secs(),
                "Graceful shutdown timed out"
            );
            Ok(())
        }
    }
}

fn server_outcome(
    joined: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(AppError::unexpected(format!("server error: {err}"))),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(target = "missive::serve", error = %err, "ctrl-c handler failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(target = "missive::serve", error = %err, "SIGTERM handler failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
