use std::{future::IntoFuture, process, sync::Arc};

use caloriecounter::{
    application::{
        error::AppError,
        pipeline::{self, PipelineReport},
        ports::{BlobStore, ProductLookup, Publisher},
        tracker::CalorieTracker,
    },
    config,
    domain::{barcode::BarCode, energy::Resolution},
    infra::{
        error::InfraError,
        http::{self, IngressState},
        openfoodfacts::OpenFoodFactsClient,
        storage::FsBlobStore,
        telemetry,
        transport::{self, LinePublisher, RetainedPublisher},
    },
};
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

    let subscriber = tracing_fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
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
        .unwrap_or(config::Command::Run(Box::<config::RunArgs>::default()));

    match command {
        config::Command::WriteConfig(args) => write_config(args).await,
        config::Command::Run(_) => {
            telemetry::init(&settings.logging)?;
            run_stream(settings).await
        }
        config::Command::Serve(_) => {
            telemetry::init(&settings.logging)?;
            run_serve(settings).await
        }
        config::Command::Lookup(args) => {
            telemetry::init(&settings.logging)?;
            run_lookup(settings, args).await
        }
    }
}

async fn write_config(args: config::WriteConfigArgs) -> Result<(), AppError> {
    let path = args.file;
    if !args.force && tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return Err(AppError::from(InfraError::configuration(format!(
            "`{}` already exists, pass --force to overwrite it",
            path.display()
        ))));
    }

    let template = config::default_template()
        .map_err(|err| AppError::unexpected(format!("failed to render configuration: {err}")))?;
    tokio::fs::write(&path, template)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    println!("Wrote {}", path.display());
    Ok(())
}

fn build_tracker(
    settings: &config::Settings,
    publisher: Arc<dyn Publisher>,
) -> Result<CalorieTracker, AppError> {
    let store: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(
        settings.lookup.storage_root.clone(),
    ));
    let lookup: Arc<dyn ProductLookup> = Arc::new(OpenFoodFactsClient::new(
        &settings.lookup.url,
        settings.lookup.timeout,
    )?);

    Ok(CalorieTracker::new(
        store,
        lookup,
        publisher,
        settings.topics.destination.clone(),
    ))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Failed to listen for Ctrl-C, running until input ends");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

fn log_report(report: &PipelineReport) {
    info!(
        exit = ?report.exit,
        processed = report.processed,
        total = %report.total.to_payload(),
        "Calorie counter stopped"
    );
}

async fn run_stream(settings: config::Settings) -> Result<(), AppError> {
    let tracker = build_tracker(&settings, Arc::new(LinePublisher::stdout()))?;
    tracker.start().await?;

    let (tx, rx) = pipeline::inbox();
    transport::spawn_stdin_reader(settings.topics.source.clone(), tx);

    let report = pipeline::run(tracker, rx, shutdown_signal()).await?;
    log_report(&report);
    Ok(())
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let retained = Arc::new(RetainedPublisher::new());
    let tracker = build_tracker(&settings, retained.clone())?;
    tracker.start().await?;

    let (tx, rx) = pipeline::inbox();
    let router = http::build_router(IngressState {
        source: settings.topics.source.clone(),
        inbox: tx,
        retained,
    });

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        addr = %settings.server.addr,
        source = %settings.topics.source,
        destination = %settings.topics.destination,
        "Accepting messages over HTTP"
    );
    let server = axum::serve(listener, router.into_make_service()).into_future();

    tokio::select! {
        served = server => {
            served.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
            Ok(())
        }
        outcome = pipeline::run(tracker, rx, shutdown_signal()) => {
            log_report(&outcome?);
            Ok(())
        }
    }
}

async fn run_lookup(settings: config::Settings, args: config::LookupArgs) -> Result<(), AppError> {
    let bar_code = BarCode::parse(&args.bar_code)?;
    let tracker = build_tracker(&settings, Arc::new(LinePublisher::stdout()))?;
    tracker.start().await?;

    let result = tracker.lookup(&bar_code).await?;
    let name = result.record.product_name().unwrap_or("(unnamed)");
    let line = match &result.resolution {
        Resolution::Usable(energy) => format!("{bar_code}\t{name}\t{energy}"),
        Resolution::Unusable(reason) => format!("{bar_code}\t{name}\tunusable: {reason}"),
    };

    println!("{line}");
    Ok(())
}
