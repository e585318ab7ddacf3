use std::sync::Arc;
use std::time::Duration;

use crate::broker::{AmqpConsumer, AmqpPublisher, HttpPublisher, Publisher};
use crate::config::{BackendConfig, EmitMode, PingerConfig};
use crate::container::NetworkID;
use crate::discovery::{AccessList, ContainerRuntime, Discoverer, DockerRuntime};
use crate::emitter::Emitter;
use crate::gate::{ApiKeys, Gate, RateLimiter};
use crate::persistence::MySqlReachabilityStore;
use crate::probe::{FanOutProber, IcmpProber, NetworkAttacher, Prober};
use crate::scanner::Scanner;

/// Reachwatch: watches which containers on a set of Docker networks answer
/// ICMP echo requests.
///
/// The pinger discovers containers, probes them and emits a batch per cycle,
/// either to a message broker or straight to the backend. The backend ingests
/// batches from the broker and over HTTP and keeps the latest observation per
/// IP in MySQL.
pub mod api;
pub mod broker;
pub mod config;
pub mod consumer;
pub mod container;
pub mod discovery;
pub mod emitter;
pub mod error;
pub mod gate;
pub mod persistence;
pub mod probe;
pub mod reachability;
pub mod scanner;

const CONSUMER_TAG: &str = "reachwatch-backend";

/// Resolves on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            log::error!("failed to listen for ctrl-c: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                log::error!("failed to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("Received shutdown signal");
}

async fn scan_until_shutdown<R, P, B>(scanner: Scanner<R, P, B>, interval: Duration)
where
    R: ContainerRuntime + 'static,
    P: Prober + 'static,
    B: Publisher,
{
    tokio::select! {
        _ = scanner.run(interval) => {},
        _ = shutdown_signal() => {},
    }
}

/// Runs the pinger until SIGINT or SIGTERM.
///
/// # Errors
///
/// Possible errors include:
/// - An unreadable access list or an invalid network name.
/// - Failure to configure the Docker client.
/// - Failure to connect to the message broker.
pub async fn run_pinger(config: PingerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let access_list = match &config.access_list_path {
        Some(path) => AccessList::from_file(path)?,
        None => AccessList::default(),
    };
    log::debug!(
        "Access list: {:?} with {} entries",
        access_list.mode(),
        access_list.len()
    );
    let networks = config
        .networks
        .iter()
        .map(NetworkID::new)
        .collect::<Result<Vec<_>, _>>()?;

    let runtime = Arc::new(DockerRuntime::connect()?);
    let discoverer = Discoverer::init(
        Arc::clone(&runtime),
        &config.service_name,
        networks,
        access_list,
    )
    .await;
    log::info!("Probing networks {:?}", discoverer.networks());

    let attacher = Arc::new(NetworkAttacher::new(
        Arc::clone(&runtime),
        discoverer.own_container().cloned(),
        discoverer.own_networks().iter().cloned(),
    ));
    let prober = FanOutProber::new(
        attacher,
        Arc::new(IcmpProber),
        config.probe_settings(),
        config.probe_concurrency,
    );

    match config.emit_mode {
        EmitMode::Broker => {
            let url = config
                .amqp_url
                .as_deref()
                .ok_or("`amqp_url` is required in broker mode")?;
            let publisher = AmqpPublisher::connect(url, config.queue.as_str()).await?;
            let scanner = Scanner::new(discoverer, prober, Emitter::new(publisher));
            scan_until_shutdown(scanner, config.scan_interval()).await;
        }
        EmitMode::Http => {
            let url = config
                .ingest_url
                .as_deref()
                .ok_or("`ingest_url` is required in http mode")?;
            log::info!("Sending batches to `{}`", url);
            let publisher = HttpPublisher::new(url, config.api_key.clone());
            let scanner = Scanner::new(discoverer, prober, Emitter::new(publisher));
            scan_until_shutdown(scanner, config.scan_interval()).await;
        }
    }

    Ok(())
}

/// Runs the backend until SIGINT or SIGTERM.
///
/// Applies the database migrations, starts the broker consumer when a broker
/// is configured and serves the HTTP ingress.
///
/// # Errors
///
/// Possible errors include:
/// - Failure to connect to or migrate the database.
/// - Failure to subscribe to the message broker.
/// - Failure to bind the listen address.
pub async fn run_backend(config: BackendConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MySqlReachabilityStore::connect(&config.database_url).await?);

    let keys = if config.require_api_key {
        ApiKeys::new(config.api_keys.iter().cloned())
    } else {
        log::warn!("API key authentication is disabled");
        ApiKeys::disabled()
    };
    let gate = Gate::new(
        keys,
        RateLimiter::new(config.rate_limit, config.rate_window()),
    );

    let consumer_task = match &config.amqp_url {
        Some(url) => {
            let consumer = AmqpConsumer::connect(url, &config.queue, CONSUMER_TAG).await?;
            let store = Arc::clone(&store);
            Some(tokio::spawn(async move {
                crate::consumer::run_consumer(consumer, store.as_ref()).await;
            }))
        }
        None => {
            log::info!("No broker configured, accepting batches over HTTP only");
            None
        }
    };

    let server = crate::api::APIServer::new(store, gate, config.request_timeout());
    server
        .listen(config.listen_addr.as_str(), shutdown_signal())
        .await?;

    if let Some(task) = consumer_task {
        task.abort();
    }

    Ok(())
}
