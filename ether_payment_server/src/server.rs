use std::{future::Future, io, pin::Pin, time::Duration};

use actix_web::{
    dev::Server,
    http::KeepAlive,
    middleware::Logger,
    web,
    App,
    HttpServer,
};
use ether_payment_engine::{
    events::{EventHandlers, EventHooks},
    AddressDeriver,
    HdWalletDeriver,
    IngestionPipeline,
    InvoiceApi,
    InvoiceLedger,
    MemoryLedger,
    PipelineError,
    PipelineStats,
};
use futures::future::join_all;
use log::*;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use crate::{
    config::ServerConfig,
    errors::ServerError,
    integrations::json_rpc::JsonRpcGateway,
    routes::{health, CreateInvoiceRoute, InvoiceByIdRoute},
};

/// Why the server began shutting down.
enum Stopped {
    Signal,
    Pipeline(Result<Result<PipelineStats, PipelineError>, JoinError>),
    Server(Result<io::Result<()>, JoinError>),
}

/// Runs the HTTP API and the ingestion pipeline side by side until a shutdown signal arrives or either of them stops.
///
/// Whichever way it ends, in-flight requests and pipeline units are allowed to finish before this returns.
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let deriver = HdWalletDeriver::from_mnemonic(config.mnemonic.clone())
        .map_err(|e| ServerError::InitializeError(format!("Could not load the invoice wallet. {e}")))?;
    let ledger = MemoryLedger::new();
    let gateway =
        JsonRpcGateway::new(&config.rpc_url, config.chain_poll_interval, config.max_consecutive_rpc_failures)?;
    info!("🚀️ Following the chain via {} and crediting {} payments", gateway.rpc_url(), config.pipeline.policy);

    let mut hooks = EventHooks::default();
    hooks.on_invoice_paid(|ev| {
        Box::pin(async move {
            let invoice = ev.invoice;
            let (id, balance, address) = (invoice.id(), invoice.balance(), invoice.address());
            info!("💸️ Invoice {id} has been paid. {balance} wei received at {address}");
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    let handlers = EventHandlers::new(config.event_buffer_size, hooks);
    let producers = handlers.producers();
    let hook_tasks = handlers.start_handlers();

    let pipeline = IngestionPipeline::new(ledger.clone(), gateway, producers, config.pipeline.clone());
    let cancel = CancellationToken::new();
    let mut pipeline_task = tokio::spawn({
        let cancel = cancel.clone();
        async move { pipeline.run(cancel).await }
    });

    let srv = create_server_instance(&config, ledger, deriver)?;
    let srv_handle = srv.handle();
    let mut server_task = actix_web::rt::spawn(srv);

    let stopped = tokio::select! {
        _ = tokio::signal::ctrl_c() => Stopped::Signal,
        res = &mut pipeline_task => Stopped::Pipeline(res),
        res = &mut server_task => Stopped::Server(res),
    };
    match &stopped {
        Stopped::Signal => info!("🚀️ Shutdown requested"),
        Stopped::Pipeline(_) => warn!("🚀️ Payment ingestion stopped. Shutting down the server"),
        Stopped::Server(_) => warn!("🚀️ The HTTP server stopped. Shutting down payment ingestion"),
    }
    cancel.cancel();
    srv_handle.stop(true).await;
    let (pipeline_result, server_result) = match stopped {
        Stopped::Signal => (pipeline_task.await, server_task.await),
        Stopped::Pipeline(res) => (res, server_task.await),
        Stopped::Server(res) => (pipeline_task.await, res),
    };
    // The pipeline held the last event producers, so the hook loops drain and end now
    join_all(hook_tasks).await;

    match pipeline_result {
        Ok(Ok(stats)) => info!("🚀️ Payment ingestion finished. {stats:?}"),
        Ok(Err(e)) => {
            error!("🚀️ Payment ingestion failed. {e}");
            return Err(e.into());
        },
        Err(e) => return Err(ServerError::Unspecified(format!("The ingestion task panicked. {e}"))),
    }
    match server_result {
        Ok(res) => res.map_err(ServerError::from),
        Err(e) => Err(ServerError::Unspecified(format!("The HTTP server task panicked. {e}"))),
    }
}

/// Malformed invoice requests are answered with the same JSON error body as every other failure.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|err, _req| ServerError::InvalidRequestBody(err.to_string()).into())
}

pub fn create_server_instance<L, D>(config: &ServerConfig, ledger: L, deriver: D) -> Result<Server, ServerError>
where
    L: InvoiceLedger,
    D: AddressDeriver,
{
    let invoice_api = web::Data::new(InvoiceApi::new(ledger, deriver));
    let srv = HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("epg::access_log"))
            .app_data(invoice_api.clone())
            .app_data(json_config())
            .service(health)
            .service(CreateInvoiceRoute::<L, D>::new())
            .service(InvoiceByIdRoute::<L, D>::new())
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .disable_signals()
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
