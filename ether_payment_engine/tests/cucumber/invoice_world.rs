use std::{collections::HashMap, sync::Arc, time::Duration};

use cucumber::World;
use epg_common::{Secret, TxHash};
use ether_payment_engine::{
    events::EventProducers,
    CreditPolicy,
    HdWalletDeriver,
    IngestionPipeline,
    InvoiceApi,
    InvoiceId,
    MemoryLedger,
    PipelineConfig,
    PipelineError,
    PipelineStats,
};
use log::*;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::support::{tx_hash, wait_until, SimulatedChain};

pub const TEST_MNEMONIC: &str = "test test test test test test test test test test test junk";

#[derive(Default, Debug, World)]
pub struct InvoiceWorld {
    pub system: Option<PaymentSystem>,
    pub invoices: HashMap<String, InvoiceId>,
    pub transactions: HashMap<String, TxHash>,
    pub tx_count: u64,
}

pub struct PaymentSystem {
    pub api: InvoiceApi<MemoryLedger, HdWalletDeriver>,
    pub chain: SimulatedChain,
    pub pipeline: Arc<IngestionPipeline<MemoryLedger, SimulatedChain>>,
    cancel: CancellationToken,
    runner: JoinHandle<Result<PipelineStats, PipelineError>>,
}

impl std::fmt::Debug for PaymentSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentSystem({:?})", self.pipeline)
    }
}

impl InvoiceWorld {
    pub fn system(&self) -> &PaymentSystem {
        self.system.as_ref().expect("Payment system not initialised")
    }

    pub fn api(&self) -> &InvoiceApi<MemoryLedger, HdWalletDeriver> {
        &self.system().api
    }

    pub fn invoice_id(&self, name: &str) -> InvoiceId {
        *self.invoices.get(name).unwrap_or_else(|| panic!("No invoice called '{name}'"))
    }

    /// Looks up the hash for a named transaction, assigning a new one on first use.
    pub fn tx_hash(&mut self, name: &str) -> TxHash {
        if let Some(hash) = self.transactions.get(name) {
            return *hash;
        }
        self.tx_count += 1;
        let hash = tx_hash(self.tx_count);
        self.transactions.insert(name.to_string(), hash);
        hash
    }

    pub fn anonymous_tx_hash(&mut self) -> TxHash {
        let name = format!("anonymous-{}", self.tx_count + 1);
        self.tx_hash(&name)
    }
}

impl PaymentSystem {
    pub async fn new(policy: CreditPolicy) -> Self {
        let ledger = MemoryLedger::new();
        let deriver =
            HdWalletDeriver::from_mnemonic(Secret::new(TEST_MNEMONIC.to_string())).expect("Error creating deriver");
        let chain = SimulatedChain::new();
        let config = PipelineConfig {
            policy,
            receipt_poll_interval: Duration::from_millis(10),
            receipt_timeout: Duration::from_secs(5),
            ..PipelineConfig::default()
        };
        let pipeline = Arc::new(IngestionPipeline::new(ledger.clone(), chain.clone(), EventProducers::default(), config));
        let cancel = CancellationToken::new();
        let p = Arc::clone(&pipeline);
        let token = cancel.clone();
        let runner = tokio::spawn(async move { p.run(token).await });
        let c = chain.clone();
        wait_until(Duration::from_secs(5), "the subscription", move || c.is_subscribed()).await;
        debug!("🥒️ Payment system is up with the {policy} credit policy");
        Self { api: InvoiceApi::new(ledger, deriver), chain, pipeline, cancel, runner }
    }

    pub async fn shutdown(self) {
        self.cancel.cancel();
        match self.runner.await {
            Ok(Ok(stats)) => debug!("🥒️ Pipeline stopped. {stats:?}"),
            Ok(Err(e)) => error!("🥒️ Pipeline failed. {e}"),
            Err(e) => error!("🥒️ Pipeline panicked. {e}"),
        }
    }
}
