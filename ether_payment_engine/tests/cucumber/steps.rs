use std::time::Duration;

use cucumber::{then, when};
use epg_common::{Address, Wei};
use ether_payment_engine::{chain::Transaction, InvoiceApiError, InvoiceId, InvoiceStatus};

use crate::{cucumber::InvoiceWorld, support::wait_until};

const PATIENCE: Duration = Duration::from_secs(5);

fn payment_to(world: &mut InvoiceWorld, tx: &str, invoice: &str, amount: u64) -> Transaction {
    let address = *world.api().invoice_by_id(world.invoice_id(invoice)).expect("Invoice does not exist").address();
    Transaction::new(world.tx_hash(tx), Some(address), Wei::from(amount))
}

#[when(expr = "I create an invoice '{word}' for {int} wei")]
async fn create_invoice(world: &mut InvoiceWorld, name: String, price: u64) {
    let id = world.api().create_invoice(Wei::from(price)).expect("Error creating invoice");
    world.invoices.insert(name, id);
}

#[when(expr = "a block pays {int} wei to invoice '{word}'")]
async fn block_pays_invoice(world: &mut InvoiceWorld, amount: u64, invoice: String) {
    let tx_name = format!("anonymous-{}", world.tx_count + 1);
    let tx = payment_to(world, &tx_name, &invoice, amount);
    world.system().chain.produce_block(vec![tx]).await;
}

#[when(expr = "a block pays {int} wei to invoice '{word}' in a transaction that reverts")]
async fn block_pays_invoice_and_reverts(world: &mut InvoiceWorld, amount: u64, invoice: String) {
    let tx_name = format!("anonymous-{}", world.tx_count + 1);
    let tx = payment_to(world, &tx_name, &invoice, amount);
    let hash = tx.hash;
    let chain = &world.system().chain;
    let header = chain.mine_block(vec![tx]);
    chain.revert(hash);
    chain.announce_block(header).await;
}

#[when(expr = "a block pays {int} wei to address {word}")]
async fn block_pays_address(world: &mut InvoiceWorld, amount: u64, address: String) {
    let address = address.parse::<Address>().expect("Not an address");
    let tx = Transaction::new(world.anonymous_tx_hash(), Some(address), Wei::from(amount));
    world.system().chain.produce_block(vec![tx]).await;
}

#[when(expr = "a block creates a contract with {int} wei")]
async fn block_creates_contract(world: &mut InvoiceWorld, amount: u64) {
    let tx = Transaction::new(world.anonymous_tx_hash(), None, Wei::from(amount));
    world.system().chain.produce_block(vec![tx]).await;
}

#[when(expr = "transaction [{word}] paying {int} wei to invoice '{word}' enters the pending pool")]
async fn pending_payment(world: &mut InvoiceWorld, tx: String, amount: u64, invoice: String) {
    let tx = payment_to(world, &tx, &invoice, amount);
    world.system().chain.submit(tx).await;
}

#[when(expr = "transaction [{word}] is mined")]
async fn mine_transaction(world: &mut InvoiceWorld, tx: String) {
    let hash = world.tx_hash(&tx);
    world.system().chain.confirm(hash, true);
}

#[when(expr = "transaction [{word}] is mined but reverts")]
async fn revert_transaction(world: &mut InvoiceWorld, tx: String) {
    let hash = world.tx_hash(&tx);
    world.system().chain.confirm(hash, false);
}

#[then(expr = "the engine is waiting for the receipt of [{word}]")]
async fn waiting_for_receipt(world: &mut InvoiceWorld, _tx: String) {
    let chain = world.system().chain.clone();
    wait_until(PATIENCE, "receipt polling", move || chain.receipt_polls() >= 2).await;
}

#[then(expr = "the engine has examined {int} transactions")]
async fn transactions_examined(world: &mut InvoiceWorld, count: u64) {
    let pipeline = world.system().pipeline.clone();
    wait_until(PATIENCE, "the transactions", move || pipeline.stats().transactions >= count).await;
    assert_eq!(world.system().pipeline.stats().transactions, count);
}

#[then(expr = "invoice '{word}' is {word} with a balance of {int} wei")]
async fn invoice_state(world: &mut InvoiceWorld, name: String, status: String, balance: u64) {
    let id = world.invoice_id(&name);
    let expected_status = match status.as_str() {
        "pending" => InvoiceStatus::Pending,
        "paid" => InvoiceStatus::Paid,
        s => panic!("Unknown invoice status {s}"),
    };
    let expected_balance = Wei::from(balance);
    let api = &world.system().api;
    let deadline = tokio::time::Instant::now() + PATIENCE;
    loop {
        let invoice = api.invoice_by_id(id).expect("Error fetching invoice");
        if invoice.status() == expected_status && invoice.balance() == &expected_balance {
            break;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("Invoice '{name}' is {} with a balance of {} wei", invoice.status(), invoice.balance());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[then(expr = "invoice '{word}' stays {word} with a balance of {int} wei")]
async fn invoice_stays(world: &mut InvoiceWorld, name: String, status: String, balance: u64) {
    tokio::time::sleep(Duration::from_millis(100)).await;
    let invoice = world.api().invoice_by_id(world.invoice_id(&name)).expect("Error fetching invoice");
    assert_eq!(invoice.status().to_string(), status);
    assert_eq!(invoice.balance(), &Wei::from(balance));
}

#[then(expr = "invoices '{word}' and '{word}' have different addresses")]
async fn distinct_addresses(world: &mut InvoiceWorld, a: String, b: String) {
    let a = world.api().invoice_by_id(world.invoice_id(&a)).expect("Error fetching invoice");
    let b = world.api().invoice_by_id(world.invoice_id(&b)).expect("Error fetching invoice");
    assert_ne!(a.address(), b.address());
}

#[then(expr = "invoice '{word}' is paid to {word}")]
async fn invoice_address(world: &mut InvoiceWorld, name: String, address: String) {
    let expected = address.parse::<Address>().expect("Not an address");
    let invoice = world.api().invoice_by_id(world.invoice_id(&name)).expect("Error fetching invoice");
    assert_eq!(invoice.address(), &expected);
}

#[then(expr = "invoice {int} does not exist")]
async fn invoice_missing(world: &mut InvoiceWorld, id: u64) {
    let err = world.api().invoice_by_id(InvoiceId(id)).unwrap_err();
    assert_eq!(err, InvoiceApiError::NotFound(InvoiceId(id)));
}
