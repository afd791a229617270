use actix_web::http::StatusCode;
use epg_common::{Address, Wei};
use ether_payment_engine::{DerivationError, Invoice, InvoiceId, InvoiceLedger, MemoryLedger};

use super::{
    helpers::{get_request, post_request},
    mocks::{numbered_addresses, MockDeriver},
};

#[actix_web::test]
async fn create_invoice() {
    let _ = env_logger::try_init().ok();
    let ledger = MemoryLedger::new();
    let (status, body) = post_request("/invoices", r#"{"price": 2000}"#, ledger.clone(), numbered_addresses()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, r#"{"id":1}"#);
    let invoice = ledger.fetch_by_id(InvoiceId(1)).unwrap();
    assert_eq!(invoice.price(), &Wei::from(2000u64));
    assert!(invoice.balance().is_zero());
    assert_eq!(invoice.address(), &Address::new([1u8; 20]));
}

#[actix_web::test]
async fn create_invoice_with_a_large_price() {
    let _ = env_logger::try_init().ok();
    let ledger = MemoryLedger::new();
    // 10^24 wei does not fit in a JSON number that every client can read, so it is sent as a string
    let body = r#"{"price": "1000000000000000000000000"}"#;
    let (status, body) = post_request("/invoices", body, ledger.clone(), numbered_addresses()).await;
    assert_eq!(status, StatusCode::CREATED, "was: {body}");
    let invoice = ledger.fetch_by_id(InvoiceId(1)).unwrap();
    assert_eq!(invoice.price().to_string(), "1000000000000000000000000");
    // and is read back as a plain JSON integer
    let (status, body) = get_request("/invoices/1", ledger, MockDeriver::new()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""price":1000000000000000000000000,"balance":0"#), "was: {body}");
}

#[actix_web::test]
async fn create_invoice_malformed_body() {
    let _ = env_logger::try_init().ok();
    let ledger = MemoryLedger::new();
    for body in [r#"{"cost": 10}"#, r#"{"price": "ten"}"#, r#"{"price": -1}"#, "price=10"] {
        let (status, reply) = post_request("/invoices", body, ledger.clone(), MockDeriver::new()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "for body {body}");
        assert!(reply.starts_with(r#"{"error":"Could not read request body"#), "was: {reply}");
    }
    assert!(ledger.is_empty());
}

#[actix_web::test]
async fn create_invoice_derivation_failure() {
    let _ = env_logger::try_init().ok();
    let ledger = MemoryLedger::new();
    let mut deriver = MockDeriver::new();
    deriver.expect_derive_address().times(1).returning(|id| Err(DerivationError::IdOutOfRange(id)));
    let (status, body) = post_request("/invoices", r#"{"price": 5}"#, ledger.clone(), deriver).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.starts_with(r#"{"error":"An error occurred on the backend of the server."#), "was: {body}");
    assert!(ledger.is_empty());
}

#[actix_web::test]
async fn fetch_invoice() {
    let _ = env_logger::try_init().ok();
    let ledger = MemoryLedger::new();
    let mut invoice = Invoice::new(ledger.next_id(), Wei::from(10u64), Address::new([7u8; 20]));
    invoice.deposit(Wei::from(4u64));
    ledger.save(invoice).unwrap();
    let (status, body) = get_request("/invoices/1", ledger, MockDeriver::new()).await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["id"], 1);
    assert_eq!(json["price"], 10);
    assert_eq!(json["balance"], 4);
    assert_eq!(json["address"], "0x0707070707070707070707070707070707070707");
    assert_eq!(json["status"], "pending");
}

#[actix_web::test]
async fn fetch_unknown_invoice() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/invoices/42", MemoryLedger::new(), MockDeriver::new()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"The data was not found. Invoice 42 does not exist"}"#);
}

#[actix_web::test]
async fn fetch_invoice_with_invalid_id() {
    let _ = env_logger::try_init().ok();
    for path in ["/invoices/abc", "/invoices/-1", "/invoices/1.5"] {
        let (status, body) = get_request(path, MemoryLedger::new(), MockDeriver::new()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "for {path}");
        assert!(body.contains("is not a valid invoice id"), "was: {body}");
    }
}
