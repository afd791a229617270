use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web, App};
use ether_payment_engine::{InvoiceApi, MemoryLedger};
use log::debug;

use super::mocks::MockDeriver;
use crate::{
    routes::{CreateInvoiceRoute, InvoiceByIdRoute},
    server::json_config,
};

fn configure(cfg: &mut web::ServiceConfig, ledger: MemoryLedger, deriver: MockDeriver) {
    let api = InvoiceApi::new(ledger, deriver);
    cfg.service(CreateInvoiceRoute::<MemoryLedger, MockDeriver>::new())
        .service(InvoiceByIdRoute::<MemoryLedger, MockDeriver>::new())
        .app_data(web::Data::new(api))
        .app_data(json_config());
}

async fn send(req: TestRequest, ledger: MemoryLedger, deriver: MockDeriver) -> (StatusCode, String) {
    let app = App::new().configure(|cfg| configure(cfg, ledger, deriver));
    let service = test::init_service(app).await;
    debug!("Making request");
    let (_, res) = test::call_service(&service, req.to_request()).await.into_parts();
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    (status, body)
}

pub async fn get_request(path: &str, ledger: MemoryLedger, deriver: MockDeriver) -> (StatusCode, String) {
    send(TestRequest::get().uri(path), ledger, deriver).await
}

pub async fn post_request(path: &str, body: &str, ledger: MemoryLedger, deriver: MockDeriver) -> (StatusCode, String) {
    let req = TestRequest::post()
        .uri(path)
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body.to_string());
    send(req, ledger, deriver).await
}
