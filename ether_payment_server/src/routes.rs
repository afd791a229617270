//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. The invoice handlers only touch the in-memory ledger, which never
//! blocks for longer than it takes to clone an invoice, so they are fine as they are. Anything slower must be
//! expressed as a future.
use actix_web::{get, web, HttpResponse, Responder};
use ether_payment_engine::{AddressDeriver, InvoiceApi, InvoiceId, InvoiceLedger};
use log::*;

use crate::{
    data_objects::{NewInvoiceRequest, NewInvoiceResponse},
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Invoices  ----------------------------------------------------
route!(create_invoice => Post "/invoices" impl InvoiceLedger, AddressDeriver);
/// Route handler for creating invoices
///
/// The body is a JSON object with the price of the invoice in wei, e.g. `{"price": 2000000000000000000}`.
/// The new invoice is `pending`, with a zero balance and its own receiving address. The response carries only the
/// invoice id; use `GET /invoices/{id}` to fetch the address to pay.
pub async fn create_invoice<L, D>(
    body: web::Json<NewInvoiceRequest>,
    api: web::Data<InvoiceApi<L, D>>,
) -> Result<HttpResponse, ServerError>
where
    L: InvoiceLedger,
    D: AddressDeriver,
{
    let NewInvoiceRequest { price } = body.into_inner();
    debug!("💻️ POST new invoice for {price} wei");
    let id = api.create_invoice(price)?;
    Ok(HttpResponse::Created().json(NewInvoiceResponse { id }))
}

route!(invoice_by_id => Get "/invoices/{id}" impl InvoiceLedger, AddressDeriver);
pub async fn invoice_by_id<L, D>(
    path: web::Path<String>,
    api: web::Data<InvoiceApi<L, D>>,
) -> Result<HttpResponse, ServerError>
where
    L: InvoiceLedger,
    D: AddressDeriver,
{
    let raw = path.into_inner();
    let id = raw.parse::<InvoiceId>().map_err(|e| {
        debug!("💻️ '{raw}' is not an invoice id. {e}");
        ServerError::InvalidRequestPath(format!("'{raw}' is not a valid invoice id"))
    })?;
    trace!("💻️ GET invoice {id}");
    let invoice = api.invoice_by_id(id)?;
    Ok(HttpResponse::Ok().json(invoice))
}
