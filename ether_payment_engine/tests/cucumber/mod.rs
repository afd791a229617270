pub mod invoice_world;
pub mod setups;
pub mod steps;

pub use invoice_world::InvoiceWorld;
