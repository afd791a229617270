use cucumber::given;
use ether_payment_engine::CreditPolicy;

use crate::cucumber::{invoice_world::PaymentSystem, InvoiceWorld};

#[given(expr = "a payment engine crediting {word} payments")]
async fn payment_engine(world: &mut InvoiceWorld, policy: String) {
    let policy = policy.parse::<CreditPolicy>().expect("Not a credit policy");
    world.system = Some(PaymentSystem::new(policy).await);
}
