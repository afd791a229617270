use epg_common::Address;
use ether_payment_engine::{AddressDeriver, DerivationError, InvoiceId};
use mockall::mock;

mock! {
    pub Deriver {}
    impl AddressDeriver for Deriver {
        fn derive_address(&self, id: InvoiceId) -> Result<Address, DerivationError>;
    }
}

/// A deriver that hands out `0x0101..01` for invoice 1, `0x0202..02` for invoice 2, and so on.
pub fn numbered_addresses() -> MockDeriver {
    let mut deriver = MockDeriver::new();
    deriver.expect_derive_address().returning(|id| Ok(Address::new([id.value() as u8; 20])));
    deriver
}
