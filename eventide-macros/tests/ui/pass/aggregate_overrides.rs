use eventide::{Aggregate, AggregateRoot, Apply, DomainEvent, JsonCodec, Serializer};
use serde::{Deserialize, Serialize};

mod billing {
    use super::*;

    #[derive(Clone, Debug, Serialize, Deserialize, DomainEvent)]
    #[event(reason = "InvoiceCharged")]
    pub struct Charged {
        pub cents: u64,
    }
}

#[derive(Default, Aggregate)]
#[aggregate(
    events(billing::Charged),
    name = "accounts.Invoice",
    event_enum = "InvoiceChange",
    root = "state",
    derives(Debug)
)]
pub struct Invoice {
    state: AggregateRoot<InvoiceChange>,
    total: u64,
}

impl Apply<billing::Charged> for Invoice {
    fn apply(&mut self, event: &billing::Charged) {
        self.total += event.cents;
    }
}

fn main() {
    let serializer = Serializer::<InvoiceChange, JsonCodec>::default();
    serializer.register::<Invoice>();
    assert!(serializer.is_registered("accounts.Invoice", "InvoiceCharged"));

    let mut invoice = Invoice::default();
    invoice
        .track_change(InvoiceChange::BillingCharged(billing::Charged { cents: 250 }))
        .unwrap();
    assert_eq!(invoice.total, 250);
    assert_eq!(invoice.root().events()[0].aggregate_type, "accounts.Invoice");
}
