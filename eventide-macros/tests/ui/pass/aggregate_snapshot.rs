use eventide::{
    AggregateRoot, Apply, Codec, DomainEvent,
    snapshot::{SnapshotAggregate, SnapshotHooks},
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Serialize, Deserialize, DomainEvent)]
pub struct Deposited {
    pub amount: u64,
}

#[derive(Default, Serialize, Deserialize, eventide::Aggregate)]
#[aggregate(events(Deposited), snapshot = "fields")]
pub struct Account {
    #[serde(skip)]
    root: AggregateRoot<AccountEvent>,
    balance: u64,
}

impl Apply<Deposited> for Account {
    fn apply(&mut self, event: &Deposited) {
        self.balance += event.amount;
    }
}

#[derive(Default, eventide::Aggregate)]
#[aggregate(events(Deposited), event_enum = "VaultEvent", snapshot = "hooks")]
pub struct Vault {
    root: AggregateRoot<VaultEvent>,
    secret: u64,
}

impl Apply<Deposited> for Vault {
    fn apply(&mut self, event: &Deposited) {
        self.secret += event.amount;
    }
}

impl SnapshotHooks for Vault {
    fn marshal_snapshot<C: Codec>(&self, codec: &C) -> Result<Vec<u8>, C::Error> {
        codec.serialize(&self.secret)
    }

    fn unmarshal_snapshot<C: Codec>(&mut self, codec: &C, state: &[u8]) -> Result<(), C::Error> {
        self.secret = codec.deserialize(state)?;
        Ok(())
    }
}

fn assert_snapshot<A: SnapshotAggregate>() {}

fn main() {
    assert_snapshot::<Account>();
    assert_snapshot::<Vault>();
}
