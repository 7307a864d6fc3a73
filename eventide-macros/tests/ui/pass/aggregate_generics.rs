use std::marker::PhantomData;

use eventide::{Aggregate, AggregateRoot, Apply, DomainEvent};
use serde::{Deserialize, Serialize};

#[derive(Clone, Serialize, Deserialize, DomainEvent)]
pub struct Ticked {}

#[derive(Aggregate)]
#[aggregate(events(Ticked))]
pub struct Clock<T: Send> {
    root: AggregateRoot<ClockEvent>,
    ticks: u64,
    marker: PhantomData<T>,
}

impl<T: Send> Apply<Ticked> for Clock<T> {
    fn apply(&mut self, _event: &Ticked) {
        self.ticks += 1;
    }
}

fn main() {
    let mut clock = Clock::<u8> {
        root: AggregateRoot::default(),
        ticks: 0,
        marker: PhantomData,
    };
    clock.track_change(Ticked {}).unwrap();
    assert_eq!(clock.ticks, 1);
    assert_eq!(<Clock<u8> as Aggregate>::TYPE, "Clock");
}
