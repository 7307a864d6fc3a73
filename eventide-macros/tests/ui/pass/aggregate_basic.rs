use eventide::{Aggregate, AggregateRoot, Apply, DomainEvent, event::EventData};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, DomainEvent)]
pub struct Born {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, DomainEvent)]
pub struct AgedOneYear {}

#[derive(Default, Aggregate)]
#[aggregate(events(Born, AgedOneYear), derives(Debug, PartialEq))]
pub struct Person {
    root: AggregateRoot<PersonEvent>,
    name: String,
    age: u32,
}

impl Apply<Born> for Person {
    fn apply(&mut self, event: &Born) {
        self.name.clone_from(&event.name);
    }
}

impl Apply<AgedOneYear> for Person {
    fn apply(&mut self, _event: &AgedOneYear) {
        self.age += 1;
    }
}

fn main() {
    let mut person = Person::default();
    person.track_change(Born { name: "Kalle".into() }).unwrap();
    person.track_change(AgedOneYear {}).unwrap();
    assert_eq!(Person::TYPE, "Person");
    assert_eq!(person.name, "Kalle");
    assert_eq!(person.age, 1);
    assert_eq!(person.root().version(), 2);

    let event: PersonEvent = AgedOneYear {}.into();
    assert_eq!(event.reason(), "AgedOneYear");
    assert_eq!(serde_json::to_string(&event).unwrap(), "{}");
}
