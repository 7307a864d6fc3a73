use eventide::DomainEvent;

#[derive(DomainEvent)]
pub struct Plain;

#[derive(DomainEvent)]
#[event(reason = "Renamed")]
pub struct Original {
    pub value: u8,
}

#[derive(DomainEvent)]
pub enum Signal {
    Up,
    Down,
}

fn main() {
    assert_eq!(Plain::REASON, "Plain");
    assert_eq!(Original::REASON, "Renamed");
    assert_eq!(Signal::REASON, "Signal");
}
