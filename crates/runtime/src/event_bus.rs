use foundation::time::Time;

/// A recorded lifecycle event.
///
/// Structured text with a stable `kind` tag; hosts can surface these in a
/// debug panel and tests can assert on them without installing a subscriber.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub at: Time,
    pub kind: &'static str,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct EventBus {
    events: Vec<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn emit(&mut self, at: Time, kind: &'static str, message: impl Into<String>) {
        self.events.push(Event {
            at,
            kind,
            message: message.into(),
        });
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Events of one kind, in emission order.
    pub fn of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Event> + 'a {
        self.events.iter().filter(move |e| e.kind == kind)
    }

    pub fn count(&self, kind: &str) -> usize {
        self.of_kind(kind).count()
    }

    pub fn drain(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::EventBus;
    use foundation::time::Time;

    #[test]
    fn records_events_with_timestamp() {
        let mut bus = EventBus::new();
        bus.emit(Time(2.0), "state", "ready");
        assert_eq!(bus.events().len(), 1);
        assert_eq!(bus.events()[0].at, Time(2.0));
    }

    #[test]
    fn counts_by_kind() {
        let mut bus = EventBus::new();
        bus.emit(Time(0.0), "retry", "attempt 1");
        bus.emit(Time(0.5), "state", "initializing");
        bus.emit(Time(2.0), "retry", "attempt 2");
        assert_eq!(bus.count("retry"), 2);
        let drained = bus.drain();
        assert_eq!(drained.len(), 3);
        assert!(bus.events().is_empty());
    }
}
