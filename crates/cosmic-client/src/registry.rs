//! Multi-subscriber event handler registry.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;

pub type Handler = Arc<dyn Fn(&Value) -> anyhow::Result<()> + Send + Sync>;

/// Identifies one registration so it can be removed with `off`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Event name → handlers in registration order. Registering the same
/// closure twice yields two independent registrations.
#[derive(Default)]
pub struct EventRegistry {
    next_id: u64,
    handlers: HashMap<String, Vec<(HandlerId, Handler)>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&mut self, event: &str, handler: Handler) -> HandlerId {
        self.next_id += 1;
        let id = HandlerId(self.next_id);
        self.handlers
            .entry(event.to_string())
            .or_default()
            .push((id, handler));
        id
    }

    /// Remove one registration. Returns false if it was not registered.
    pub fn off(&mut self, event: &str, id: HandlerId) -> bool {
        let Some(list) = self.handlers.get_mut(event) else {
            return false;
        };
        let before = list.len();
        list.retain(|(h, _)| *h != id);
        let removed = list.len() != before;
        if list.is_empty() {
            self.handlers.remove(event);
        }
        removed
    }

    pub fn off_all(&mut self, event: &str) -> usize {
        self.handlers.remove(event).map(|l| l.len()).unwrap_or(0)
    }

    pub fn handler_count(&self, event: &str) -> usize {
        self.handlers.get(event).map(Vec::len).unwrap_or(0)
    }

    /// Snapshot of the handlers for `event`, so dispatch can run without
    /// holding whatever lock guards the registry.
    pub fn handlers_for(&self, event: &str) -> Vec<Handler> {
        self.handlers
            .get(event)
            .map(|l| l.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default()
    }
}

/// Invoke every handler in order. A handler that errors or panics is logged
/// and skipped; the rest still run. Returns the number of failed handlers.
pub fn dispatch(event: &str, handlers: &[Handler], payload: &Value) -> usize {
    let mut failures = 0;
    for (index, handler) in handlers.iter().enumerate() {
        match catch_unwind(AssertUnwindSafe(|| handler(payload))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                failures += 1;
                tracing::warn!(event, index, error = %e, "event handler failed");
            }
            Err(_) => {
                failures += 1;
                tracing::warn!(event, index, "event handler panicked");
            }
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &str) -> Handler {
        let log = Arc::clone(log);
        let tag = tag.to_string();
        Arc::new(move |v: &Value| -> anyhow::Result<()> {
            log.lock().unwrap().push(format!("{tag}:{v}"));
            Ok(())
        })
    }

    #[test]
    fn handlers_fire_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut reg = EventRegistry::new();
        reg.on("foo", recorder(&log, "a"));
        reg.on("foo", recorder(&log, "b"));
        dispatch("foo", &reg.handlers_for("foo"), &Value::from(1));
        assert_eq!(*log.lock().unwrap(), vec!["a:1", "b:1"]);
    }

    #[test]
    fn duplicate_registrations_both_fire() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let handler = recorder(&log, "dup");
        let mut reg = EventRegistry::new();
        reg.on("foo", Arc::clone(&handler));
        reg.on("foo", handler);
        dispatch("foo", &reg.handlers_for("foo"), &Value::Null);
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn failing_handler_does_not_block_the_next() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut reg = EventRegistry::new();
        reg.on(
            "foo",
            Arc::new(|_: &Value| -> anyhow::Result<()> { Err(anyhow::anyhow!("boom")) }),
        );
        reg.on("foo", recorder(&log, "second"));
        let failures = dispatch("foo", &reg.handlers_for("foo"), &Value::from("payload"));
        assert_eq!(failures, 1);
        assert_eq!(*log.lock().unwrap(), vec![r#"second:"payload""#]);
    }

    #[test]
    fn panicking_handler_does_not_block_the_next() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut reg = EventRegistry::new();
        reg.on(
            "foo",
            Arc::new(|_: &Value| -> anyhow::Result<()> { panic!("handler bug") }),
        );
        reg.on("foo", recorder(&log, "second"));
        let failures = dispatch("foo", &reg.handlers_for("foo"), &Value::Null);
        assert_eq!(failures, 1);
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn off_removes_only_that_registration() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut reg = EventRegistry::new();
        let first = reg.on("foo", recorder(&log, "a"));
        reg.on("foo", recorder(&log, "b"));
        assert!(reg.off("foo", first));
        assert!(!reg.off("foo", first));
        assert_eq!(reg.handler_count("foo"), 1);
        dispatch("foo", &reg.handlers_for("foo"), &Value::Null);
        assert_eq!(*log.lock().unwrap(), vec!["b:null"]);
    }

    #[test]
    fn unknown_event_has_no_handlers() {
        let reg = EventRegistry::new();
        assert!(reg.handlers_for("nothing").is_empty());
        assert_eq!(dispatch("nothing", &[], &Value::Null), 0);
    }
}
