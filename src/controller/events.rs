use crate::core::models::UpdateEvent;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 16;

/// Fire-and-forget fan-out of [`UpdateEvent`]s. Listeners hold a clone of the
/// bus (or just a receiver) and never a reference to the controller.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<UpdateEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UpdateEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: UpdateEvent) {
        // No listeners is fine.
        let delivered = self.tx.send(event).unwrap_or(0);
        tracing::debug!(event = event.name(), delivered, "Broadcast update event");
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    #[tokio::test]
    async fn test_every_listener_receives_event() {
        let bus = EventBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.clone().subscribe();

        bus.emit(UpdateEvent::Completed);

        assert_eq!(first.recv().await.unwrap(), UpdateEvent::Completed);
        assert_eq!(second.recv().await.unwrap(), UpdateEvent::Completed);
        assert!(matches!(first.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_emit_without_listeners() {
        let bus = EventBus::new();
        bus.emit(UpdateEvent::Failed);
    }
}
