//! Broadcast of crank events to any number of subscribers.

use scope_types::CrankEvent;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<CrankEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<CrankEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event. Having no subscribers is not an error.
	pub fn publish(&self, event: CrankEvent) {
		let _ = self.sender.send(event);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_publish_reaches_subscribers() {
		let bus = EventBus::new(8);
		bus.publish(CrankEvent::RefreshSkipped {
			slot_index: 0,
			reason: "nobody listening".into(),
		});

		let mut receiver = bus.subscribe();
		let event = CrankEvent::Ready {
			feed_id: "hubble".into(),
			mapped_slots: 2,
		};
		bus.publish(event.clone());
		assert_eq!(receiver.recv().await.unwrap(), event);
	}
}
