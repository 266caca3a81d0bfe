//! In-process topics with consumer counting
use std::sync::{atomic::{AtomicU64, Ordering}, Arc, Weak};

use concurrent_queue::ConcurrentQueue;
use parking_lot::Mutex;
use tracing::trace;

/// Somewhere results can be sent
pub trait Sink<T>: Send + Sync {
	fn publish(&self, message: T);

	/// How many consumers would currently receive a published message?
	fn active_consumer_count(&self) -> usize;
}

impl<T, S: Sink<T> + ?Sized> Sink<T> for Arc<S> {
	fn publish(&self, message: T) {
		(**self).publish(message)
	}

	fn active_consumer_count(&self) -> usize {
		(**self).active_consumer_count()
	}
}

/// Fans messages out to every live [Subscriber]
///
/// Each subscriber has a bounded queue; when it is full the oldest message
/// is dropped. Dropping a subscriber unsubscribes it.
pub struct Publisher<T> {
	topic: String,
	subscribers: Mutex<Vec<Weak<ConcurrentQueue<T>>>>,
	published: AtomicU64,
}

impl<T> Publisher<T> {
	pub fn new(topic: impl Into<String>) -> Self {
		Self {
			topic: topic.into(),
			subscribers: Mutex::new(Vec::new()),
			published: AtomicU64::new(0),
		}
	}

	/// Start receiving messages, keeping at most `queue_size` of them
	pub fn subscribe(&self, queue_size: usize) -> Subscriber<T> {
		let queue = Arc::new(ConcurrentQueue::bounded(queue_size.max(1)));
		let mut subscribers = self.subscribers.lock();
		subscribers.retain(|s| s.strong_count() > 0);
		subscribers.push(Arc::downgrade(&queue));
		Subscriber { queue }
	}

	/// Number of messages published so far
	pub fn published_count(&self) -> u64 {
		self.published.load(Ordering::Relaxed)
	}
}

impl<T: Clone + Send> Sink<T> for Publisher<T> {
	fn publish(&self, message: T) {
		self.published.fetch_add(1, Ordering::Relaxed);

		let live = {
			let mut subscribers = self.subscribers.lock();
			subscribers.retain(|s| s.strong_count() > 0);
			subscribers.iter()
				.filter_map(Weak::upgrade)
				.collect::<Vec<_>>()
		};

		let Some((last, rest)) = live.split_last() else {
			trace!("Nobody subscribed to {}", self.topic);
			return;
		};
		for queue in rest {
			// Only fails if the queue was closed, which subscribers never do
			let _ = queue.force_push(message.clone());
		}
		let _ = last.force_push(message);
	}

	fn active_consumer_count(&self) -> usize {
		self.subscribers.lock()
			.iter()
			.filter(|s| s.strong_count() > 0)
			.count()
	}
}

/// Receiving end of a [Publisher]
pub struct Subscriber<T> {
	queue: Arc<ConcurrentQueue<T>>,
}

impl<T> Subscriber<T> {
	/// Next queued message, if any
	pub fn try_recv(&self) -> Option<T> {
		self.queue.pop().ok()
	}

	/// All queued messages, oldest first
	pub fn drain(&self) -> Vec<T> {
		self.queue.try_iter().collect()
	}

	pub fn is_empty(&self) -> bool {
		self.queue.is_empty()
	}
}
