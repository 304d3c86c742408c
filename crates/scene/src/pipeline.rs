use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use worldmap_kernel::InboundEvent;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("message queue is closed")]
    Closed,
}

struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Unbounded FIFO with an async consumer side.
///
/// `enqueue` never blocks; `dequeue` suspends while the queue is empty and
/// returns `None` once the queue is closed and drained.
pub struct MessageQueue<T> {
    state: Mutex<QueueState<T>>,
    notify: Notify,
}

impl<T> Default for MessageQueue<T> {
    fn default() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                closed: false,
            }),
            notify: Notify::new(),
        }
    }
}

impl<T> MessageQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn enqueue(&self, item: T) -> Result<(), PipelineError> {
        {
            let mut state = self.lock();
            if state.closed {
                return Err(PipelineError::Closed);
            }
            state.items.push_back(item);
        }
        self.notify.notify_one();
        Ok(())
    }

    pub async fn dequeue(&self) -> Option<T> {
        loop {
            let notified = self.notify.notified();
            {
                let mut state = self.lock();
                if let Some(item) = state.items.pop_front() {
                    return Some(item);
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Stop accepting messages. Buffered messages can still be dequeued.
    pub fn close(&self) {
        self.lock().closed = true;
        self.notify.notify_waiters();
        self.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Whatever applies decoded frames to render state.
pub trait InboundSink {
    fn apply(&mut self, event: InboundEvent);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub applied: u64,
    /// Dequeued while newer frames were already waiting.
    pub skipped: u64,
    /// Frames that were not valid JSON events.
    pub rejected: u64,
}

/// Consumer loop between the transport queue and the scene.
///
/// A frame is applied only if the queue is empty right after it was
/// dequeued; frames superseded by a newer one in the same burst are skipped.
pub struct InboundPipeline {
    queue: Arc<MessageQueue<String>>,
    stats: PipelineStats,
}

impl InboundPipeline {
    pub fn new(queue: Arc<MessageQueue<String>>) -> Self {
        Self {
            queue,
            stats: PipelineStats::default(),
        }
    }

    pub fn queue(&self) -> &Arc<MessageQueue<String>> {
        &self.queue
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Handle one frame. Returns false once the queue is closed and drained.
    pub async fn step<S: InboundSink>(&mut self, sink: &mut S) -> bool {
        let Some(frame) = self.queue.dequeue().await else {
            return false;
        };
        if !self.queue.is_empty() {
            self.stats.skipped += 1;
            tracing::trace!(waiting = self.queue.len(), "skipping superseded frame");
            return true;
        }
        match InboundEvent::parse(&frame) {
            Ok(event) => {
                tracing::debug!(kind = event.kind(), "applying inbound frame");
                sink.apply(event);
                self.stats.applied += 1;
            }
            Err(err) => {
                self.stats.rejected += 1;
                tracing::warn!(%err, "dropping unparseable frame");
            }
        }
        true
    }

    /// Run until the queue is closed.
    pub async fn run<S: InboundSink>(&mut self, sink: &mut S) -> PipelineStats {
        while self.step(sink).await {}
        tracing::info!(
            applied = self.stats.applied,
            skipped = self.stats.skipped,
            rejected = self.stats.rejected,
            "inbound pipeline finished"
        );
        self.stats
    }

    /// Step until nothing is buffered. Never waits on an empty queue.
    pub async fn drain<S: InboundSink>(&mut self, sink: &mut S) -> usize {
        let mut n = 0;
        while !self.queue.is_empty() && self.step(sink).await {
            n += 1;
        }
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder(Vec<InboundEvent>);

    impl InboundSink for Recorder {
        fn apply(&mut self, event: InboundEvent) {
            self.0.push(event);
        }
    }

    fn players_frame(x: i32) -> String {
        format!(r#"{{"type":"players","data":[{{"playerID":1,"locationX":{x},"locationY":0}}]}}"#)
    }

    #[tokio::test]
    async fn dequeue_waits_for_enqueue() {
        let queue = Arc::new(MessageQueue::new());
        let producer = Arc::clone(&queue);
        let handle = tokio::spawn(async move { queue.dequeue().await });
        tokio::task::yield_now().await;
        producer.enqueue(7).unwrap();
        assert_eq!(handle.await.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn close_ends_after_drain() {
        let queue = MessageQueue::new();
        queue.enqueue("a").unwrap();
        queue.close();
        assert_eq!(queue.enqueue("b"), Err(PipelineError::Closed));
        assert_eq!(queue.dequeue().await, Some("a"));
        assert_eq!(queue.dequeue().await, None);
    }

    #[tokio::test]
    async fn burst_applies_only_the_last_frame() {
        let queue = Arc::new(MessageQueue::new());
        for x in 1..=3 {
            queue.enqueue(players_frame(x)).unwrap();
        }
        let mut pipeline = InboundPipeline::new(Arc::clone(&queue));
        let mut sink = Recorder::default();
        assert_eq!(pipeline.drain(&mut sink).await, 3);

        assert_eq!(sink.0.len(), 1);
        let InboundEvent::Players { players, .. } = &sink.0[0] else {
            panic!("expected players event");
        };
        assert_eq!(players[0].x, 3.0);
        assert_eq!(
            pipeline.stats(),
            PipelineStats {
                applied: 1,
                skipped: 2,
                rejected: 0
            }
        );
    }

    #[tokio::test]
    async fn bad_frames_are_dropped() {
        let queue = Arc::new(MessageQueue::new());
        queue.enqueue("{not json".to_string()).unwrap();
        queue.close();
        let mut pipeline = InboundPipeline::new(queue);
        let mut sink = Recorder::default();
        let stats = pipeline.run(&mut sink).await;
        assert!(sink.0.is_empty());
        assert_eq!(stats.rejected, 1);
    }
}
