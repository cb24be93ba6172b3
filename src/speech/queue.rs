use std::collections::VecDeque;
use std::time::Instant;

/// Speech priority. Hazard warnings jump ahead of narration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SpeechPriority {
    /// Narration from the cognitive loop.
    Low,
    /// Hazard warnings from the reflex loop.
    High,
}

#[derive(Clone, Debug)]
pub struct SpeechRequest {
    pub text: String,
    pub priority: SpeechPriority,
    pub enqueued_at: Instant,
}

impl SpeechRequest {
    pub fn new(text: impl Into<String>, priority: SpeechPriority) -> Self {
        Self {
            text: text.into(),
            priority,
            enqueued_at: Instant::now(),
        }
    }
}

/// Bounded two-tier queue: every high request leaves before any low one,
/// FIFO within a tier.
#[derive(Debug)]
pub struct PriorityQueue {
    high: VecDeque<SpeechRequest>,
    low: VecDeque<SpeechRequest>,
    capacity: usize,
}

impl PriorityQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            high: VecDeque::new(),
            low: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Push a request. Hands it back when the queue is full.
    pub fn push(&mut self, request: SpeechRequest) -> Result<(), SpeechRequest> {
        if self.len() >= self.capacity {
            return Err(request);
        }
        match request.priority {
            SpeechPriority::High => self.high.push_back(request),
            SpeechPriority::Low => self.low.push_back(request),
        }
        Ok(())
    }

    pub fn pop(&mut self) -> Option<SpeechRequest> {
        self.high.pop_front().or_else(|| self.low.pop_front())
    }

    pub fn len(&self) -> usize {
        self.high.len() + self.low.len()
    }

    pub fn is_empty(&self) -> bool {
        self.high.is_empty() && self.low.is_empty()
    }

    pub fn clear(&mut self) {
        self.high.clear();
        self.low.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_before_low_fifo_within_tier() {
        let mut queue = PriorityQueue::new(8);
        for (text, priority) in [
            ("narration 1", SpeechPriority::Low),
            ("stop 1", SpeechPriority::High),
            ("narration 2", SpeechPriority::Low),
            ("stop 2", SpeechPriority::High),
        ] {
            queue.push(SpeechRequest::new(text, priority)).unwrap();
        }
        let order: Vec<String> = std::iter::from_fn(|| queue.pop()).map(|r| r.text).collect();
        assert_eq!(order, vec!["stop 1", "stop 2", "narration 1", "narration 2"]);
    }

    #[test]
    fn full_queue_rejects() {
        let mut queue = PriorityQueue::new(2);
        queue.push(SpeechRequest::new("a", SpeechPriority::Low)).unwrap();
        queue.push(SpeechRequest::new("b", SpeechPriority::Low)).unwrap();
        let rejected = queue
            .push(SpeechRequest::new("c", SpeechPriority::High))
            .unwrap_err();
        assert_eq!(rejected.text, "c");
        assert_eq!(queue.len(), 2);
    }
}
