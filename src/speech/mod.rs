//! Serialized audio output.
//!
//! One speech worker drains a two-tier priority queue and is the only thread
//! that speaks. Alert tones run on a separate tone worker; the speech worker
//! waits (bounded) for a playing tone to finish so tones are never talked over.

mod queue;

pub use queue::{PriorityQueue, SpeechPriority, SpeechRequest};

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::worker::join_with_timeout;

/// Audio device. Both calls block until playback is done.
pub trait AudioOutput: Send + Sync {
    fn play_tone(&self, freq_hz: u32, duration: Duration) -> Result<()>;
    fn speak(&self, text: &str) -> Result<()>;
}

/// Audio output that writes to the log. Tones still take their duration so
/// timing behaves as with a real device.
#[derive(Debug, Default)]
pub struct LogAudio;

impl AudioOutput for LogAudio {
    fn play_tone(&self, freq_hz: u32, duration: Duration) -> Result<()> {
        log::info!("[tone] {} Hz for {} ms", freq_hz, duration.as_millis());
        std::thread::sleep(duration);
        Ok(())
    }

    fn speak(&self, text: &str) -> Result<()> {
        log::info!("[speech] {}", text);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SpeechConfig {
    pub queue_capacity: usize,
    /// Longest time speech waits for a playing tone.
    pub tone_wait: Duration,
    /// Worker poll interval; bounds how long shutdown takes to be noticed.
    pub poll: Duration,
    pub join_timeout: Duration,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 16,
            tone_wait: Duration::from_millis(500),
            poll: Duration::from_millis(100),
            join_timeout: Duration::from_secs(2),
        }
    }
}

struct ToneRequest {
    freq_hz: u32,
    duration: Duration,
}

struct Shared {
    queue: Mutex<PriorityQueue>,
    queue_ready: Condvar,
    tone_playing: Mutex<bool>,
    tone_done: Condvar,
    running: AtomicBool,
    spoken: Mutex<u64>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct SpeechDispatcher {
    shared: Arc<Shared>,
    tone_tx: Mutex<SyncSender<ToneRequest>>,
    workers: Mutex<Vec<(&'static str, JoinHandle<()>)>>,
    config: SpeechConfig,
}

impl SpeechDispatcher {
    /// Start the speech and tone workers over `audio`.
    pub fn spawn(audio: Arc<dyn AudioOutput>, config: SpeechConfig) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(PriorityQueue::new(config.queue_capacity)),
            queue_ready: Condvar::new(),
            tone_playing: Mutex::new(false),
            tone_done: Condvar::new(),
            running: AtomicBool::new(true),
            spoken: Mutex::new(0),
        });
        let (tone_tx, tone_rx) = mpsc::sync_channel(1);

        let speech = {
            let shared = shared.clone();
            let audio = audio.clone();
            let config = config.clone();
            std::thread::spawn(move || run_speech(shared, audio, config))
        };
        let tone = {
            let shared = shared.clone();
            let poll = config.poll;
            std::thread::spawn(move || run_tone(shared, audio, tone_rx, poll))
        };

        Self {
            shared,
            tone_tx: Mutex::new(tone_tx),
            workers: Mutex::new(vec![("speech worker", speech), ("tone worker", tone)]),
            config,
        }
    }

    /// Queue text for speech without blocking. Returns false when the request
    /// was dropped (blank text, full queue or dispatcher stopped).
    pub fn enqueue(&self, text: &str, priority: SpeechPriority) -> bool {
        if text.trim().is_empty() {
            log::warn!("ignoring empty speech request");
            return false;
        }
        if !self.shared.running.load(Ordering::SeqCst) {
            return false;
        }
        let pushed = lock(&self.shared.queue).push(SpeechRequest::new(text, priority));
        match pushed {
            Ok(()) => {
                self.shared.queue_ready.notify_one();
                true
            }
            Err(dropped) => {
                log::warn!(
                    "speech queue full; dropping {:?} request: {}",
                    dropped.priority,
                    truncate(&dropped.text, 50)
                );
                false
            }
        }
    }

    /// Start an alert tone on the tone worker. Returns false if a tone is
    /// already playing or the dispatcher is stopped.
    pub fn play_tone(&self, freq_hz: u32, duration: Duration) -> bool {
        if !self.shared.running.load(Ordering::SeqCst) {
            return false;
        }
        {
            let mut playing = lock(&self.shared.tone_playing);
            if *playing {
                log::debug!("tone already playing; skipping");
                return false;
            }
            *playing = true;
        }
        let sent = lock(&self.tone_tx).try_send(ToneRequest { freq_hz, duration });
        match sent {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.finish_tone();
                false
            }
        }
    }

    fn finish_tone(&self) {
        *lock(&self.shared.tone_playing) = false;
        self.shared.tone_done.notify_all();
    }

    pub fn is_tone_playing(&self) -> bool {
        *lock(&self.shared.tone_playing)
    }

    /// Requests waiting to be spoken.
    pub fn pending(&self) -> usize {
        lock(&self.shared.queue).len()
    }

    /// Utterances completed since start.
    pub fn spoken(&self) -> u64 {
        *lock(&self.shared.spoken)
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Stop both workers. Pending requests are discarded. Idempotent.
    pub fn shutdown(&self) {
        if !self.shared.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let discarded = {
            let mut queue = lock(&self.shared.queue);
            let n = queue.len();
            queue.clear();
            n
        };
        if discarded > 0 {
            log::debug!("discarding {} pending speech requests", discarded);
        }
        self.shared.queue_ready.notify_all();
        self.shared.tone_done.notify_all();
        let workers: Vec<_> = lock(&self.workers).drain(..).collect();
        for (name, handle) in workers {
            join_with_timeout(handle, self.config.join_timeout, name);
        }
    }
}

impl Drop for SpeechDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_speech(shared: Arc<Shared>, audio: Arc<dyn AudioOutput>, config: SpeechConfig) {
    log::debug!("speech worker started");
    while shared.running.load(Ordering::SeqCst) {
        let request = {
            let mut queue = lock(&shared.queue);
            match queue.pop() {
                Some(request) => request,
                None => {
                    let (guard, _) = shared
                        .queue_ready
                        .wait_timeout(queue, config.poll)
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                    drop(guard);
                    continue;
                }
            }
        };

        wait_for_tone(&shared, config.tone_wait);
        if !shared.running.load(Ordering::SeqCst) {
            break;
        }
        log::debug!(
            "speaking {:?} request after {} ms in queue",
            request.priority,
            request.enqueued_at.elapsed().as_millis()
        );
        if let Err(e) = audio.speak(&request.text) {
            log::error!("speech output failed: {}", e);
            continue;
        }
        *lock(&shared.spoken) += 1;
    }
    log::debug!("speech worker stopped");
}

fn wait_for_tone(shared: &Shared, max_wait: Duration) {
    let deadline = Instant::now() + max_wait;
    let mut playing = lock(&shared.tone_playing);
    while *playing {
        let now = Instant::now();
        if now >= deadline {
            log::debug!("tone still playing after {:?}; speaking anyway", max_wait);
            return;
        }
        let (guard, _) = shared
            .tone_done
            .wait_timeout(playing, deadline - now)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        playing = guard;
    }
}

fn run_tone(
    shared: Arc<Shared>,
    audio: Arc<dyn AudioOutput>,
    requests: Receiver<ToneRequest>,
    poll: Duration,
) {
    while shared.running.load(Ordering::SeqCst) {
        let request = match requests.recv_timeout(poll) {
            Ok(request) => request,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        if let Err(e) = audio.play_tone(request.freq_hz, request.duration) {
            log::warn!("tone output failed: {}", e);
        }
        *lock(&shared.tone_playing) = false;
        shared.tone_done.notify_all();
    }
}

pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
