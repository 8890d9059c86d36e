//! Stub collaborators shared by the subsystem and HTTP unit tests.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracedesk_core::{Clock, GenerationBackend, GenerationClient, GenerationError, Sleeper};

pub struct NoSleep;

#[async_trait]
impl Sleeper for NoSleep {
    async fn sleep(&self, _duration: Duration) {}
}

/// Advances by a fixed step on every read.
pub struct SteppingClock {
    base: Instant,
    step: Duration,
    reads: AtomicUsize,
}

impl SteppingClock {
    pub fn new(step: Duration) -> Self {
        Self {
            base: Instant::now(),
            step,
            reads: AtomicUsize::new(0),
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> Instant {
        let n = self.reads.fetch_add(1, Ordering::SeqCst) as u32;
        self.base + self.step * n
    }
}

/// Replies from a queue of scripted outcomes, then repeats the fallback.
pub struct FixedBackend {
    queue: Mutex<VecDeque<Option<String>>>,
    fallback: Option<String>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl FixedBackend {
    fn build(queue: Vec<Option<String>>, fallback: Option<String>) -> Self {
        Self {
            queue: Mutex::new(queue.into()),
            fallback,
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Always answers `text`.
    pub fn replying(text: &str) -> Self {
        Self::build(Vec::new(), Some(text.to_string()))
    }

    /// Answers each entry in turn; `None` entries fail.
    pub fn scripted(replies: &[Option<&str>]) -> Self {
        let queue = replies.iter().map(|r| r.map(str::to_string)).collect();
        Self::build(queue, None)
    }

    /// Never succeeds.
    pub fn failing() -> Self {
        Self::build(Vec::new(), None)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationBackend for FixedBackend {
    async fn generate(&self, _model: &str, prompt: &str) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());

        let next = self
            .queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        next.ok_or(GenerationError::Api {
            code: 503,
            message: "model overloaded".to_string(),
        })
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

pub fn client_for(backend: Arc<FixedBackend>) -> GenerationClient {
    GenerationClient::new(backend, "test-model").with_sleeper(Arc::new(NoSleep))
}

/// In-memory sink for formatted log lines.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

/// Route this thread's log output into a buffer until the guard drops.
pub fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();
    (buffer, tracing::subscriber::set_default(subscriber))
}
