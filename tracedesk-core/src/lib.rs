pub mod category;
pub mod config;
pub mod db;
pub mod error;
pub mod generation;
pub mod models;
pub mod prompts;
pub mod retry;

pub use category::{Category, UnknownCategory};
pub use config::TracedeskConfig;
pub use error::TracedeskError;
pub use generation::{
    GeminiGenerationClient, GenerationBackend, GenerationClient, GenerationError,
};
pub use models::{NewTrace, Trace};
pub use retry::{Clock, RetryPolicy, Sleeper, SystemClock, TokioSleeper};
