pub mod trace;

pub use trace::{NewTrace, Trace};
