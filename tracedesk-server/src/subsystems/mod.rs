pub mod analytics;
pub mod chat;
pub mod classifier;
pub mod responder;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;
