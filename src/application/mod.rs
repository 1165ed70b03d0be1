pub mod content;
pub mod discovery;
pub mod prompts;
pub mod report;
pub mod scoring;
pub mod service;
pub mod templates;

#[cfg(test)]
pub(crate) mod testing;

pub use service::AppService;
