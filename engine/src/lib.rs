use crate::llm::LLM;

pub mod component;
pub mod config;
pub mod llm;

pub type LLMBox = Box<dyn LLM + Send>;

pub use component::{LmStudioComponent, LogOutput, OutputHandler};
pub use config::ClientConfig;
