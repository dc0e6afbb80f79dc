pub mod analysis;
pub mod context;
pub mod llm;
pub mod progress;
pub mod sink;
pub mod virustotal;
