pub mod analysis;
pub mod cli;
pub mod config;
pub mod logging;
pub mod normalize;
pub mod source;
pub mod store;
pub mod summarize;

pub use config::Config;
pub use logging::LogContext;
pub use source::{FileLister, GlobLister};
pub use store::TableStore;
pub use summarize::Summarizer;
