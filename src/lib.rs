//! Translate Fluent localization files with an LLM completion service.
//!
//! A project keeps one directory per language under a common root. Every
//! `.ftl` file of the base language is translated into every other language
//! directory, one concurrent task per (file, language) pair.
//!
//! ```rust,ignore
//! use gpt_ftl::{Config, OpenAiClient, Orchestrator, ProgressReporter};
//! use std::sync::Arc;
//!
//! let config = Config::load()?;
//! let service = OpenAiClient::new(&config)?;
//! let orchestrator = Orchestrator::new(
//!     Arc::new(config),
//!     Arc::new(service),
//!     Arc::new(ProgressReporter::stdout()),
//! );
//! let summary = orchestrator.run().await?;
//! println!("{} succeeded", summary.success_count());
//! ```

pub mod config;
pub mod error;
pub mod ftl;
pub mod metrics;
pub mod openai;
pub mod orchestrator;
pub mod progress;
pub mod retry;
pub mod translation;
pub mod validator;

pub use config::Config;
pub use error::{ConfigError, Error, Result};
pub use ftl::{Message, ResourceFile};
pub use openai::{CompletionRequest, CompletionService, OpenAiClient};
pub use orchestrator::{Orchestrator, RunSummary, TaskFailure};
pub use progress::{ProgressEvent, ProgressReporter};
pub use translation::{TaskReport, TranslationTask};
