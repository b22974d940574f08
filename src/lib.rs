//! AI provider layer for the novel-writing backend.
//!
//! [`ProviderManager`] holds the configured vendor clients and forwards
//! `complete`, `chat` and `stream` calls to one of them; [`TemplateRegistry`]
//! fills prompt templates; [`AuthoringService`] combines both into the
//! authoring tasks.

pub mod authoring;
pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod manager;
pub mod provider;
pub mod roles;
pub mod stream;
pub mod template;
pub mod types;

pub use authoring::AuthoringService;
pub use config::Settings;
pub use error::{AiError, ProviderErrorKind};
pub use manager::ProviderManager;
pub use provider::{AiProvider, DynProvider, TextStream};
pub use roles::AuthorRole;
pub use template::TemplateRegistry;
pub use types::*;
