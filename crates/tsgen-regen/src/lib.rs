//! Debounced, change-detecting regeneration of a TypeScript API client.
//!
//! A [`RegenerationController`] receives triggering events (file changes,
//! startup), waits for them to settle through a [`DebounceGate`], and then
//! runs one cycle on its [`CycleRunner`]:
//!
//! ```text
//! fetching ─► validating ─► fingerprinting ─► comparing ─┬─► skipped (unchanged)
//!                                                        └─► generating ─► persisting ─► succeeded
//! ```
//!
//! Any stage can end the cycle with a [`CycleError`]; it is reported as
//! [`GenerationOutcome::Failed`] and never stops the controller.
//!
//! The cycle's collaborators are injected:
//!
//! - [`ProviderResolver`] turns the configured identifier into a
//!   [`SchemaProvider`] (built in: [`IdentifierResolver`])
//! - [`ClientGenerator`] writes the client (built in: [`OpenApiGeneratorCli`])
//! - [`FingerprintStore`](tsgen_core::FingerprintStore) remembers the last
//!   generated schema (built in: [`FileStore`](tsgen_core::FileStore))
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use camino::Utf8Path;
//! use tokio_util::sync::CancellationToken;
//! use tsgen_core::{Config, FileStore};
//! use tsgen_regen::{CycleRunner, CycleSettings, IdentifierResolver, OpenApiGeneratorCli, RegenerationController};
//!
//! # async fn example(config: Config) {
//! let runner = CycleRunner::new(
//!     IdentifierResolver::new(Utf8Path::new(".")),
//!     OpenApiGeneratorCli::from_config(&config.generator, config.clean_before_generate),
//!     FileStore::in_output_dir(&config.output_dir),
//!     CycleSettings::from_config(&config),
//! );
//!
//! let cancel = CancellationToken::new();
//! let controller = RegenerationController::spawn(Arc::new(runner), config.debounce(), true, &cancel);
//! let mut outcomes = controller.subscribe();
//!
//! controller.on_triggering_event();
//! if let Ok(outcome) = outcomes.recv().await {
//!     println!("{}", outcome.status_line());
//! }
//! controller.shutdown().await;
//! # }
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod controller;
pub mod cycle;
pub mod debounce;
pub mod error;
pub mod generator;
pub mod outcome;
pub mod provider;
pub mod tools;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::RegenerationController;
pub use cycle::{CycleRunner, CycleSettings};
pub use debounce::{DebounceGate, Settlement};
pub use error::{CycleError, GeneratorError, MAX_STDERR_CHARS, ProviderError, Stage};
pub use generator::{ClientGenerator, MissingDependency, OpenApiGeneratorCli};
pub use outcome::{GenerationOutcome, SkipReason};
pub use provider::{
    BuiltinProvider, CommandProvider, DEFAULT_COMMAND_TIMEOUT, FileProvider, IdentifierResolver,
    ProviderResolver, SchemaProvider,
};
