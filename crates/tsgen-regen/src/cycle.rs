//! One regeneration cycle: fetch, validate, fingerprint, compare, generate,
//! persist.
//!
//! [`CycleRunner`] owns the three capabilities a cycle needs (provider
//! resolution, client generation, fingerprint storage) and nothing else, so
//! it holds no state between cycles. Every error is turned into a
//! [`GenerationOutcome::Failed`] at the cycle boundary.

use std::time::Duration;

use camino::Utf8PathBuf;
use tracing::{debug, info, warn};

use tsgen_core::{ClientFormat, Config, Fingerprint, FingerprintStore, SchemaDocument, StoreError};

use crate::error::{CycleError, ProviderError};
use crate::generator::ClientGenerator;
use crate::outcome::{GenerationOutcome, SkipReason};
use crate::provider::{ProviderResolver, SchemaProvider};

/// What a cycle regenerates, and how long it may take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleSettings {
    /// Provider identifier, resolved afresh every cycle.
    pub provider: String,
    /// Directory the client is written to.
    pub output_dir: Utf8PathBuf,
    /// Client flavour.
    pub format: ClientFormat,
    /// Upper bound for one generator run.
    pub generate_timeout: Duration,
}

impl CycleSettings {
    /// Takes the cycle settings from a loaded configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            provider: config.schema_provider.clone(),
            output_dir: config.output_dir.clone(),
            format: config.format,
            generate_timeout: config.generator_timeout(),
        }
    }
}

/// Runs regeneration cycles against injected capabilities.
#[derive(Debug)]
pub struct CycleRunner<R, G, S> {
    resolver: R,
    generator: G,
    store: S,
    settings: CycleSettings,
}

impl<R, G, S> CycleRunner<R, G, S>
where
    R: ProviderResolver,
    G: ClientGenerator,
    S: FingerprintStore,
{
    /// Creates a runner.
    pub const fn new(resolver: R, generator: G, store: S, settings: CycleSettings) -> Self {
        Self {
            resolver,
            generator,
            store,
            settings,
        }
    }

    /// Returns the settings.
    pub const fn settings(&self) -> &CycleSettings {
        &self.settings
    }

    /// Returns the fingerprint store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Returns the client generator.
    pub const fn generator(&self) -> &G {
        &self.generator
    }

    /// Reads the stored fingerprint once, before any cycle runs.
    ///
    /// Unlike a read failure during a cycle, which only fails that cycle, a
    /// failure here is meant to stop the host.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Read`] if the store exists but cannot be read.
    pub fn preflight(&self) -> Result<Option<Fingerprint>, StoreError> {
        let stored = self.store.load()?;
        match &stored {
            Some(fingerprint) => info!(
                store = %self.store.location(),
                fingerprint = fingerprint.short(),
                "Found stored schema fingerprint"
            ),
            None => info!(store = %self.store.location(), "No stored schema fingerprint"),
        }
        Ok(stored)
    }

    /// Resolves the provider and obtains the current document.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the identifier does not resolve or the
    /// provider fails.
    pub async fn fetch_schema(&self) -> Result<SchemaDocument, ProviderError> {
        let provider = self.resolver.resolve(&self.settings.provider)?;
        debug!(provider = provider.identifier(), "Fetching schema");
        provider.get_schema().await
    }

    /// Runs one cycle, skipping generation when the schema is unchanged.
    pub async fn run_cycle(&self) -> GenerationOutcome {
        self.run(false).await
    }

    /// Runs one cycle that always calls the generator.
    pub async fn run_cycle_forced(&self) -> GenerationOutcome {
        self.run(true).await
    }

    async fn run(&self, force: bool) -> GenerationOutcome {
        let outcome = match self.try_run(force).await {
            Ok(outcome) => outcome,
            Err(error) => error.into(),
        };
        log_outcome(&outcome);
        outcome
    }

    async fn try_run(&self, force: bool) -> Result<GenerationOutcome, CycleError> {
        let document = self.fetch_schema().await?;
        document.validate()?;
        let fingerprint = tsgen_core::fingerprint(&document)?;

        if !force {
            let stored = self.store.load().map_err(CycleError::StoreRead)?;
            if stored.as_ref() == Some(&fingerprint) {
                return Ok(GenerationOutcome::Skipped {
                    reason: SkipReason::Unchanged,
                    fingerprint,
                });
            }
            debug!(
                previous = stored.as_ref().map(Fingerprint::short),
                current = fingerprint.short(),
                "Schema changed"
            );
        }

        let after = self.settings.generate_timeout;
        let generation = self
            .generator
            .generate(&document, self.settings.format, &self.settings.output_dir);
        // Dropping the generation future on expiry kills the child process.
        tokio::time::timeout(after, generation)
            .await
            .map_err(|_| CycleError::Timeout { after })??;

        self.store
            .save(&fingerprint)
            .map_err(CycleError::StoreWrite)?;

        Ok(GenerationOutcome::Succeeded { fingerprint })
    }
}

fn log_outcome(outcome: &GenerationOutcome) {
    match outcome {
        GenerationOutcome::Skipped { fingerprint, .. } => {
            info!(fingerprint = fingerprint.short(), "Schema unchanged, skipping generation");
        }
        GenerationOutcome::Succeeded { fingerprint } => {
            info!(fingerprint = fingerprint.short(), "Client generated");
        }
        GenerationOutcome::Failed(error) => {
            warn!(
                stage = %error.stage(),
                reason = error.reason_code(),
                error = %error,
                "Regeneration cycle failed"
            );
        }
    }
}
