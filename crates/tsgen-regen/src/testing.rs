//! In-memory stand-ins for the cycle's collaborators.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use parking_lot::Mutex;
use serde_json::{Value, json};

use tsgen_core::{ClientFormat, Fingerprint, FingerprintStore, SchemaDocument, StoreError};

use crate::error::{GeneratorError, ProviderError};
use crate::generator::ClientGenerator;
use crate::provider::{ProviderResolver, SchemaProvider};

pub(crate) fn schema_with_title(title: &str) -> SchemaDocument {
    SchemaDocument::new(json!({
        "openapi": "3.1.0",
        "info": {"title": title, "version": "1.0.0"},
        "paths": {"/api/items": {"get": {"operationId": "list_items"}}}
    }))
}

/// Resolves every identifier to the current document, or to nothing.
#[derive(Debug, Default)]
pub(crate) struct FakeResolver {
    schema: Arc<Mutex<Option<Value>>>,
    resolutions: AtomicUsize,
}

impl FakeResolver {
    pub(crate) fn serving(document: &SchemaDocument) -> Self {
        let resolver = Self::default();
        resolver.set_schema(document);
        resolver
    }

    pub(crate) fn unresolvable() -> Self {
        Self::default()
    }

    pub(crate) fn set_schema(&self, document: &SchemaDocument) {
        *self.schema.lock() = Some(document.as_value().clone());
    }

    pub(crate) fn resolutions(&self) -> usize {
        self.resolutions.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub(crate) struct FakeProvider {
    identifier: String,
    schema: Value,
}

impl SchemaProvider for FakeProvider {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn get_schema(&self) -> Result<SchemaDocument, ProviderError> {
        Ok(SchemaDocument::new(self.schema.clone()))
    }
}

impl ProviderResolver for FakeResolver {
    type Provider = FakeProvider;

    fn resolve(&self, identifier: &str) -> Result<FakeProvider, ProviderError> {
        self.resolutions.fetch_add(1, Ordering::SeqCst);
        let schema = self.schema.lock().clone();
        schema
            .map(|schema| FakeProvider {
                identifier: identifier.to_owned(),
                schema,
            })
            .ok_or_else(|| ProviderError::unresolved(identifier, "no such provider"))
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Behavior {
    Succeed,
    Reject(&'static str),
    Delay(Duration),
    Panic(&'static str),
}

/// Counts calls and behaves as told.
#[derive(Debug)]
pub(crate) struct FakeGenerator {
    behavior: Mutex<Behavior>,
    calls: AtomicUsize,
}

impl FakeGenerator {
    pub(crate) fn new(behavior: Behavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn set_behavior(&self, behavior: Behavior) {
        *self.behavior.lock() = behavior;
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ClientGenerator for FakeGenerator {
    async fn generate(
        &self,
        _schema: &SchemaDocument,
        _format: ClientFormat,
        _output_dir: &Utf8Path,
    ) -> Result<(), GeneratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self.behavior.lock().clone();
        match behavior {
            Behavior::Succeed => Ok(()),
            Behavior::Reject(stderr) => Err(GeneratorError::invalid_spec(stderr)),
            Behavior::Delay(duration) => {
                tokio::time::sleep(duration).await;
                Ok(())
            }
            Behavior::Panic(message) => panic!("{message}"),
        }
    }
}

/// Fingerprint store that lives in memory and counts every access.
#[derive(Debug)]
pub(crate) struct MemoryStore {
    location: Utf8PathBuf,
    value: Mutex<Option<Fingerprint>>,
    fail_reads: bool,
    loads: AtomicUsize,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub(crate) fn new(value: Option<Fingerprint>) -> Self {
        Self {
            location: Utf8PathBuf::from("memory/.schema.hash"),
            value: Mutex::new(value),
            fail_reads: false,
            loads: AtomicUsize::new(0),
            saves: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing_reads() -> Self {
        Self {
            fail_reads: true,
            ..Self::new(None)
        }
    }

    pub(crate) fn value(&self) -> Option<Fingerprint> {
        self.value.lock().clone()
    }

    pub(crate) fn accesses(&self) -> usize {
        self.loads.load(Ordering::SeqCst) + self.saves.load(Ordering::SeqCst)
    }

    pub(crate) fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl FingerprintStore for MemoryStore {
    fn load(&self) -> Result<Option<Fingerprint>, StoreError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads {
            return Err(StoreError::read(
                self.location.clone(),
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "permission denied"),
            ));
        }
        Ok(self.value.lock().clone())
    }

    fn save(&self, fingerprint: &Fingerprint) -> Result<(), StoreError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.value.lock() = Some(fingerprint.clone());
        Ok(())
    }

    fn location(&self) -> &Utf8Path {
        &self.location
    }
}
