use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc};

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::jobs::model::JobType;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
type HandlerFn = dyn for<'a> Fn(&'a [u8]) -> BoxFuture<'a, Result<(), JobError>> + Send + Sync;

/// Failure reported by a handler. `code` is a short machine-readable tag
/// for logs, `message` the human-readable detail.
#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct JobError {
    pub code: &'static str,
    pub message: String,
}

impl JobError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Clone)]
pub struct HandlerEntry {
    handler: Arc<HandlerFn>,
}

impl HandlerEntry {
    pub async fn run(&self, payload: &[u8]) -> Result<(), JobError> {
        (self.handler)(payload).await
    }
}

/// Job type → handler map. Populated once before the queue starts and
/// shared read-only afterwards.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<JobType, HandlerEntry>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an async handler. A second registration for the same type
    /// replaces the first.
    pub fn register<F>(&mut self, job_type: JobType, handler: F)
    where
        F: for<'a> Fn(&'a [u8]) -> BoxFuture<'a, Result<(), JobError>> + Send + Sync + 'static,
    {
        self.handlers.insert(
            job_type,
            HandlerEntry {
                handler: Arc::new(handler),
            },
        );
    }

    /// Registers a plain synchronous handler.
    pub fn register_fn<F>(&mut self, job_type: JobType, handler: F)
    where
        F: Fn(&[u8]) -> Result<(), JobError> + Send + Sync + 'static,
    {
        self.register(job_type, move |payload| {
            let res = handler(payload);
            boxed(async move { res })
        });
    }

    pub fn handler_for(&self, job_type: &JobType) -> Option<&HandlerEntry> {
        self.handlers.get(job_type)
    }

    pub fn contains(&self, job_type: &JobType) -> bool {
        self.handlers.contains_key(job_type)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

pub fn boxed<'a, T>(fut: impl Future<Output = T> + Send + 'a) -> BoxFuture<'a, T> {
    Box::pin(fut)
}

/// Decodes a JSON payload, tagging decode failures as `BAD_PAYLOAD`.
pub fn parse_payload<T: DeserializeOwned>(payload: &[u8]) -> Result<T, JobError> {
    serde_json::from_slice(payload).map_err(|e| JobError::new("BAD_PAYLOAD", e.to_string()))
}
