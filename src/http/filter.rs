//! Filter chain execution.
//!
//! A chain is an ordered, immutable list of stages. Each stage receives the
//! envelope and a [`Next`] handle for the rest of the chain. A stage either
//! answers the request itself (sets a result, a status, or writes the
//! output) or calls [`Next::run`]. `Next` is consumed by `run`, so the rest
//! of the chain can be invoked at most once. A stage that neither answers
//! nor calls `next` leaves the response empty; the framework does not fill
//! it in.

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::http::envelope::Envelope;

/// One processing stage.
pub trait Filter: Send + Sync {
    fn call<'a>(&'a self, env: &'a mut Envelope, next: Next<'a>) -> BoxFuture<'a, ()>;
}

/// The remaining stages after the current one.
pub struct Next<'a> {
    rest: &'a [Arc<dyn Filter>],
}

impl<'a> Next<'a> {
    /// Run the remaining stages. Returns immediately at the end of the chain.
    pub fn run<'b>(self, env: &'b mut Envelope) -> BoxFuture<'b, ()>
    where
        'a: 'b,
    {
        match self.rest.split_first() {
            Some((stage, rest)) => stage.call(env, Next { rest }),
            None => Box::pin(async {}),
        }
    }
}

/// An ordered, immutable list of stages.
#[derive(Clone)]
pub struct FilterChain {
    stages: Arc<[Arc<dyn Filter>]>,
}

impl FilterChain {
    pub fn new(stages: Vec<Arc<dyn Filter>>) -> Self {
        Self {
            stages: stages.into(),
        }
    }

    /// Invoke the first stage with the rest of the chain.
    pub async fn run(&self, env: &mut Envelope) {
        Next {
            rest: &self.stages,
        }
        .run(env)
        .await
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterChain")
            .field("stages", &self.stages.len())
            .finish()
    }
}
