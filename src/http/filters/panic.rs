//! Panic recovery stage.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::http::envelope::Envelope;
use crate::http::filter::{Filter, Next};
use crate::http::result::ErrorResult;

/// Catches panics in the stages after it and answers with a 500.
///
/// Output already written by the panicking stage is kept; the error result
/// cannot change a status that was already committed.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanicFilter;

impl Filter for PanicFilter {
    fn call<'a>(&'a self, env: &'a mut Envelope, next: Next<'a>) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let outcome = AssertUnwindSafe(next.run(&mut *env)).catch_unwind().await;
            if let Err(payload) = outcome {
                let message = panic_message(payload.as_ref());
                tracing::error!(
                    path = %env.request.path(),
                    request_id = env.request.request_id().unwrap_or("-"),
                    panic = %message,
                    "Request handler panicked"
                );
                env.set_result(ErrorResult::internal(message));
            }
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
