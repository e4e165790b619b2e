//! LLM API interaction for geolocation inference.
//!
//! # Architecture
//!
//! - [`AskAsync`]: core trait defining async LLM interaction
//! - [`AskFnWrapper`]: wraps the `awful_aj` library's `ask` function
//! - [`ask_with_timeout`]: bounds a single call with a hard deadline
//!
//! `Option<A>` is itself an [`AskAsync`]: `None` stands for a client whose
//! configuration could not be loaded, and fails every call without I/O.
//!
//! The model is treated as best-effort: there is no retry loop here. A failed
//! or timed-out call leaves the snapshot unenriched and the next pipeline run
//! tries again.

use awful_aj::api::ask;
use awful_aj::{config::AwfulJadeConfig, template::ChatTemplate};
use std::error::Error;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument, warn};

/// Trait for async LLM interaction.
///
/// Implementors of this trait can send text to an LLM and receive a response.
/// The enricher is generic over it so tests can substitute a canned model.
pub trait AskAsync {
    /// The type of response returned by the LLM.
    type Response;

    /// Send text to the LLM and receive a response.
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>>;
}

/// Wrapper around `awful_aj::api::ask` that implements [`AskAsync`].
#[derive(Debug)]
pub struct AskFnWrapper<'a> {
    /// Reference to the LLM configuration (API keys, endpoints, model settings).
    pub config: &'a AwfulJadeConfig,
    /// Reference to the chat template carrying the geolocation system prompt.
    pub template: &'a ChatTemplate,
}

impl<'a> AskAsync for AskFnWrapper<'a> {
    type Response = String;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        let t0 = Instant::now();
        let res = ask(self.config, text.to_string(), self.template, None, None).await;
        let dt = t0.elapsed();

        match &res {
            Ok(_) => {}
            Err(e) => warn!(elapsed_ms = dt.as_millis() as u128, error = %e, "API call failed"),
        }
        res
    }
}

impl<A: AskAsync> AskAsync for Option<A> {
    type Response = A::Response;

    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        match self {
            Some(client) => client.ask(text).await,
            None => Err("LLM client is not configured".into()),
        }
    }
}

/// Outcome of a deadline-bounded ask.
#[derive(Debug)]
pub enum Asked<R> {
    Answered(R),
    Failed(String),
    TimedOut,
}

/// Call `client` once, giving up after `deadline`.
///
/// The error is flattened to a string before the function returns so the
/// non-`Send` boxed error never outlives this call.
#[instrument(level = "info", skip_all, fields(deadline_ms = deadline.as_millis() as u64))]
pub async fn ask_with_timeout<A: AskAsync>(client: &A, text: &str, deadline: Duration) -> Asked<A::Response> {
    let t0 = Instant::now();
    let res = tokio::time::timeout(deadline, client.ask(text)).await;
    let dt = t0.elapsed();

    match res {
        Ok(Ok(resp)) => {
            info!(elapsed_ms_total = dt.as_millis() as u128, "ask_with_timeout succeeded");
            Asked::Answered(resp)
        }
        Ok(Err(e)) => {
            error!(elapsed_ms_total = dt.as_millis() as u128, error = %e, "ask_with_timeout failed");
            Asked::Failed(e.to_string())
        }
        Err(_) => {
            error!(elapsed_ms_total = dt.as_millis() as u128, "ask_with_timeout hit its deadline");
            Asked::TimedOut
        }
    }
}
