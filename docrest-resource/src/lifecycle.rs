//! The per-request state machine shared by every handler archetype.
//!
//! A request moves through [`Phase::Start`], [`Phase::PreHook`], [`Phase::Executing`],
//! then [`Phase::Success`] or [`Phase::Failed`], then [`Phase::PostHook`] (success only)
//! and finally [`Phase::Done`]. Each transition is logged at `trace` level.

use async_trait::async_trait;
use std::future::Future;
use tracing::{debug, error, trace};

use crate::{
    error::{RestError, RestResult},
    request::{Method, Request, Response},
};

/// The four handler shapes, each with a fixed set of verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Archetype {
    /// `/resource/{id}`
    Single,
    /// `/resource`
    Collection,
    /// `/resource/{id}/{field}/{nested_id}`
    NestedSingle,
    /// `/resource/{id}/{field}`
    NestedCollection,
}

impl Archetype {
    pub fn allowed_methods(&self) -> &'static [Method] {
        match self {
            Archetype::Single | Archetype::NestedSingle => &[
                Method::Get,
                Method::Put,
                Method::Patch,
                Method::Delete,
                Method::Options,
            ],
            Archetype::Collection | Archetype::NestedCollection => {
                &[Method::Get, Method::Post, Method::Head, Method::Options]
            }
        }
    }

    pub fn allows(&self, method: Method) -> bool {
        self.allowed_methods().contains(&method)
    }

    /// Value of the `Allow` header.
    pub fn allow_header(&self) -> String {
        self.allowed_methods()
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Start,
    PreHook,
    Executing,
    Success,
    Failed,
    PostHook,
    Done,
}

/// Per-resource extension points around every verb.
///
/// # Example
///
/// ```ignore
/// struct ReadOnlyOnFridays;
///
/// #[async_trait]
/// impl Hooks for ReadOnlyOnFridays {
///     async fn pre(&self, method: Method, _request: &Request) -> RestResult<()> {
///         if method != Method::Get && is_friday() {
///             return Err(RestError::MethodNotAllowed(method));
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Hooks: Send + Sync {
    /// Runs before the verb. An error skips the verb and becomes the response.
    async fn pre(&self, _method: Method, _request: &Request) -> RestResult<()> {
        Ok(())
    }

    /// Runs after a verb succeeded, before the response is returned.
    async fn post(&self, _method: Method, _request: &Request, _response: &Response) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl Hooks for NoHooks {}

fn enter(archetype: Archetype, method: Method, phase: Phase) {
    trace!(?archetype, %method, ?phase, "request phase");
}

/// Drives one request through the lifecycle, with `body` as the verb implementation.
///
/// Every failure except [`RestError::StoreUnavailable`] comes back as an error response.
pub(crate) async fn run<F, Fut>(
    archetype: Archetype,
    hooks: &dyn Hooks,
    request: &Request,
    body: F,
) -> RestResult<Response>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = RestResult<Response>>,
{
    let method = request.method;
    enter(archetype, method, Phase::Start);

    if !archetype.allows(method) {
        enter(archetype, method, Phase::Failed);
        enter(archetype, method, Phase::Done);
        return Ok(RestError::MethodNotAllowed(method).into_response());
    }

    if method == Method::Options {
        enter(archetype, method, Phase::Done);
        return Ok(Response::new(200).with_header("Allow", archetype.allow_header()));
    }

    enter(archetype, method, Phase::PreHook);
    let outcome = match hooks.pre(method, request).await {
        Ok(()) => {
            enter(archetype, method, Phase::Executing);
            body().await
        }
        Err(err) => Err(err),
    };

    let result = match outcome {
        Ok(response) => {
            enter(archetype, method, Phase::Success);
            enter(archetype, method, Phase::PostHook);
            hooks.post(method, request, &response).await;
            Ok(response)
        }
        Err(err) if err.is_fatal() => {
            enter(archetype, method, Phase::Failed);
            error!(?archetype, %method, error = %err, "request aborted");
            Err(err)
        }
        Err(err) => {
            enter(archetype, method, Phase::Failed);
            debug!(?archetype, %method, status = err.status_code(), error = %err, "request failed");
            Ok(err.into_response())
        }
    };

    enter(archetype, method, Phase::Done);
    result
}
