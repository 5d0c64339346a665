//! crates/study_buddy_core/src/view.rs
//!
//! Stale-response guard. A request started by a view carries a ticket; if the
//! user navigated away before the response arrived, the ticket no longer
//! matches and the response is dropped instead of updating an unmounted view.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Shared navigation generation for one view.
#[derive(Debug, Clone, Default)]
pub struct ViewScope {
    generation: Arc<AtomicU64>,
}

/// The generation a request was issued under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

impl ViewScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ticket(&self) -> Ticket {
        Ticket(self.generation.load(Ordering::Acquire))
    }

    /// The view was left (or re-mounted); every outstanding ticket goes stale.
    pub fn navigate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.generation.load(Ordering::Acquire) == ticket.0
    }

    /// Hands the value through only when the view is still the one that asked.
    pub fn accept<T>(&self, ticket: Ticket, value: T) -> Option<T> {
        if self.is_current(ticket) {
            Some(value)
        } else {
            debug!(issued = ticket.0, "Dropping stale response");
            None
        }
    }

    /// Issues `request` under the current generation and yields its output only
    /// if the view is still current when it completes.
    pub async fn run<F>(&self, request: F) -> Option<F::Output>
    where
        F: Future,
    {
        let ticket = self.ticket();
        let output = request.await;
        self.accept(ticket, output)
    }
}
