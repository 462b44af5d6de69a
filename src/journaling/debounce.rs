use std::time::{Duration, Instant};

/// A single pending-task slot: scheduling replaces whatever was pending.
///
/// Time is supplied by the caller, which keeps the slot deterministic and lets
/// the owner decide when to poll.
#[derive(Debug)]
pub struct Debouncer<T> {
    quiet: Duration,
    pending: Option<Pending<T>>,
}

#[derive(Debug)]
struct Pending<T> {
    task: T,
    due: Instant,
}

impl<T> Debouncer<T> {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: None,
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet
    }

    /// Restarts the quiet period from `now`. Returns the task it displaced.
    pub fn schedule(&mut self, task: T, now: Instant) -> Option<T> {
        let due = now.checked_add(self.quiet).unwrap_or(now);
        self.pending
            .replace(Pending { task, due })
            .map(|previous| previous.task)
    }

    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|pending| pending.task)
    }

    /// Cancels the pending task only when `pred` matches it.
    pub fn cancel_if<F>(&mut self, pred: F) -> Option<T>
    where
        F: FnOnce(&T) -> bool,
    {
        let matched = self
            .pending
            .as_ref()
            .map(|pending| pred(&pending.task))
            .unwrap_or(false);
        if matched {
            self.cancel()
        } else {
            None
        }
    }

    /// Hands out the pending task once its quiet period has elapsed.
    pub fn take_due(&mut self, now: Instant) -> Option<T> {
        let ready = self
            .pending
            .as_ref()
            .map(|pending| now >= pending.due)
            .unwrap_or(false);
        if ready {
            self.cancel()
        } else {
            None
        }
    }

    /// Hands out the pending task regardless of its deadline.
    pub fn take(&mut self) -> Option<T> {
        self.cancel()
    }

    pub fn pending(&self) -> Option<&T> {
        self.pending.as_ref().map(|pending| &pending.task)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|pending| pending.due)
    }
}
