//! Ordered teardown of acquired resources
//!
//! Every resource the client acquires (the server process, its stdio
//! channel, the protocol session) is pushed onto a [`ResourceStack`] as soon
//! as it exists. [`ResourceStack::release_all`] releases them newest-first,
//! keeps going when one release fails, and is a no-op the second time.

use std::future::Future;

use async_trait::async_trait;

use crate::error::Result;

/// A resource that must be released explicitly and asynchronously.
#[async_trait]
pub trait ManagedResource: Send {
    /// Short name used in logs.
    fn label(&self) -> &str;

    /// Releases the resource. Consumes it so it cannot be released twice.
    async fn release(self: Box<Self>) -> Result<()>;
}

/// Outcome of a [`ResourceStack::release_all`] call.
#[derive(Debug, Default)]
pub struct ReleaseReport {
    /// Labels of the resources released, in release order.
    pub released: Vec<String>,
    /// Labels and error messages of releases that failed.
    pub failures: Vec<(String, String)>,
}

impl ReleaseReport {
    /// `true` when nothing was released.
    pub fn is_empty(&self) -> bool {
        self.released.is_empty() && self.failures.is_empty()
    }
}

/// Last-in first-out collection of [`ManagedResource`]s.
#[derive(Default)]
pub struct ResourceStack {
    entries: Vec<Box<dyn ManagedResource>>,
}

impl std::fmt::Debug for ResourceStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceStack")
            .field("labels", &self.labels())
            .finish()
    }
}

impl ResourceStack {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resource; it will be released before everything pushed
    /// earlier.
    pub fn push<R: ManagedResource + 'static>(&mut self, resource: R) {
        tracing::debug!(resource = resource.label(), "Registered resource");
        self.entries.push(Box::new(resource));
    }

    /// Labels of the held resources, in acquisition order.
    pub fn labels(&self) -> Vec<String> {
        self.entries.iter().map(|r| r.label().to_string()).collect()
    }

    /// Number of resources not yet released.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when nothing is held.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Releases every held resource in reverse acquisition order.
    ///
    /// A failing release is logged and recorded; the remaining resources are
    /// still released. Calling this on an empty stack does nothing.
    pub async fn release_all(&mut self) -> ReleaseReport {
        let mut report = ReleaseReport::default();

        while let Some(resource) = self.entries.pop() {
            let label = resource.label().to_string();
            match resource.release().await {
                Ok(()) => {
                    tracing::debug!(resource = %label, "Released resource");
                    report.released.push(label);
                }
                Err(e) => {
                    tracing::warn!(resource = %label, "Failed to release resource: {:#}", e);
                    report.failures.push((label, format!("{:#}", e)));
                }
            }
        }

        report
    }
}

impl Drop for ResourceStack {
    fn drop(&mut self) {
        if !self.entries.is_empty() {
            tracing::warn!(
                remaining = ?self.labels(),
                "ResourceStack dropped without release_all; falling back to Drop impls"
            );
        }
    }
}

/// A resource released by running a closure.
pub struct OnRelease<F> {
    label: String,
    action: F,
}

impl<F, Fut> OnRelease<F>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    /// Wraps `action` so it runs when the stack releases this entry.
    pub fn new(label: impl Into<String>, action: F) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }
}

#[async_trait]
impl<F, Fut> ManagedResource for OnRelease<F>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    fn label(&self) -> &str {
        &self.label
    }

    async fn release(self: Box<Self>) -> Result<()> {
        (self.action)().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder(log: &Arc<Mutex<Vec<String>>>, label: &str) -> impl ManagedResource + 'static {
        let log = Arc::clone(log);
        let name = label.to_string();
        OnRelease::new(label, move || async move {
            log.lock().unwrap().push(name);
            Ok(())
        })
    }

    #[tokio::test]
    async fn test_release_all_runs_in_reverse_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut stack = ResourceStack::new();
        stack.push(recorder(&log, "child"));
        stack.push(recorder(&log, "channel"));
        stack.push(recorder(&log, "session"));

        assert_eq!(stack.labels(), vec!["child", "channel", "session"]);

        let report = stack.release_all().await;
        assert_eq!(report.released, vec!["session", "channel", "child"]);
        assert_eq!(*log.lock().unwrap(), vec!["session", "channel", "child"]);
        assert!(stack.is_empty());
    }

    #[tokio::test]
    async fn test_second_release_all_is_noop() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut stack = ResourceStack::new();
        stack.push(recorder(&log, "child"));

        let first = stack.release_all().await;
        let second = stack.release_all().await;

        assert_eq!(first.released.len(), 1);
        assert!(second.is_empty());
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_release_does_not_stop_the_rest() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut stack = ResourceStack::new();
        stack.push(recorder(&log, "child"));
        stack.push(OnRelease::new("broken", || async {
            Err(anyhow::anyhow!("pipe already closed"))
        }));
        stack.push(recorder(&log, "session"));

        let report = stack.release_all().await;

        assert_eq!(report.released, vec!["session", "child"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, "broken");
        assert!(report.failures[0].1.contains("pipe already closed"));
        assert_eq!(*log.lock().unwrap(), vec!["session", "child"]);
    }
}
