//! Periodic REST refreshes, one ticker per resource class.
//!
//! Each tick spawns its fetch as an independent task, so stopping a resource
//! prevents future ticks while an in-flight fetch from the last tick still
//! completes and its result still reaches the store. Fetch failures are
//! swallowed with a log line and the last good state stays visible.

use std::collections::HashMap;
use std::time::Duration;

use medilink_bridge::records::{DataEnvelope, Resource, SyncRecord};
use tokio::task::JoinHandle;

use crate::app::EngineEvent;

/// The set of running resource tickers.
///
/// Starting a resource that is already running tears down the previous
/// ticker first, so there is never more than one per resource.
#[derive(Debug, Default)]
pub(crate) struct PollingRegistry {
    tasks: HashMap<Resource, JoinHandle<()>>,
}

impl PollingRegistry {
    /// Spawns a ticker invoking `tick` at the given cadence (first tick
    /// immediately), replacing and aborting any previous ticker for the
    /// same resource.
    pub fn start<F>(&mut self, resource: Resource, interval: Duration, mut tick: F)
    where
        F: FnMut() + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                tick();
            }
        });
        if let Some(previous) = self.tasks.insert(resource, handle) {
            previous.abort();
        }
    }

    /// Stops the ticker for one resource, if it is running.
    pub fn stop(&mut self, resource: Resource) {
        if let Some(handle) = self.tasks.remove(&resource) {
            handle.abort();
            log::info!("Stopped polling {resource}");
        }
    }

    /// Stops every running ticker and empties the registry.
    pub fn stop_all(&mut self) {
        for (resource, handle) in self.tasks.drain() {
            handle.abort();
            log::info!("Stopped polling {resource}");
        }
    }

    pub fn is_running(&self, resource: Resource) -> bool {
        self.tasks.contains_key(&resource)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }
}

/// Begins periodic refreshes for one resource at the given cadence.
pub(crate) fn start_updates(
    context: super::AppContextHandle,
    registry: &mut PollingRegistry,
    resource: Resource,
    interval: Duration,
) {
    log::info!("Polling {resource} every {}s", interval.as_secs());
    registry.start(resource, interval, move || {
        // each fetch runs as its own task so it survives a stop request
        tokio::spawn(poll_tick(context.clone(), resource));
    });
}

/// One authenticated fetch of a resource list.
///
/// Without a session token the tick is a silent no-op. A transport error,
/// a non-OK status, or an unreadable body skips the tick with a log line;
/// stored state is left untouched either way.
pub(crate) async fn poll_tick(context: super::AppContextHandle, resource: Resource) {
    let (client, base_url, token) = {
        let state = context.state.read().await;
        (
            state.request_client.clone(),
            state.config.base_url.clone(),
            state.auth_token.clone(),
        )
    };
    let Some(token) = token else {
        return;
    };

    let url = format!("{base_url}{}", resource.path());
    let response = match client.get(&url).bearer_auth(&token).send().await {
        Ok(response) => response,
        Err(error) => {
            log::warn!("Polling {resource} failed: {}", error.without_url());
            return;
        }
    };
    if !response.status().is_success() {
        log::warn!("Polling {resource} returned {}", response.status());
        return;
    }

    let envelope: DataEnvelope<SyncRecord> = match response.json().await {
        Ok(envelope) => envelope,
        Err(error) => {
            log::warn!(
                "Polling {resource} returned an unreadable body: {}",
                error.without_url()
            );
            return;
        }
    };

    let event = EngineEvent::PollCompleted {
        resource,
        records: envelope.data,
    };
    if context.engine_tx.send(event).await.is_err() {
        log::debug!("Dropping {resource} poll result, the event loop is gone");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn restarting_a_resource_replaces_the_previous_ticker() {
        let mut registry = PollingRegistry::default();

        let first = Arc::new(AtomicUsize::new(0));
        let first_counter = first.clone();
        registry.start(Resource::Appointments, Duration::from_secs(5), move || {
            first_counter.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(first.load(Ordering::SeqCst) >= 2);

        let second = Arc::new(AtomicUsize::new(0));
        let second_counter = second.clone();
        registry.start(Resource::Appointments, Duration::from_secs(7), move || {
            second_counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(registry.len(), 1);

        let first_before = first.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(
            first.load(Ordering::SeqCst),
            first_before,
            "the replaced ticker must not fire again"
        );
        assert!(second.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_tickers_no_longer_fire() {
        let mut registry = PollingRegistry::default();
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        registry.start(Resource::Messages, Duration::from_secs(3), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(registry.is_running(Resource::Messages));

        registry.stop(Resource::Messages);
        assert!(!registry.is_running(Resource::Messages));

        let ticks_before = ticks.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), ticks_before);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_all_empties_the_registry() {
        let mut registry = PollingRegistry::default();
        registry.start(Resource::Appointments, Duration::from_secs(5), || {});
        registry.start(Resource::Messages, Duration::from_secs(5), || {});
        registry.start(Resource::Notifications, Duration::from_secs(5), || {});
        assert_eq!(registry.len(), 3);

        registry.stop_all();
        assert_eq!(registry.len(), 0);
    }
}
