//! Optimistic handling of locally-made changes.
//!
//! A mutation always lands in local state immediately, flagged `local_only`
//! until a server refresh confirms it. While online the payload is also
//! uploaded fire-and-forget — there is no per-mutation retry; the polling
//! merge reconciles whatever the server ends up holding. While offline (or
//! before a session starts) the payload is queued for the next bulk sync.

use chrono::Utc;
use medilink_bridge::records::{Mutation, SyncRecord};
use medilink_store::queue::OfflineQueue;
use medilink_store::{StateKey, StateStore, StateUpdate, UpdateSource};

use super::sync_service;

/// Handles an incoming mutation request (see
/// [`medilink_bridge::MessageToBackend::MutationRequest`]).
pub(crate) async fn handle_mutation(
    context: &super::AppContextHandle,
    store: &mut StateStore,
    queue: &mut OfflineQueue,
    mutation: Mutation,
) {
    let (client, base_url, token, cache_path) = {
        let state = context.state.read().await;
        (
            state.request_client.clone(),
            state.config.base_url.clone(),
            state.auth_token.clone(),
            state.cache_path.clone(),
        )
    };

    let online = store.state().is_online;
    match token {
        Some(token) if online => {
            let resource = mutation.resource;
            let url = format!("{base_url}{}", resource.path());
            let payload = mutation.payload.clone();
            tokio::spawn(async move {
                match client
                    .post(&url)
                    .bearer_auth(&token)
                    .json(&payload)
                    .send()
                    .await
                {
                    Ok(response) if response.status().is_success() => {
                        log::debug!("Uploaded {resource} change");
                    }
                    Ok(response) => {
                        log::warn!("{resource} change rejected: {}", response.status());
                    }
                    Err(error) => {
                        log::warn!("{resource} upload failed: {}", error.without_url());
                    }
                }
            });
        }
        _ => {
            queue.push(mutation.resource, mutation.payload.clone());
            if let Err(error) = sync_service::save_queue(&cache_path, queue).await {
                log::warn!("Could not persist the offline queue: {error}");
            }
            log::info!(
                "Queued a {} change for later sync ({} pending)",
                mutation.resource,
                queue.len()
            );
        }
    }

    apply_optimistic(store, &mutation);
}

/// Upserts the mutation into its resource list, flagged `local_only` and
/// stamped now so it survives (and can win) the next server merge.
pub(crate) fn apply_optimistic(store: &mut StateStore, mutation: &Mutation) {
    let key = StateKey::of_resource(mutation.resource);
    let mut records = store.get(key).records().to_vec();

    let incoming = optimistic_record(&mutation.payload);
    match records.iter_mut().find(|record| record.id == incoming.id) {
        Some(existing) => {
            for (name, value) in &incoming.fields {
                existing.fields.insert(name.clone(), value.clone());
            }
            existing.last_modified = incoming.last_modified;
            existing.local_only = true;
        }
        None => records.push(incoming),
    }

    store.smart_update(
        StateUpdate::resource_records(mutation.resource, records),
        UpdateSource::Local,
    );
}

fn optimistic_record(payload: &serde_json::Value) -> SyncRecord {
    let id = payload
        .get("id")
        .and_then(|value| value.as_str())
        .map(str::to_string)
        // the server has not assigned an id yet; give it a temporary one
        .unwrap_or_else(|| format!("local-{}", Utc::now().timestamp_millis()));

    let mut record = SyncRecord::new(id);
    record.last_modified = Some(Utc::now());
    record.local_only = true;
    if let Some(object) = payload.as_object() {
        record.fields = object.clone();
        record.fields.remove("id");
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::test_support::context_with;
    use medilink_bridge::config::SyncConfig;
    use medilink_bridge::records::Resource;
    use serde_json::json;

    fn offline_config() -> SyncConfig {
        SyncConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            ..SyncConfig::default()
        }
    }

    #[tokio::test]
    async fn offline_mutation_is_queued_and_applied_optimistically() {
        let dir = tempfile::tempdir().unwrap();
        let (context, _frontend_rx, _engine_rx) =
            context_with(offline_config(), dir.path().to_path_buf());

        let mut store = StateStore::new(); // starts offline
        let mut queue = OfflineQueue::new();
        let mutation = Mutation {
            resource: Resource::Appointments,
            payload: json!({"id": "a1", "status": "cancelled"}),
        };

        handle_mutation(&context, &mut store, &mut queue, mutation).await;

        assert_eq!(queue.len(), 1);
        let records = store.get(StateKey::Appointments).records();
        assert_eq!(records.len(), 1);
        assert!(records[0].local_only);
        assert_eq!(records[0].field_str("status"), Some("cancelled"));
    }

    #[tokio::test]
    async fn online_mutation_is_not_queued() {
        let dir = tempfile::tempdir().unwrap();
        let (context, _frontend_rx, _engine_rx) =
            context_with(offline_config(), dir.path().to_path_buf());

        let mut store = StateStore::new();
        store.update(StateUpdate::Connectivity(true));
        let mut queue = OfflineQueue::new();
        let mutation = Mutation {
            resource: Resource::Appointments,
            payload: json!({"id": "a1", "status": "cancelled"}),
        };

        // the upload itself goes nowhere (closed port) and is logged away
        handle_mutation(&context, &mut store, &mut queue, mutation).await;

        assert!(queue.is_empty());
        assert!(store.get(StateKey::Appointments).records()[0].local_only);
    }

    #[test]
    fn optimistic_apply_updates_an_existing_record_in_place() {
        let mut store = StateStore::new();
        let mut existing = SyncRecord::new("a1");
        existing
            .fields
            .insert("status".into(), json!("pending"));
        store.update(StateUpdate::Appointments(vec![existing]));

        apply_optimistic(
            &mut store,
            &Mutation {
                resource: Resource::Appointments,
                payload: json!({"id": "a1", "status": "cancelled"}),
            },
        );

        let records = store.get(StateKey::Appointments).records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].field_str("status"), Some("cancelled"));
        assert!(records[0].local_only);
        assert!(records[0].last_modified.is_some());
    }

    #[test]
    fn payload_without_an_id_gets_a_temporary_one() {
        let mut store = StateStore::new();
        apply_optimistic(
            &mut store,
            &Mutation {
                resource: Resource::Messages,
                payload: json!({"text": "hello"}),
            },
        );

        let records = store.get(StateKey::Messages).records();
        assert!(records[0].id.starts_with("local-"));
    }
}
