mod common;

use chrono::{Duration, Utc};
use common::*;
use encore::application_port::*;
use encore::domain_model::*;
use encore::domain_port::*;
use encore::infra_memory::*;
use futures_util::future::join_all;
use std::sync::Arc;

#[tokio::test]
async fn missing_record_is_not_connected() {
    let store = Arc::new(MemoryTokenStore::new());
    let exchanger = Arc::new(ScriptedExchanger::granting("T2", 3600));
    let service = service(store, exchanger.clone());
    let user_id = UserId::new_v4();

    let token = service.get_access_token(user_id).await.unwrap();

    assert!(token.is_none());
    assert!(!service.has_valid_connection(user_id).await);
    assert_eq!(exchanger.calls(), 0);
}

#[tokio::test]
async fn record_without_access_token_is_not_connected() {
    let store = Arc::new(MemoryTokenStore::new());
    let user_id = UserId::new_v4();
    store.insert(TokenRecord {
        user_id,
        access_token: None,
        refresh_token: Some(RefreshToken("r1".into())),
        expires_at: Some(in_minutes(60)),
    });
    let exchanger = Arc::new(ScriptedExchanger::granting("T2", 3600));
    let service = service(store, exchanger.clone());

    assert!(service.get_access_token(user_id).await.unwrap().is_none());
    assert_eq!(exchanger.calls(), 0);
}

#[tokio::test]
async fn fresh_store_token_is_cached() {
    let store = Arc::new(MemoryTokenStore::new());
    let user_id = UserId::new_v4();
    store.insert(record(user_id, "T1", Some("r1"), in_minutes(60)));
    let exchanger = Arc::new(ScriptedExchanger::granting("T2", 3600));
    let service = service(store.clone(), exchanger.clone());

    let first = service.resolve_access_token(user_id).await.unwrap().unwrap();
    assert_eq!(first.token, AccessToken("T1".into()));
    assert_eq!(first.source, TokenSource::Store);

    // A cache hit must not touch the store.
    store.delete_token(user_id).await.unwrap();
    let second = service.resolve_access_token(user_id).await.unwrap().unwrap();
    assert_eq!(second.token, AccessToken("T1".into()));
    assert_eq!(second.source, TokenSource::Cache);
    assert_eq!(exchanger.calls(), 0);
}

#[tokio::test]
async fn cached_token_inside_buffer_is_refreshed() {
    let store = Arc::new(MemoryTokenStore::new());
    let user_id = UserId::new_v4();
    store.insert(record(user_id, "T1", Some("r1"), in_minutes(2)));
    let exchanger = Arc::new(ScriptedExchanger::granting("T2", 3600));
    let service = service(store.clone(), exchanger.clone());
    service.cache().set(user_id, AccessToken("T1".into()), in_minutes(2));

    let resolved = service.resolve_access_token(user_id).await.unwrap().unwrap();

    assert_eq!(resolved.token, AccessToken("T2".into()));
    assert_eq!(resolved.source, TokenSource::Refreshed);
    assert!(resolved.persist_error.is_none());
    assert_eq!(exchanger.calls(), 1);

    let cached = service.cache().get(user_id).unwrap();
    assert_eq!(cached.token, AccessToken("T2".into()));
    let expected = Utc::now() + Duration::seconds(3600);
    assert!((cached.expires_at - expected).num_seconds().abs() <= 5);

    let row = store.get(user_id).unwrap();
    assert_eq!(row.access_token, Some(AccessToken("T2".into())));
    assert_eq!(row.expires_at, Some(cached.expires_at));
    assert_eq!(row.refresh_token, Some(RefreshToken("r1".into())));
}

#[tokio::test]
async fn expired_without_refresh_token_is_not_connected() {
    let store = Arc::new(MemoryTokenStore::new());
    let user_id = UserId::new_v4();
    store.insert(record(user_id, "T1", None, in_minutes(-10)));
    let exchanger = Arc::new(ScriptedExchanger::granting("T2", 3600));
    let service = service(store.clone(), exchanger.clone());

    assert!(service.get_access_token(user_id).await.unwrap().is_none());
    assert_eq!(exchanger.calls(), 0);
    assert!(store.get(user_id).is_some());
}

#[tokio::test]
async fn unreadable_expiry_triggers_refresh() {
    let store = Arc::new(MemoryTokenStore::new());
    let user_id = UserId::new_v4();
    store.insert(TokenRecord {
        user_id,
        access_token: Some(AccessToken("T1".into())),
        refresh_token: Some(RefreshToken("r1".into())),
        expires_at: None,
    });
    let exchanger = Arc::new(ScriptedExchanger::granting("T2", 3600));
    let service = service(store, exchanger.clone());

    let token = service.get_access_token(user_id).await.unwrap();
    assert_eq!(token, Some(AccessToken("T2".into())));
    assert_eq!(exchanger.calls(), 1);
}

#[tokio::test]
async fn concurrent_lookups_share_one_exchange() {
    let store = Arc::new(MemoryTokenStore::new());
    let user_id = UserId::new_v4();
    store.insert(record(user_id, "T1", Some("r1"), in_minutes(-1)));
    let exchanger = Arc::new(
        ScriptedExchanger::granting("T2", 3600)
            .with_delay(std::time::Duration::from_millis(50)),
    );
    let service = service(store, exchanger.clone());

    let lookups = (0..20).map(|_| {
        let service = service.clone();
        tokio::spawn(async move { service.get_access_token(user_id).await })
    });
    let results = join_all(lookups).await;

    for result in results {
        assert_eq!(result.unwrap().unwrap(), Some(AccessToken("T2".into())));
    }
    assert_eq!(exchanger.calls(), 1);
    assert_eq!(service.refreshes_in_flight(), 0);
}

#[tokio::test]
async fn concurrent_failures_are_identical_for_every_caller() {
    let store = Arc::new(MemoryTokenStore::new());
    let user_id = UserId::new_v4();
    store.insert(record(user_id, "T1", Some("r1"), in_minutes(-1)));
    let exchanger = Arc::new(
        ScriptedExchanger::failing(ExchangeError::Other("connection reset".into()))
            .with_delay(std::time::Duration::from_millis(50)),
    );
    let service = service(store, exchanger.clone());

    let lookups = (0..5).map(|_| {
        let service = service.clone();
        tokio::spawn(async move { service.get_access_token(user_id).await })
    });

    for result in join_all(lookups).await {
        match result.unwrap() {
            Err(TokenError::TransientFailure(message)) => {
                assert!(message.contains("connection reset"))
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
    assert_eq!(exchanger.calls(), 1);
}

#[tokio::test]
async fn late_store_read_reuses_settled_refresh() {
    let store = Arc::new(LaggingReadStore::new([
        std::time::Duration::ZERO,
        std::time::Duration::from_millis(60),
    ]));
    let user_id = UserId::new_v4();
    store.inner.insert(record(user_id, "T1", Some("r1"), in_minutes(-1)));
    // Refresh tokens are single use: a second exchange with r1 would be revoked.
    let exchanger = Arc::new(
        ScriptedExchanger::rotating("T2", "r2").with_delay(std::time::Duration::from_millis(10)),
    );
    let service = service(store.clone(), exchanger.clone());

    let (first, second) = tokio::join!(
        service.resolve_access_token(user_id),
        service.resolve_access_token(user_id),
    );
    let first = first.unwrap().unwrap();
    let second = second.unwrap().unwrap();

    assert_eq!(first.token, AccessToken("T2".into()));
    assert_eq!(first.source, TokenSource::Refreshed);
    assert_eq!(second.token, AccessToken("T2".into()));
    assert_eq!(second.source, TokenSource::Cache);
    assert_eq!(exchanger.calls(), 1);
    let row = store.inner.get(user_id).unwrap();
    assert_eq!(row.refresh_token, Some(RefreshToken("r2".into())));
}

#[tokio::test]
async fn unrepresentable_grant_lifetime_keeps_connection() {
    let store = Arc::new(MemoryTokenStore::new());
    let user_id = UserId::new_v4();
    store.insert(record(user_id, "T1", Some("r1"), in_minutes(-1)));
    let exchanger = Arc::new(ScriptedExchanger::granting("T2", i64::MAX));
    let service = service(store.clone(), exchanger.clone());

    let err = service.get_access_token(user_id).await.unwrap_err();

    match err {
        TokenError::TransientFailure(message) => assert!(message.contains("expires_in")),
        other => panic!("unexpected error: {other:?}"),
    }
    let row = store.get(user_id).unwrap();
    assert_eq!(row.access_token, Some(AccessToken("T1".into())));
    assert_eq!(row.refresh_token, Some(RefreshToken("r1".into())));
    assert!(service.cache().get(user_id).is_none());
    assert_eq!(service.refreshes_in_flight(), 0);
}

#[tokio::test]
async fn non_positive_grant_lifetime_is_not_cached() {
    for expires_in in [0, -30] {
        let store = Arc::new(MemoryTokenStore::new());
        let user_id = UserId::new_v4();
        store.insert(record(user_id, "T1", Some("r1"), in_minutes(-1)));
        let exchanger = Arc::new(ScriptedExchanger::granting("T2", expires_in));
        let service = service(store.clone(), exchanger.clone());

        let err = service.get_access_token(user_id).await.unwrap_err();

        assert!(matches!(err, TokenError::TransientFailure(_)));
        assert!(service.cache().get(user_id).is_none());
        let row = store.get(user_id).unwrap();
        assert_eq!(row.access_token, Some(AccessToken("T1".into())));
        assert_eq!(exchanger.calls(), 1);
    }
}

#[tokio::test]
async fn invalid_grant_purges_connection() {
    let store = Arc::new(MemoryTokenStore::new());
    let user_id = UserId::new_v4();
    store.insert(record(user_id, "T1", Some("revoked"), in_minutes(1)));
    let exchanger = Arc::new(ScriptedExchanger::failing(ExchangeError::InvalidGrant(
        "Refresh token revoked".into(),
    )));
    let service = service(store.clone(), exchanger.clone());
    service.cache().set(user_id, AccessToken("T1".into()), in_minutes(1));

    let err = service.get_access_token(user_id).await.unwrap_err();

    assert!(matches!(err, TokenError::InvalidConnection(_)));
    assert!(store.get(user_id).is_none());
    assert!(service.cache().get(user_id).is_none());
    assert!(!service.has_valid_connection(user_id).await);
    assert_eq!(exchanger.calls(), 1);
}

#[tokio::test]
async fn unavailable_refresh_service_purges_connection() {
    let store = Arc::new(MemoryTokenStore::new());
    let user_id = UserId::new_v4();
    store.insert(record(user_id, "T1", Some("r1"), in_minutes(-5)));
    let exchanger = Arc::new(ScriptedExchanger::failing(
        ExchangeError::ServiceUnavailable("token endpoint returned 503".into()),
    ));
    let service = service(store.clone(), exchanger.clone());

    let err = service.get_access_token(user_id).await.unwrap_err();

    assert!(matches!(err, TokenError::ServiceUnavailable(_)));
    assert!(store.get(user_id).is_none());
    assert!(service.get_access_token(user_id).await.unwrap().is_none());
    assert_eq!(exchanger.calls(), 1);
}

#[tokio::test]
async fn ambiguous_failure_keeps_connection() {
    let store = Arc::new(MemoryTokenStore::new());
    let user_id = UserId::new_v4();
    store.insert(record(user_id, "T1", Some("r1"), in_minutes(-5)));
    let exchanger = Arc::new(ScriptedExchanger::failing(ExchangeError::Other(
        "timed out".into(),
    )));
    let service = service(store.clone(), exchanger.clone());

    let err = service.get_access_token(user_id).await.unwrap_err();

    assert!(matches!(err, TokenError::TransientFailure(_)));
    let row = store.get(user_id).unwrap();
    assert_eq!(row.refresh_token, Some(RefreshToken("r1".into())));

    // The next call tries again instead of reporting "not connected".
    let _ = service.get_access_token(user_id).await;
    assert_eq!(exchanger.calls(), 2);
}

#[tokio::test]
async fn persist_failure_is_reported_but_token_is_usable() {
    let store = Arc::new(FlakyStore::failing_writes());
    let user_id = UserId::new_v4();
    store.inner.insert(record(user_id, "T1", Some("r1"), in_minutes(-1)));
    let exchanger = Arc::new(ScriptedExchanger::granting("T2", 3600));
    let service = service(store.clone(), exchanger.clone());

    let resolved = service.resolve_access_token(user_id).await.unwrap().unwrap();

    assert_eq!(resolved.token, AccessToken("T2".into()));
    assert!(resolved.persist_error.unwrap().contains("connection reset"));
    assert_eq!(
        store.inner.get(user_id).unwrap().access_token,
        Some(AccessToken("T1".into()))
    );

    // The in-memory copy carries the process until the store recovers.
    let again = service.resolve_access_token(user_id).await.unwrap().unwrap();
    assert_eq!(again.source, TokenSource::Cache);
    assert_eq!(exchanger.calls(), 1);
}

#[tokio::test]
async fn rotated_refresh_token_is_persisted() {
    let store = Arc::new(MemoryTokenStore::new());
    let user_id = UserId::new_v4();
    store.insert(record(user_id, "T1", Some("r1"), in_minutes(-1)));
    let exchanger = Arc::new(ScriptedExchanger::rotating("T2", "r2"));
    let service = service(store.clone(), exchanger);

    service.get_access_token(user_id).await.unwrap();

    let row = store.get(user_id).unwrap();
    assert_eq!(row.refresh_token, Some(RefreshToken("r2".into())));
}

#[tokio::test]
async fn clear_cache_leaves_store_untouched() {
    let store = Arc::new(MemoryTokenStore::new());
    let alice = UserId::new_v4();
    let bob = UserId::new_v4();
    store.insert(record(alice, "A1", Some("r"), in_minutes(60)));
    store.insert(record(bob, "B1", Some("r"), in_minutes(60)));
    let service = service(store.clone(), Arc::new(ScriptedExchanger::granting("X", 3600)));

    service.get_access_token(alice).await.unwrap();
    service.get_access_token(bob).await.unwrap();
    assert_eq!(service.cache().len(), 2);

    service.clear_cache(Some(alice));
    assert!(service.cache().get(alice).is_none());
    assert!(service.cache().get(bob).is_some());

    service.clear_cache(None);
    assert!(service.cache().is_empty());
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn disconnect_removes_row_and_cache() {
    let store = Arc::new(MemoryTokenStore::new());
    let user_id = UserId::new_v4();
    store.insert(record(user_id, "T1", Some("r1"), in_minutes(60)));
    let service = service(store.clone(), Arc::new(ScriptedExchanger::granting("X", 3600)));
    assert!(service.has_valid_connection(user_id).await);

    service.disconnect(user_id).await.unwrap();

    assert!(store.get(user_id).is_none());
    assert!(service.cache().get(user_id).is_none());
    assert!(!service.has_valid_connection(user_id).await);
}

#[tokio::test]
async fn purged_connection_recovers_after_new_webhook_write() {
    let store = Arc::new(MemoryTokenStore::new());
    let user_id = UserId::new_v4();
    store.insert(record(user_id, "T1", Some("revoked"), in_minutes(-1)));
    let exchanger = Arc::new(ScriptedExchanger::failing(ExchangeError::InvalidGrant(
        "Invalid refresh token".into(),
    )));
    let service = service(store.clone(), exchanger);

    assert!(service.get_access_token(user_id).await.is_err());
    assert!(!service.has_valid_connection(user_id).await);

    store.insert(record(user_id, "T9", Some("r9"), in_minutes(60)));
    assert_eq!(
        service.get_access_token(user_id).await.unwrap(),
        Some(AccessToken("T9".into()))
    );
}
