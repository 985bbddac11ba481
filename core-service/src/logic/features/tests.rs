//! Normalizer -> store -> feature vector, end to end.

use crate::logic::features::{FeatureNormalizer, FeatureVector};
use crate::logic::twin::{InMemoryTwinStore, TwinStore};

async fn ingest(store: &InMemoryTwinStore, messages: &[&str]) {
    let normalizer = FeatureNormalizer::new();
    for (i, raw) in messages.iter().enumerate() {
        let msg = normalizer.normalize(i, raw).unwrap();
        store.apply(&msg.device_id, &msg.patch).await.unwrap();
    }
}

#[tokio::test]
async fn test_distinct_devices_make_distinct_twins() {
    let store = InMemoryTwinStore::new();
    ingest(
        &store,
        &[
            r#"{"deviceId":"router-01","os":"Cisco IOS"}"#,
            r#"{"deviceId":"db-01","os":"Linux"}"#,
            r#"{"deviceId":"cam-07","os":"RTOS"}"#,
        ],
    )
    .await;

    assert_eq!(store.list_all().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_later_message_wins_and_absent_strings_persist() {
    let store = InMemoryTwinStore::new();
    ingest(
        &store,
        &[
            r#"{"deviceId":"d1","ipAddress":"10.0.0.5","os":"Linux","latency":40}"#,
            r#"{"deviceId":"d1","os":"Windows","latency":"7"}"#,
        ],
    )
    .await;

    let twin = store.get("d1").await.unwrap().unwrap();
    assert_eq!(twin.device.os.as_deref(), Some("Windows"));
    assert_eq!(twin.device.ip_address.as_deref(), Some("10.0.0.5"));
    assert_eq!(twin.traffic.latency, 7);
}

#[tokio::test]
async fn test_ingested_scoring_attributes_reach_the_vector() {
    let store = InMemoryTwinStore::new();
    ingest(
        &store,
        &[r#"{"deviceId":"srv","vulnerabilityScore":"0.75","connections":300,"accessLevel":4}"#],
    )
    .await;

    let twin = store.get("srv").await.unwrap().unwrap();
    let vector = FeatureVector::from_device(&twin);
    assert_eq!(vector.get_by_name("vulnerability_score"), Some(0.75));
    assert_eq!(vector.get_by_name("connections"), Some(300.0));
    assert_eq!(vector.get_by_name("access_level"), Some(4.0));
    assert!(vector.is_defaulted(1));
}
