//! Incremental application of feed entries to the stored history.
//!
//! Entries are processed in ascending publish order. The processed-entry
//! ledger makes polls idempotent: overlapping feed windows between runs do
//! not duplicate events.

use std::collections::BTreeSet;

use tracing::{debug, instrument};

use skywatch_extract::{AirportRegistry, Classifier};
use skywatch_feed::FeedItem;
use skywatch_shared::{Icao, Result};
use skywatch_storage::Storage;

/// Counters for one ingest pass.
#[derive(Debug, Default)]
pub struct IngestStats {
    /// Entries offered by the feed.
    pub entries_fetched: usize,
    /// Entries not previously processed.
    pub entries_new: usize,
    /// Status events written.
    pub events_added: usize,
    /// Airports that received at least one event.
    pub airports_updated: usize,
}

/// Apply feed items to storage. Items must be in ascending publish order.
#[instrument(skip_all, fields(items = items.len()))]
pub async fn ingest_items(
    storage: &Storage,
    classifier: &Classifier,
    registry: &mut AirportRegistry,
    items: &[FeedItem],
) -> Result<IngestStats> {
    let mut stats = IngestStats {
        entries_fetched: items.len(),
        ..Default::default()
    };
    let mut touched: BTreeSet<Icao> = BTreeSet::new();

    for item in items {
        if storage.has_seen_entry(&item.id).await? {
            continue;
        }
        stats.entries_new += 1;

        if let Some(status) = classifier.classify(&item.text) {
            for (icao, name) in registry.extract(&item.text) {
                storage.upsert_airport(&icao, &name).await?;
                if storage
                    .insert_event(&icao, item.published, status, &item.id)
                    .await?
                {
                    stats.events_added += 1;
                    touched.insert(icao);
                }
            }
        } else {
            debug!(entry_id = %item.id, "entry not classified, skipping");
        }

        storage
            .mark_entry_seen(&item.id, &item.content_hash, item.published)
            .await?;
    }

    for icao in &touched {
        storage.refresh_current_status(icao).await?;
    }
    stats.airports_updated = touched.len();

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use skywatch_shared::Status;
    use uuid::Uuid;

    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("skywatch_ingest_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn ts(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 17, hour, minute, 0).unwrap()
    }

    fn item(id: &str, published: DateTime<Utc>, text: &str) -> FeedItem {
        FeedItem {
            id: id.into(),
            published,
            text: text.into(),
            content_hash: format!("hash-{id}"),
        }
    }

    fn icao(code: &str) -> Icao {
        code.parse().unwrap()
    }

    #[tokio::test]
    async fn ingest_applies_events_in_order() {
        let storage = test_storage().await;
        let classifier = Classifier::new();
        let mut registry = AirportRegistry::new();

        let items = vec![
            item(
                "urn:post:1",
                ts(10, 0),
                "Внуково: временные ограничения введены.",
            ),
            item("urn:post:2", ts(11, 0), "Ограничения во Внуково сняты."),
        ];

        let stats = ingest_items(&storage, &classifier, &mut registry, &items)
            .await
            .expect("ingest");

        assert_eq!(stats.entries_fetched, 2);
        assert_eq!(stats.entries_new, 2);
        assert_eq!(stats.events_added, 2);
        assert_eq!(stats.airports_updated, 1);

        let record = storage
            .get_airport(&icao("UUWW"))
            .await
            .unwrap()
            .expect("airport exists");
        assert_eq!(record.current, Some(Status::Open));
        assert_eq!(record.events.len(), 2);
        assert_eq!(record.events[0].status, Status::Closed);
        assert_eq!(record.events[1].status, Status::Open);
    }

    #[tokio::test]
    async fn reingest_is_idempotent() {
        let storage = test_storage().await;
        let classifier = Classifier::new();
        let mut registry = AirportRegistry::new();

        let items = vec![item(
            "urn:post:1",
            ts(10, 0),
            "Внуково: временные ограничения введены.",
        )];

        let first = ingest_items(&storage, &classifier, &mut registry, &items)
            .await
            .unwrap();
        assert_eq!(first.events_added, 1);

        let second = ingest_items(&storage, &classifier, &mut registry, &items)
            .await
            .unwrap();
        assert_eq!(second.entries_new, 0);
        assert_eq!(second.events_added, 0);

        let record = storage.get_airport(&icao("UUWW")).await.unwrap().unwrap();
        assert_eq!(record.events.len(), 1);
    }

    #[tokio::test]
    async fn one_entry_can_touch_several_airports() {
        let storage = test_storage().await;
        let classifier = Classifier::new();
        let mut registry = AirportRegistry::new();

        let items = vec![item(
            "urn:post:1",
            ts(10, 0),
            "Временные ограничения введены во Внуково и Домодедово.",
        )];

        let stats = ingest_items(&storage, &classifier, &mut registry, &items)
            .await
            .unwrap();
        assert_eq!(stats.events_added, 2);
        assert_eq!(stats.airports_updated, 2);

        for code in ["UUWW", "UUDD"] {
            let record = storage.get_airport(&icao(code)).await.unwrap().unwrap();
            assert_eq!(record.current, Some(Status::Closed));
        }
    }

    #[tokio::test]
    async fn unclassified_entries_are_marked_seen() {
        let storage = test_storage().await;
        let classifier = Classifier::new();
        let mut registry = AirportRegistry::new();

        let items = vec![item(
            "urn:post:1",
            ts(10, 0),
            "Во Внуково открыли новый терминал.",
        )];

        let stats = ingest_items(&storage, &classifier, &mut registry, &items)
            .await
            .unwrap();
        assert_eq!(stats.entries_new, 1);
        assert_eq!(stats.events_added, 0);
        assert!(storage.has_seen_entry("urn:post:1").await.unwrap());
        assert!(storage.get_airport(&icao("UUWW")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn classified_entry_without_airports_adds_no_events() {
        let storage = test_storage().await;
        let classifier = Classifier::new();
        let mut registry = AirportRegistry::new();

        let items = vec![item(
            "urn:post:1",
            ts(10, 0),
            "Временные ограничения на полёты введены в ряде регионов.",
        )];

        let stats = ingest_items(&storage, &classifier, &mut registry, &items)
            .await
            .unwrap();
        assert_eq!(stats.entries_new, 1);
        assert_eq!(stats.events_added, 0);
        assert_eq!(stats.airports_updated, 0);
    }
}
