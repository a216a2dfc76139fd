//! Contract tests for UpstreamApi using the fixture implementation.
//!
//! Any conforming implementation must page deterministically, keep upstream
//! order, and surface failures with their status classification intact.

use std::sync::Arc;
use std::time::Duration;

use census_upstream::fakes::{FailTarget, Fixture, FixtureUpstream};
use census_upstream::{RawBackup, ResourceKind, StatusClass, UpstreamApi, UpstreamError};
use chrono::DateTime;

fn backup(id: &str, ended: &str) -> RawBackup {
    RawBackup {
        id: id.to_string(),
        display_name: format!("backup-{id}"),
        database_size_in_gbs: Some(10.0),
        backup_type: Some("INCREMENTAL".to_string()),
        lifecycle_state: "ACTIVE".to_string(),
        time_started: DateTime::parse_from_rfc3339("2026-10-18T00:00:00Z").unwrap(),
        time_ended: Some(DateTime::parse_from_rfc3339(ended).unwrap()),
    }
}

fn fixture() -> Fixture {
    Fixture::new()
        .compartment("c1", "finance")
        .compartment("c2", "billing")
        .db_home("c1", "h1", "home-1")
        .database("h1", "c1", "d1", "ORCL")
        .backup("d1", backup("b1", "2026-10-18T01:00:00Z"))
        .backup("d1", backup("b2", "2026-10-18T02:00:00Z"))
        .backup("d1", backup("b3", "2026-10-18T03:00:00Z"))
}

// ===========================================================================
// Paging contract
// ===========================================================================

async fn drain_backups(upstream: &dyn UpstreamApi, parent: &str) -> Vec<String> {
    let mut ids = Vec::new();
    let mut page: Option<String> = None;
    loop {
        let resp = upstream
            .list_leaf_records(parent, "c1", page.as_deref())
            .await
            .unwrap();
        ids.extend(resp.items.into_iter().map(|b| b.id));
        match resp.next_page {
            Some(next) => page = Some(next),
            None => break,
        }
    }
    ids
}

#[tokio::test]
async fn paged_and_unpaged_listings_agree() {
    let unpaged = FixtureUpstream::new(fixture());
    let paged = FixtureUpstream::new(fixture()).with_page_size(1);

    let a = drain_backups(&unpaged, "d1").await;
    let b = drain_backups(&paged, "d1").await;

    assert_eq!(a, vec!["b1", "b2", "b3"]);
    assert_eq!(a, b);
    assert_eq!(paged.call_count(), 3);
}

#[tokio::test]
async fn children_are_scoped_by_kind_and_parent() {
    let upstream = FixtureUpstream::new(fixture());

    let homes = upstream
        .list_child_resources(ResourceKind::DbHome, "c1", "c1", None)
        .await
        .unwrap();
    assert_eq!(homes.items.len(), 1);

    let systems = upstream
        .list_child_resources(ResourceKind::DbSystem, "c1", "c1", None)
        .await
        .unwrap();
    assert!(systems.items.is_empty());
}

// ===========================================================================
// Failure contract
// ===========================================================================

#[tokio::test]
async fn scripted_child_failure_keeps_classification() {
    let upstream = FixtureUpstream::new(fixture()).fail(
        FailTarget::Children {
            kind: ResourceKind::DbHome,
            parent_id: "c2".to_string(),
        },
        UpstreamError::server_error("internal"),
        None,
    );

    for _ in 0..3 {
        let err = upstream
            .list_child_resources(ResourceKind::DbHome, "c2", "c2", None)
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusClass::ServerError);
    }

    // Other parents are unaffected.
    assert!(upstream
        .list_child_resources(ResourceKind::DbHome, "c1", "c1", None)
        .await
        .is_ok());
}

// ===========================================================================
// Instrumentation
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn max_in_flight_tracks_overlapping_calls() {
    let upstream =
        Arc::new(FixtureUpstream::new(fixture()).with_latency(Duration::from_millis(100)));

    let mut handles = Vec::new();
    for _ in 0..3 {
        let upstream = Arc::clone(&upstream);
        handles.push(tokio::spawn(async move {
            upstream.list_compartments("root", None).await.unwrap();
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    assert_eq!(upstream.max_in_flight(), 3);
    assert_eq!(upstream.call_count(), 3);
}
