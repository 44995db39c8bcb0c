//! Assignment engine against a live Postgres.

mod common;

use std::collections::HashMap;

use common::{finish, newly_assigned, seeded_catalog};
use survey_dispatch::engine::{AssignmentResponse, Selection};
use survey_dispatch::error::Error;
use survey_dispatch::model::ItemKind::{Recurring, Shared};
use survey_dispatch::model::*;

#[tokio::test]
#[ignore] // Requires running Postgres
async fn recurring_items_interleave_with_shared_queue() {
    let (dispatcher, catalog, items) =
        seeded_catalog(&[(1, Shared), (2, Recurring), (3, Shared)]).await;
    let (e1, e2, e3) = (&items[0], &items[1], &items[2]);

    // shared=E1(1) vs recurring=E2(2): 2 is not < 1, so E1.
    let c1 = newly_assigned(dispatcher.next(catalog, "w1").await.unwrap());
    assert_eq!(c1.work_item_id, e1.id);
    finish(&dispatcher, "w1", &c1).await;

    // High-water mark is 1: shared=E3(3) vs recurring=E2(2), so E2.
    let c2 = newly_assigned(dispatcher.next(catalog, "w1").await.unwrap());
    assert_eq!(c2.work_item_id, e2.id);
    finish(&dispatcher, "w1", &c2).await;

    let c3 = newly_assigned(dispatcher.next(catalog, "w1").await.unwrap());
    assert_eq!(c3.work_item_id, e3.id);
    finish(&dispatcher, "w1", &c3).await;

    assert_eq!(
        dispatcher.next(catalog, "w1").await.unwrap(),
        Selection::Exhausted
    );

    // A fresh worker still owes the recurring item after the shared queue drained.
    let w2 = newly_assigned(dispatcher.next(catalog, "w2").await.unwrap());
    assert_eq!(w2.work_item_id, e2.id);
    assert_eq!(w2.kind, Recurring);
    finish(&dispatcher, "w2", &w2).await;

    assert_eq!(
        dispatcher.next(catalog, "w2").await.unwrap(),
        Selection::Exhausted
    );
}

#[tokio::test]
#[ignore] // Requires running Postgres
async fn open_claim_is_resumed_not_duplicated() {
    let (dispatcher, catalog, _) = seeded_catalog(&[(1, Shared), (2, Shared)]).await;

    let first = newly_assigned(dispatcher.next(catalog, "w1").await.unwrap());
    let again = dispatcher.next(catalog, "w1").await.unwrap();
    assert_eq!(again, Selection::Resumed(first.clone()));

    let claims = dispatcher.db().list_claims(catalog).await.unwrap();
    assert_eq!(claims.len(), 1);
    assert_eq!(claims[0].id, first.id);
}

#[tokio::test]
#[ignore] // Requires running Postgres
async fn unknown_catalog_is_exhausted() {
    let (dispatcher, _, _) = seeded_catalog(&[(1, Shared)]).await;
    let selection = dispatcher.next(CatalogId::new(), "w1").await.unwrap();
    assert_eq!(selection, Selection::Exhausted);
}

#[tokio::test]
#[ignore] // Requires running Postgres
async fn claim_rejected_for_taken_or_missing_item() {
    let (dispatcher, catalog, items) = seeded_catalog(&[(1, Shared), (2, Recurring)]).await;
    let db = dispatcher.db();

    assert!(matches!(
        db.try_claim(items[0].id, "w1").await.unwrap(),
        survey_dispatch::db::ledger::ClaimAttempt::Claimed(_)
    ));
    // Shared: nobody else may hold it.
    assert!(matches!(
        db.try_claim(items[0].id, "w2").await.unwrap(),
        survey_dispatch::db::ledger::ClaimAttempt::Rejected
    ));
    // Recurring: once per worker.
    assert!(matches!(
        db.try_claim(items[1].id, "w2").await.unwrap(),
        survey_dispatch::db::ledger::ClaimAttempt::Claimed(_)
    ));
    assert!(matches!(
        db.try_claim(items[1].id, "w2").await.unwrap(),
        survey_dispatch::db::ledger::ClaimAttempt::Rejected
    ));
    // Missing item.
    assert!(matches!(
        db.try_claim(WorkItemId(uuid::Uuid::new_v4()), "w1").await.unwrap(),
        survey_dispatch::db::ledger::ClaimAttempt::Rejected
    ));

    assert_eq!(db.list_claims(catalog).await.unwrap().len(), 2);
}

#[tokio::test]
#[ignore] // Requires running Postgres
async fn second_open_claim_is_an_invariant_violation() {
    let (dispatcher, catalog, items) = seeded_catalog(&[(1, Shared), (2, Shared)]).await;
    let db = dispatcher.db();

    // Bypass the selector to fabricate two open claims for one worker.
    db.try_claim(items[0].id, "w1").await.unwrap();
    db.try_claim(items[1].id, "w1").await.unwrap();

    let err = dispatcher.next(catalog, "w1").await.unwrap_err();
    assert!(matches!(err, Error::InvariantViolation(_)), "got {err:?}");
}

#[tokio::test]
#[ignore] // Requires running Postgres
async fn concurrent_workers_never_share_an_item() {
    let layout: Vec<(i64, ItemKind)> = (1..=30)
        .map(|order| (order, if order % 10 == 0 { Recurring } else { Shared }))
        .collect();
    let (dispatcher, catalog, _) = seeded_catalog(&layout).await;

    let mut handles = Vec::new();
    for w in 0..8 {
        let dispatcher = dispatcher.clone();
        handles.push(tokio::spawn(async move {
            let worker = format!("w{w}");
            while let Selection::NewlyAssigned(claim) | Selection::Resumed(claim) =
                dispatcher.next(catalog, &worker).await.unwrap()
            {
                finish(&dispatcher, &worker, &claim).await;
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let db = dispatcher.db();
    let items: HashMap<_, _> = db
        .list_work_items(catalog)
        .await
        .unwrap()
        .into_iter()
        .map(|item| (item.id, item))
        .collect();
    let claims = db.list_claims(catalog).await.unwrap();
    assert!(!claims.is_empty());

    let mut per_item: HashMap<_, usize> = HashMap::new();
    let mut per_worker_item: HashMap<_, usize> = HashMap::new();
    for claim in &claims {
        *per_item.entry(claim.work_item_id).or_default() += 1;
        *per_worker_item
            .entry((claim.work_item_id, claim.worker_id.clone()))
            .or_default() += 1;
        assert!(claim.completed);
    }
    for (id, count) in &per_item {
        if items[id].kind == Shared {
            assert_eq!(*count, 1, "shared item {id} claimed {count} times");
        }
    }
    assert!(per_worker_item.values().all(|&count| count == 1));

    // Claims list is in creation order; shared order keys never go backwards.
    let shared_orders: Vec<i64> = claims
        .iter()
        .filter(|c| c.kind == Shared)
        .map(|c| items[&c.work_item_id].order_key)
        .collect();
    assert!(shared_orders.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
#[ignore] // Requires running Postgres
async fn assign_resolves_default_then_submitted_payload() {
    let (dispatcher, catalog, items) = seeded_catalog(&[(1, Shared)]).await;

    let AssignmentResponse::Open {
        resumed,
        claim,
        payload,
    } = dispatcher.assign(catalog, "w1").await.unwrap()
    else {
        panic!("expected an open assignment");
    };
    assert!(!resumed);
    assert_eq!(payload.claim_id, claim.id);
    assert_eq!(payload.external_ref, items[0].external_ref);
    assert_eq!(payload.occupancy_type, "RES1");
    assert_eq!(payload.stories, 0);

    // Resolving is read-only.
    assert_eq!(dispatcher.resolve(&claim).await.unwrap(), payload);

    let completed = finish(&dispatcher, "w1", &claim).await;
    assert!(completed.completed);

    let stored = dispatcher.resolve(&claim).await.unwrap();
    assert_eq!(stored.stories, 2);
    assert_eq!(stored.roof_style, "gable");

    let response = dispatcher.assign(catalog, "w1").await.unwrap();
    assert!(matches!(response, AssignmentResponse::Exhausted));
    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        serde_json::json!({"result": "completed"})
    );
}

#[tokio::test]
#[ignore] // Requires running Postgres
async fn resubmission_overwrites_payload() {
    let (dispatcher, catalog, _) = seeded_catalog(&[(1, Shared)]).await;
    let claim = newly_assigned(dispatcher.next(catalog, "w1").await.unwrap());

    let mut payload = dispatcher.resolve(&claim).await.unwrap();
    payload.quality = "good".to_string();
    dispatcher.complete("w1", payload.clone()).await.unwrap();

    payload.quality = "poor".to_string();
    payload.garage = "attached".to_string();
    dispatcher.complete("w1", payload).await.unwrap();

    let stored = dispatcher.db().find_payload(claim.id).await.unwrap().unwrap();
    assert_eq!(stored.quality, "poor");
    assert_eq!(stored.garage, "attached");
    assert!(dispatcher.db().get_claim(claim.id).await.unwrap().completed);
}

#[tokio::test]
#[ignore] // Requires running Postgres
async fn complete_rejects_other_workers_claim() {
    let (dispatcher, catalog, _) = seeded_catalog(&[(1, Shared)]).await;
    let claim = newly_assigned(dispatcher.next(catalog, "w1").await.unwrap());
    let payload = dispatcher.resolve(&claim).await.unwrap();

    let err = dispatcher.complete("w2", payload).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)), "got {err:?}");

    let claim = dispatcher.db().get_claim(claim.id).await.unwrap();
    assert!(!claim.completed);
    assert!(dispatcher.db().find_payload(claim.id).await.unwrap().is_none());
}

#[tokio::test]
#[ignore] // Requires running Postgres
async fn completing_unknown_claim_is_not_found() {
    let (dispatcher, catalog, _) = seeded_catalog(&[(1, Shared)]).await;
    let claim = newly_assigned(dispatcher.next(catalog, "w1").await.unwrap());
    let payload = dispatcher.resolve(&claim).await.unwrap();

    let ghost = Claim {
        id: ClaimId::new(),
        ..claim.clone()
    };
    let err = dispatcher.complete_claim(&ghost, &payload).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)), "got {err:?}");
    assert!(matches!(
        dispatcher.db().record_completion(ghost.id, &payload).await,
        Err(Error::NotFound(_))
    ));
    assert!(dispatcher.db().find_payload(ghost.id).await.unwrap().is_none());

    let claim = dispatcher.db().get_claim(claim.id).await.unwrap();
    assert!(!claim.completed);
}

/// A text field Postgres refuses to store: NUL bytes are invalid in TEXT.
fn unstorable(mut payload: Payload) -> Payload {
    payload.cbfips = "24510\0".to_string();
    payload
}

#[tokio::test]
#[ignore] // Requires running Postgres
async fn payload_write_failure_rolls_back_completion() {
    let (dispatcher, catalog, _) = seeded_catalog(&[(1, Shared)]).await;
    let claim = newly_assigned(dispatcher.next(catalog, "w1").await.unwrap());
    let payload = unstorable(dispatcher.resolve(&claim).await.unwrap());

    // The claim update succeeds inside the transaction; the payload write
    // then fails and neither change may be visible.
    let err = dispatcher.complete("w1", payload).await.unwrap_err();
    assert!(matches!(err, Error::StoreUnavailable(_)), "got {err:?}");

    assert!(!dispatcher.db().get_claim(claim.id).await.unwrap().completed);
    assert!(dispatcher.db().find_payload(claim.id).await.unwrap().is_none());
    assert_eq!(
        dispatcher.next(catalog, "w1").await.unwrap(),
        Selection::Resumed(claim)
    );
}

#[tokio::test]
#[ignore] // Requires running Postgres
async fn failed_resubmission_keeps_previous_payload() {
    let (dispatcher, catalog, _) = seeded_catalog(&[(1, Shared)]).await;
    let claim = newly_assigned(dispatcher.next(catalog, "w1").await.unwrap());
    finish(&dispatcher, "w1", &claim).await;
    let stored = dispatcher.db().find_payload(claim.id).await.unwrap().unwrap();

    let mut retry = unstorable(stored.clone());
    retry.roof_style = "hip".to_string();
    assert!(dispatcher.complete("w1", retry).await.is_err());

    assert_eq!(
        dispatcher.db().find_payload(claim.id).await.unwrap(),
        Some(stored)
    );
    assert!(dispatcher.db().get_claim(claim.id).await.unwrap().completed);
}

#[tokio::test]
#[ignore] // Requires running Postgres
async fn mark_complete_is_idempotent() {
    let (dispatcher, catalog, _) = seeded_catalog(&[(1, Shared)]).await;
    let claim = newly_assigned(dispatcher.next(catalog, "w1").await.unwrap());

    dispatcher.db().mark_complete(claim.id).await.unwrap();
    dispatcher.db().mark_complete(claim.id).await.unwrap();
    assert!(dispatcher.db().get_claim(claim.id).await.unwrap().completed);
}

#[tokio::test]
#[ignore] // Requires running Postgres
async fn report_lists_open_and_completed_claims() {
    let (dispatcher, catalog, _) = seeded_catalog(&[(1, Shared), (2, Shared)]).await;

    let done = newly_assigned(dispatcher.next(catalog, "w1").await.unwrap());
    finish(&dispatcher, "w1", &done).await;
    let open = newly_assigned(dispatcher.next(catalog, "w2").await.unwrap());

    let report = dispatcher.db().catalog_report(catalog).await.unwrap();
    assert_eq!(report.len(), 2);

    assert_eq!(report[0].claim_id, done.id);
    assert!(report[0].completed);
    assert_eq!(report[0].payload.as_ref().unwrap().roof_style, "gable");

    assert_eq!(report[1].claim_id, open.id);
    assert!(!report[1].completed);
    assert!(report[1].payload.is_none());
}
