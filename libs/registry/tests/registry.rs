use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use we_reference::{
    DocumentType, FallbackPolicy, IssueError, ManualClock, ReferenceCode, ReferenceGenerator,
    Sequence, SequenceSource, StoreError,
};
use we_registry::{DbConfig, DbError, Registry};

fn scenario_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 9, 2)
        .unwrap()
        .and_hms_opt(14, 30, 27)
        .unwrap()
}

async fn open_registry() -> Registry {
    Registry::open(&DbConfig::in_memory())
        .await
        .expect("in-memory registry should open")
}

fn code(document_type: DocumentType, seq: u16) -> ReferenceCode {
    ReferenceCode::new(
        document_type,
        scenario_time(),
        Sequence::new(seq).unwrap(),
        None,
    )
}

async fn issue(
    gen: &ReferenceGenerator<Registry, ManualClock>,
    document_type: DocumentType,
    suffix: Option<&str>,
) -> Result<ReferenceCode, IssueError> {
    let registry = gen.source().clone();
    gen.issue(document_type, suffix, move |issued| {
        let registry = registry.clone();
        async move {
            registry
                .record(issued.code(), issued.is_verified())
                .await
                .map_err(StoreError::from)?;
            Ok(issued.into_code())
        }
    })
    .await
}

#[tokio::test]
async fn health_check_passes() {
    let registry = open_registry().await;
    registry.health_check().await.unwrap();
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let registry = open_registry().await;
    registry.run_migrations().await.unwrap();
}

#[tokio::test]
async fn lookup_returns_bucket_sequences_only() {
    let registry = open_registry().await;
    registry.record(&code(DocumentType::Quotation, 1), true).await.unwrap();
    registry.record(&code(DocumentType::Quotation, 3), true).await.unwrap();
    registry.record(&code(DocumentType::Invoice, 1), true).await.unwrap();

    let issued = registry
        .issued_sequences(&code(DocumentType::Quotation, 1).bucket())
        .await
        .unwrap();
    let values: Vec<u16> = issued.iter().map(Sequence::value).collect();
    assert_eq!(values, vec![1, 3]);
}

#[tokio::test]
async fn duplicate_slot_is_rejected_even_with_different_suffix() {
    let registry = open_registry().await;
    registry.record(&code(DocumentType::Quotation, 1), true).await.unwrap();

    let with_suffix = ReferenceCode::parse("DEV-20250902-143027-0001-COPIE001").unwrap();
    let err = registry.record(&with_suffix, true).await.unwrap_err();
    assert!(err.is_duplicate(), "unexpected error: {err}");

    let err = registry
        .record(&code(DocumentType::Quotation, 1), true)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Duplicate(_)));
}

#[tokio::test]
async fn generator_scenario_against_registry() {
    let registry = open_registry().await;
    let gen = ReferenceGenerator::with_clock(registry.clone(), ManualClock::new(scenario_time()));

    let first = issue(&gen, DocumentType::Quotation, None).await.unwrap();
    let second = issue(&gen, DocumentType::Quotation, None).await.unwrap();
    let third = issue(&gen, DocumentType::Quotation, Some("URGENT")).await.unwrap();

    assert_eq!(first.to_string(), "DEV-20250902-143027-0001");
    assert_eq!(second.to_string(), "DEV-20250902-143027-0002");
    assert_eq!(third.to_string(), "DEV-20250902-143027-0003-URGENT");

    gen.clock().advance(TimeDelta::seconds(1));
    let next = issue(&gen, DocumentType::Quotation, None).await.unwrap();
    assert_eq!(next.to_string(), "DEV-20250902-143028-0001");
}

#[tokio::test]
async fn issue_retries_past_a_concurrent_writer() {
    let registry = open_registry().await;
    let gen = ReferenceGenerator::with_clock(registry.clone(), ManualClock::new(scenario_time()));

    let mut first_attempt = true;
    let code = gen
        .issue(DocumentType::Production, None, |issued| {
            let registry = registry.clone();
            let race = std::mem::replace(&mut first_attempt, false);
            async move {
                if race {
                    // Someone else saves the same slot between lookup and write.
                    registry.record(issued.code(), true).await.map_err(StoreError::from)?;
                }
                registry
                    .record(issued.code(), true)
                    .await
                    .map_err(StoreError::from)?;
                Ok(issued.into_code())
            }
        })
        .await
        .unwrap();

    assert_eq!(code.to_string(), "PROD-20250902-143027-0002");
}

#[tokio::test]
async fn find_list_and_retire() {
    let registry = open_registry().await;
    for seq in 1..=3 {
        registry.record(&code(DocumentType::Invoice, seq), true).await.unwrap();
    }

    let found = registry
        .find("FAC-20250902-143027-0002")
        .await
        .unwrap()
        .expect("reference should exist");
    assert_eq!(found.reference, code(DocumentType::Invoice, 2));
    assert!(found.verified);

    let listed = registry.list(DocumentType::Invoice, 2).await.unwrap();
    let texts: Vec<String> = listed.iter().map(|r| r.reference.to_string()).collect();
    assert_eq!(
        texts,
        vec!["FAC-20250902-143027-0003", "FAC-20250902-143027-0002"]
    );

    assert!(registry.retire("FAC-20250902-143027-0002").await.unwrap());
    assert!(!registry.retire("FAC-20250902-143027-0002").await.unwrap());
    assert!(registry.find("FAC-20250902-143027-0002").await.unwrap().is_none());
}

#[tokio::test]
async fn retired_reference_is_never_reissued() {
    let registry = open_registry().await;
    let gen = ReferenceGenerator::with_clock(registry.clone(), ManualClock::new(scenario_time()));

    let first = issue(&gen, DocumentType::Quotation, None).await.unwrap();
    assert!(registry.retire(&first.to_string()).await.unwrap());

    // The local clock comes back to the same second (DST fall-back).
    gen.clock().advance(TimeDelta::hours(1));
    gen.clock().set(scenario_time());

    let again = issue(&gen, DocumentType::Quotation, None).await.unwrap();
    assert_ne!(again, first);
    assert_eq!(again.to_string(), "DEV-20250902-143027-0002");

    let err = registry.record(&first, true).await.unwrap_err();
    assert!(err.is_duplicate());

    let listed = registry.list(DocumentType::Quotation, 10).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].reference, again);
}

#[tokio::test]
async fn unverified_references_are_tracked() {
    let registry = open_registry().await;
    registry.record(&code(DocumentType::Delivery, 9123), false).await.unwrap();
    registry.record(&code(DocumentType::Delivery, 1), true).await.unwrap();

    let pending = registry.unverified().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].reference.sequence().value(), 9123);

    registry
        .retire(&code(DocumentType::Delivery, 9123).to_string())
        .await
        .unwrap();
    assert!(registry.unverified().await.unwrap().is_empty());
}

#[tokio::test]
async fn strict_generator_fails_when_registry_is_closed() {
    let registry = open_registry().await;
    registry.pool().close().await;

    let gen = ReferenceGenerator::with_clock(registry, ManualClock::new(scenario_time()))
        .fallback_policy(FallbackPolicy::Strict);
    let err = gen.generate(DocumentType::Return, None).await.unwrap_err();
    assert!(matches!(
        err,
        we_reference::ReferenceError::PersistenceUnavailable(_)
    ));
}
