use crate::cache::FakeCacheStore;
use crate::db::FakeCampaignStore;
use crate::ingest::{BytesChunkStream, UploadFrame};
use crate::s3::FakeAssetStore;
use crate::service::{
    AssetPolicy, CampaignService, CreateCampaign, ServiceError, UpdateCampaignProperty,
};
use crate::test_utils::FakeIdGenerator;
use bytes::Bytes;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration as StdDuration;

const CACHE_TTL: StdDuration = StdDuration::from_secs(300);
const IMAGE: &[u8] = b"\x89PNG launch screen image";

/// Ids issued by the fake generator start here
const FIRST_ID: u64 = 100;

fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

/// Test environment that holds all fake seams and the service under test
struct TestEnvironment {
    campaigns: Arc<FakeCampaignStore>,
    assets: Arc<FakeAssetStore>,
    idgen: Arc<FakeIdGenerator>,
    service: CampaignService<FakeCampaignStore, FakeAssetStore, FakeCacheStore, FakeIdGenerator>,
}

fn setup() -> TestEnvironment {
    setup_with_policy(AssetPolicy::default())
}

fn setup_with_policy(policy: AssetPolicy) -> TestEnvironment {
    let campaigns = Arc::new(FakeCampaignStore::new());
    let assets = Arc::new(FakeAssetStore::new());
    let cache = Arc::new(FakeCacheStore::new());
    let idgen = Arc::new(FakeIdGenerator::new(FIRST_ID));

    let service = CampaignService::new(
        campaigns.clone(),
        assets.clone(),
        cache,
        idgen.clone(),
        CACHE_TTL,
        policy,
    );

    TestEnvironment {
        campaigns,
        assets,
        idgen,
        service,
    }
}

fn create_request(category: i32, now: DateTime<Utc>) -> CreateCampaign {
    CreateCampaign {
        owner_id: Some(7),
        link_href: "https://example.com/promo".to_string(),
        text: "Launch promo".to_string(),
        targeting_regex: ".*".to_string(),
        category,
        start_at: now - Duration::hours(1),
        end_at: now + Duration::hours(1),
        start_hour: 0,
        end_hour: 24,
        frequency_cap: 3,
    }
}

fn image_stream() -> BytesChunkStream {
    BytesChunkStream::from_bytes(IMAGE, 8)
}

#[tokio::test]
async fn create_persists_the_row_and_the_asset() {
    let env = setup();
    let now = noon();

    let mut stream = image_stream();
    let campaign = env
        .service
        .create(create_request(3, now), &mut stream)
        .await
        .unwrap();

    assert_eq!(campaign.id, FIRST_ID);
    assert_eq!(campaign.asset_url, format!("campaigns/{}.img", FIRST_ID));
    assert_eq!(campaign.impression_count, 0);
    assert_eq!(campaign.click_count, 0);

    let stored = env.campaigns.fake_get_campaign(FIRST_ID).unwrap();
    assert_eq!(stored.category, 3);
    assert!(stored.deleted_at.is_none());

    let blob = env.assets.fake_get_object(&campaign.asset_url).await.unwrap();
    assert_eq!(blob, Bytes::from_static(IMAGE));
}

#[tokio::test]
async fn create_rejects_an_inverted_calendar_window() {
    let env = setup();
    let now = noon();

    let mut request = create_request(3, now);
    request.start_at = now + Duration::hours(2);
    request.end_at = now + Duration::hours(1);

    let mut stream = image_stream();
    let result = env.service.create(request, &mut stream).await;
    assert!(matches!(result, Err(ServiceError::Validation(_))));

    assert!(env.campaigns.fake_get_campaign(FIRST_ID).is_none());
    assert!(!env.assets.fake_has_object("campaigns/100.img").await);
}

#[tokio::test]
async fn create_rejects_a_malformed_hour_window() {
    let env = setup();
    let now = noon();

    let mut inverted = create_request(3, now);
    inverted.start_hour = 20;
    inverted.end_hour = 8;
    let mut stream = image_stream();
    assert!(matches!(
        env.service.create(inverted, &mut stream).await,
        Err(ServiceError::Validation(_))
    ));

    let mut out_of_range = create_request(3, now);
    out_of_range.end_hour = 25;
    let mut stream = image_stream();
    assert!(matches!(
        env.service.create(out_of_range, &mut stream).await,
        Err(ServiceError::Validation(_))
    ));
}

#[tokio::test]
async fn a_malformed_stream_aborts_before_any_side_effect() {
    let env = setup();
    let now = noon();

    // Chunk without a preceding header
    let mut stream =
        BytesChunkStream::from_frames(vec![UploadFrame::Chunk(Bytes::from_static(IMAGE))]);

    let result = env.service.create(create_request(3, now), &mut stream).await;
    assert!(matches!(result, Err(ServiceError::Validation(_))));

    assert!(env.campaigns.fake_get_campaign(FIRST_ID).is_none());
    assert!(!env.assets.fake_has_object("campaigns/100.img").await);
}

#[tokio::test]
async fn an_id_generator_failure_halts_creation() {
    let env = setup();
    env.idgen.fake_fail(true);

    let mut stream = image_stream();
    let result = env
        .service
        .create(create_request(3, noon()), &mut stream)
        .await;
    assert!(matches!(result, Err(ServiceError::Storage { .. })));
    assert!(env.campaigns.fake_get_campaign(FIRST_ID).is_none());
}

#[tokio::test]
async fn an_upload_failure_compensates_the_inserted_row() {
    let env = setup();
    env.assets.fake_fail_put("campaigns/100.img").await;

    let mut stream = image_stream();
    let result = env
        .service
        .create(create_request(3, noon()), &mut stream)
        .await;
    assert!(matches!(result, Err(ServiceError::Storage { .. })));

    // The inserted row was compensated with a delete
    let row = env.campaigns.fake_get_campaign(FIRST_ID).unwrap();
    assert!(row.deleted_at.is_some());
    assert!(!env.assets.fake_has_object("campaigns/100.img").await);
}

#[tokio::test]
async fn a_failed_compensation_surfaces_as_partial() {
    let env = setup();
    env.assets.fake_fail_put("campaigns/100.img").await;
    // The compensating row delete will fail too
    env.campaigns.fake_fail_updates(true);

    let mut stream = image_stream();
    let result = env
        .service
        .create(create_request(3, noon()), &mut stream)
        .await;

    match result {
        Err(ServiceError::Partial { op, remnant, .. }) => {
            assert_eq!(op, "create");
            assert!(remnant.contains("campaign row 100"));
        }
        other => panic!("expected a partial failure, got {:?}", other.map(|c| c.id)),
    }
}

#[tokio::test]
async fn an_insert_failure_compensates_the_uploaded_asset() {
    let env = setup();
    env.campaigns.fake_fail_creates(true);

    let mut stream = image_stream();
    let result = env
        .service
        .create(create_request(3, noon()), &mut stream)
        .await;
    assert!(matches!(result, Err(ServiceError::Storage { .. })));

    assert!(env.campaigns.fake_get_campaign(FIRST_ID).is_none());
    assert!(!env.assets.fake_has_object("campaigns/100.img").await);
}

#[tokio::test]
async fn update_property_merges_only_the_given_fields() {
    let env = setup();
    let now = noon();

    let mut stream = image_stream();
    let created = env
        .service
        .create(create_request(3, now), &mut stream)
        .await
        .unwrap();

    let request = UpdateCampaignProperty {
        id: created.id,
        text: Some("Holiday promo".to_string()),
        end_hour: Some(20),
        ..Default::default()
    };

    let updated = env.service.update_property(request).await.unwrap();
    assert_eq!(updated.text, "Holiday promo");
    assert_eq!(updated.end_hour, 20);
    // Untouched fields survive
    assert_eq!(updated.link_href, created.link_href);
    assert_eq!(updated.category, created.category);
    assert_eq!(updated.asset_url, created.asset_url);
}

#[tokio::test]
async fn update_property_validates_the_merged_schedule() {
    let env = setup();
    let now = noon();

    let mut stream = image_stream();
    let created = env
        .service
        .create(create_request(3, now), &mut stream)
        .await
        .unwrap();

    // end_at alone, moved before the stored start_at
    let request = UpdateCampaignProperty {
        id: created.id,
        end_at: Some(now - Duration::hours(2)),
        ..Default::default()
    };

    assert!(matches!(
        env.service.update_property(request).await,
        Err(ServiceError::Validation(_))
    ));
}

#[tokio::test]
async fn update_property_of_a_missing_campaign_is_not_found() {
    let env = setup();

    let request = UpdateCampaignProperty {
        id: 42,
        text: Some("ghost".to_string()),
        ..Default::default()
    };

    assert!(matches!(
        env.service.update_property(request).await,
        Err(ServiceError::NotFound(42))
    ));
}

#[tokio::test]
async fn update_property_of_a_deleted_campaign_is_not_found() {
    let env = setup();
    let now = noon();

    let mut stream = image_stream();
    let created = env
        .service
        .create(create_request(3, now), &mut stream)
        .await
        .unwrap();
    env.service.delete(created.id).await.unwrap();

    let request = UpdateCampaignProperty {
        id: created.id,
        text: Some("too late".to_string()),
        ..Default::default()
    };

    assert!(matches!(
        env.service.update_property(request).await,
        Err(ServiceError::NotFound(_))
    ));
}

#[tokio::test]
async fn update_asset_swaps_the_blob_and_deletes_the_old_one() {
    let env = setup();
    let now = noon();

    let mut stream = image_stream();
    let created = env
        .service
        .create(create_request(3, now), &mut stream)
        .await
        .unwrap();
    let old_url = created.asset_url.clone();

    let replacement = b"fresh image bytes";
    let mut stream = BytesChunkStream::from_bytes(replacement, 4);
    let updated = env.service.update_asset(created.id, &mut stream).await.unwrap();

    // Second id issued becomes the revision of the new key
    assert_eq!(
        updated.asset_url,
        format!("campaigns/{}.v{}.img", FIRST_ID, FIRST_ID + 1)
    );
    assert_ne!(updated.asset_url, old_url);

    let blob = env.assets.fake_get_object(&updated.asset_url).await.unwrap();
    assert_eq!(blob, Bytes::copy_from_slice(replacement));
    assert!(!env.assets.fake_has_object(&old_url).await);

    let stored = env.campaigns.fake_get_campaign(created.id).unwrap();
    assert_eq!(stored.asset_url, updated.asset_url);
}

#[tokio::test]
async fn update_asset_upload_failure_restores_the_previous_key() {
    let env = setup();
    let now = noon();

    let mut stream = image_stream();
    let created = env
        .service
        .create(create_request(3, now), &mut stream)
        .await
        .unwrap();

    let new_url = format!("campaigns/{}.v{}.img", FIRST_ID, FIRST_ID + 1);
    env.assets.fake_fail_put(&new_url).await;

    let mut stream = BytesChunkStream::from_bytes(b"fresh image bytes", 4);
    let result = env.service.update_asset(created.id, &mut stream).await;
    assert!(matches!(result, Err(ServiceError::Storage { .. })));

    // Row still points at the original asset, which is still stored
    let stored = env.campaigns.fake_get_campaign(created.id).unwrap();
    assert_eq!(stored.asset_url, created.asset_url);
    assert!(env.assets.fake_has_object(&created.asset_url).await);
}

#[tokio::test]
async fn update_asset_of_a_missing_campaign_is_not_found() {
    let env = setup();
    let mut stream = image_stream();
    assert!(matches!(
        env.service.update_asset(42, &mut stream).await,
        Err(ServiceError::NotFound(42))
    ));
}

#[tokio::test]
async fn delete_retains_the_blob_by_default() {
    let env = setup();
    let now = noon();

    let mut stream = image_stream();
    let created = env
        .service
        .create(create_request(3, now), &mut stream)
        .await
        .unwrap();

    let deleted = env.service.delete(created.id).await.unwrap();
    assert!(deleted.deleted_at.is_some());

    // Retention policy: the blob stays
    assert!(env.assets.fake_has_object(&created.asset_url).await);
}

#[tokio::test]
async fn delete_purges_the_blob_when_the_policy_says_so() {
    let env = setup_with_policy(AssetPolicy {
        purge_on_delete: true,
    });
    let now = noon();

    let mut stream = image_stream();
    let created = env
        .service
        .create(create_request(3, now), &mut stream)
        .await
        .unwrap();

    env.service.delete(created.id).await.unwrap();
    assert!(!env.assets.fake_has_object(&created.asset_url).await);
}

#[tokio::test]
async fn delete_stands_even_when_the_purge_fails() {
    let env = setup_with_policy(AssetPolicy {
        purge_on_delete: true,
    });
    let now = noon();

    let mut stream = image_stream();
    let created = env
        .service
        .create(create_request(3, now), &mut stream)
        .await
        .unwrap();
    env.assets.fake_fail_delete(&created.asset_url).await;

    let deleted = env.service.delete(created.id).await.unwrap();
    assert!(deleted.deleted_at.is_some());
    assert!(env.assets.fake_has_object(&created.asset_url).await);
}

#[tokio::test]
async fn impressions_increase_by_exactly_one_per_call() {
    let env = setup();
    let now = noon();

    let mut stream = image_stream();
    let first = env
        .service
        .create(create_request(3, now), &mut stream)
        .await
        .unwrap();
    let mut stream = image_stream();
    let second = env
        .service
        .create(create_request(3, now), &mut stream)
        .await
        .unwrap();

    env.service
        .record_impressions(&[first.id, second.id])
        .await
        .unwrap();
    env.service.record_impressions(&[first.id]).await.unwrap();

    assert_eq!(
        env.campaigns.fake_get_campaign(first.id).unwrap().impression_count,
        2
    );
    assert_eq!(
        env.campaigns
            .fake_get_campaign(second.id)
            .unwrap()
            .impression_count,
        1
    );
}

#[tokio::test]
async fn clicks_increase_by_exactly_one_per_call() {
    let env = setup();
    let now = noon();

    let mut stream = image_stream();
    let created = env
        .service
        .create(create_request(3, now), &mut stream)
        .await
        .unwrap();

    env.service.record_click(created.id).await.unwrap();
    env.service.record_click(created.id).await.unwrap();

    assert_eq!(
        env.campaigns.fake_get_campaign(created.id).unwrap().click_count,
        2
    );
}

#[tokio::test]
async fn a_campaign_is_eligible_inside_and_gone_after_its_window() {
    let env = setup();
    let now = noon();

    let mut stream = image_stream();
    let created = env
        .service
        .create(create_request(3, now), &mut stream)
        .await
        .unwrap();

    let visible = env.service.get_eligible(3, "anyKey", now).await.unwrap();
    assert!(visible.iter().any(|c| c.id == created.id));

    // Past end_at the same cached entry no longer yields the campaign
    let after_end = now + Duration::hours(2);
    let gone = env.service.get_eligible(3, "anyKey", after_end).await.unwrap();
    assert!(gone.iter().all(|c| c.id != created.id));
}

#[tokio::test]
async fn a_freshly_created_campaign_is_seen_by_the_next_read() {
    let env = setup();
    let now = noon();

    let mut stream = image_stream();
    env.service
        .create(create_request(3, now), &mut stream)
        .await
        .unwrap();
    env.service.get_eligible(3, "anyKey", now).await.unwrap();

    let mut stream = image_stream();
    let newest = env
        .service
        .create(create_request(3, now), &mut stream)
        .await
        .unwrap();

    let visible = env.service.get_eligible(3, "anyKey", now).await.unwrap();
    assert!(visible.iter().any(|c| c.id == newest.id));
}

#[tokio::test]
async fn concurrent_creates_both_succeed_and_become_visible() {
    let env = setup();
    let now = noon();

    let mut stream_a = image_stream();
    let mut stream_b = image_stream();
    let (a, b) = tokio::join!(
        env.service.create(create_request(3, now), &mut stream_a),
        env.service.create(create_request(3, now), &mut stream_b)
    );
    let a = a.unwrap();
    let b = b.unwrap();
    assert_ne!(a.id, b.id);

    let visible = env.service.get_eligible(3, "anyKey", now).await.unwrap();
    let ids: Vec<u64> = visible.iter().map(|c| c.id).collect();
    assert!(ids.contains(&a.id));
    assert!(ids.contains(&b.id));
}

#[tokio::test]
async fn deleting_a_missing_campaign_is_not_found() {
    let env = setup();
    assert!(matches!(
        env.service.delete(42).await,
        Err(ServiceError::NotFound(42))
    ));
}
