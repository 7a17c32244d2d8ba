use super::{
    AccessPolicy,
    catalog_service::{CatalogService, CatalogSettings},
    error::{FileUploadError, ServiceError},
    keys::KeyGenerator,
    metadata_repository::{MetadataRepository, test_support::memory_repository},
    object_store::{LocalObjectStore, ObjectStore, ObjectStoreError, fake::FakeObjectStore},
    upload_service::{UploadService, UploadSettings},
};
use crate::{
    config::{CatalogSource, ResolveBy, UrlMode},
    models::upload::IncomingFile,
};
use bytes::Bytes;
use std::{sync::Arc, time::Duration};

const PRESIGNED: AccessPolicy = AccessPolicy {
    url_mode: UrlMode::Presigned,
    presign_expiry: Duration::from_secs(3600),
};

fn pdf(name: &str, body: &'static [u8]) -> IncomingFile {
    IncomingFile {
        original_name: name.to_string(),
        content_type: "application/pdf".to_string(),
        bytes: Bytes::from_static(body),
    }
}

struct Harness {
    store: FakeObjectStore,
    records: MetadataRepository,
    uploads: UploadService,
}

impl Harness {
    async fn new() -> Self {
        Self::with_access(PRESIGNED).await
    }

    async fn with_access(access: AccessPolicy) -> Self {
        Self::build(access, Duration::from_secs(5)).await
    }

    async fn build(access: AccessPolicy, persist_timeout: Duration) -> Self {
        let store = FakeObjectStore::new();
        let records = memory_repository().await;
        let shared: Arc<dyn ObjectStore> = Arc::new(store.clone());
        let uploads = UploadService::new(
            shared,
            records.clone(),
            Arc::new(KeyGenerator::new()),
            UploadSettings {
                max_files: 3,
                access,
                persist_timeout,
            },
        );
        Self {
            store,
            records,
            uploads,
        }
    }

    fn catalog(&self, resolve_by: ResolveBy, source: CatalogSource) -> CatalogService {
        self.catalog_with(PRESIGNED, resolve_by, source)
    }

    fn catalog_with(
        &self,
        access: AccessPolicy,
        resolve_by: ResolveBy,
        source: CatalogSource,
    ) -> CatalogService {
        CatalogService::new(
            Arc::new(self.store.clone()),
            self.records.clone(),
            CatalogSettings {
                access,
                resolve_by,
                source,
            },
        )
    }
}

#[tokio::test]
async fn batch_results_follow_input_order() {
    let h = Harness::new().await;
    let uploaded = h
        .uploads
        .upload_batch(vec![
            pdf("first.pdf", b"%PDF-1"),
            pdf("second.pdf", b"%PDF-22"),
            pdf("third.pdf", b"%PDF-333"),
        ])
        .await
        .unwrap();

    let names: Vec<_> = uploaded.iter().map(|u| u.filename.as_str()).collect();
    assert_eq!(names, ["first.pdf", "second.pdf", "third.pdf"]);
    assert_eq!(
        uploaded.iter().map(|u| u.size).collect::<Vec<_>>(),
        [6, 7, 8]
    );
    for file in &uploaded {
        assert!(file.key.starts_with("pdfs/"));
        assert!(!file.url.is_empty());
        assert!(h.store.object(&file.key).await.is_some());
        let record = h.records.find_by_key(&file.key).await.unwrap().unwrap();
        assert_eq!(record.filename, file.filename);
        assert_eq!(record.url, file.url);
    }
}

#[tokio::test]
async fn stored_object_carries_metadata() {
    let h = Harness::new().await;
    let uploaded = h
        .uploads
        .upload_batch(vec![pdf("relatório final.pdf", b"%PDF-1.4")])
        .await
        .unwrap();

    let object = h.store.object(&uploaded[0].key).await.unwrap();
    assert_eq!(object.content_type, "application/pdf");
    assert_eq!(object.bytes.as_ref(), b"%PDF-1.4");
    assert_eq!(object.metadata["size"], "8");
    assert_eq!(object.metadata["originalname"], "relatrio final.pdf");
    assert!(uploaded[0].key.ends_with("_relatriofinal.pdf"));
}

#[tokio::test]
async fn names_are_sanitized_into_keys() {
    let h = Harness::new().await;
    let uploaded = h
        .uploads
        .upload_batch(vec![pdf("a.pdf", b"1"), pdf("b??.pdf", b"2")])
        .await
        .unwrap();

    assert!(uploaded[0].key.ends_with("_a.pdf"));
    assert!(uploaded[1].key.ends_with("_b.pdf"));
    assert_eq!(uploaded[1].filename, "b??.pdf");
    assert_ne!(uploaded[0].key, uploaded[1].key);
}

#[tokio::test]
async fn same_name_twice_gets_distinct_keys() {
    let h = Harness::new().await;
    let uploaded = h
        .uploads
        .upload_batch(vec![pdf("dup.pdf", b"1"), pdf("dup.pdf", b"2")])
        .await
        .unwrap();

    assert_ne!(uploaded[0].key, uploaded[1].key);
    assert_eq!(h.store.keys().await.len(), 2);
}

#[tokio::test]
async fn empty_batch_is_rejected_without_writes() {
    let h = Harness::new().await;
    let err = h.uploads.upload_batch(Vec::new()).await.unwrap_err();

    assert!(matches!(err, ServiceError::NoFilesProvided));
    assert!(h.store.keys().await.is_empty());
}

#[tokio::test]
async fn oversized_batch_is_rejected_without_writes() {
    let h = Harness::new().await;
    let files = (0..4).map(|i| pdf(&format!("{i}.pdf"), b"x")).collect();
    let err = h.uploads.upload_batch(files).await.unwrap_err();

    assert!(matches!(err, ServiceError::TooManyFiles { count: 4, max: 3 }));
    assert!(h.store.keys().await.is_empty());
}

#[tokio::test]
async fn non_pdf_rejects_whole_batch() {
    let h = Harness::new().await;
    let mut image = pdf("photo.png", b"\x89PNG");
    image.content_type = "image/png".into();

    let err = h
        .uploads
        .upload_batch(vec![pdf("ok.pdf", b"1"), image])
        .await
        .unwrap_err();

    match err {
        ServiceError::UnsupportedMediaType {
            filename,
            content_type,
        } => {
            assert_eq!(filename, "photo.png");
            assert_eq!(content_type, "image/png");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(h.store.keys().await.is_empty());
}

#[tokio::test]
async fn pdf_media_type_ignores_case_and_parameters() {
    let h = Harness::new().await;
    let mut file = pdf("odd.pdf", b"1");
    file.content_type = "Application/PDF; charset=binary".into();

    let uploaded = h.uploads.upload_batch(vec![file]).await.unwrap();
    assert_eq!(uploaded.len(), 1);
}

#[tokio::test]
async fn write_failure_names_file_and_leaves_no_record() {
    let h = Harness::new().await;
    h.store.fake_fail_put("broken").await;

    let err = h
        .uploads
        .upload_batch(vec![pdf("good.pdf", b"1"), pdf("broken.pdf", b"2")])
        .await
        .unwrap_err();

    match err {
        ServiceError::UploadFailed { failed, source } => {
            assert_eq!(failed, ["broken.pdf"]);
            assert!(matches!(
                source,
                FileUploadError::Write(ObjectStoreError::Write { .. })
            ));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let records = h.records.list_newest_first().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].filename, "good.pdf");
    assert!(h.records.find_by_filename("broken.pdf").await.unwrap().is_none());
}

#[tokio::test]
async fn persist_failure_removes_written_object() {
    let h = Harness::new().await;
    sqlx::query("DROP TABLE files")
        .execute(&*h.records.db)
        .await
        .unwrap();

    let err = h
        .uploads
        .upload_batch(vec![pdf("lost.pdf", b"1")])
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ServiceError::UploadFailed {
            source: FileUploadError::Persist(_),
            ..
        }
    ));
    let deleted = h.store.deleted().await;
    assert_eq!(deleted.len(), 1);
    assert!(deleted[0].ends_with("_lost.pdf"));
    assert!(h.store.keys().await.is_empty());
}

#[tokio::test]
async fn slow_persist_times_out_and_removes_object() {
    let h = Harness::build(PRESIGNED, Duration::from_millis(50)).await;
    // The test pool has a single connection; holding it stalls every insert.
    let held = h.records.db.acquire().await.unwrap();

    let err = h
        .uploads
        .upload_batch(vec![pdf("slow.pdf", b"%PDF")])
        .await
        .unwrap_err();
    drop(held);

    match err {
        ServiceError::UploadFailed { failed, source } => {
            assert_eq!(failed, ["slow.pdf"]);
            assert!(matches!(source, FileUploadError::PersistTimeout(_)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(h.store.keys().await.is_empty());
    let deleted = h.store.deleted().await;
    assert_eq!(deleted.len(), 1);
    assert!(deleted[0].ends_with("_slow.pdf"));
    assert!(h.records.list_newest_first().await.unwrap().is_empty());
}

#[tokio::test]
async fn local_backend_accepts_dotted_names_and_misses_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let local: Arc<dyn ObjectStore> =
        Arc::new(LocalObjectStore::new(dir.path(), "http://localhost:4000"));
    let records = memory_repository().await;
    let uploads = UploadService::new(
        local.clone(),
        records.clone(),
        Arc::new(KeyGenerator::new()),
        UploadSettings {
            max_files: 3,
            access: PRESIGNED,
            persist_timeout: Duration::from_secs(5),
        },
    );
    let catalog = CatalogService::new(
        local,
        records,
        CatalogSettings {
            access: PRESIGNED,
            resolve_by: ResolveBy::Key,
            source: CatalogSource::Store,
        },
    );

    let uploaded = uploads
        .upload_batch(vec![pdf("my..file.pdf", b"%PDF")])
        .await
        .unwrap();
    assert!(uploaded[0].key.ends_with("_my..file.pdf"));
    assert_eq!(
        catalog.resolve(&uploaded[0].key).await.unwrap(),
        format!("http://localhost:4000/objects/{}", uploaded[0].key)
    );

    let sidecar = format!("{}.meta.json", uploaded[0].key);
    for key in ["pdfs/1_never..written.pdf", sidecar.as_str()] {
        let err = catalog.resolve(key).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)), "{key}");
    }
}

#[tokio::test]
async fn uploaded_key_resolves_to_fresh_url() {
    let h = Harness::new().await;
    let uploaded = h
        .uploads
        .upload_batch(vec![pdf("report.pdf", b"%PDF")])
        .await
        .unwrap();
    let catalog = h.catalog(ResolveBy::Key, CatalogSource::Store);

    let url = catalog.resolve(&uploaded[0].key).await.unwrap();
    assert_eq!(
        url,
        format!("https://fake-bucket.example/{}?expires=3600", uploaded[0].key)
    );
}

#[tokio::test]
async fn unknown_key_is_not_found() {
    let h = Harness::new().await;
    let catalog = h.catalog(ResolveBy::Key, CatalogSource::Store);

    let err = catalog.resolve("pdfs/1_missing.pdf").await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));

    let err = catalog.resolve("../etc/passwd").await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn filename_mode_returns_recorded_url() {
    let h = Harness::new().await;
    let uploaded = h
        .uploads
        .upload_batch(vec![pdf("minutes.pdf", b"%PDF")])
        .await
        .unwrap();
    let catalog = h.catalog(ResolveBy::Filename, CatalogSource::Records);

    assert_eq!(catalog.resolve("minutes.pdf").await.unwrap(), uploaded[0].url);
    assert!(matches!(
        catalog.resolve("agenda.pdf").await.unwrap_err(),
        ServiceError::NotFound(_)
    ));
}

#[tokio::test]
async fn empty_store_lists_nothing() {
    let h = Harness::new().await;
    let catalog = h.catalog(ResolveBy::Key, CatalogSource::Store);
    assert!(catalog.list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn store_listing_derives_display_names() {
    let h = Harness::new().await;
    h.store
        .fake_add_object("pdfs/1700000000000_weekly_news.pdf", b"%PDF-12")
        .await;
    h.store.fake_add_object("other/1_ignored.pdf", b"x").await;
    let catalog = h.catalog(ResolveBy::Key, CatalogSource::Store);

    let entries = catalog.list_all().await.unwrap();
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.key, "pdfs/1700000000000_weekly_news.pdf");
    assert_eq!(entry.filename, "news");
    assert_eq!(entry.size, 7);
    assert_eq!(
        entry.url,
        "https://fake-bucket.example/pdfs/1700000000000_weekly_news.pdf?expires=3600"
    );
}

#[tokio::test]
async fn record_listing_is_newest_first() {
    let h = Harness::new().await;
    h.uploads
        .upload_batch(vec![pdf("older.pdf", b"1")])
        .await
        .unwrap();
    h.uploads
        .upload_batch(vec![pdf("newer.pdf", b"22")])
        .await
        .unwrap();
    let catalog = h.catalog(ResolveBy::Key, CatalogSource::Records);

    let names: Vec<_> = catalog
        .list_all()
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.filename)
        .collect();
    assert_eq!(names, ["newer.pdf", "older.pdf"]);
}

#[tokio::test]
async fn public_mode_hands_out_permanent_urls() {
    let public = AccessPolicy {
        url_mode: UrlMode::Public,
        presign_expiry: Duration::from_secs(3600),
    };
    let h = Harness::with_access(public).await;
    let uploaded = h
        .uploads
        .upload_batch(vec![pdf("open.pdf", b"1")])
        .await
        .unwrap();

    let expected = format!("https://fake-bucket.example/{}", uploaded[0].key);
    assert_eq!(uploaded[0].url, expected);

    let catalog = h.catalog_with(public, ResolveBy::Key, CatalogSource::Store);
    assert_eq!(catalog.resolve(&uploaded[0].key).await.unwrap(), expected);
}
