use chrono::TimeZone;

use super::*;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn post(id: i64, channel: &str) -> Post {
    Post {
        message_id: id,
        channel_name: channel.to_string(),
        channel_title: format!("{channel} title"),
        message_date: Some(Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()),
        message_text: Some(format!("post {id}")),
        has_media: false,
        image_path: None,
        views: 10,
        forwards: 1,
    }
}

#[test]
fn write_then_read_preserves_order() {
    let dir = tempfile::tempdir().unwrap();
    let store = LandingStore::new(dir.path());
    let posts = vec![post(3, "cheMed123"), post(2, "cheMed123"), post(1, "cheMed123")];

    let partition = store.write("cheMed123", date(2026, 3, 2), &posts).unwrap();
    assert!(partition
        .path
        .ends_with("raw/telegram_messages/2026-03-02/cheMed123.json"));

    let contents = store.read(&partition).unwrap();
    assert_eq!(contents.posts, posts);
    assert!(contents.malformed.is_empty());
}

#[test]
fn rewrite_replaces_previous_partition() {
    let dir = tempfile::tempdir().unwrap();
    let store = LandingStore::new(dir.path());
    let day = date(2026, 3, 2);

    store
        .write("cheMed123", day, &[post(1, "cheMed123"), post(2, "cheMed123")])
        .unwrap();
    let partition = store.write("cheMed123", day, &[post(9, "cheMed123")]).unwrap();

    let contents = store.read(&partition).unwrap();
    assert_eq!(contents.posts.len(), 1);
    assert_eq!(contents.posts[0].message_id, 9);
    assert!(!partition.path.with_extension("json.tmp").exists());
}

#[test]
fn write_rejects_unsafe_channel_names() {
    let dir = tempfile::tempdir().unwrap();
    let store = LandingStore::new(dir.path());
    for bad in ["", "../escape", "_manifest", "a/b"] {
        let err = store.write(bad, date(2026, 3, 2), &[]).unwrap_err();
        assert!(matches!(err, LandingError::InvalidChannel(_)), "{bad}");
    }
}

#[test]
fn list_returns_requested_date_sorted_and_skips_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let store = LandingStore::new(dir.path());
    let day = date(2026, 3, 2);
    store.write("tikvahpharma", day, &[]).unwrap();
    store.write("cheMed123", day, &[]).unwrap();
    store.archive(day, &[], Utc::now()).unwrap();

    let listing = store.list_partitions(Some(day)).unwrap();
    assert_eq!(listing.date, Some(day));
    assert!(!listing.fell_back);
    let names: Vec<&str> = listing
        .partitions
        .iter()
        .map(|p| p.channel_name.as_str())
        .collect();
    assert_eq!(names, vec!["cheMed123", "tikvahpharma"]);
}

#[test]
fn list_falls_back_to_most_recent_earlier_date() {
    let dir = tempfile::tempdir().unwrap();
    let store = LandingStore::new(dir.path());
    store.write("cheMed123", date(2026, 2, 27), &[]).unwrap();
    store.write("cheMed123", date(2026, 3, 1), &[]).unwrap();
    // A date directory holding only a manifest does not count.
    store.archive(date(2026, 3, 2), &[], Utc::now()).unwrap();
    std::fs::create_dir_all(store.messages_root().join("not-a-date")).unwrap();

    let listing = store.list_partitions(Some(date(2026, 3, 3))).unwrap();
    assert!(listing.fell_back);
    assert_eq!(listing.requested, date(2026, 3, 3));
    assert_eq!(listing.date, Some(date(2026, 3, 1)));
    assert_eq!(listing.partitions.len(), 1);
}

#[test]
fn list_on_empty_store_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = LandingStore::new(dir.path());
    let listing = store.list_partitions(None).unwrap();
    assert!(listing.is_empty());
    assert_eq!(listing.date, None);
}

#[test]
fn read_separates_malformed_records() {
    let dir = tempfile::tempdir().unwrap();
    let store = LandingStore::new(dir.path());
    let day = date(2026, 3, 2);
    let path = store.partition_path("cheMed123", day);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(
        &path,
        r#"[
          {"message_id": 1, "channel_name": "cheMed123", "channel_title": "CheMed",
           "message_date": "2026-03-02T09:00:00+00:00", "message_text": "",
           "has_media": false, "image_path": null, "views": 4, "forwards": 0},
          {"message_id": 2, "channel_name": "cheMed123", "channel_title": "CheMed",
           "message_date": "not a date", "message_text": "x",
           "has_media": false, "image_path": null, "views": 1, "forwards": 0},
          {"message_id": 3, "channel_name": "cheMed123", "channel_title": "CheMed",
           "message_date": null, "message_text": "x",
           "has_media": false, "image_path": "data/raw/images/cheMed123/3.jpg",
           "views": 1, "forwards": 0},
          {"channel_name": "cheMed123"}
        ]"#,
    )
    .unwrap();

    let partition = LandingPartition {
        date: day,
        channel_name: "cheMed123".to_string(),
        path,
    };
    let contents = store.read(&partition).unwrap();
    assert_eq!(contents.posts.len(), 1);
    assert!(contents.posts[0].message_text.is_none());

    let ids: Vec<Option<i64>> = contents.malformed.iter().map(|m| m.message_id).collect();
    assert_eq!(ids, vec![Some(2), Some(3), None]);
    assert_eq!(contents.malformed[2].index, 3);
}

#[test]
fn read_rejects_non_array_partition() {
    let dir = tempfile::tempdir().unwrap();
    let store = LandingStore::new(dir.path());
    let day = date(2026, 3, 2);
    let path = store.partition_path("cheMed123", day);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, r#"{"messages": []}"#).unwrap();

    let err = store
        .read(&LandingPartition {
            date: day,
            channel_name: "cheMed123".to_string(),
            path,
        })
        .unwrap_err();
    assert!(matches!(err, LandingError::CorruptPartition { .. }));
}

#[test]
fn archive_writes_manifest_and_keeps_partitions() {
    let dir = tempfile::tempdir().unwrap();
    let store = LandingStore::new(dir.path());
    let day = date(2026, 3, 2);
    let partition = store.write("cheMed123", day, &[post(1, "cheMed123")]).unwrap();
    let loaded_at = Utc.with_ymd_and_hms(2026, 3, 2, 2, 15, 0).unwrap();

    assert!(store.read_manifest(day).unwrap().is_none());
    store.archive(day, &[partition.clone()], loaded_at).unwrap();

    let manifest = store.read_manifest(day).unwrap().unwrap();
    assert_eq!(manifest.partitions, vec!["cheMed123".to_string()]);
    assert_eq!(manifest.loaded_at, loaded_at);
    assert!(partition.path.exists());
}

#[test]
fn image_paths_follow_convention() {
    let dir = tempfile::tempdir().unwrap();
    let store = LandingStore::new(dir.path());
    let path = store.write_image("lobelia4cosmetics", 77, "jpg", b"\xff\xd8").unwrap();
    assert_eq!(path, dir.path().join("raw/images/lobelia4cosmetics/77.jpg"));
    assert_eq!(std::fs::read(&path).unwrap(), b"\xff\xd8");
}
