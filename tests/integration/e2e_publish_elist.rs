//! End-to-end coverage of `PUBLISH`/`ELIST`/`DELETE`, scenarios E1, E2, E3
//! and E7.

use vstream_store::BackendKind;
use vstream_test_utils::TestServer;

#[tokio::test]
async fn publish_then_elist_round_trips_one_event() {
    let server = TestServer::start(BackendKind::Sled).await.unwrap();
    let mut client = server.connect().await.unwrap();

    client.publish(b"s", b"1", b"hello").await.unwrap();
    let events = client.elist(b"s", None, None).await.unwrap();

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].version, 1);
    assert_eq!(events[0].data, b"hello");

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn duplicate_version_is_rejected_and_first_write_wins() {
    let server = TestServer::start(BackendKind::Sled).await.unwrap();
    let mut client = server.connect().await.unwrap();

    client.publish(b"s", b"1", b"hello").await.unwrap();
    let err = client.publish(b"s", b"1", b"world").await.unwrap_err();
    assert!(matches!(err, vstream_client::ClientError::Server(_)));

    let events = client.elist(b"s", None, None).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].data, b"hello");

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn elist_with_offset_and_limit_returns_the_next_n() {
    let server = TestServer::start(BackendKind::Sled).await.unwrap();
    let mut client = server.connect().await.unwrap();

    client.publish(b"s", b"1", b"a").await.unwrap();
    client.publish(b"s", b"2", b"b").await.unwrap();
    client.publish(b"s", b"3", b"c").await.unwrap();

    let events = client
        .elist(b"s", Some(b"2"), Some(1))
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].version, 3);
    assert_eq!(events[0].data, b"c");

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn delete_removes_the_stream_entirely() {
    let server = TestServer::start(BackendKind::Sled).await.unwrap();
    let mut client = server.connect().await.unwrap();

    client.publish(b"s", b"1", b"x").await.unwrap();
    client.delete(&[b"s"]).await.unwrap();

    let events = client.elist(b"s", None, None).await.unwrap();
    assert!(events.is_empty());
    assert!(!client.exists(b"s").await.unwrap());

    server.shutdown().await.unwrap();
}
