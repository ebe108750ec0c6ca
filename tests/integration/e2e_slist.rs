//! Scenario E4: `SLIST` reports one pair per live stream.

use vstream_store::BackendKind;
use vstream_test_utils::TestServer;

#[tokio::test]
async fn slist_reports_every_published_stream() {
    let server = TestServer::start(BackendKind::Sled).await.unwrap();
    let mut client = server.connect().await.unwrap();

    client.publish(b"s", b"1", b"a").await.unwrap();
    client.publish(b"t", b"1", b"b").await.unwrap();

    let mut counts = client.slist().await.unwrap();
    counts.sort_by(|a, b| a.stream.cmp(&b.stream));

    assert_eq!(counts.len(), 2);
    assert_eq!(counts[0].stream, b"s");
    assert_eq!(counts[0].count, 1);
    assert_eq!(counts[1].stream, b"t");
    assert_eq!(counts[1].count, 1);

    server.shutdown().await.unwrap();
}
