//! Scenario E6: `SUBSCRIBEALL` replays existing events across every stream,
//! then continues with live pushes, each event delivered exactly once.

use vstream_store::BackendKind;
use vstream_test_utils::TestServer;

#[tokio::test]
async fn subscribe_all_replays_then_streams_live_events_across_streams() {
    let server = TestServer::start(BackendKind::Sled).await.unwrap();

    let mut publisher = server.connect().await.unwrap();
    publisher.publish(b"a", b"1", b"_").await.unwrap();

    let sub_client = server.connect().await.unwrap();
    let mut subscription = sub_client.subscribe_all(None).await.unwrap();

    let replayed = subscription.next_event().await.unwrap().unwrap();
    assert_eq!(replayed.stream, b"a");
    assert_eq!(replayed.version, b"1");

    publisher.publish(b"a", b"2", b"_").await.unwrap();
    let live = subscription.next_event().await.unwrap().unwrap();
    assert_eq!(live.stream, b"a");
    assert_eq!(live.version, b"2");

    server.shutdown().await.unwrap();
}
