//! Scenario E5: `SUBSCRIBE` delivers live pushes for its own stream only.

use vstream_store::BackendKind;
use vstream_test_utils::TestServer;

#[tokio::test]
async fn subscriber_receives_a_live_publish_on_its_stream() {
    let server = TestServer::start(BackendKind::Sled).await.unwrap();

    let sub_client = server.connect().await.unwrap();
    let mut subscription = sub_client.subscribe(b"x", None).await.unwrap();

    // Give the server a moment to register the listener before publishing.
    tokio::task::yield_now().await;

    let mut publisher = server.connect().await.unwrap();
    publisher.publish(b"x", b"1", b"hi").await.unwrap();

    let event = subscription.next_event().await.unwrap().unwrap();
    assert_eq!(event.stream, b"x");
    assert_eq!(event.version, b"1");
    assert_eq!(event.data, b"hi");

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn subscriber_does_not_see_publishes_on_other_streams() {
    let server = TestServer::start(BackendKind::Sled).await.unwrap();

    let sub_client = server.connect().await.unwrap();
    let mut subscription = sub_client.subscribe(b"x", None).await.unwrap();
    tokio::task::yield_now().await;

    let mut publisher = server.connect().await.unwrap();
    publisher.publish(b"y", b"1", b"other").await.unwrap();
    publisher.publish(b"x", b"1", b"mine").await.unwrap();

    let event = subscription.next_event().await.unwrap().unwrap();
    assert_eq!(event.stream, b"x");
    assert_eq!(event.data, b"mine");

    server.shutdown().await.unwrap();
}
