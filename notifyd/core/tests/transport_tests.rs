//! Socket round trips between `ServiceClient` and `ServiceListener`

use std::time::Duration;

use notifyd_core::transport::frame::encode;
use notifyd_core::{
    handle_call, FontDescriptor, HeadlessPlatform, MonospaceText, NotificationManager,
    NotifyRequest, NotifydConfig, ServiceCall, ServiceClient, ServiceListener, ServiceReply,
    TransportError,
};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::sync::mpsc;

async fn bound_listener(dir: &TempDir) -> ServiceListener {
    let mut listener = ServiceListener::new(dir.path().join("notifyd.sock"));
    listener.listen().await.unwrap();
    listener
}

#[tokio::test]
async fn test_call_reaches_loop_and_reply_returns() {
    let dir = TempDir::new().unwrap();
    let listener = bound_listener(&dir).await;
    let (tx, mut rx) = mpsc::channel(8);

    let mut manager = NotificationManager::create(
        NotifydConfig::default(),
        HeadlessPlatform::new(),
        MonospaceText::without_system_fonts(FontDescriptor::default()),
    );

    let server = async {
        let (_conn, _task) = listener.accept(tx).await.unwrap();
        for _ in 0..2 {
            let incoming = rx.recv().await.unwrap();
            incoming.respond_with(|call| handle_call(&mut manager, call));
        }
    };

    let client = async {
        let mut client = ServiceClient::connect(listener.socket_path()).await.unwrap();
        let notified = client
            .call(&ServiceCall::Notify(NotifyRequest {
                body: Some("Finished".to_string()),
                app_name: "ci".to_string(),
                ..NotifyRequest::new("Build")
            }))
            .await
            .unwrap();
        let info = client.call(&ServiceCall::GetServerInformation).await.unwrap();
        (notified, info)
    };

    let ((), (notified, info)) = tokio::join!(server, client);

    assert_eq!(notified, ServiceReply::Notified { id: 1 });
    assert_eq!(info, ServiceReply::server_information());
    assert_eq!(manager.store().len(), 1);
}

#[tokio::test]
async fn test_dropped_call_gets_internal_error() {
    let dir = TempDir::new().unwrap();
    let listener = bound_listener(&dir).await;
    let (tx, mut rx) = mpsc::channel(8);

    let server = async {
        let (_conn, _task) = listener.accept(tx).await.unwrap();
        let incoming = rx.recv().await.unwrap();
        drop(incoming);
    };

    let client = async {
        let mut client = ServiceClient::connect(listener.socket_path()).await.unwrap();
        client.call(&ServiceCall::GetCapabilities).await.unwrap()
    };

    let ((), reply) = tokio::join!(server, client);
    assert!(matches!(reply, ServiceReply::Error { .. }));
}

#[tokio::test]
async fn test_corrupt_frame_is_answered_then_closed() {
    let dir = TempDir::new().unwrap();
    let listener = bound_listener(&dir).await;
    let (tx, _rx) = mpsc::channel(8);

    let server = async {
        let (_conn, task) = listener.accept(tx).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    };

    let client = async {
        let mut stream = UnixStream::connect(listener.socket_path()).await.unwrap();
        let mut frame = encode(&ServiceCall::Introspect).unwrap();
        let last = frame.len() - 1;
        frame[last] ^= 0xff;
        stream.write_all(&frame).await.unwrap();

        let mut received = Vec::new();
        stream.read_to_end(&mut received).await.unwrap();
        received
    };

    let ((), received) = tokio::join!(server, client);
    assert!(!received.is_empty());

    let mut decoder = notifyd_core::transport::frame::FrameDecoder::new();
    decoder.push(&received);
    let reply: ServiceReply = decoder.decode().unwrap().unwrap();
    assert!(matches!(reply, ServiceReply::Error { .. }));
}

#[tokio::test]
async fn test_connect_without_daemon_fails() {
    let dir = TempDir::new().unwrap();
    let result = ServiceClient::connect(&dir.path().join("missing.sock")).await;
    assert!(matches!(result, Err(TransportError::Io(_))));
}
