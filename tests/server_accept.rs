//! The TCP front end: real sockets, several clients at once, clean shutdown.

mod common;

use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use worldcore::config::Config;
use worldcore::server::WorldServer;

fn test_config(dir: &tempfile::TempDir) -> Config {
    let mut config = Config::default();
    config.server.bind = "127.0.0.1:0".into();
    config.world.data_dir = dir.path().to_string_lossy().into_owned();
    config.logging.file = None;
    config
}

#[tokio::test]
async fn serves_clients_concurrently_until_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let server = Arc::new(WorldServer::new(test_config(&dir)).unwrap());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let running = {
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            server
                .serve_with_shutdown(listener, async {
                    let _ = stop_rx.await;
                })
                .await
        })
    };

    let mut first = TcpStream::connect(addr).await.unwrap();
    let mut second = TcpStream::connect(addr).await.unwrap();
    common::read_until(&mut first, "Name: ").await;
    common::read_until(&mut second, "Name: ").await;

    first.write_all(b"erin\r\n").await.unwrap();
    common::read_until(&mut first, "> ").await;
    second.write_all(b"frank\r\n").await.unwrap();
    let entered = common::read_until(&mut second, "> ").await;
    assert!(entered.contains("Also here: Erin"));

    // A client vanishing mid-game does not disturb the other.
    drop(first);
    second.write_all(b"look\r\n").await.unwrap();
    // Erin's departure may be reported first.
    let mut seen = String::new();
    while !seen.contains("The Crossroads") {
        seen.push_str(&common::read_until(&mut second, "> ").await);
    }

    stop_tx.send(()).unwrap();
    running.await.unwrap().unwrap();

    let stats = server.context().store.stats();
    assert_eq!(stats.characters, 2);
    assert_eq!(stats.rooms, 25);
}

#[test]
fn status_reports_world_counts() {
    let dir = tempfile::tempdir().unwrap();
    let server = WorldServer::new(test_config(&dir)).unwrap();
    server.show_status(true).unwrap();
    server.show_status(false).unwrap();
    assert_eq!(server.context().store.stats().zones, 1);
}
