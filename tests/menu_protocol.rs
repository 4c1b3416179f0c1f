//! Menus driven over a real connection: prompts, paging and filtering as the client sees them.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use worldcore::session::{exec_menu, Menu, MenuError, SessionError, SessionIo, SharedWriter};

fn connect(window: (usize, usize)) -> (SessionIo, DuplexStream) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let (reader, writer) = tokio::io::split(server);
    (
        SessionIo::spawn(reader, SharedWriter::new(writer), window),
        client,
    )
}

async fn transcript(io: SessionIo, mut client: DuplexStream) -> String {
    io.close().await.unwrap();
    drop(io);
    let mut out = String::new();
    client.read_to_string(&mut out).await.unwrap();
    out
}

fn numbered<'a>(count: usize) -> impl FnMut(&mut Menu<'a>) -> Result<(), MenuError> + Send {
    move |menu| {
        for i in 0..count {
            menu.add_action_indexed(i, &format!("Room {}", i + 1), |_| Ok(()))?;
        }
        Ok(())
    }
}

#[tokio::test]
async fn pages_fit_half_the_window_and_clamp() {
    let (mut io, mut client) = connect((80, 10));
    client.write_all(b"<\n>>\n>\n<<\n\n").await.unwrap();

    let choice = exec_menu("Rooms", &mut io, numbered(12)).await.unwrap();
    assert_eq!(choice, None);

    let out = transcript(io, client).await;
    // Five rows per page: 12 options make three pages.
    assert_eq!(out.matches("Page 1 of 3 (<, >, <<, >>)\r\n> ").count(), 3);
    assert_eq!(out.matches("Page 3 of 3 (<, >, <<, >>)\r\n> ").count(), 2);
    assert!(!out.contains("Page 2 of 3"));
    assert_eq!(out.matches("-=-=- Rooms -=-=-\r\n").count(), 5);
}

#[tokio::test]
async fn filtered_menu_reports_no_matches() {
    let (mut io, mut client) = connect((80, 24));
    client.write_all(b"/attic\n/room 1\n/\n\n").await.unwrap();

    exec_menu("Rooms", &mut io, numbered(3)).await.unwrap();

    let out = transcript(io, client).await;
    assert!(out.contains("-=-=- Rooms -=-=- (/attic)\r\nNo items match your search\r\n> "));
    assert!(out.contains("-=-=- Rooms -=-=- (/room 1)\r\n  Room [1]\r\n> "));
    // The bare slash clears the filter and everything is listed again.
    assert_eq!(out.matches("  Room [3]\r\n").count(), 2);
}

#[tokio::test]
async fn duplicate_keys_abort_before_prompting() {
    let (mut io, client) = connect((80, 24));
    let result = exec_menu("Broken", &mut io, |menu| {
        menu.add_action("x", "First", |_| Ok(()))?;
        menu.add_action("X", "Second", |_| Ok(()))?;
        Ok(())
    })
    .await;

    match result {
        Err(SessionError::Menu(MenuError::DuplicateKey { key, text })) => {
            assert_eq!(key, "X");
            assert_eq!(text, "Second");
        }
        other => panic!("expected duplicate key error, got {:?}", other),
    }
    assert_eq!(transcript(io, client).await, "");
}

#[tokio::test]
async fn handlers_see_live_state_on_redisplay() {
    let (mut io, mut client) = connect((80, 24));
    client.write_all(b"t\nT\nnope\n\n").await.unwrap();

    let hits = AtomicUsize::new(0);
    exec_menu("Switch", &mut io, |menu| {
        let label = format!("Toggle ({})", hits.load(Ordering::SeqCst));
        menu.add_action("t", &label, |_| {
            hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })?;
        Ok(())
    })
    .await
    .unwrap();

    let out = transcript(io, client).await;
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    assert!(out.contains("[T]oggle (0)"));
    assert!(out.contains("[T]oggle (2)"));
    assert_eq!(out.matches("Invalid selection\r\n").count(), 1);
}
