//! Test utilities & fixtures shared by the integration tests.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use worldcore::session::{SessionSettings, WorldContext};
use worldcore::world::WorldStoreBuilder;

/// A world in a throwaway directory, seeded with the default zone. Keep the `TempDir` alive for
/// as long as the store is used.
pub fn world() -> (Arc<WorldContext>, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = WorldStoreBuilder::new(dir.path()).open().expect("open store");
    let ctx = Arc::new(WorldContext::new(
        Arc::new(store),
        SessionSettings::default(),
    ));
    (ctx, dir)
}

/// Read from `reader` until the text received so far ends with `needle`.
#[allow(dead_code)] // Only the session tests talk to a live connection.
pub async fn read_until<R>(reader: &mut R, needle: &str) -> String
where
    R: AsyncRead + Unpin,
{
    let mut out = Vec::new();
    let mut buf = [0u8; 1024];
    tokio::time::timeout(Duration::from_secs(5), async {
        while !String::from_utf8_lossy(&out).ends_with(needle) {
            let n = reader.read(&mut buf).await.expect("read");
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
    })
    .await
    .unwrap_or_else(|_| {
        panic!(
            "timed out waiting for {:?}; got {:?}",
            needle,
            String::from_utf8_lossy(&out)
        )
    });
    String::from_utf8_lossy(&out).into_owned()
}
