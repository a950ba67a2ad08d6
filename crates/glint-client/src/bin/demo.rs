//! Drives the client core against the in-memory store and prints every
//! view event. Useful for watching the event flow without a UI attached.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use serde_json::json;

use glint_client::{GlintClient, SessionContext, ViewEvent};
use glint_media::UploadPayload;
use glint_remote::{MemoryStore, RemoteStore};
use glint_shared::document::Post;
use glint_shared::{CollectionPath, Fields};

fn fields(value: serde_json::Value) -> Fields {
    match value {
        serde_json::Value::Object(map) => map,
        _ => unreachable!(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    glint_client::init_tracing();

    let store = Arc::new(MemoryStore::new());
    for (name, display) in [("ada", "Ada L."), ("adele", "Adele G."), ("bob", "Bob M.")] {
        store
            .seed(
                CollectionPath::Users,
                fields(json!({ "username": name, "displayName": display })),
                Utc::now(),
            )
            .await;
    }
    store
        .seed(
            CollectionPath::Posts,
            fields(json!({
                "caption": "sunrise over the bay",
                "username": "bob",
                "imageUrl": "blob://seeded",
            })),
            Utc::now(),
        )
        .await;

    let remote = Arc::clone(&store) as Arc<dyn RemoteStore>;
    let (client, mut events) = GlintClient::new(remote, SessionContext::new("u1", "ada", "Ada L."));

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                ViewEvent::FeedUpdated(snapshot) => {
                    println!("feed: {} post(s)", snapshot.len());
                    for doc in snapshot.iter() {
                        match doc.decode::<Post>() {
                            Ok(post) => println!("  [{}] {}", post.username, post.caption),
                            Err(error) => println!("  undecodable post {}: {error}", doc.id),
                        }
                    }
                }
                ViewEvent::SearchResults { users, .. } => {
                    let names: Vec<&str> =
                        users.iter().filter_map(|u| u.str_field("username")).collect();
                    println!("search: {names:?}");
                }
                other => println!("event: {other:?}"),
            }
        }
    });

    client.open_feed().await?;

    let payload = UploadPayload::new(
        "sunset.png",
        "image/png",
        Bytes::from(vec![0u8; 512 * 1024]),
    );
    let task = client.upload_photo(payload, "sunset from the roof")?;
    let terminal = task.wait_terminal().await;
    println!("upload finished: {:?}", terminal.state);

    client.search("ad");
    tokio::time::sleep(std::time::Duration::from_millis(500)).await;

    client.shutdown().await;
    drop(client);
    printer.abort();
    Ok(())
}
