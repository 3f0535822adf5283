//! Blog API demo
//!
//! Serves the resources declared in `blog.yaml` from an in-memory store
//! seeded with a few records. Try:
//!
//! ```text
//! curl http://127.0.0.1:3000/api/
//! curl 'http://127.0.0.1:3000/api/Post/?filter=published%20==%20true&sort=title'
//! curl http://127.0.0.1:3000/api/Author/ursula/posts/
//! curl -i -H 'x-user-id: ursula' -d '{"title":"Draft"}' http://127.0.0.1:3000/api/Post/
//! ```

use chrono::NaiveDate;
use hyperrest::prelude::*;
use tracing_subscriber::EnvFilter;

const CONFIG: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/demos/blog_api/blog.yaml");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,hyperrest=debug,tower_http=debug")),
        )
        .init();

    let path = std::env::args().nth(1).unwrap_or_else(|| CONFIG.to_string());
    let config = ApiConfig::from_yaml_file(&path)?;

    let store = InMemoryRecordStore::new();
    seed(&store).await?;

    println!("🚀 Blog API from {}", path);
    for resource in &config.resources {
        println!("  📦 {}", resource.name);
    }
    println!("\n🌐 Server running on http://127.0.0.1:3000/api/");

    ServerBuilder::new()
        .with_store(store)
        .with_principal_resolver(HeaderPrincipalResolver)
        .with_config(config)?
        .serve("127.0.0.1:3000")
        .await
}

async fn seed(store: &InMemoryRecordStore) -> Result<()> {
    let ursula = Record::new("Author", RecordKey::Name("ursula".into()))
        .with_value("name", FieldValue::String("Ursula K. Le Guin".into()))
        .with_value(
            "joined",
            NaiveDate::from_ymd_opt(2024, 1, 5).map_or(FieldValue::Null, FieldValue::Date),
        );

    let posts = [
        ("On Anarres", true),
        ("The Ones Who Walk Away", true),
        ("Notes for a sequel", false),
    ];
    for (i, (title, published)) in posts.into_iter().enumerate() {
        let post = Record::new("Post", RecordKey::Id(i as i64 + 1))
            .with_value("title", FieldValue::String(title.into()))
            .with_value("published", FieldValue::Boolean(published))
            .with_value("author", FieldValue::Reference(ursula.key_ref()));
        store.put(post).await?;
    }

    store.put(ursula).await?;
    Ok(())
}
