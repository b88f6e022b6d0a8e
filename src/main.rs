// Server entry point
// Loads configuration, wires up a sample notes api, and serves it

use std::sync::Arc;

use docrest::api::Api;
use docrest::config::{Config, StorageBackend};
use docrest::errors::ApiError;
use docrest::fields::{ApiField, DocumentSchema};
use docrest::filters::Operator;
use docrest::logger;
use docrest::resource::{DocumentResource, FilterSpec, ResourceOptions};
use docrest::server;
use docrest::store::{DocumentStore, MemoryStore, SqliteStore};
use docrest::throttle::MemoryThrottle;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config".to_string());
    let cfg = Config::load_from(&config_path)?;

    // Build the Tokio runtime, honoring the workers setting
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();

    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }

    let runtime = runtime_builder.build()?;
    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: Config) -> Result<(), Box<dyn std::error::Error>> {
    logger::init(&cfg)?;

    let store: Arc<dyn DocumentStore> = match cfg.storage.backend {
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
        StorageBackend::Sqlite => {
            let path = cfg
                .storage
                .path
                .clone()
                .unwrap_or_else(|| "documents.db".to_string());
            Arc::new(SqliteStore::open(&path)?)
        }
    };

    let api = build_api(&cfg, store)?;
    server::serve(api, cfg).await
}

/// A small notes api: people write notes, notes carry tags.
fn build_api(cfg: &Config, store: Arc<dyn DocumentStore>) -> Result<Api, ApiError> {
    let defaults = ResourceOptions {
        limit: cfg.limits.default_limit,
        max_limit: cfg.limits.max_limit,
        ..ResourceOptions::default()
    };

    let person = DocumentSchema::new("person")
        .field(ApiField::string("name").required(true))
        .field(ApiField::string("email").unique(true));

    let note = DocumentSchema::new("note")
        .field(ApiField::string("title").required(true))
        .field(ApiField::string("body"))
        .field(ApiField::datetime("created_at"))
        .field(ApiField::integer("views").default_value(0.into()))
        .field(ApiField::to_one("author", "person"))
        .field(ApiField::to_many("tags", "tag"));

    let tag =
        DocumentSchema::new("tag").field(ApiField::string("label").required(true).unique(true));

    let mut person_resource = DocumentResource::build("person", person, store.clone())
        .options(defaults.clone())
        .filtering("name", FilterSpec::All)
        .filtering("email", FilterSpec::Operators(vec![Operator::Exact]))
        .ordering(&["name"]);

    let mut note_resource = DocumentResource::build("note", note, store.clone())
        .field(ApiField::to_one("author", "person").full(true))
        .field(ApiField::to_many("tags", "tag"))
        .options(defaults.clone())
        .filter_fields(&["title", "views", "author"])
        .ordering(&["title", "views", "created_at"]);

    let mut tag_resource = DocumentResource::build("tag", tag, store)
        .options(defaults)
        .filter_fields(&["label"])
        .ordering(&["label"]);

    if cfg.throttle.enabled {
        person_resource = person_resource.throttle(build_throttle(cfg));
        note_resource = note_resource.throttle(build_throttle(cfg));
        tag_resource = tag_resource.throttle(build_throttle(cfg));
    }

    let mut api = Api::new(&cfg.api.name, &cfg.api.version)
        .debug(cfg.api.debug)
        .max_body_size(cfg.limits.max_body_size);
    api.register(person_resource.finish()?);
    api.register(note_resource.finish()?);
    api.register(tag_resource.finish()?);

    Ok(api)
}

fn build_throttle(cfg: &Config) -> MemoryThrottle {
    MemoryThrottle::new(
        cfg.throttle.throttle_at,
        cfg.throttle.time_frame,
        cfg.throttle.expiration,
    )
}
