use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use actor_persistence_pg::config::ProviderConfig;
use actor_persistence_pg::domain::user::{self, UserCreated, UserRenamed, UserState};
use actor_persistence_pg::event_sourcing::{
    registry, JournalSchema, Payload, PersistenceProvider, PostgresProvider, TypeRegistry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,actor_persistence_pg=debug")),
        )
        .init();

    let config = ProviderConfig::from_env();

    // `ddl` prints the table definitions and exits without touching the database
    if std::env::args().nth(1).as_deref() == Some("ddl") {
        for statement in config.schema().create_tables() {
            println!("{statement};");
        }
        return Ok(());
    }

    tracing::info!("🚀 Starting persistence demo");

    // === 1. Register payload types before anything can decode ===
    registry::init_global(user::register_types(TypeRegistry::builder()).build())?;

    // === 2. Connect and make sure both tables exist ===
    let pool = config.connect().await?;
    for statement in config.schema().create_tables() {
        sqlx::query(&statement).execute(&pool).await?;
    }

    let provider = PostgresProvider::builder(pool).config(&config).build()?;
    let state = provider.get_state();
    state.restart().await;

    // === 3. Persist a short history ===
    let actor_name = format!("user-{}", uuid::Uuid::now_v7());
    let user_id = uuid::Uuid::new_v4().to_string();

    state
        .persist_event(
            &actor_name,
            1,
            &UserCreated {
                id: user_id.clone(),
                name: "alice".to_string(),
                email: Some("alice@example.com".to_string()),
            },
        )
        .await;
    state
        .persist_event(
            &actor_name,
            2,
            &UserRenamed {
                id: user_id.clone(),
                name: "bob".to_string(),
            },
        )
        .await;

    // Duplicate sequence number: rejected by the store, logged, not retried
    state
        .persist_event(
            &actor_name,
            2,
            &UserRenamed {
                id: user_id.clone(),
                name: "mallory".to_string(),
            },
        )
        .await;

    // === 4. Replay ===
    state
        .get_events(&actor_name, 1, 2, &mut |event: Box<dyn Payload>| {
            tracing::info!(payload_type = event.payload_type(), event = ?event, "📜 Replayed");
        })
        .await;

    // === 5. Snapshot and recover ===
    // Snapshot cadence is the host's call; the demo snapshots once at the end
    let recovered = UserState::recover(&*state, &actor_name).await;
    tracing::info!(
        version = recovered.version,
        snapshot_interval = state.get_snapshot_interval(),
        "Recovered user"
    );
    state.persist_snapshot(&actor_name, recovered.version, &recovered).await;

    match state.get_snapshot(&actor_name).await {
        Some(snapshot) => tracing::info!(
            actor_name = %actor_name,
            sequence_number = snapshot.sequence_number,
            snapshot = ?snapshot.payload,
            "📸 Latest snapshot"
        ),
        None => tracing::warn!(actor_name = %actor_name, "No snapshot found"),
    }

    tracing::info!(
        journal = provider.schema().journal_table_name(),
        rows_written = provider.metrics().persist_total.with_label_values(&["journal"]).get(),
        "🎉 Demo complete"
    );

    Ok(())
}
