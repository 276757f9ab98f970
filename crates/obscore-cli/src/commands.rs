use std::path::PathBuf;

use anyhow::{Context, Result};
use obscore_sdk::types::{Continuation, Event, EventFilter, EventPayload, PlayerConfig, SessionPlayer};
use obscore_sdk::{Client, Config};

use crate::args::{Cli, Commands, OutputFormat};

pub async fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(cli.data_dir.as_deref())?;
    let client = Client::open(config).context("failed to open obscore workspace")?;

    match cli.command {
        Commands::Record {
            session,
            role,
            content,
        } => record(&client, &session, &role, &content, cli.format).await,
        Commands::Inspect {
            session,
            types,
            limit,
        } => inspect(&client, &session, types, limit, cli.format).await,
        Commands::Replay {
            session,
            speed,
            skip_timing,
        } => replay(&client, &session, speed, skip_timing, cli.format).await,
    }
}

fn resolve_config(data_dir: Option<&str>) -> Result<Config> {
    let Some(data_dir) = data_dir else {
        return Config::load(None).context("failed to load obscore.toml");
    };
    let root = PathBuf::from(data_dir);
    Ok(Config {
        event_store_root: root.join("events"),
        blob_store_root: root.join("blobs"),
        ..Config::default()
    })
}

async fn record(
    client: &Client,
    session: &str,
    role: &str,
    content: &str,
    format: OutputFormat,
) -> Result<()> {
    let event = Event::new(
        "message.created",
        EventPayload::MessageCreated(obscore_types::event::MessagePayload {
            role: role.to_string(),
            content: content.to_string(),
            ..Default::default()
        }),
    )
    .context("failed to construct event")?
    .with_session_id(session);

    let accepted = client.publish(event).await;
    client.event_store().sync().await?;

    if !accepted {
        anyhow::bail!("event was not accepted (bus closed or dispatch channel full)");
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({"status": "recorded"})),
        OutputFormat::Plain => println!("recorded message.created in session {session}"),
    }
    Ok(())
}

async fn inspect(
    client: &Client,
    session: &str,
    types: Vec<String>,
    limit: Option<usize>,
    format: OutputFormat,
) -> Result<()> {
    let mut filter = EventFilter::for_session(session);
    if !types.is_empty() {
        filter = filter.with_types(types);
    }
    if let Some(limit) = limit {
        filter = filter.with_limit(limit);
    }

    let events = client.query(&filter).await?;

    match format {
        OutputFormat::Json => {
            for event in &events {
                println!("{}", serde_json::to_string(event)?);
            }
        }
        OutputFormat::Plain => {
            for event in &events {
                println!(
                    "[{}] seq={} {} ({})",
                    event.event.timestamp, event.seq, event.event.event_type,
                    event.event.data_type.as_deref().unwrap_or("unknown"),
                );
            }
        }
    }
    Ok(())
}

async fn replay(
    client: &Client,
    session: &str,
    speed: f64,
    skip_timing: bool,
    format: OutputFormat,
) -> Result<()> {
    let events = client.session(session).events().await?;
    if events.is_empty() {
        anyhow::bail!("session {session} has no events");
    }

    let (done_tx, done_rx) = tokio::sync::oneshot::channel();
    let done_tx = std::sync::Mutex::new(Some(done_tx));

    let config = PlayerConfig::new(move |event: &Event, offset| {
        match format {
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"offset_ms": offset.num_milliseconds(), "type": event.event_type})
                );
            }
            OutputFormat::Plain => {
                println!("+{}ms {}", offset.num_milliseconds(), event.event_type);
            }
        }
        Continuation::Continue
    })
    .with_speed(speed)
    .with_skip_timing(skip_timing)
    .with_on_complete(move || {
        if let Some(tx) = done_tx.lock().expect("done_tx poisoned").take() {
            let _ = tx.send(());
        }
    });

    let player = SessionPlayer::new(events, config)?;
    player.play();
    let _ = done_rx.await;

    Ok(())
}
