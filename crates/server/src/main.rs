//! The `tollgate` binary: runs the sweep scheduler and gives operators a
//! CLI for managing subscriptions.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use tollgate_core::{config, Clock, Config, GrantDuration, SubscriberId, SubscriberStatus, SystemClock};
use tollgate_engine::{
    ExpirySweeper, Lifecycle, NotificationSweeper, SweepIntervals, SweepScheduler,
};
use tollgate_notify::{MessageCatalog, TelegramClient, TelegramGateway, TelegramNotifier};
use tollgate_store::{GrantRequest, Store};

#[derive(Parser)]
#[command(name = "tollgate", version, about = "Subscription gatekeeper for a Telegram channel")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the periodic sweeps until interrupted.
    Serve,
    /// Run both sweeps once and exit.
    Check,
    /// Grant (or fully replace) a subscription window.
    Grant {
        user_id: i64,
        #[arg(long, default_value_t = 0)]
        days: u32,
        #[arg(long, default_value_t = 0)]
        hours: u32,
        #[arg(long, default_value_t = 0)]
        minutes: u32,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        /// Operator id recorded in the audit trail.
        #[arg(long)]
        actor: Option<i64>,
    },
    /// Add time to an existing subscription.
    Extend {
        user_id: i64,
        #[arg(long, default_value_t = 0)]
        days: u32,
        #[arg(long, default_value_t = 0)]
        hours: u32,
        #[arg(long, default_value_t = 0)]
        minutes: u32,
        #[arg(long)]
        actor: Option<i64>,
    },
    /// Delete a subscriber and ban them from the channel.
    Remove { user_id: i64 },
    /// List subscribers, soonest-expiring first.
    List {
        /// Filter by status (active or expired).
        #[arg(long)]
        status: Option<String>,
    },
    /// Show one subscriber and their pending reminders.
    Status { user_id: i64 },
}

/// Everything the commands need, wired once at startup.
struct App {
    store: Arc<Store>,
    lifecycle: Lifecycle,
    scheduler: SweepScheduler,
    clock: Arc<dyn Clock>,
}

async fn build_app(config: &Config) -> anyhow::Result<App> {
    let tz = config.time.timezone()?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(tz));

    let db_url = config
        .database
        .url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required"))?;
    let store = Arc::new(Store::connect(db_url, clock.clone()).await?);

    let client = TelegramClient::new(config.bot.token.clone())?;
    let notifier = Arc::new(TelegramNotifier::new(client.clone()));
    let gateway = Arc::new(TelegramGateway::new(client, config.bot.channel_id.clone())?);

    let notifications = Arc::new(NotificationSweeper::new(
        store.clone(),
        notifier.clone(),
        MessageCatalog::new(),
        clock.clone(),
    ));
    let expiry = Arc::new(ExpirySweeper::new(
        store.clone(),
        gateway.clone(),
        notifier,
        MessageCatalog::new(),
        clock.clone(),
    ));
    let scheduler = SweepScheduler::new(
        notifications,
        expiry,
        SweepIntervals::from_config(&config.sweep),
    );

    Ok(App {
        lifecycle: Lifecycle::new(store.clone(), gateway),
        store,
        scheduler,
        clock,
    })
}

async fn serve(app: App) -> anyhow::Result<()> {
    let scheduler = Arc::new(app.scheduler);
    let runner = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.run().await })
    };

    tokio::signal::ctrl_c().await?;
    info!("Interrupt received, stopping sweeps...");
    scheduler.shutdown();
    runner.await?;
    Ok(())
}

fn print_subscriber(sub: &tollgate_core::Subscriber, clock: &Arc<dyn Clock>) {
    println!(
        "{:<12} {:<20} {:<8} until {}",
        sub.id,
        sub.display_name(),
        sub.status,
        clock.format_local(sub.valid_until)
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    config::load_dotenv();
    let config = Config::from_env();
    config.validate()?;
    config.log_summary();

    let app = build_app(&config).await?;

    match cli.command {
        Command::Serve => serve(app).await?,
        Command::Check => app.scheduler.force_check().await,
        Command::Grant {
            user_id,
            days,
            hours,
            minutes,
            username,
            first_name,
            last_name,
            actor,
        } => {
            let req = GrantRequest {
                id: SubscriberId(user_id),
                username,
                first_name,
                last_name,
                duration: GrantDuration::new(days, hours, minutes),
                actor: actor.map(SubscriberId),
            };
            if !app.lifecycle.grant(&req).await {
                anyhow::bail!("grant failed for subscriber {user_id}");
            }
            if let Some(sub) = app.store.get(req.id).await {
                println!(
                    "Granted {user_id} until {}",
                    app.clock.format_local(sub.valid_until)
                );
            }
        }
        Command::Extend {
            user_id,
            days,
            hours,
            minutes,
            actor,
        } => {
            let duration = GrantDuration::new(days, hours, minutes);
            let id = SubscriberId(user_id);
            if !app.lifecycle.extend(id, duration, actor.map(SubscriberId)).await {
                anyhow::bail!("extend failed: subscriber {user_id} not found");
            }
            if let Some(sub) = app.store.get(id).await {
                println!(
                    "Extended {user_id} until {}",
                    app.clock.format_local(sub.valid_until)
                );
            }
        }
        Command::Remove { user_id } => {
            if app.lifecycle.remove(SubscriberId(user_id)).await {
                println!("Removed {user_id}");
            } else {
                anyhow::bail!("remove failed: subscriber {user_id} not found");
            }
        }
        Command::List { status } => {
            let status = match status.as_deref() {
                Some(s) => match SubscriberStatus::parse(s) {
                    Some(status) => Some(status),
                    None => anyhow::bail!("unknown status '{s}' (expected active or expired)"),
                },
                None => None,
            };
            let subscribers = app.store.list(status).await;
            if subscribers.is_empty() {
                println!("No subscribers");
            }
            for sub in &subscribers {
                print_subscriber(sub, &app.clock);
            }
        }
        Command::Status { user_id } => {
            let id = SubscriberId(user_id);
            match app.store.get(id).await {
                Some(sub) => {
                    print_subscriber(&sub, &app.clock);
                    let reminders = app.store.reminders_for(id).await;
                    let pending = reminders.iter().filter(|r| !r.sent).count();
                    println!("{} reminder(s), {} pending", reminders.len(), pending);
                    for reminder in &reminders {
                        println!(
                            "  {:<12} due {}  {}",
                            reminder.kind,
                            app.clock.format_local(reminder.due_at),
                            if reminder.sent { "sent" } else { "pending" }
                        );
                    }
                }
                None => warn!(subscriber = %id, "Subscriber not found"),
            }
        }
    }

    Ok(())
}
