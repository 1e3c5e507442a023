// server/src/bin/urbanherb_admin.rs

//! Maintenance commands meant to be run from cron: payment polling and
//! clean-up, reminders, checkout expiry, migrations and staff accounts.

use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use std::sync::Arc;

use urbanherb::models::MobilePayment;
use urbanherb_server::config::AppConfig;
use urbanherb_server::db;
use urbanherb_server::errors::{AppError, Result};
use urbanherb_server::state::AppState;
use urbanherb_server::telemetry::init_tracing;

#[derive(Parser, Debug)]
#[command(author, version, about = "UrbanHerb maintenance commands", long_about = None)]
struct Args {
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Poll providers for payments created in the last N minutes that are still open.
  CheckPaymentStatus {
    #[arg(long, default_value_t = 30)]
    minutes: i64,
    #[arg(long)]
    dry_run: bool,
  },
  /// Cancel open payments older than N hours.
  CancelStalePayments {
    #[arg(long, default_value_t = 24)]
    hours: i64,
    #[arg(long)]
    dry_run: bool,
  },
  /// Send a reminder SMS for payments pending longer than N hours.
  SendPaymentReminders {
    #[arg(long, default_value_t = 1)]
    hours: i64,
    #[arg(long)]
    dry_run: bool,
  },
  /// Expire open checkout sessions past their deadline.
  ExpireCheckoutSessions {
    #[arg(long)]
    dry_run: bool,
  },
  /// Apply pending database migrations.
  Migrate,
  /// Create a staff account.
  CreateStaff {
    #[arg(long)]
    email: String,
    #[arg(long)]
    password: String,
  },
}

fn report(action: &str, payments: &[MobilePayment], dry_run: bool) {
  for payment in payments {
    tracing::info!(
      payment_id = %payment.id,
      reference = %payment.provider_tx_ref,
      status = %payment.status,
      dry_run,
      "{}",
      action
    );
  }
  let prefix = if dry_run { "[dry run] " } else { "" };
  println!("{}{}: {} payment(s)", prefix, action, payments.len());
}

#[tokio::main]
async fn main() -> Result<()> {
  init_tracing();
  let args = Args::parse();
  let config = Arc::new(AppConfig::from_env()?);

  if let Command::Migrate = args.command {
    let url = config
      .database_url
      .as_deref()
      .ok_or_else(|| AppError::Config("DATABASE_URL is required to run migrations".to_string()))?;
    let pool = db::connect(url).await?;
    db::run_migrations(&pool).await?;
    println!("Migrations applied.");
    return Ok(());
  }

  if config.database_url.is_none() {
    tracing::warn!("DATABASE_URL is not set; the command runs against an empty in-memory store.");
  }
  let state = AppState::from_config(config).await?;
  let services = &state.services;
  let now = Utc::now();

  match args.command {
    Command::CheckPaymentStatus { minutes, dry_run } => {
      let payments = services.payments.poll_recent(now - Duration::minutes(minutes), dry_run).await?;
      report("Checked payment status", &payments, dry_run);
    }
    Command::CancelStalePayments { hours, dry_run } => {
      let payments = services.payments.cancel_stale(now - Duration::hours(hours), dry_run).await?;
      report("Cancelled stale payment", &payments, dry_run);
    }
    Command::SendPaymentReminders { hours, dry_run } => {
      let payments = services.payments.remind_pending(now - Duration::hours(hours), dry_run).await?;
      report("Sent payment reminder", &payments, dry_run);
    }
    Command::ExpireCheckoutSessions { dry_run } => {
      let expired = if dry_run {
        services
          .checkout
          .stale_sessions(now)
          .await?
          .into_iter()
          .map(|s| s.id)
          .collect()
      } else {
        services.checkout.expire_stale_sessions(now).await?
      };
      for id in &expired {
        tracing::info!(session_id = %id, dry_run, "Expired checkout session");
      }
      let prefix = if dry_run { "[dry run] " } else { "" };
      println!("{}Expired {} checkout session(s)", prefix, expired.len());
    }
    Command::CreateStaff { email, password } => {
      let user = services.accounts.create_staff(&email, &password).await?;
      println!("Created staff user {} ({})", user.email, user.id);
    }
    Command::Migrate => {}
  }
  Ok(())
}
