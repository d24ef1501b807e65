// courtbook: book a squash court on CourtReserve from the command line or CI.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use courtbook::booking::{BookingRequest, ReservationType, TargetDate};
use courtbook::schedule::{find_best_court, time};
use courtbook::{Booker, BrowserManager, Config, Credentials, load_yaml_config, running_on_ci};

#[derive(Parser)]
#[command(name = "courtbook")]
#[command(version, about = "Book squash courts on CourtReserve", long_about = None)]
struct Cli {
    /// Config file (defaults to ./courtbook.yaml when present)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Show the browser window
    #[arg(long, global = true)]
    headed: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Default)]
struct TargetArgs {
    /// today, tomorrow, a number of days ahead, or YYYY-MM-DD
    #[arg(long, conflicts_with = "days_ahead")]
    date: Option<String>,

    /// Days ahead of today
    #[arg(short = 'd', long)]
    days_ahead: Option<u32>,

    /// Start time, e.g. "5:00 PM" or 17:00
    #[arg(short, long)]
    time: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Book the court with the longest free run at the given time
    Book {
        #[command(flatten)]
        target: TargetArgs,

        /// Preferred length in minutes (capped by what is free)
        #[arg(long)]
        duration: Option<u32>,

        /// Guest player for Singles
        #[arg(short, long, conflicts_with = "no_player")]
        player: Option<String>,

        /// Ignore any configured guest player
        #[arg(long)]
        no_player: bool,

        /// Reservation type; chosen from the peak windows when omitted
        #[arg(long = "type", value_enum)]
        reservation_type: Option<ReservationType>,

        /// Consider doubles and unlabelled courts too
        #[arg(long)]
        any_court: bool,

        /// Fill the form but do not submit it
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the schedule for a day
    Schedule {
        #[command(flatten)]
        target: TargetArgs,

        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "courtbook=info,chromiumoxide=warn",
        1 => "courtbook=debug,chromiumoxide=warn",
        _ => "courtbook=trace,chromiumoxide=info",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Day and start time from the flags, falling back to the config defaults
fn resolve_target(
    config: &Config,
    target: &TargetArgs,
    today: NaiveDate,
) -> Result<(NaiveDate, u32, NaiveTime)> {
    let target_date = match (&target.date, target.days_ahead) {
        (Some(text), _) => TargetDate::parse(text)?,
        (None, Some(days)) => TargetDate::DaysAhead(days),
        (None, None) => TargetDate::DaysAhead(config.booking.days_ahead),
    };
    let days_ahead = target_date.days_from(today)?;
    let date = target_date.resolve(today);

    let time_text = target.time.as_deref().unwrap_or(&config.booking.time);
    let start = time::parse_clock(time_text)
        .with_context(|| format!("Unrecognised time '{time_text}', expected e.g. \"5:00 PM\""))?;

    Ok((date, days_ahead, start))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<bool> {
    dotenv::dotenv().ok();

    let mut config = load_yaml_config(cli.config.as_deref())?;
    config.apply_env();
    if cli.headed {
        if running_on_ci() {
            warn!("Ignoring --headed on CI");
        } else {
            config.browser.headless = false;
        }
    }

    let credentials = Credentials::from_env()?;
    let today = chrono::Local::now().date_naive();
    let manager = Arc::new(BrowserManager::new(config.browser.clone()));

    let outcome = match cli.command {
        Commands::Book {
            target,
            duration,
            player,
            no_player,
            reservation_type,
            any_court,
            dry_run,
        } => {
            let (date, days_ahead, start) = resolve_target(&config, &target, today)?;
            let guest_player = if no_player {
                None
            } else {
                player.or_else(|| config.booking.guest_player.clone())
            };
            let request = BookingRequest {
                date,
                days_ahead,
                time: start,
                duration_minutes: duration.unwrap_or(config.booking.duration_minutes),
                guest_player,
                reservation_type: ReservationType::resolve(
                    reservation_type,
                    date,
                    start,
                    &config.booking.peak_windows,
                ),
                singles_only: config.booking.singles_only && !any_court,
                dry_run,
            }
            .validate()?;

            info!(
                "Booking {} on {} at {} for up to {} minutes",
                request.reservation_type,
                request.date.format("%A %Y-%m-%d"),
                request.time_display(),
                request.duration_minutes
            );

            let booker = Booker::new(config, credentials, manager.clone())?;
            run_book(&booker, &request).await
        }
        Commands::Schedule { target, format } => {
            let (date, days_ahead, start) = resolve_target(&config, &target, today)?;
            let request = BookingRequest {
                date,
                days_ahead,
                time: start,
                duration_minutes: config.booking.duration_minutes,
                guest_player: None,
                reservation_type: ReservationType::SoloPractice,
                singles_only: config.booking.singles_only,
                dry_run: true,
            };

            let booker = Booker::new(config, credentials, manager.clone())?;
            run_schedule(&booker, &request, format).await
        }
    };

    manager.shutdown().await;
    outcome
}

async fn run_book(booker: &Booker, request: &BookingRequest) -> Result<bool> {
    let report = booker.book(request).await?;
    println!("{}", report.summary());
    if !report.succeeded() {
        error!("Booking could not be verified");
    }
    Ok(report.succeeded())
}

async fn run_schedule(booker: &Booker, request: &BookingRequest, format: OutputFormat) -> Result<bool> {
    let schedule = booker.run_schedule(request).await?;
    let best = find_best_court(&schedule, request.time, request.singles_only);

    match format {
        OutputFormat::Table => {
            println!("{}", request.date.format("%A %Y-%m-%d"));
            print!("{}", schedule.render_table());
            match &best {
                Some(choice) => println!(
                    "Best at {}: {} ({} minutes free)",
                    request.time_display(),
                    choice.court_name,
                    choice.available_minutes
                ),
                None => println!("Nothing free at {}", request.time_display()),
            }
        }
        OutputFormat::Json => {
            let out = serde_json::json!({
                "date": request.date,
                "time": request.time_display(),
                "courts": schedule.courts,
                "best": best,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }

    Ok(true)
}
