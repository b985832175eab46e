use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::calendar::public::CreateEventRequest;
use crate::core::AppConfig;

pub mod auth;
pub mod calendar;
pub mod tools;

#[derive(Subcommand)]
enum Command {
    /// Sign in with Google and store a calendar credential
    Auth {},
    /// Create an event on the calendar
    CreateEvent {
        #[arg(long)]
        summary: String,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "")]
        location: String,
        /// Email of someone to invite, repeat for more than one
        #[arg(long = "attendee")]
        attendees: Vec<String>,
    },
    /// List events between two times
    ListEvents {
        #[arg(long)]
        time_min: String,
        #[arg(long)]
        time_max: String,
        #[arg(long, default_value = "10", allow_hyphen_values = true)]
        max_results: String,
    },
    /// Print the current date and time
    Now {},
    /// Print the calendar assistant and its tool schemas
    Tools {},
    /// Call a tool the same way the agent runtime does
    Call {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "{}")]
        args: String,
    },
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();
    let config = AppConfig::from_env()?;

    // Logs go to stderr, stdout is reserved for results
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("{}={}", env!("CARGO_CRATE_NAME"), config.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match args.command {
        Some(Command::Auth {}) => {
            auth::run(&config).await?;
        }
        Some(Command::CreateEvent {
            summary,
            start,
            end,
            description,
            location,
            attendees,
        }) => {
            let req = CreateEventRequest {
                summary,
                start_time: start,
                end_time: end,
                description,
                location,
                attendees,
            };
            calendar::create(&config, req).await?;
        }
        Some(Command::ListEvents {
            time_min,
            time_max,
            max_results,
        }) => {
            calendar::list(&config, time_min, time_max, &max_results).await?;
        }
        Some(Command::Now {}) => {
            calendar::now(&config)?;
        }
        Some(Command::Tools {}) => {
            tools::describe(&config)?;
        }
        Some(Command::Call { name, args }) => {
            tools::call(&config, &name, &args).await?;
        }
        None => {}
    }

    Ok(())
}
