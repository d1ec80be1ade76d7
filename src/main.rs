//! Rebate CLI
//!
//! Loads a fixture set, adds any vouchers to the fixture basket, applies the active offers
//! and prints the receipt.
//!
//! Use `-f` to load a fixture set by name
//! Use `-d` to price the basket on a given date
//! Use `-v` (repeatable) to add voucher codes, and `-u` to sign in as a customer

use std::{
    io::{self, Write},
    path::PathBuf,
    time::Instant,
};

use anyhow::Result;
use clap::{Parser, ValueEnum};
use humanize_duration::{Truncate, prelude::DurationExt};
use jiff::{Zoned, civil::Date};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Registry,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use rebate::{
    fixtures::Fixture, offers::applicator::OfferApplicator, receipt::Receipt, vouchers::UserId,
};

/// Log output format
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogFormat {
    /// Human readable, single line
    #[default]
    Compact,

    /// Structured JSON
    Json,
}

/// Arguments for the rebate CLI
#[derive(Debug, Parser)]
#[command(name = "rebate", about = "Apply offers and vouchers to a basket", long_about = None)]
struct Args {
    /// Fixture set to use for the catalogue, offers, vouchers & basket
    #[arg(short, long, default_value = "oscar")]
    fixture: String,

    /// Directory containing the fixture sets
    #[arg(long, default_value = "./fixtures")]
    fixtures_dir: PathBuf,

    /// Date to price the basket on (e.g. 2026-10-18), today unless given
    #[arg(short, long)]
    date: Option<Date>,

    /// Voucher code to add to the basket
    #[arg(short = 'v', long = "voucher")]
    vouchers: Vec<String>,

    /// Signed in customer
    #[arg(short, long)]
    user: Option<u64>,

    /// Log level, used when `RUST_LOG` is not set
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,
}

/// Rebate CLI entry point
pub fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args)?;

    let date = args.date.unwrap_or_else(|| Zoned::now().date());
    let user = args.user.map(UserId);

    let mut fixture = Fixture::with_base_path(&args.fixtures_dir);
    fixture.load_set(&args.fixture)?;

    let mut basket = fixture.basket()?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();

    for code in &args.vouchers {
        if let Err(error) = fixture
            .vouchers_mut()
            .add_to_basket(&mut basket, code, user, date)
        {
            warn!(code = %code, %error, "voucher not added");
            writeln!(handle, "{error}")?;
        }
    }

    let start = Instant::now();

    let applied = OfferApplicator::new(fixture.offers(), date)
        .with_vouchers(fixture.vouchers(), user)
        .apply(&mut basket)?;

    let elapsed = start.elapsed();

    info!(fixture = %args.fixture, offers = applied.len(), "basket priced");

    Receipt::from_basket(&basket)?.write_to(
        &mut handle,
        fixture.catalogue(),
        Some(fixture.vouchers()),
    )?;

    writeln!(
        handle,
        "\nPriced on {date}: {} ({}s)",
        elapsed.human(Truncate::Nano),
        elapsed.as_secs_f32()
    )?;

    Ok(())
}

fn init_logging(args: &Args) -> Result<()> {
    match args.log_format {
        LogFormat::Compact => init_with_layer(
            args,
            tracing_subscriber::fmt::layer()
                .compact()
                .with_target(true)
                .with_writer(io::stderr),
        ),
        LogFormat::Json => init_with_layer(
            args,
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_target(true)
                .with_writer(io::stderr),
        ),
    }
}

fn init_with_layer<L>(args: &Args, fmt_layer: L) -> Result<()>
where
    L: Layer<Registry> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_err| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .try_init()?;

    Ok(())
}
