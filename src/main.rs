//! Receipt Calculator
//!
//! Command-line front end for chemical receipts: record them, inspect
//! their ratios and distribute a reactor load across one or many.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use rusqlite::Connection;
use tracing_subscriber::EnvFilter;

use receipt_calculator::calculator::{self, ReactorLoad};
use receipt_calculator::import;
use receipt_calculator::models::{Chemical, ChemicalFields, Receipt, ReceiptDraft, ReceiptField};
use receipt_calculator::{IdentityProvider, ReceiptStore, SqliteIdentityProvider, SqliteReceiptStore};

#[derive(Parser)]
#[command(name = "receipt-calculator")]
#[command(about = "Chemical receipt calculator with reactor distribution")]
struct Cli {
    /// Path to the SQLite database
    #[arg(short, long, env = "RECEIPTS_DB", default_value = "receipts.db")]
    database: PathBuf,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "RECEIPTS_LOG", default_value = "warn")]
    log_level: String,

    #[command(flatten)]
    credentials: Credentials,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Credentials {
    /// Account email
    #[arg(long, env = "RECEIPTS_EMAIL", global = true)]
    email: Option<String>,

    /// Account password
    #[arg(long, env = "RECEIPTS_PASSWORD", global = true, hide_env_values = true)]
    password: Option<String>,
}

impl Credentials {
    fn required(&self) -> Result<(&str, &str)> {
        match (self.email.as_deref(), self.password.as_deref()) {
            (Some(email), Some(password)) => Ok((email, password)),
            _ => bail!("--email and --password (or RECEIPTS_EMAIL / RECEIPTS_PASSWORD) are required"),
        }
    }
}

#[derive(Args)]
struct LoadArgs {
    /// Total reactor input
    #[arg(short, long, value_parser = parse_total)]
    total: f64,

    /// Scale applied to the total
    #[arg(short, long, default_value = "1", value_parser = parse_multiplier)]
    multiplier: f64,
}

impl From<LoadArgs> for ReactorLoad {
    fn from(args: LoadArgs) -> Self {
        ReactorLoad {
            total_input: args.total,
            multiplier: args.multiplier,
        }
    }
}

fn parse_total(s: &str) -> Result<f64, String> {
    match s.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
        _ => Err(format!("'{s}' is not a number >= 0")),
    }
}

fn parse_multiplier(s: &str) -> Result<f64, String> {
    match s.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => Ok(v),
        _ => Err(format!("'{s}' is not a number > 0")),
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize empty database with schema
    Init,

    /// Create an account with --email and --password
    SignUp {
        /// Display name
        #[arg(long)]
        name: Option<String>,
    },

    /// Show the signed-in account
    Whoami,

    /// Record a new receipt
    Add {
        name: String,

        #[arg(long, default_value = "")]
        dmp: String,

        #[arg(long, default_value = "")]
        h3po4: String,

        #[arg(long, default_value = "")]
        color: String,

        #[arg(long, default_value = "")]
        yellow: String,

        #[arg(long, default_value = "")]
        blue: String,

        #[arg(long, default_value = "")]
        litre: String,
    },

    /// Change one field of a receipt (name, litre, or a chemical)
    Set {
        id: String,
        field: ReceiptField,
        value: String,
    },

    /// Delete a receipt
    Remove { id: String },

    /// List all receipts
    List,

    /// Show a receipt with its chemical ratios
    Show { id: String },

    /// Distribute a reactor load across one receipt's chemicals
    Distribute {
        id: String,

        #[command(flatten)]
        load: LoadArgs,
    },

    /// Distribute the same load over several receipts and sum per chemical
    Combine {
        #[arg(required = true)]
        ids: Vec<String>,

        #[command(flatten)]
        load: LoadArgs,
    },

    /// Import receipts from a directory of JSON exports
    Import { dir: PathBuf },

    /// Replace all receipts with sample data
    LoadSample,

    /// Print the receipt list whenever it changes
    Watch {
        /// Polling interval in milliseconds
        #[arg(long, default_value = "1000")]
        interval_ms: u64,
    },
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn open(path: &Path) -> Result<Connection> {
    Connection::open(path).with_context(|| format!("opening database {}", path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let store = SqliteReceiptStore::new(open(&cli.database)?)?;
    let identity = SqliteIdentityProvider::new(open(&cli.database)?)?;

    match cli.command {
        Commands::Init => {
            println!("Database initialized at: {}", cli.database.display());
        }

        Commands::SignUp { name } => {
            let (email, password) = cli.credentials.required()?;
            let profile = identity.sign_up(email, password, name.as_deref())?;
            println!("Account created for {} ({})", profile.email, profile.uid);
        }

        command => {
            let (email, password) = cli.credentials.required()?;
            let session = identity.sign_in(email, password)?;
            let profile = identity.current_user(&session)?;
            identity.sign_out(session)?;

            if let Commands::Whoami = command {
                println!("Email:   {}", profile.email);
                println!("Name:    {}", profile.display_name.as_deref().unwrap_or("-"));
                println!("UID:     {}", profile.uid);
                println!("Created: {}", profile.created_at);
                return Ok(());
            }
            run(&store, command)?;
        }
    }

    Ok(())
}

fn run(store: &SqliteReceiptStore, command: Commands) -> Result<()> {
    match command {
        Commands::Add {
            name,
            dmp,
            h3po4,
            color,
            yellow,
            blue,
            litre,
        } => {
            let draft = ReceiptDraft {
                name,
                chemicals: ChemicalFields {
                    dmp,
                    h3po4,
                    color,
                    yellow,
                    blue,
                },
                litre,
            };
            let receipt = store.create(&draft)?;
            println!("Added {} ({:.3} kg): {}", receipt.name, receipt.kilos, receipt.id);
        }

        Commands::Set { id, field, value } => {
            let receipt = store.update_field(&id, field, &value)?;
            println!("Updated {} ({:.3} kg)", receipt.name, receipt.kilos);
        }

        Commands::Remove { id } => {
            store.delete(&id)?;
            println!("Removed {}", id);
        }

        Commands::List => print_receipts(&store.list()?),

        Commands::Show { id } => {
            let receipt = find(store, &id)?;
            print!("{}", calculator::summarize_receipt(&receipt, None));
        }

        Commands::Distribute { id, load } => {
            let receipt = find(store, &id)?;
            print!("{}", calculator::summarize_receipt(&receipt, Some(load.into())));
        }

        Commands::Combine { ids, load } => {
            let receipts = ids
                .iter()
                .map(|id| find(store, id))
                .collect::<Result<Vec<_>>>()?;
            print!("{}", calculator::summarize_selection(&receipts, load.into()));
        }

        Commands::Import { dir } => {
            let stats = import::import_directory(store, &dir)?;
            println!("{}", stats);
        }

        Commands::LoadSample => {
            load_sample_data(store)?;
            println!("Sample data loaded successfully!");
        }

        Commands::Watch { interval_ms } => {
            let _subscription = store.subscribe(Arc::new(|receipts: &[Receipt]| {
                print_receipts(receipts);
                println!();
            }))?;

            let interval = Duration::from_millis(interval_ms.max(50));
            loop {
                thread::sleep(interval);
                store.poll_external_changes()?;
            }
        }

        Commands::Init | Commands::SignUp { .. } | Commands::Whoami => {}
    }

    Ok(())
}

fn find(store: &SqliteReceiptStore, id: &str) -> Result<Receipt> {
    store
        .get(id)?
        .with_context(|| format!("Receipt '{}' not found", id))
}

fn print_receipts(receipts: &[Receipt]) {
    if receipts.is_empty() {
        println!("No receipts in database. Run 'add' or 'load-sample' first.");
        return;
    }

    println!("{:<36}  {:<24} {:>10} {:>8}", "ID", "Receipt", "Kilos", "Litre");
    println!("{}", "-".repeat(81));
    for r in receipts {
        println!("{:<36}  {:<24} {:>10.3} {:>8}", r.id, r.name, r.kilos, r.litre);
    }
}

/// Load a few sample receipts for trying the calculator out
fn load_sample_data(store: &SqliteReceiptStore) -> Result<()> {
    store.clear()?;

    let samples: [(&str, [&str; 5], &str); 4] = [
        ("Standard Green", ["10", "20", "0", "5", "15"], "40"),
        ("Deep Blue", ["12.5", "18", "2", "0", "30"], "55"),
        ("Sunflower", ["8", "16", "1.5", "25", "0"], "42"),
        ("Clear Base", ["40", "60", "", "", ""], "90"),
    ];

    for (name, values, litre) in samples {
        let mut chemicals = ChemicalFields::default();
        for (chemical, value) in Chemical::ALL.into_iter().zip(values) {
            chemicals.set(chemical, value);
        }
        store.create(&ReceiptDraft {
            name: name.to_string(),
            chemicals,
            litre: litre.to_string(),
        })?;
    }

    println!("Loaded {} sample receipts", samples.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_must_be_finite_and_not_negative() {
        for bad in ["-1", "NaN", "inf", "abc", ""] {
            assert!(parse_total(bad).is_err(), "accepted {bad:?}");
        }
        assert_eq!(parse_total("0"), Ok(0.0));
        assert_eq!(parse_total("300"), Ok(300.0));
        assert_eq!(parse_total(" 2.5 "), Ok(2.5));
    }

    #[test]
    fn multiplier_must_be_finite_and_positive() {
        for bad in ["0", "-0.5", "NaN", "inf", "x"] {
            assert!(parse_multiplier(bad).is_err(), "accepted {bad:?}");
        }
        assert_eq!(parse_multiplier("1"), Ok(1.0));
        assert_eq!(parse_multiplier("2.5"), Ok(2.5));
    }

    #[test]
    fn load_args_reject_out_of_range_values() {
        assert!(Cli::try_parse_from(["receipt-calculator", "distribute", "r1", "--total", "-5"]).is_err());
        assert!(
            Cli::try_parse_from(["receipt-calculator", "combine", "a", "b", "-t", "10", "-m", "0"])
                .is_err()
        );

        let cli =
            Cli::try_parse_from(["receipt-calculator", "distribute", "r1", "-t", "300", "-m", "2.5"])
                .unwrap();
        match cli.command {
            Commands::Distribute { id, load } => {
                assert_eq!(id, "r1");
                assert_eq!(ReactorLoad::from(load), ReactorLoad { total_input: 300.0, multiplier: 2.5 });
            }
            _ => panic!("expected distribute"),
        }
    }
}
