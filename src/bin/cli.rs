//! hashsync CLI Client
//!
//! Command-line interface for a running hashsync server.

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use hashsync::{
    BoundedOutcome, ClampStrategy, Config, HashSynchronizer, RemoteGateway, Result, Schema,
    StoreGateway,
};
use tracing_subscriber::{fmt, EnvFilter};

/// hashsync CLI
#[derive(Parser, Debug)]
#[command(name = "hashsync-cli")]
#[command(about = "CLI for the hashsync store")]
#[command(version)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:6380")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ping the server
    Ping,

    /// Get a string value
    Get { key: String },

    /// Set a string value
    Set { key: String, value: String },

    /// Delete keys
    Del {
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Check whether a key exists
    Exists { key: String },

    /// Expire a key after a number of seconds
    Expire { key: String, seconds: u64 },

    /// Remaining time to live of a key
    Ttl { key: String },

    /// Get one hash field
    Hget { key: String, field: String },

    /// Set one hash field
    Hset {
        key: String,
        field: String,
        value: String,
    },

    /// Print every field of a hash
    Hgetall { key: String },

    /// Delete hash fields
    Hdel {
        key: String,
        #[arg(required = true)]
        fields: Vec<String>,
    },

    /// Push a JSON object into a hash
    Sync {
        key: String,

        /// Flat JSON object, e.g. '{"name":"ann","energy":5}'
        json: String,

        /// Set fields one by one instead of overwriting the hash
        #[arg(long)]
        merge: bool,
    },

    /// Bounded increment of a hash field
    Incr {
        key: String,
        field: String,

        /// Step size
        #[arg(long, default_value = "1")]
        by: i64,

        /// Upper bound
        #[arg(long)]
        max: i64,

        /// Use the server's atomic bounded increment
        #[arg(long)]
        atomic: bool,
    },

    /// Bounded decrement of a hash field
    Decr {
        key: String,
        field: String,

        /// Step size
        #[arg(long, default_value = "1")]
        by: i64,

        /// Lower bound
        #[arg(long)]
        min: i64,

        /// Use the server's atomic bounded decrement
        #[arg(long)]
        atomic: bool,
    },
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let config = Config::builder().store_addr(&args.server).pool_size(1).build();
    let gateway = Arc::new(RemoteGateway::new(config)?);

    match args.command {
        Commands::Ping => {
            gateway.ping()?;
            println!("PONG");
        }
        Commands::Get { key } => print_optional(gateway.get(&key)?),
        Commands::Set { key, value } => {
            gateway.set(&key, &value)?;
            println!("OK");
        }
        Commands::Del { keys } => {
            let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
            println!("{}", gateway.delete(&keys)?);
        }
        Commands::Exists { key } => println!("{}", gateway.exists(&key)?),
        Commands::Expire { key, seconds } => println!("{}", gateway.expire(&key, seconds)?),
        Commands::Ttl { key } => match gateway.ttl(&key)? {
            Some(seconds) => println!("{}", seconds),
            None => println!("-1"),
        },
        Commands::Hget { key, field } => print_optional(gateway.hash_get_field(&key, &field)?),
        Commands::Hset { key, field, value } => {
            let created = gateway.hash_set_field(&key, &field, &value)?;
            println!("{}", if created { "created" } else { "updated" });
        }
        Commands::Hgetall { key } => {
            for (field, value) in gateway.hash_get_all(&key)? {
                println!("{}={}", field, value);
            }
        }
        Commands::Hdel { key, fields } => {
            let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
            println!("{}", gateway.hash_delete_fields(&key, &fields)?);
        }
        Commands::Sync { key, json, merge } => {
            let record: serde_json::Value = serde_json::from_str(&json)
                .map_err(|e| hashsync::SyncError::Mapping(format!("invalid JSON: {}", e)))?;
            let synchronizer = HashSynchronizer::new(gateway);
            let fields = if merge {
                synchronizer.incremental_sync(&record, &key)?
            } else {
                synchronizer.full_sync(&record, &key)?
            };
            println!("synced {} fields", fields.len());
        }
        Commands::Incr {
            key,
            field,
            by,
            max,
            atomic,
        } => {
            let synchronizer = HashSynchronizer::with_strategy(gateway, strategy(atomic));
            let schema = Schema::new("cli", [field.as_str()]);
            print_outcome(synchronizer.increment_in(&schema, &key, &field, by, max)?);
        }
        Commands::Decr {
            key,
            field,
            by,
            min,
            atomic,
        } => {
            let synchronizer = HashSynchronizer::with_strategy(gateway, strategy(atomic));
            let schema = Schema::new("cli", [field.as_str()]);
            print_outcome(synchronizer.decrement_in(&schema, &key, &field, by, min)?);
        }
    }
    Ok(())
}

fn strategy(atomic: bool) -> ClampStrategy {
    if atomic {
        ClampStrategy::Atomic
    } else {
        ClampStrategy::Corrective
    }
}

fn print_optional(value: Option<String>) {
    match value {
        Some(value) => println!("{}", value),
        None => println!("(nil)"),
    }
}

fn print_outcome(outcome: BoundedOutcome) {
    match outcome {
        BoundedOutcome::Applied(value) => println!("{}", value),
        BoundedOutcome::Clamped(value) => println!("{} (clamped)", value),
        BoundedOutcome::Refused => println!("refused"),
    }
}
