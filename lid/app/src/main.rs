/*++

Licensed under the Apache-2.0 license.

File Name:

   main.rs

Abstract:

    Main entry point for the Marker LID policy tool

--*/

use clap::{Parser, Subcommand};
use log::LevelFilter;
use marker_lid_verify::{
    build_id, FlashStore, LidError, LidValidator, OsRelease, ResetFlagFile, SystemEnv,
};
use simple_logger::SimpleLogger;
use std::path::PathBuf;

mod config;
mod inventory;

use config::ToolConfig;
use inventory::TomlInventoryStore;

type Validator = LidValidator<SystemEnv<TomlInventoryStore>>;

/// Exit status of an update rejected by policy
const EXIT_POLICY_REJECTED: i32 = 3;

#[derive(Parser)]
#[command(version, about = "Marker LID firmware acceptance policy tool", long_about = None)]
struct Cli {
    /// Tool configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a Marker LID against the minimum ship level and update access key
    Validate {
        /// Marker LID file
        lid: PathBuf,
    },
    /// Record the running firmware version as the minimum ship level
    SetMinLevel,
    /// Request a minimum ship level reset on the next validation
    ResetMinLevel,
    /// Reconcile the minimum ship level between inventory and flash
    SyncMinLevel,
    /// Reconcile the update access key expiration date across its copies
    SyncAccessKey,
    /// Check a build date against the update access key expiration date
    CheckAccessKey {
        /// Build date in YYYYMMDD format
        #[arg(long, required_unless_present = "manifest", conflicts_with = "manifest")]
        date: Option<String>,

        /// Image manifest carrying a BuildId entry
        #[arg(long, value_name = "FILE")]
        manifest: Option<PathBuf>,
    },
}

fn validator(config: &ToolConfig) -> anyhow::Result<Validator> {
    let env = SystemEnv::new(
        TomlInventoryStore::new(&config.inventory_file),
        FlashStore::new(&config.persist_dir),
        OsRelease::new(&config.os_release),
        ResetFlagFile::new(&config.reset_file),
    );
    Ok(LidValidator::new(
        env,
        config.msl_policy()?,
        config.uak_policy(),
    ))
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = config::load_config(cli.config.as_deref())?;
    let validator = validator(&config)?;

    match &cli.cmd {
        Commands::Validate { lid } => {
            validator.validate(lid)?;
            log::info!("{} accepted", lid.display());
        }
        Commands::SetMinLevel => validator.minimum_ship_level().set()?,
        Commands::ResetMinLevel => validator.minimum_ship_level().reset()?,
        Commands::SyncMinLevel => validator.minimum_ship_level().sync(),
        Commands::SyncAccessKey => validator.update_access_key().sync(),
        Commands::CheckAccessKey { date, manifest } => {
            let date = match (date, manifest) {
                (Some(date), _) => date.clone(),
                (None, Some(manifest)) => build_id(manifest)?,
                (None, None) => anyhow::bail!("Either --date or --manifest is required"),
            };
            validator.update_access_key().check_validity(&date)?;
            log::info!("Build date {date} is covered by the update access key");
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let _ = SimpleLogger::new().with_level(level).init();

    run(&cli).unwrap_or_else(|e| {
        let status = exit_status(&e);
        std::process::exit(status);
    });
}

/// Log `err` and map it to the process exit status
fn exit_status(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<LidError>() {
        Some(lid_err) => {
            log::error!("Error {:#x}: {:#}", u32::from(lid_err.code()), err);
            if lid_err.is_policy_violation() {
                EXIT_POLICY_REJECTED
            } else {
                1
            }
        }
        None => {
            log::error!("Error: {:#}", err);
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_status() {
        let rejected = anyhow::Error::from(LidError::ExpiredAccessKey {
            expiration_date: "20230601".into(),
            build_date: "20230701".into(),
        });
        assert_eq!(exit_status(&rejected), EXIT_POLICY_REJECTED);

        let io = anyhow::Error::from(LidError::Io {
            path: "MANIFEST".into(),
            reason: "not found".into(),
        });
        assert_eq!(exit_status(&io), 1);

        assert_eq!(exit_status(&anyhow::anyhow!("bad config")), 1);
    }
}
