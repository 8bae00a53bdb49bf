// src/cli/main.rs

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pos_license::certificate::CertificatePayload;
use pos_license::config::LicensingConfig;
use pos_license::errors::LicenseResult;
use pos_license::hardware::DeviceInfo;
use pos_license::logging;
use pos_license::manager::DefaultLicenseManager;
use pos_license::status::LicenseInfo;

/// License maintenance for the NetViper POS.
///
/// Runs the same license manager the app uses, against the same record, so
/// support staff can inspect and repair a till from a terminal.
#[derive(Parser, Debug)]
#[command(name = "pos_license", version)]
struct Args {
    /// Configuration file (defaults to ./license.toml plus environment)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the current license status
    Status {
        /// Bypass the cache and re-verify with the server
        #[arg(long)]
        refresh: bool,
    },
    /// Activate a license key on this machine
    Activate { key: String },
    /// Release this machine's activation
    Deactivate,
    /// Import an offline certificate file
    Import { file: PathBuf },
    /// Download and store an offline certificate for this machine
    FetchCert,
    /// List the machines the license is active on
    Activations,
    /// Print this machine's hardware fingerprint
    Fingerprint,
    /// Start the trial on a machine with no license
    StartTrial,
    /// Wipe the local license record and start a fresh trial
    ResetTrial,
}

fn print_info(info: &LicenseInfo) {
    println!("Status:          {}", info.status);
    println!("Plan:            {}", info.plan);
    if let Some(expiry) = info.expiry_date {
        println!("Expires:         {}", expiry.format("%Y-%m-%d %H:%M UTC"));
    }
    println!("Days remaining:  {}", info.days_remaining);
    if info.grace_remaining > 0 {
        println!("Grace remaining: {}", info.grace_remaining);
    }
    println!("{}", info.message);
}

fn print_certificate(payload: &CertificatePayload) {
    println!("Certificate for {}", payload.license_key);
    println!("Issued:      {}", payload.issued_at.to_rfc3339());
    println!("Valid until: {}", payload.valid_until.to_rfc3339());
    if let Some(name) = &payload.device_name {
        println!("Device:      {name}");
    }
}

#[tokio::main]
async fn main() -> LicenseResult<()> {
    let args = Args::parse();

    if let Command::Fingerprint = args.command {
        let device = DeviceInfo::collect();
        println!("Hostname: {}", device.hostname.as_deref().unwrap_or("-"));
        println!("Platform: {} ({})", device.platform, device.arch);
        println!("MAC:      {}", device.mac_address.as_deref().unwrap_or("-"));
        println!("CPU:      {}", device.cpu_model.as_deref().unwrap_or("-"));
        println!("Hash:     {}", device.fingerprint());
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => LicensingConfig::load_from(path)?,
        None => LicensingConfig::load()?,
    };
    logging::init(&config.logging)?;

    let manager = DefaultLicenseManager::from_config(&config)?;
    // one-shot process: no background timers
    manager.stop();

    match args.command {
        Command::Status { refresh } => print_info(&manager.get_license_info(refresh).await),
        Command::Activate { key } => print_info(&manager.activate(&key).await?),
        Command::Deactivate => print_info(&manager.deactivate().await?),
        Command::Import { file } => {
            print_certificate(&manager.import_certificate_file(&file).await?);
            print_info(&manager.get_license_info(true).await);
        }
        Command::FetchCert => print_certificate(&manager.generate_offline_certificate().await?),
        Command::Activations => {
            let activations = manager.list_activations().await?;
            if activations.is_empty() {
                println!("No activations.");
            }
            for a in activations {
                let marker = if a.device_hash == manager.device().device_hash {
                    "*"
                } else {
                    " "
                };
                println!(
                    "{marker} {}  {}  activated {}  last seen {}",
                    a.device_name.as_deref().unwrap_or("(unnamed)"),
                    a.device_hash,
                    a.activated_at.as_deref().unwrap_or("-"),
                    a.last_seen_at.as_deref().unwrap_or("-"),
                );
            }
        }
        Command::StartTrial => print_info(&manager.start_trial().await?),
        Command::ResetTrial => print_info(&manager.reset_to_trial().await?),
        Command::Fingerprint => {}
    }

    Ok(())
}
