//! Command line utility for interacting with KeepKey devices

use clap::Parser;
use log::{debug, info, LevelFilter};

use keepkey_host::{transport::Transport, DeviceHandle, KeepKeyProvider};

mod helpers;
use helpers::*;

/// KeepKey command line utility
#[derive(Clone, PartialEq, Debug, Parser)]
struct Options {
    /// Wait for a device to be connected instead of failing when none
    /// is present
    #[clap(long)]
    wait: bool,

    /// Subcommand to execute
    #[clap(subcommand)]
    cmd: Actions,

    /// Enable verbose logging
    #[clap(long, default_value = "info")]
    log_level: LevelFilter,
}

#[derive(Clone, PartialEq, Debug, Parser)]
#[non_exhaustive]
enum Actions {
    /// Fetch the device feature descriptor
    Info {
        /// Print the descriptor as JSON
        #[clap(long)]
        json: bool,
    },

    /// Display a message on the device and await the echo
    Ping {
        /// Message to display (long text is truncated by the device)
        message: String,

        /// Require the user to hold the device button
        #[clap(long)]
        button: bool,
    },

    /// Fetch the extended public key for a derivation path
    Xpub {
        /// BIP-32 derivation path, eg. 44'/0'/0'/0/0
        path: String,

        /// Answer a PIN matrix challenge interactively
        #[clap(long)]
        pin: bool,
    },

    /// Watch device connect / disconnect events
    Watch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Options::parse();

    // Setup logging
    simplelog::SimpleLogger::init(args.log_level, simplelog::Config::default()).unwrap();

    // Setup provider
    let p = KeepKeyProvider::hid()?;

    // Handle watch command (no session required)
    if args.cmd == Actions::Watch {
        return watch(p).await;
    }

    // Connect to device
    let d = match p.try_open()? {
        Some(d) => d,
        None if args.wait => {
            info!("No device found, waiting for connection...");

            match p.wait_for_connection().await? {
                Some(d) => d,
                None => return Err(anyhow::anyhow!("provider torn down while waiting")),
            }
        }
        None => return Err(anyhow::anyhow!("No KeepKey device found")),
    };

    // Execute command
    let r = execute(&d, args.cmd).await;

    d.close().await;

    r
}

/// Execute a command against the connected device
async fn execute<T: Transport + Send>(d: &DeviceHandle<T>, cmd: Actions) -> anyhow::Result<()> {
    debug!("Executing command: {:?}", cmd);

    match cmd {
        Actions::Info { json } => {
            let f = d.initialize().await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&f)?);
                return Ok(());
            }

            info!("Vendor:     {}", f.vendor);
            info!("Device id:  {}", f.device_id);
            info!("Label:      {}", f.label);
            info!("Version:    {}", f.version());

            if !f.coins.is_empty() {
                let coins: Vec<_> = f
                    .coins
                    .iter()
                    .map(|c| format!("{} ({})", c.name, c.shortcut))
                    .collect();
                info!("Coins:      {}", coins.join(", "));
            }

            if !f.policies.is_empty() {
                let policies: Vec<_> = f.policies.iter().map(|p| p.name.as_str()).collect();
                info!("Policies:   {}", policies.join(", "));
            }

            let mut protection = vec![];
            if f.pin_protection {
                protection.push("pin");
            }
            if f.passphrase_protection {
                protection.push("passphrase");
            }
            info!("Protection: {}", protection.join(", "));
        }
        Actions::Ping { message, button } => {
            if button {
                info!("Pinging device, hold the button to confirm...");
            }

            let r = d.ping(&message, button).await?;

            info!("Ping response: {}", r);
        }
        Actions::Xpub { path, pin } => {
            let path = parse_derivation_path(&path)?;

            let r = match pin {
                true => d.get_public_key_with_pin(&path, prompt_pin).await?,
                false => d.get_public_key(&path).await?,
            };

            info!("xpub: {}", r.xpub);
        }
        Actions::Watch => unreachable!("handled before session setup"),
    }

    Ok(())
}

/// Watch and report connection lifecycle events until ctrl-c
async fn watch(p: KeepKeyProvider<impl keepkey_host::Discover + Send + Sync + 'static>) -> anyhow::Result<()> {
    let mut events = p.subscribe();

    let monitor = {
        let p = p.clone();
        tokio::spawn(async move { p.run_monitor().await })
    };

    info!("Watching for device events, ctrl-c to exit");

    loop {
        tokio::select! {
            r = events.recv() => match r {
                Ok(ev) => info!("Device event: {}", ev),
                Err(_) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    p.shutdown();
    monitor.await.ok();

    Ok(())
}
