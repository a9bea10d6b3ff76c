use adb_host::{AdbClient, CancelToken, Intent, TrackerEvent};
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

#[derive(Parser)]
#[command(name = "adb-host")]
#[command(about = "ADB host protocol client")]
struct Cli {
    /// ADB server host address.
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// ADB server port.
    #[arg(short = 'P', long, default_value_t = 5037)]
    port: u16,

    /// Target device serial number.
    #[arg(short, long)]
    serial: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Get ADB server version.
    Version,

    /// List connected devices.
    Devices {
        /// Include path/product/model details.
        #[arg(short, long)]
        long: bool,
    },

    /// Follow device arrivals and departures.
    Track,

    /// Run a shell command on the device.
    Shell {
        /// Shell command to execute.
        #[arg(trailing_var_arg = true)]
        command: Vec<String>,
    },

    /// Push a local file to the device.
    Push {
        /// Local file path.
        local: PathBuf,
        /// Remote file path on device.
        remote: String,
    },

    /// Pull a file from the device.
    Pull {
        /// Remote file path on device.
        remote: String,
        /// Local file path.
        local: PathBuf,
    },

    /// Stat a remote file on the device.
    Stat {
        /// Remote path on device.
        path: String,
    },

    /// List a remote directory on the device.
    Ls {
        /// Remote directory path on device.
        path: String,
    },

    /// Stream a device log socket to stdout (raw bytes).
    Logcat,

    /// Dump the raw framebuffer to a file.
    Framebuffer {
        /// Output file for the raw pixel data.
        output: PathBuf,
    },

    /// Establish a port forward.
    Forward {
        /// Local endpoint, e.g. tcp:6100.
        local: String,
        /// Remote endpoint, e.g. tcp:7100.
        remote: String,
    },

    /// List active port forwards.
    Forwards,

    /// Start an activity by component name.
    Start {
        /// Component, e.g. com.example/.MainActivity.
        component: String,
        /// Intent action.
        #[arg(short, long)]
        action: Option<String>,
    },

    /// Wait until the device finishes booting.
    WaitBoot,

    /// Reboot the device.
    Reboot {
        /// Target mode (bootloader, recovery).
        mode: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let command = match cli.command {
        Some(cmd) => cmd,
        None => {
            Cli::command().print_help()?;
            println!();
            return Ok(());
        }
    };

    let client = AdbClient::with_address(&cli.host, cli.port);
    let serial = cli.serial.as_deref();

    match command {
        Commands::Version => {
            println!("ADB server version: {}", client.server_version().await?);
        }
        Commands::Devices { long } => {
            let devices = if long {
                client.devices_long().await?
            } else {
                client.devices().await?
            };
            if devices.is_empty() {
                println!("No devices connected.");
            } else {
                println!("{:<24} State", "Serial");
                for d in &devices {
                    println!("{:<24} {}", d.serial, d.state);
                }
            }
        }
        Commands::Track => {
            let mut tracker = client.track_devices().await?;
            while let Some(event) = tracker.next_event().await? {
                match event {
                    TrackerEvent::Add(d) => println!("+ {}\t{}", d.serial, d.state),
                    TrackerEvent::Remove(d) => println!("- {}", d.serial),
                    TrackerEvent::Change { device, previous } => {
                        println!("~ {}\t{} -> {}", device.serial, previous, device.state)
                    }
                    TrackerEvent::ChangeSet(_) => {}
                }
            }
        }
        Commands::Shell { command } => {
            if command.is_empty() {
                eprintln!("Error: no shell command specified");
                std::process::exit(1);
            }
            let args: Vec<&str> = command.iter().map(String::as_str).collect();
            let output = client.shell_args(serial, &args).await?;
            tokio::io::stdout().write_all(&output).await?;
        }
        Commands::Push { local, remote } => {
            let n = client.push(serial, &local, &remote).await?;
            println!("Pushed {} -> {} ({} bytes)", local.display(), remote, n);
        }
        Commands::Pull { remote, local } => {
            let n = client.pull(serial, &remote, &local).await?;
            println!("Pulled {} -> {} ({} bytes)", remote, local.display(), n);
        }
        Commands::Stat { path } => {
            let stat = client.stat(serial, &path).await?;
            if !stat.exists() {
                println!("{}: no such file or directory", path);
            } else {
                println!("Mode:     {:o}", stat.mode);
                println!("Size:     {} bytes", stat.size);
                println!("Modified: {} (unix timestamp)", stat.mtime);
                if stat.is_file() {
                    println!("Type:     regular file");
                } else if stat.is_directory() {
                    println!("Type:     directory");
                } else if stat.is_symlink() {
                    println!("Type:     symlink");
                }
            }
        }
        Commands::Ls { path } => {
            let entries = client.list_dir(serial, &path).await?;
            if entries.is_empty() {
                println!("(empty)");
            } else {
                for entry in &entries {
                    let type_char = if (entry.mode & 0o170000) == 0o040000 {
                        'd'
                    } else {
                        '-'
                    };
                    println!(
                        "{}{:o}  {:>8}  {}",
                        type_char,
                        entry.mode & 0o7777,
                        entry.size,
                        entry.name
                    );
                }
            }
        }
        Commands::Logcat => {
            let mut stream = client.open_log(serial, "main").await?;
            let mut stdout = tokio::io::stdout();
            tokio::io::copy(&mut stream, &mut stdout).await?;
        }
        Commands::Framebuffer { output } => {
            let mut fb = client.framebuffer(serial).await?;
            println!(
                "framebuffer v{}: {}x{} {} bpp, format {}",
                fb.meta.version, fb.meta.width, fb.meta.height, fb.meta.bpp, fb.meta.format
            );
            let mut file = tokio::fs::File::create(&output).await?;
            let n = fb.write_to(&mut file).await?;
            println!("Wrote {} bytes to {}", n, output.display());
        }
        Commands::Forward { local, remote } => {
            client.forward(&local, &remote).await?;
            println!("Forwarding {} -> {}", local, remote);
        }
        Commands::Forwards => {
            for f in client.list_forwards().await? {
                println!("{} {} {}", f.serial, f.local, f.remote);
            }
        }
        Commands::Start { component, action } => {
            let mut intent = Intent::new().component(component);
            if let Some(action) = action {
                intent = intent.action(action);
            }
            client.start_activity(serial, &intent).await?;
            println!("Started.");
        }
        Commands::WaitBoot => {
            let cancel = CancelToken::new();
            client.wait_boot_complete(serial, &cancel).await?;
            println!("Boot completed.");
        }
        Commands::Reboot { mode } => {
            client.reboot(serial, mode.as_deref()).await?;
            println!("Rebooting.");
        }
    }

    Ok(())
}
