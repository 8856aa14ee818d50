use std::time::Duration;

use clap::{Parser, Subcommand};
use nibus_rs::{
    connect, init_logger, log_info, Address, MibDescription, NibusError, NibusEvent, NmsReply,
};

#[derive(Parser)]
#[command(name = "nibus-cli")]
#[command(about = "CLI tool for the NIBUS field-bus protocol")]
struct Cli {
    /// Serial port device path
    #[arg(short, long, default_value = "/dev/ttyUSB0")]
    port: String,

    #[arg(short, long, default_value = "115200")]
    baudrate: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Measure round-trip time to a device
    Ping {
        address: Address,
    },
    /// Read the device version register
    Version {
        address: Address,
    },
    /// Read one or more property values
    Read {
        address: Address,
        ids: Vec<u16>,
    },
    /// Discover devices of a given type via SARP broadcast
    Find {
        /// Defaults to the Minihost display controller type
        #[arg(value_parser = parse_device_type, default_value = "0xABC6")]
        device_type: u16,
        /// How long to collect responses, in milliseconds
        #[arg(short, long, default_value = "3000")]
        wait: u64,
    },
}

fn parse_device_type(s: &str) -> Result<u16, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x") {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|_| format!("invalid device type: {s}"))
}

#[tokio::main]
async fn main() -> Result<(), NibusError> {
    init_logger();

    let cli = Cli::parse();
    let description = MibDescription {
        baud_rate: cli.baudrate,
        ..Default::default()
    };
    let connection = connect(&cli.port, description)?;

    match cli.command {
        Commands::Ping { address } => match connection.ping(address.clone()).await {
            Some(rtt) => log_info(&format!("{address}: {} ms", rtt.as_millis())),
            None => log_info(&format!("{address}: no reply")),
        },
        Commands::Version { address } => match connection.get_version(address.clone()).await {
            Some(version) => log_info(&format!(
                "{address}: device type {:04x}, firmware {}",
                version.device_type, version.version
            )),
            None => log_info(&format!("{address}: no reply")),
        },
        Commands::Read { address, ids } => {
            let req = nibus_rs::create_nms_read(address, &ids)?;
            match connection.send_datagram(req).await? {
                NmsReply::One(reply) => log_info(&format!("{}: {:?}", reply.id, reply.value())),
                NmsReply::Many(replies) => {
                    for reply in replies {
                        log_info(&format!("{}: {:?}", reply.id, reply.value()));
                    }
                }
                NmsReply::None => {}
            }
        }
        Commands::Find { device_type, wait } => {
            let mut events = connection.subscribe();
            connection.find_by_type(device_type).await?;
            let deadline = tokio::time::sleep(Duration::from_millis(wait));
            tokio::pin!(deadline);
            loop {
                tokio::select! {
                    _ = &mut deadline => break,
                    event = events.recv() => match event {
                        Ok(NibusEvent::Sarp(sarp)) if sarp.is_response => {
                            log_info(&format!(
                                "found {} (type {:04x})",
                                hex::encode(sarp.mac),
                                sarp.device_type().unwrap_or_default()
                            ));
                        }
                        Ok(NibusEvent::Close) | Err(_) => break,
                        Ok(_) => {}
                    },
                }
            }
        }
    }

    connection.close();
    Ok(())
}
