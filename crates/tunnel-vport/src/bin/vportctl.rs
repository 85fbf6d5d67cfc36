//! Tunnel vport control tool
//!
//! ```bash
//! # Create the shared vxlan link for UDP port 4789
//! vportctl create vxlan
//!
//! # Create a geneve link on a non-default port
//! vportctl create geneve --dst-port 6082
//!
//! # Remove a link
//! vportctl destroy vxlan_sys_4789 vxlan
//!
//! # Report which tunnel modules the kernel uses
//! vportctl probe
//! ```

use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tunnel_vport::{NetlinkLinkTransport, Vport, VportManager, VportResult, VportType};

#[derive(Parser, Debug)]
#[command(name = "vportctl")]
#[command(about = "Provision kernel tunnel links for switch ports", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create (or verify) the link backing a tunnel port
    Create {
        /// Port type: vxlan, gre or geneve
        vport_type: VportType,

        /// Switch port name
        #[arg(long, default_value = "tunnel")]
        name: String,

        /// UDP destination port (defaults per type)
        #[arg(long)]
        dst_port: Option<u16>,

        /// Enable the vxlan group based policy extension
        #[arg(long)]
        gbp: bool,
    },
    /// Remove a tunnel link
    Destroy {
        /// Link name, e.g. vxlan_sys_4789
        link: String,

        /// Port type the link was created for
        vport_type: VportType,
    },
    /// Detect out-of-tree tunnel modules
    Probe,
}

fn run(command: Command) -> VportResult<()> {
    let manager = VportManager::new(Arc::new(NetlinkLinkTransport::new()?));

    match command {
        Command::Create {
            vport_type,
            name,
            dst_port,
            gbp,
        } => {
            let mut vport = Vport::new(name, vport_type).with_gbp(gbp);
            if let Some(port) = dst_port {
                vport = vport.with_dst_port(port);
            }
            manager.create(&vport)?;
            println!("{}", vport.dpif_port_name());
        }
        Command::Destroy { link, vport_type } => manager.destroy(&link, vport_type)?,
        Command::Probe => {
            let modules = if manager.probe_out_of_tree() { "out-of-tree" } else { "in-tree" };
            println!("{}", modules);
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    info!(command = ?args.command, "Starting vportctl");

    match run(args.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(errno = e.errno(), "{}", e);
            ExitCode::FAILURE
        }
    }
}
