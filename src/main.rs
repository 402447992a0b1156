use std::process::ExitCode;

use clap::{ArgAction, Parser};
use tracing::{error, Level};
use wol::MagicPacket;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// MAC address to wake. May be given more than once.
    #[arg(short, long, required = true)]
    mac: Vec<String>,

    /// Host or broadcast address the packet is sent to.
    #[arg(short, long, default_value = "255.255.255.255")]
    ip: String,

    /// UDP port, usually 7 or 9.
    #[arg(short, long, default_value_t = 9)]
    port: u16,

    /// More logging (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Only log warnings and errors.
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn log_level(&self) -> Level {
        match (self.quiet, self.verbose) {
            (true, _) => Level::WARN,
            (false, 0) => Level::INFO,
            (false, 1) => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}

fn wake(mac: &str, ip: &str, port: u16) -> Result<(), wol::Error> {
    MagicPacket::from_mac_str(mac)?.send(ip, port)
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level())
        .with_target(false)
        .init();

    let mut status = ExitCode::SUCCESS;
    for mac in &args.mac {
        if let Err(err) = wake(mac, &args.ip, args.port) {
            error!("unable to wake {mac}: {err}");
            status = ExitCode::FAILURE;
        }
    }

    status
}

#[test]
fn test_args_valid() {
    use clap::CommandFactory;
    Args::command().debug_assert();
}

#[test]
fn test_args_defaults() {
    let args = Args::try_parse_from(["wol", "-m", "11:22:33:44:55:66"]).unwrap();
    assert_eq!(args.mac, ["11:22:33:44:55:66"]);
    assert_eq!(args.ip, "255.255.255.255");
    assert_eq!(args.port, 9);
    assert_eq!(args.log_level(), Level::INFO);
}

#[test]
fn test_args_many_macs() {
    let args = Args::try_parse_from([
        "wol",
        "--mac",
        "11:22:33:44:55:66",
        "--mac",
        "aa-bb-cc-dd-ee-ff",
        "--ip",
        "192.168.1.255",
        "--port",
        "7",
        "-vv",
    ])
    .unwrap();
    assert_eq!(args.mac.len(), 2);
    assert_eq!(args.ip, "192.168.1.255");
    assert_eq!(args.port, 7);
    assert_eq!(args.log_level(), Level::TRACE);
}

#[test]
fn test_args_mac_required() {
    assert!(Args::try_parse_from(["wol"]).is_err());
}

#[test]
fn test_args_quiet_conflicts_with_verbose() {
    assert!(Args::try_parse_from(["wol", "-m", "11:22:33:44:55:66", "-q", "-v"]).is_err());
}
