use std::{path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};
use defmt_or_log::info;
use zeropi::{
    script::{execute, load_script, run_script},
    util::serial::SerialPorts,
    Command, Config, Error, Reading,
};
use zeropi_core::config::{DEFAULT_BAUD_RATE, DEFAULT_PATH};

#[derive(Parser, Debug)]
#[command(version, about = "Drive a ZeroPi board over its serial command protocol")]
struct Args {
    /// Serial device the board is connected to, or `simulated` for an in-process fake board
    #[arg(long, default_value = DEFAULT_PATH)]
    port: String,

    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    baud_rate: u32,

    /// Log every line sent and received
    #[arg(long)]
    debug: bool,

    /// Split incoming data on newlines instead of treating each chunk as one reply
    #[arg(long)]
    reassemble_lines: bool,

    /// Print the serial ports found on this machine and exit
    #[arg(long)]
    list_ports: bool,

    #[command(subcommand)]
    action: Option<Action>,
}

#[derive(Subcommand, Debug)]
enum Action {
    #[command(flatten)]
    Board(Command),
    /// Send arbitrary command text, e.g. `zeropi raw "M11 D10 L1"`
    Raw { text: String },
    /// Run a JSON array of commands in order
    Script { file: PathBuf },
}

impl Args {
    fn config(&self) -> Config {
        Config {
            path: self.port.clone(),
            baud_rate: self.baud_rate,
            debug: self.debug,
            reassemble_lines: self.reassemble_lines,
        }
    }
}

fn init_logger(debug: bool) {
    let level = if debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn print_reading(reading: &Reading) -> Result<(), Error> {
    println!("{}", serde_json::to_string(reading)?);
    Ok(())
}

async fn run(args: Args) -> Result<(), Error> {
    if args.list_ports {
        for port in SerialPorts::available()? {
            println!("{port}");
        }
        return Ok(());
    }

    let config = args.config();
    let (zeropi, _join_handles) = SerialPorts::parse(&config.path).connect(&config)?;
    zeropi.opened().await?;

    match args.action {
        None => info!("No action given, nothing to send"),
        Some(Action::Board(command)) => {
            if let Some(reading) = execute(&zeropi, &command).await? {
                print_reading(&reading)?;
            }
        }
        Some(Action::Raw { text }) => zeropi.core().write(text)?,
        Some(Action::Script { file }) => {
            let commands = load_script(&file)?;
            for reading in run_script(&zeropi, &commands).await? {
                print_reading(&reading)?;
            }
        }
    }

    // writes are fire-and-forget, make sure they left before exiting
    zeropi.core().flush().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logger(args.debug);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError: {e}\x1b[0m");
            ExitCode::FAILURE
        }
    }
}
