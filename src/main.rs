//! Serdebug - serial port debugging terminal
//!
//! Command-line host for the session engine: ticks the engine at a fixed
//! rate, sends stdin lines through it and prints received chunks.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serdebug_core::cli::{parse_line, CliResult, ExitCodes, InputLine, OperatorCommand, HELP};
use serdebug_core::config::{self, AppConfig};
use serdebug_core::core::transcript::default_transcript_filename;
use serdebug_core::{
    Clock, ConfigError, Encoding, FramingEngine, LineEnding, LoopbackTransport, SerialParity,
    SerialPortTransport, SessionEvent, TickClock, Transcript, Transport, WallClock,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Serdebug CLI
#[derive(Parser, Debug)]
#[command(
    name = "serdebug",
    version,
    about = "Serial port debugging terminal with ASCII/HEX views",
    long_about = None
)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file (defaults to the platform config dir)
    #[arg(long, global = true, env = "SERDEBUG_CONFIG")]
    config: Option<PathBuf>,

    /// Also write logs to a daily rolling file in the data dir
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available serial ports
    ListPorts {
        /// Show detailed info
        #[arg(short, long)]
        detailed: bool,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Open a port and start the interactive terminal
    Open(OpenArgs),

    /// Configuration file management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args, Debug)]
struct OpenArgs {
    /// Serial port name (e.g., COM3, /dev/ttyUSB0)
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate
    #[arg(short, long)]
    baud: Option<u32>,

    /// Data bits (5-8)
    #[arg(long)]
    data_bits: Option<u8>,

    /// Stop bits (1, 2)
    #[arg(long)]
    stop_bits: Option<u8>,

    /// Parity (none, odd, even)
    #[arg(long)]
    parity: Option<SerialParity>,

    /// Receive display encoding (ascii, hex)
    #[arg(long)]
    recv: Option<Encoding>,

    /// Send input encoding (ascii, hex)
    #[arg(long)]
    send: Option<Encoding>,

    /// Prefix received data with local time
    #[arg(long)]
    timestamp: bool,

    /// Append the line ending to sent data
    #[arg(long)]
    append_line_ending: bool,

    /// Line ending (cr, lf, crlf)
    #[arg(long)]
    line_ending: Option<LineEnding>,

    /// Idle time that completes a received burst
    #[arg(long)]
    idle_timeout_ms: Option<u64>,

    /// Host poll rate
    #[arg(long)]
    tick_rate: Option<u32>,

    /// Measure idle time in wall-clock milliseconds instead of poll ticks
    #[arg(long)]
    wall_clock: bool,

    /// Use an in-memory echo device instead of a serial port
    #[arg(long)]
    loopback: bool,

    /// Save the transcript to this file on exit
    #[arg(long)]
    save: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write a default configuration file if none exists
    Init,
    /// Print the configuration file path
    Path,
}

fn init_tracing(cli: &Cli) -> Option<WorkerGuard> {
    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let mut guard = None;
    let file_layer = if cli.log_file {
        config::log_dir().map(|dir| {
            let appender = tracing_appender::rolling::daily(dir, "serdebug.log");
            let (writer, worker) = tracing_appender::non_blocking(appender);
            guard = Some(worker);
            fmt::layer().with_ansi(false).with_writer(writer)
        })
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .init();

    guard
}

fn load_config(cli: &Cli) -> Result<AppConfig, CliResult> {
    let loaded = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    loaded.map_err(|e| CliResult::from(&e))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = init_tracing(&cli);

    if let Err(e) = config::init_directories() {
        tracing::warn!("Cannot create application directories: {}", e);
    }

    let result = match &cli.command {
        Commands::ListPorts { detailed, json } => match list_ports(&cli, *detailed, *json) {
            Ok(()) => CliResult::success(),
            Err(e) => CliResult::error(ExitCodes::ERROR, format!("{e:#}")),
        },
        Commands::Open(args) => match load_config(&cli) {
            Ok(app_config) => run_terminal(&cli, app_config, args).await,
            Err(result) => result,
        },
        Commands::Config { action } => handle_config(&cli, action),
    };

    if let Some(message) = result.message() {
        if result.is_success() {
            if !cli.quiet {
                eprintln!("{message}");
            }
        } else {
            eprintln!("error: {message}");
        }
    }
    result.to_exit_code()
}

fn list_ports(cli: &Cli, detailed: bool, json: bool) -> anyhow::Result<()> {
    let ports = serialport::available_ports().context("Cannot enumerate serial ports")?;

    if json {
        let entries: Vec<serde_json::Value> = ports
            .iter()
            .map(|p| {
                serde_json::json!({
                    "name": p.port_name,
                    "type": format!("{:?}", p.port_type)
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if ports.is_empty() {
        if !cli.quiet {
            println!("No serial ports found.");
        }
        return Ok(());
    }

    if detailed {
        println!("Available Serial Ports:");
        println!("{:-<60}", "");
        for port in &ports {
            println!("  {} [{:?}]", port.port_name, port.port_type);
        }
    } else {
        for port in &ports {
            println!("{}", port.port_name);
        }
    }
    Ok(())
}

fn handle_config(cli: &Cli, action: &ConfigAction) -> CliResult {
    let path = match cli.config.clone().or_else(config::config_path) {
        Some(path) => path,
        None => return CliResult::error(ExitCodes::CONFIG_ERROR, "Could not determine config directory"),
    };

    match action {
        ConfigAction::Path => {
            println!("{}", path.display());
            CliResult::success()
        }
        ConfigAction::Show => match AppConfig::load_from(&path) {
            Ok(app_config) => match toml::to_string_pretty(&app_config) {
                Ok(text) => {
                    print!("{text}");
                    CliResult::success()
                }
                Err(e) => CliResult::error(ExitCodes::CONFIG_ERROR, e.to_string()),
            },
            Err(e) => CliResult::from(&e),
        },
        ConfigAction::Init => {
            if path.exists() {
                return CliResult::Success(Some(format!("Config already exists at {}", path.display())));
            }
            match AppConfig::default().save_to(&path) {
                Ok(()) => CliResult::Success(Some(format!("Wrote {}", path.display()))),
                Err(e) => CliResult::from(&e),
            }
        }
    }
}

fn apply_overrides(app_config: &mut AppConfig, args: &OpenArgs) {
    let serial = &mut app_config.serial;
    if let Some(port) = &args.port {
        serial.port.clone_from(port);
    }
    if let Some(baud) = args.baud {
        serial.baud_rate = baud;
    }
    if let Some(bits) = args.data_bits {
        serial.data_bits = bits;
    }
    if let Some(bits) = args.stop_bits {
        serial.stop_bits = bits;
    }
    if let Some(parity) = args.parity {
        serial.parity = parity;
    }

    let terminal = &mut app_config.terminal;
    if let Some(encoding) = args.recv {
        terminal.recv_encoding = encoding;
    }
    if let Some(encoding) = args.send {
        terminal.send_encoding = encoding;
    }
    if let Some(line_ending) = args.line_ending {
        terminal.line_ending = line_ending;
    }
    if let Some(ms) = args.idle_timeout_ms {
        terminal.idle_timeout_ms = ms;
    }
    if let Some(rate) = args.tick_rate {
        terminal.tick_rate_hz = rate;
    }
    terminal.add_timestamp |= args.timestamp;
    terminal.append_line_ending |= args.append_line_ending;
    terminal.wall_clock |= args.wall_clock;
}

/// Interactive terminal state
struct Terminal {
    engine: FramingEngine,
    transcript: Transcript,
    /// Last typed send text; an empty line resends it
    pending: String,
    disconnected: Option<String>,
    quiet: bool,
}

impl Terminal {
    fn notice(&mut self, message: &str) {
        if !self.quiet {
            eprintln!("{message}");
        }
        self.transcript.note(message);
    }

    fn report_setting(&mut self, result: Result<(), ConfigError>, applied: &str) {
        match result {
            Ok(()) => self.notice(applied),
            Err(ConfigError::PortOpen) => {
                self.notice(&format!("{}, use :close first", ConfigError::PortOpen));
            }
            Err(e) => self.notice(&e.to_string()),
        }
    }

    fn record(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::Data(text) => print!("{text}"),
            SessionEvent::Disconnected { port } => {
                eprintln!("Port {port} disconnected or has issue, close it, please retry");
                self.disconnected = Some(port.clone());
            }
        }
        self.transcript.record(event);
    }

    /// Handle one stdin line; `Some` ends the session
    fn handle_line(&mut self, line: &str) -> Option<CliResult> {
        let input = match parse_line(line) {
            Ok(input) => input,
            Err(e) => {
                eprintln!("{e}");
                return None;
            }
        };

        match input {
            InputLine::Send(text) => {
                if !text.is_empty() {
                    self.pending = text;
                }
                let text = self.pending.clone();
                if let Err(e) = self.engine.send(&text) {
                    self.notice(&e.to_string());
                }
            }
            InputLine::Command(command) => return self.handle_command(command),
        }
        None
    }

    fn handle_command(&mut self, command: OperatorCommand) -> Option<CliResult> {
        match command {
            OperatorCommand::RecvEncoding(encoding) => {
                self.engine.set_recv_encoding(encoding);
                self.notice(&format!("receive encoding: {encoding}"));
            }
            OperatorCommand::SendEncoding(encoding) => {
                match self.engine.set_send_encoding(encoding, &mut self.pending) {
                    Ok(()) => self.notice(&format!("send encoding: {encoding}")),
                    Err(_) => {
                        self.notice("Wrong hex data format in send area, cannot transfer to ASCII");
                    }
                }
                if !self.pending.is_empty() {
                    let pending = self.pending.clone();
                    self.notice(&format!("send buffer: {pending}"));
                }
            }
            OperatorCommand::Timestamp(enabled) => self.engine.set_add_timestamp(enabled),
            OperatorCommand::LineEnding(enabled) => self.engine.set_append_line_ending(enabled),
            OperatorCommand::Port(port) => {
                let result = self.engine.set_port(&port);
                self.report_setting(result, &format!("comm port: {port}"));
            }
            OperatorCommand::Baud(baud) => {
                let result = self.engine.set_baud_rate(baud);
                self.report_setting(result, &format!("baudrate: {baud}"));
            }
            OperatorCommand::DataBits(bits) => {
                let result = self.engine.set_data_bits(bits);
                self.report_setting(result, &format!("data bit: {}", bits.bits()));
            }
            OperatorCommand::StopBits(bits) => {
                let result = self.engine.set_stop_bits(bits);
                self.report_setting(result, &format!("stop bit: {}", bits.bits()));
            }
            OperatorCommand::Parity(parity) => {
                let result = self.engine.set_parity(parity);
                self.report_setting(result, &format!("check sum: {}", parity.letter()));
            }
            OperatorCommand::ClearSend => self.pending.clear(),
            OperatorCommand::Open => match self.engine.reopen() {
                Ok(()) => {
                    self.disconnected = None;
                    let config = self.engine.port().config().to_string();
                    self.notice(&format!("Opened {config}"));
                }
                Err(e) => self.notice(&e.to_string()),
            },
            OperatorCommand::Close => {
                self.engine.close();
                let port = self.engine.port().selected_port().to_string();
                self.notice(&format!("Closed {port}"));
            }
            OperatorCommand::Clear => self.transcript.clear(),
            OperatorCommand::Save(path) => {
                let path = path.unwrap_or_else(|| PathBuf::from(default_transcript_filename("serdebug")));
                if let Err(e) = self.transcript.save(&path) {
                    self.notice(&format!("Cannot save {}: {e}", path.display()));
                } else if !self.quiet {
                    eprintln!("File saved at {}", path.display());
                }
            }
            OperatorCommand::Help => eprintln!("{HELP}"),
            OperatorCommand::Quit => return Some(CliResult::success()),
        }
        None
    }

    fn finish(&mut self, save: Option<&PathBuf>, outcome: CliResult) -> CliResult {
        self.engine.close();
        if let Some(path) = save {
            if let Err(e) = self.transcript.save(path) {
                return CliResult::error(ExitCodes::ERROR, format!("Cannot save {}: {e}", path.display()));
            }
        }
        match (&outcome, &self.disconnected) {
            (CliResult::Success(_), Some(port)) => {
                CliResult::error(ExitCodes::DISCONNECTED, format!("Port {port} disconnected"))
            }
            _ => outcome,
        }
    }
}

async fn run_terminal(cli: &Cli, mut app_config: AppConfig, args: &OpenArgs) -> CliResult {
    apply_overrides(&mut app_config, args);
    let terminal_settings = app_config.terminal.clone();

    if args.loopback && app_config.serial.port.is_empty() {
        app_config.serial.port = "loopback".to_string();
    }
    if app_config.serial.port.is_empty() {
        return CliResult::error(
            ExitCodes::INVALID_ARGS,
            "No port selected (use --port or set serial.port in the config file)",
        );
    }

    let transport: Box<dyn Transport> = if args.loopback {
        let (transport, _handle) = LoopbackTransport::echo();
        Box::new(transport)
    } else {
        Box::new(
            SerialPortTransport::new()
                .write_timeout(Duration::from_millis(terminal_settings.write_timeout_ms)),
        )
    };
    let clock: Box<dyn Clock> = if terminal_settings.wall_clock {
        Box::new(WallClock::new())
    } else {
        Box::new(TickClock::new(terminal_settings.tick_rate_hz))
    };

    let (sink, events) = serdebug_core::ChannelSink::new();
    let engine = FramingEngine::with_clock(transport, clock, Box::new(sink))
        .settings(terminal_settings.engine_settings());

    let mut terminal = Terminal {
        engine,
        transcript: terminal_settings.transcript(),
        pending: String::new(),
        disconnected: None,
        quiet: cli.quiet,
    };

    if let Err(e) = terminal.engine.open(app_config.serial.to_line_config()) {
        return CliResult::from(&e);
    }
    if !cli.quiet {
        eprintln!(
            "Opened {}. Type :help for commands, Ctrl+C to exit.",
            terminal.engine.port().config()
        );
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    }) {
        tracing::warn!("Cannot install Ctrl+C handler: {}", e);
    }

    let mut ticker = tokio::time::interval(terminal_settings.tick_period());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    let outcome = loop {
        if !running.load(Ordering::SeqCst) {
            break CliResult::success();
        }

        tokio::select! {
            _ = ticker.tick() => {
                terminal.engine.poll();
                for event in events.try_iter() {
                    terminal.record(&event);
                }
                // a closed stdout (e.g. `| head`) ends the session
                if io::stdout().flush().is_err() {
                    break CliResult::success();
                }
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if let Some(result) = terminal.handle_line(line.trim_end_matches('\r')) {
                        break result;
                    }
                }
                // keep displaying received data after stdin ends
                Ok(None) => stdin_open = false,
                Err(e) => break CliResult::error(ExitCodes::ERROR, format!("stdin: {e}")),
            },
        }
    };

    terminal.finish(args.save.as_ref(), outcome)
}
