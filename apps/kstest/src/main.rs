use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::io;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use ks_protocol as ks;

mod interactive;
mod report;
mod runner;
mod sequence;
mod sim;

use report::{opcode_name, state_name, Reporter};
use runner::{Backend, Runner};

#[derive(Parser, Debug)]
#[command(
    name = "kstest",
    version,
    about = "Greenhouse field-bus device tester",
    disable_help_subcommand = true
)]
struct Cli {
    /// Configuration file (JSON or YAML); built-in defaults when absent
    #[arg(long, default_value = "conf.json", global = true)]
    config: String,

    /// Run against the in-process simulated controller
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    mock: bool,

    /// Polling interval in milliseconds (default 1000, 0 with --mock)
    #[arg(long, global = true)]
    interval_ms: Option<u64>,

    /// Print records as JSON lines
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    json: bool,

    /// Print protocol counters when done
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum ClassArg {
    Switch,
    Retractable,
    Nutsupply,
}

impl From<ClassArg> for ks::DeviceClass {
    fn from(c: ClassArg) -> Self {
        match c {
            ClassArg::Switch => ks::DeviceClass::Switch,
            ClassArg::Retractable => ks::DeviceClass::Retractable,
            ClassArg::Nutsupply => ks::DeviceClass::Dispenser,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OpcodeArg {
    Off,
    On,
    TimedOn,
    Open,
    Close,
    TimedOpen,
    TimedClose,
    SetPosition,
    OnceWater,
    JustWater,
    NutWater,
}

impl From<OpcodeArg> for ks::Opcode {
    fn from(o: OpcodeArg) -> Self {
        match o {
            OpcodeArg::Off => ks::Opcode::Off,
            OpcodeArg::On => ks::Opcode::On,
            OpcodeArg::TimedOn => ks::Opcode::TimedOn,
            OpcodeArg::Open => ks::Opcode::Open,
            OpcodeArg::Close => ks::Opcode::Close,
            OpcodeArg::TimedOpen => ks::Opcode::TimedOpen,
            OpcodeArg::TimedClose => ks::Opcode::TimedClose,
            OpcodeArg::SetPosition => ks::Opcode::SetPosition,
            OpcodeArg::OnceWater => ks::Opcode::OnceWater,
            OpcodeArg::JustWater => ks::Opcode::JustWater,
            OpcodeArg::NutWater => ks::Opcode::NutWater,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Test switch actuators (fans, CO2, fog)
    Switch {
        /// Device index; all devices when omitted
        #[arg(long, allow_negative_numbers = true)]
        device: Option<i64>,
    },
    /// Test retractable actuators (vents, screens, curtains)
    Retractable {
        /// Device index; all devices when omitted
        #[arg(long, allow_negative_numbers = true)]
        device: Option<i64>,
    },
    /// Test the nutrient dispenser
    Nutsupply,
    /// Read every configured sensor point once
    Sensors,
    /// List devices with their resolved registers
    Devices,
    /// Encode a command and print its registers (nothing is sent)
    Encode {
        #[arg(long, value_enum)]
        class: ClassArg,
        #[arg(long, value_enum)]
        opcode: OpcodeArg,
        /// Operation id to embed
        #[arg(long, default_value_t = ks::INITIAL_OPERATION_ID + 1)]
        opid: u16,
        /// Duration in seconds
        #[arg(long, allow_negative_numbers = true)]
        duration: Option<i32>,
        /// Irrigation area range start
        #[arg(long)]
        area_start: Option<u16>,
        /// Irrigation area range end (defaults to start)
        #[arg(long)]
        area_end: Option<u16>,
        #[arg(long)]
        ec: Option<f32>,
        #[arg(long)]
        ph: Option<f32>,
        /// Position in percent
        #[arg(long)]
        position: Option<u16>,
    },
    /// Decode a status block given as space-separated registers
    Decode {
        #[arg(long, value_enum)]
        class: ClassArg,
        #[arg(long, value_delimiter = ' ', num_args = 1..)]
        regs: Vec<u16>,
    },
    /// Menu-driven test selection (default with no subcommand)
    Interactive,
}

fn main() -> Result<()> {
    setup_tracing();
    let cli = Cli::parse();

    let config = load_config(&cli.config)?;
    let backend = if cli.mock {
        Backend::Simulated
    } else {
        Backend::ModbusTcp
    };
    let default_ms = if cli.mock { 0 } else { 1000 };
    let interval = Duration::from_millis(cli.interval_ms.unwrap_or(default_ms));
    let mut runner = Runner::new(config, backend, interval, Reporter { json: cli.json });
    if cli.metrics {
        runner.metrics = Some(ks::MetricsHub::new().map_err(anyhow::Error::msg)?);
    }

    match cli.command.unwrap_or(Commands::Interactive) {
        Commands::Switch { device } => {
            runner.run_class(ks::DeviceClass::Switch, device)?;
        }
        Commands::Retractable { device } => {
            runner.run_class(ks::DeviceClass::Retractable, device)?;
        }
        Commands::Nutsupply => {
            runner.run_class(ks::DeviceClass::Dispenser, None)?;
        }
        Commands::Sensors => {
            let ok = runner.read_all_sensors()?;
            info!(ok, "sensor pass done");
        }
        Commands::Devices => devices(&runner),
        Commands::Encode {
            class,
            opcode,
            opid,
            duration,
            area_start,
            area_end,
            ec,
            ph,
            position,
        } => {
            let params = ks::CommandParams {
                duration_secs: duration,
                area: area_start.map(|start| ks::AreaRange {
                    start,
                    end: area_end.unwrap_or(start),
                }),
                ec,
                ph,
                position,
            };
            encode_cmd(class.into(), opcode.into(), opid, &params, cli.json)?
        }
        Commands::Decode { class, regs } => decode_cmd(class.into(), &regs, cli.json)?,
        Commands::Interactive => {
            let stdin = io::stdin();
            interactive::run(&runner, &mut stdin.lock(), &mut io::stdout())?;
        }
    }

    if let Some(hub) = &runner.metrics {
        print!("{}", hub.encode_text());
    }
    Ok(())
}

fn setup_tracing() {
    // Best-effort; avoid panics if already set
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .try_init();
}

/// A missing default config falls back to built-in values.
fn load_config(path: &str) -> Result<ks::BusConfig> {
    if Path::new(path).exists() {
        ks::load_config_file(path)
    } else {
        info!(path, "no config file, using defaults");
        Ok(ks::BusConfig::default())
    }
}

fn devices(runner: &Runner) {
    for class in ks::DeviceClass::ALL {
        for (idx, name) in runner.config.device_names(class).iter().enumerate() {
            match runner.map.resolve(class, idx as i64) {
                Ok(a) => println!(
                    "{class}\t{idx}\t{name}\t{}\tcommand={}\tstatus={}",
                    a.unit_id, a.command_base, a.status_base
                ),
                Err(e) => println!("{class}\t{idx}\t{name}\t{e}"),
            }
        }
    }
}

fn encode_cmd(
    class: ks::DeviceClass,
    opcode: ks::Opcode,
    opid: u16,
    params: &ks::CommandParams,
    json: bool,
) -> Result<()> {
    let cmd = ks::Command::build(class, opcode, opid, params)
        .with_context(|| format!("encoding {opcode} for {class}"))?;
    if json {
        println!("{}", serde_json::to_string(&cmd)?);
    } else {
        println!("{} {:?}", opcode_name(opcode), cmd.registers);
    }
    Ok(())
}

fn decode_cmd(class: ks::DeviceClass, regs: &[u16], json: bool) -> Result<()> {
    let block = ks::decode(regs, class).context("decoding status block")?;
    if json {
        println!("{}", serde_json::to_string(&block)?);
        return Ok(());
    }
    println!(
        "opid={} state={} ({})",
        block.operation_id,
        block.state,
        state_name(class, block.state)
    );
    if let Some(code) = block.fault_code {
        println!("fault_code={code}");
    }
    if let Some(secs) = block.remaining_secs {
        println!("remaining={secs}s");
    }
    if let Some(area) = block.area {
        println!("area={area}");
    }
    Ok(())
}
