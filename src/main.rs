use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use gatebus::{Config, Interpreter};
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gatebus", version, about = "Compile and tick bus-level gate circuits")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct BuildArgs {
    /// Circuit source file
    file: PathBuf,
    #[arg(long, default_value_t = Config::DEFAULT_CAPACITY)]
    capacity: usize,
    /// Seed for unstable latch resolution
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Build, apply stimuli, tick and dump
    Run {
        #[command(flatten)]
        build: BuildArgs,
        #[arg(long, default_value_t = 1)]
        ticks: usize,
        /// Drive a bus before ticking: `name=value` (decimal, 0x.. or 0b..)
        #[arg(long = "set", value_parser = parse_stimulus)]
        stimuli: Vec<(String, u64)>,
    },
    /// Print gate count, depth, fan-out and structural hash
    Stats {
        #[command(flatten)]
        build: BuildArgs,
    },
    /// Write the netlist as JSON
    Export {
        #[command(flatten)]
        build: BuildArgs,
        #[arg(long)]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gatebus=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            build,
            ticks,
            stimuli,
        } => {
            let mut it = build.load()?;
            for (name, value) in &stimuli {
                let bus = it
                    .bus(name)
                    .cloned()
                    .ok_or_else(|| anyhow!("unknown bus `{name}`"))?;
                it.netlist_mut().write_bus(&bus, *value);
            }
            for _ in 0..ticks {
                it.netlist_mut().tick();
            }
            info!(ticks, "simulation done");
            let net = it.netlist();
            print!("{}", net.dump_ports());
            print!("{}", net.dump_gates());
        }
        Commands::Stats { build } => {
            let it = build.load()?;
            let net = it.netlist();
            let st = net.stats();
            println!(
                "gates={} capacity={} max_depth={} max_usage={} hash={}",
                st.gates,
                st.capacity,
                st.max_depth,
                st.max_usage,
                net.hash()
            );
        }
        Commands::Export { build, out } => {
            let it = build.load()?;
            let json = serde_json::to_string_pretty(&it.netlist().snapshot())?;
            fs::write(&out, json).with_context(|| format!("writing {}", out.display()))?;
            println!("netlist written to {}", out.display());
        }
    }
    Ok(())
}

impl BuildArgs {
    fn load(&self) -> Result<Interpreter> {
        let config = Config {
            capacity: self.capacity,
            seed: self.seed,
        };
        let mut it = Interpreter::from_path(&self.file, config)
            .with_context(|| format!("loading {}", self.file.display()))?;
        it.build()
            .with_context(|| format!("building {}", self.file.display()))?;
        Ok(it)
    }
}

fn parse_stimulus(arg: &str) -> std::result::Result<(String, u64), String> {
    let (name, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got `{arg}`"))?;
    let value = value.trim();
    let parsed = if let Some(hex) = value.strip_prefix("0x") {
        u64::from_str_radix(hex, 16)
    } else if let Some(bin) = value.strip_prefix("0b") {
        u64::from_str_radix(bin, 2)
    } else {
        value.parse()
    };
    parsed
        .map(|v| (name.trim().to_string(), v))
        .map_err(|e| format!("bad value `{value}`: {e}"))
}
