use affirmation_mixer::asset::{AssetPool, Category};
use affirmation_mixer::config::{CONFIG_FILE, MixerConfig};
use affirmation_mixer::decode::probe_duration_ms;
use affirmation_mixer::server::{ServerState, run_server};
use affirmation_mixer::timeline::{self, INTRO_END_MS, OUTRO_START_MS, TOTAL_DURATION_MS};
use affirmation_mixer::FsAssembler;
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "affmix", about = "Affirmation session mixer")]
struct Cli {
    /// Path to the JSON config file
    #[arg(short, long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build one session from randomly selected clips
    Assemble {
        /// Output file (defaults to <output_dir>/final_audio.<ext>)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Seed for reproducible clip selection
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Print the timeline offsets for a number of main sections
    Plan {
        /// Number of main sections
        #[arg(short, long)]
        sections: usize,
    },
    /// List the clips available in each category
    Pools,
    /// Run the webhook server
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Configuration file management
    Config {
        #[command(subcommand)]
        action: ConfigCmd,
    },
}

#[derive(Subcommand)]
enum ConfigCmd {
    /// Show the effective configuration
    Show,
    /// Write the default configuration to the config path
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn fmt_ms(ms: u64) -> String {
    let secs = ms / 1000;
    format!("{}:{:02}.{:03}", secs / 60, secs % 60, ms % 1000)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .map_err(|e| anyhow!("cannot install log subscriber: {}", e))?;

    // `config init` must work even when the existing file is corrupt.
    if let Commands::Config {
        action: ConfigCmd::Init { force },
    } = &cli.command
    {
        if cli.config.exists() && !force {
            return Err(anyhow!(
                "'{}' already exists (use --force to overwrite)",
                cli.config.display()
            ));
        }
        MixerConfig::default()
            .save(&cli.config)
            .map_err(|e| anyhow!(e))?;
        println!("Wrote default config to {}", cli.config.display());
        return Ok(());
    }

    let config = MixerConfig::load(&cli.config).map_err(|e| anyhow!(e))?;

    match cli.command {
        Commands::Assemble { output, seed } => {
            let output = output.unwrap_or_else(|| {
                config
                    .output_dir
                    .join(format!("final_audio.{}", config.export.format.extension()))
            });
            if let Some(dir) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Cannot create '{}'", dir.display()))?;
            }
            let assembler = FsAssembler::from_config(&config);
            let report = assembler
                .assemble_seeded(&output, seed)
                .with_context(|| format!("Assembly of '{}' failed", output.display()))?;
            println!("Intro:      {}", report.intro);
            println!("Background: {}", report.background);
            for (name, offset) in report.main_sections.iter().zip(&report.main_offsets_ms) {
                println!("Main:       {} @ {}", name, fmt_ms(*offset));
            }
            println!("Outro:      {} @ {}", report.outro, fmt_ms(report.outro_start_ms));
            println!(
                "Wrote {} ({})",
                report.output.display(),
                fmt_ms(report.duration_ms)
            );
        }
        Commands::Plan { sections } => {
            let interval = timeline::main_section_interval(sections)?;
            let offsets = timeline::main_section_offsets(sections)?;
            println!("Intro:    0:00.000 (nominal end {})", fmt_ms(INTRO_END_MS));
            for (i, offset) in offsets.iter().enumerate() {
                println!("Main {:>3}: {}", i + 1, fmt_ms(*offset));
            }
            println!("Outro:    {}", fmt_ms(OUTRO_START_MS));
            println!(
                "Interval: {} | Total: {}",
                fmt_ms(interval),
                fmt_ms(TOTAL_DURATION_MS)
            );
        }
        Commands::Pools => {
            let pool = config.pool();
            for category in Category::ALL {
                let dir = config.category_dir(category);
                match pool.list(category) {
                    Ok(assets) => {
                        println!("{} ({}): {} file(s)", category, dir.display(), assets.len());
                        for asset in assets {
                            let duration = probe_duration_ms(&asset.path)
                                .map(fmt_ms)
                                .unwrap_or_else(|_| "?".to_string());
                            println!("  {:>10}  {}", duration, asset.name());
                        }
                    }
                    Err(e) => println!("{} ({}): {}", category, dir.display(), e),
                }
            }
        }
        Commands::Serve { port } => {
            let port = port.unwrap_or(config.server.port);
            let state = ServerState::new(
                Arc::new(FsAssembler::from_config(&config)),
                config.output_dir.clone(),
                config.export.format.extension(),
            );
            let runtime = tokio::runtime::Runtime::new().context("Cannot start runtime")?;
            runtime
                .block_on(run_server(state, port))
                .context("Server error")?;
        }
        Commands::Config { action } => match action {
            ConfigCmd::Show => {
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
            ConfigCmd::Init { .. } => unreachable!("handled before loading the config"),
        },
    }

    Ok(())
}
