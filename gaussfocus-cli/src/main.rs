use clap::Parser;
use gaussfocus::io::load_gray16_image;
use gaussfocus::{
    measure_batch, measure_batch_par, Accumulation, BatchSummary, FocusResult, SigmaSolution,
    SolverConfig, StarSeed,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const SCHEMA_JSON: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.schema.json"));
const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "Gaussian focus measurement CLI (JSON config driven)")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Print the JSON schema and exit.
    #[arg(long)]
    print_schema: bool,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output for the solver iterations.
    #[arg(long)]
    trace: bool,
}

#[derive(Debug, Deserialize, Clone, Copy, Default)]
#[serde(rename_all = "snake_case")]
enum AccumulationConfig {
    #[default]
    Wide,
    Shifted,
}

impl From<AccumulationConfig> for Accumulation {
    fn from(value: AccumulationConfig) -> Self {
        match value {
            AccumulationConfig::Wide => Accumulation::Wide,
            AccumulationConfig::Shifted => Accumulation::Shifted,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct SolverConfigJson {
    initial_sigma: Option<f64>,
    max_iterations: usize,
    tolerance: f64,
    max_peak_retries: usize,
    accumulation: AccumulationConfig,
}

impl Default for SolverConfigJson {
    fn default() -> Self {
        let cfg = SolverConfig::default();
        Self {
            initial_sigma: cfg.initial_sigma,
            max_iterations: cfg.max_iterations,
            tolerance: cfg.tolerance,
            max_peak_retries: cfg.max_peak_retries,
            accumulation: AccumulationConfig::Wide,
        }
    }
}

impl From<&SolverConfigJson> for SolverConfig {
    fn from(value: &SolverConfigJson) -> Self {
        Self {
            initial_sigma: value.initial_sigma,
            max_iterations: value.max_iterations,
            tolerance: value.tolerance,
            max_peak_retries: value.max_peak_retries,
            accumulation: value.accumulation.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StarJson {
    x: usize,
    y: usize,
    sky: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    image_path: String,
    output_path: Option<String>,
    sky: i64,
    stars: Vec<StarJson>,
    solver: SolverConfigJson,
    parallel: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            image_path: String::new(),
            output_path: None,
            sky: 0,
            stars: Vec::new(),
            solver: SolverConfigJson::default(),
            parallel: false,
        }
    }
}

#[derive(Debug, Serialize)]
struct StarRecord {
    x: usize,
    y: usize,
    status: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sigma: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    xf: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    yf: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    xmom: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ymom: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pmom: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mmom: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filval: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    iterations: Option<usize>,
}

impl StarRecord {
    fn new(seed: &StarSeed, result: &FocusResult<SigmaSolution>) -> Self {
        let mut record = Self {
            x: seed.x,
            y: seed.y,
            status: 0,
            error: None,
            sigma: None,
            xf: None,
            yf: None,
            xmom: None,
            ymom: None,
            pmom: None,
            mmom: None,
            filval: None,
            iterations: None,
        };
        match result {
            Ok(solution) => {
                let m = &solution.moments;
                record.sigma = Some(solution.sigma);
                record.xf = Some(m.xf);
                record.yf = Some(m.yf);
                record.xmom = Some(m.xmom);
                record.ymom = Some(m.ymom);
                record.pmom = Some(m.pmom);
                record.mmom = Some(m.mmom);
                record.filval = Some(m.filval);
                record.iterations = Some(solution.iterations);
            }
            Err(err) => {
                record.status = err.solve_status();
                record.error = Some(err.to_string());
            }
        }
        record
    }
}

#[derive(Debug, Serialize)]
struct SummaryRecord {
    measured: usize,
    skipped: usize,
    median_sigma: f64,
    mean_focus_statistic: f64,
}

impl From<BatchSummary> for SummaryRecord {
    fn from(value: BatchSummary) -> Self {
        Self {
            measured: value.measured,
            skipped: value.skipped,
            median_sigma: value.median_sigma,
            mean_focus_statistic: value.mean_focus_statistic,
        }
    }
}

#[derive(Debug, Serialize)]
struct Output {
    summary: Option<SummaryRecord>,
    stars: Vec<StarRecord>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive("gaussfocus=debug".parse()?),
            )
            .with_target(false)
            .init();
    }

    if cli.print_schema {
        println!("{SCHEMA_JSON}");
        return Ok(());
    }
    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    let config_text = fs::read_to_string(&cli.config)?;
    let config: Config = serde_json::from_str(&config_text)?;
    if config.image_path.is_empty() {
        return Err("image_path must be set in the config".into());
    }
    if config.stars.is_empty() {
        return Err("stars must list at least one source".into());
    }

    let image = load_gray16_image(&config.image_path)?;
    let seeds: Vec<StarSeed> = config
        .stars
        .iter()
        .map(|star| StarSeed {
            x: star.x,
            y: star.y,
            sky: star.sky.unwrap_or(config.sky),
        })
        .collect();
    let solver_cfg = SolverConfig::from(&config.solver);

    let results = if config.parallel {
        measure_batch_par(image.view(), &seeds, &solver_cfg)?
    } else {
        measure_batch(image.view(), &seeds, &solver_cfg)?
    };

    for (seed, result) in seeds.iter().zip(&results) {
        match result {
            Err(err) if err.is_measurement_failure() => {
                tracing::warn!(x = seed.x, y = seed.y, %err, "source skipped");
            }
            Err(err) => tracing::error!(x = seed.x, y = seed.y, %err, "source rejected"),
            Ok(_) => {}
        }
    }

    let summary = BatchSummary::from_results(&results).map(SummaryRecord::from);
    let stars = seeds
        .iter()
        .zip(&results)
        .map(|(seed, result)| StarRecord::new(seed, result))
        .collect();
    let output = Output { summary, stars };
    let json = serde_json::to_string_pretty(&output)?;

    match config.output_path {
        Some(path) => fs::write(path, json)?,
        None => println!("{json}"),
    }

    Ok(())
}
