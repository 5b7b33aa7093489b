use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};
use env_logger::{Builder, Env};
use heart_risk_client::batch::{self, BatchError};
use heart_risk_client::{
    encode, CategoricalInput, PatientInput, PredictError, PredictionClient, PredictionConfig,
    PredictionSlot, ValidationError, ZeroPolicy,
};
use log::{debug, info, LevelFilter};
use sysinfo::{get_current_pid, ProcessExt, System, SystemExt};
use thiserror::Error;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = HeartRiskArgs::parse();

    let log_level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let env = Env::new().filter("HEART_RISK_LOG");
    Builder::new()
        .filter(Some("heart_risk_client"), log_level)
        .parse_env(env)
        .init();

    debug!("Arguments {:#?}", cli);

    match cli.command {
        Command::Encode(args) => encode_record(&args),
        Command::Predict { service, record } => predict_record(&service, &record).await,
        Command::Batch(args) => score_dataset(&args).await,
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "heart-risk-client",
    version,
    about = "Submit patient measurements to the heart-failure risk service"
)]
struct HeartRiskArgs {
    /// Increase verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a record and print the request body without sending it
    Encode(EncodeArgs),
    /// Predict the heart-failure risk of one patient
    Predict {
        #[command(flatten)]
        service: ServiceArgs,
        #[command(flatten)]
        record: RecordArgs,
    },
    /// Score every row of a heart-failure CSV dataset
    Batch(BatchArgs),
}

#[derive(Args, Debug)]
struct EncodeArgs {
    #[command(flatten)]
    record: RecordArgs,

    /// Print the numeric feature vector in model order instead of the body
    #[arg(long)]
    features: bool,
}

#[derive(Args, Debug)]
struct ServiceArgs {
    /// Base URL of the inference service, e.g. http://localhost:3001
    #[arg(long, env = "HEART_RISK_SERVICE_URL")]
    service_url: String,

    /// Request timeout in milliseconds (0 waits indefinitely)
    #[arg(long, env = "HEART_RISK_TIMEOUT_MS", default_value_t = 0)]
    timeout_ms: u64,

    /// Report a prediction of exactly 0 as a 0% risk instead of a failure
    #[arg(long, env = "HEART_RISK_ACCEPT_ZERO", default_value_t = false)]
    accept_zero: bool,
}

impl ServiceArgs {
    fn build_config(&self) -> PredictionConfig {
        let zero_policy = if self.accept_zero {
            ZeroPolicy::AcceptZero
        } else {
            ZeroPolicy::RejectZero
        };
        PredictionConfig::new(self.service_url.clone())
            .with_timeout((self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms)))
            .with_zero_policy(zero_policy)
    }
}

#[derive(Args, Debug)]
struct RecordArgs {
    /// JSON file holding the record; field flags are ignored when set
    #[arg(long, value_name = "FILE")]
    json: Option<PathBuf>,

    /// F, M, or code 0-1
    #[arg(long)]
    sex: Option<String>,

    /// Years, 18-120
    #[arg(long)]
    age: Option<f64>,

    /// ASY, ATA, NAP, TA, or code 0-3
    #[arg(long)]
    chest_pain_type: Option<String>,

    /// Resting blood pressure, mm Hg
    #[arg(long)]
    resting_bp: Option<f64>,

    /// Serum cholesterol, mg/dL
    #[arg(long)]
    cholesterol: Option<f64>,

    /// Normal, High (above 120 mg/dL), or code 0-1
    #[arg(long)]
    fasting_bs: Option<String>,

    /// LVH, Normal, ST, or code 0-2
    #[arg(long)]
    resting_ecg: Option<String>,

    /// Maximum heart rate, 60-202 bpm
    #[arg(long)]
    max_hr: Option<f64>,

    /// N, Y, or code 0-1
    #[arg(long)]
    exercise_angina: Option<String>,

    /// ST depression, 0-3 mm
    #[arg(long)]
    old_peak: Option<f64>,

    /// Down, Flat, Up, or code 0-2
    #[arg(long)]
    st_slope: Option<String>,
}

impl RecordArgs {
    fn to_input(&self) -> Result<PatientInput, AppError> {
        if let Some(path) = &self.json {
            let raw = fs::read(path).map_err(|source| AppError::Io {
                path: path.clone(),
                source,
            })?;
            return Ok(serde_json::from_slice(&raw)?);
        }
        let token = |value: &Option<String>| value.as_deref().map(CategoricalInput::from);
        Ok(PatientInput {
            sex: token(&self.sex),
            age: self.age,
            chest_pain_type: token(&self.chest_pain_type),
            resting_bp: self.resting_bp,
            cholesterol: self.cholesterol,
            fasting_bs: token(&self.fasting_bs),
            resting_ecg: token(&self.resting_ecg),
            max_hr: self.max_hr,
            exercise_angina: token(&self.exercise_angina),
            old_peak: self.old_peak,
            st_slope: token(&self.st_slope),
        })
    }
}

#[derive(Args, Debug)]
struct BatchArgs {
    #[command(flatten)]
    service: ServiceArgs,

    /// Input CSV in the heart-failure dataset layout
    #[arg(short, long)]
    input: PathBuf,

    /// Output file, .csv or .parquet
    #[arg(short, long)]
    output: PathBuf,

    /// Maximum requests in flight
    #[arg(long, default_value_t = 4)]
    concurrency: usize,

    /// Probability at which a row counts as a positive prediction
    #[arg(long, default_value_t = 0.5)]
    threshold: f64,
}

#[derive(Error, Debug)]
enum AppError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Predict(#[from] PredictError),
    #[error(transparent)]
    Batch(#[from] BatchError),
    #[error("invalid JSON record: {0}")]
    Json(#[from] serde_json::Error),
    #[error("could not read {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn monitor_memory() -> u64 {
    let Ok(pid) = get_current_pid() else {
        return 0;
    };
    let mut system = System::new();
    system.refresh_process(pid);
    system.process(pid).map(|process| process.memory()).unwrap_or(0)
}

fn encode_record(args: &EncodeArgs) -> Result<(), AppError> {
    let record = encode(&args.record.to_input()?)?;
    if args.features {
        for (name, value) in record.named_features() {
            println!("{name}\t{value}");
        }
    } else {
        println!("{}", serde_json::to_string_pretty(&record)?);
    }
    Ok(())
}

async fn predict_record(service: &ServiceArgs, args: &RecordArgs) -> Result<(), AppError> {
    let record = encode(&args.to_input()?)?;
    let client = PredictionClient::new(&service.build_config())?;

    let slot = PredictionSlot::new();
    let submission = slot.begin();
    let interrupt = submission.cancel_token().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    match client
        .predict_with_cancel(&record, submission.cancel_token())
        .await
    {
        Ok(probability) => {
            slot.complete(&submission, probability);
        }
        Err(err) => {
            slot.fail(&submission);
            return Err(err.into());
        }
    }

    if let Some(probability) = slot.current() {
        println!(
            "Estimated heart-failure risk: {:.2}% ({probability})",
            probability * 100.0
        );
    }
    Ok(())
}

async fn score_dataset(args: &BatchArgs) -> Result<(), AppError> {
    let start_time = Instant::now();
    let start_memory = monitor_memory();

    let client = PredictionClient::new(&args.service.build_config())?;
    let summary = batch::score_file(
        &client,
        &args.input,
        &args.output,
        args.concurrency,
        args.threshold,
    )
    .await?;

    info!(
        "scored {} of {} rows ({} failed)",
        summary.scored, summary.rows, summary.failed
    );
    if let Some(matrix) = summary.confusion {
        info!("Precision: {:.2}", matrix.precision());
        info!("Negative Predictive Value (NPV): {:.2}", matrix.negative_predictive_value());
        info!("Sensitivity (Recall): {:.2}", matrix.sensitivity());
        info!("Specificity: {:.2}", matrix.specificity());
        info!("Accuracy: {:.2}", matrix.accuracy());
    }

    let end_memory = monitor_memory();
    let duration = start_time.elapsed();

    info!("Time elapsed scoring the dataset: {:?}", duration);
    info!("Memory used: {} bytes", end_memory.saturating_sub(start_memory));

    Ok(())
}
