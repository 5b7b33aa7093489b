//! Scores a whole heart-failure dataset through the inference service.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use log::{debug, info};
use polars::prelude::*;
use polars_io::parquet::ParquetWriter;
use thiserror::Error;

use crate::client::PredictionClient;
use crate::encoder::{CategoricalInput, PatientInput};
use crate::metrics::ConfusionMatrix;
use crate::records::{columns, PatientRecord};

pub const PROBABILITY_COLUMN: &str = "probability";
pub const ERROR_COLUMN: &str = "error";

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("could not access {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Polars(#[from] PolarsError),
    #[error("unsupported output format {path:?}, expected .csv or .parquet")]
    OutputFormat { path: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Parquet,
}

impl OutputFormat {
    pub fn from_path(path: &Path) -> Result<Self, BatchError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Ok(OutputFormat::Csv),
            Some(ext) if ext.eq_ignore_ascii_case("parquet") => Ok(OutputFormat::Parquet),
            _ => Err(BatchError::OutputFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// What happened to one dataset row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Scored(f64),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    pub rows: usize,
    pub scored: usize,
    pub failed: usize,
    /// Present when the input carries a `HeartDisease` label column.
    pub confusion: Option<ConfusionMatrix>,
}

pub fn read_records<P: AsRef<Path>>(path: P) -> Result<DataFrame, BatchError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| BatchError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let df = CsvReader::new(file)
        .has_header(true)
        .with_dtypes(Some(Arc::new(PatientRecord::raw_schema())))
        .finish()?;
    Ok(df)
}

pub fn write_csv<P: AsRef<Path>>(path: P, df: &mut DataFrame) -> Result<(), BatchError> {
    let mut file = create(path.as_ref())?;
    CsvWriter::new(&mut file).finish(df)?;
    Ok(())
}

pub fn write_parquet<P: AsRef<Path>>(path: P, df: &mut DataFrame) -> Result<(), BatchError> {
    let mut file = create(path.as_ref())?;
    ParquetWriter::new(&mut file).finish(df)?;
    Ok(())
}

fn create(path: &Path) -> Result<File, BatchError> {
    File::create(path).map_err(|source| BatchError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn float_column(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
    let series = df.column(name)?.cast(&DataType::Float64)?;
    let values = series.f64()?.into_iter().collect();
    Ok(values)
}

fn code_column(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<i64>>> {
    let series = df.column(name)?.cast(&DataType::Int64)?;
    let values = series.i64()?.into_iter().collect();
    Ok(values)
}

fn token_column(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<String>>> {
    let series = df.column(name)?.cast(&DataType::Utf8)?;
    let values = series
        .utf8()?
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect();
    Ok(values)
}

/// One `PatientInput` per row. Nulls become missing fields so the encoder
/// reports them per row.
pub fn inputs_from_frame(df: &DataFrame) -> Result<Vec<PatientInput>, BatchError> {
    let age = float_column(df, columns::AGE)?;
    let sex = token_column(df, columns::SEX)?;
    let chest_pain_type = token_column(df, columns::CHEST_PAIN_TYPE)?;
    let resting_bp = float_column(df, columns::RESTING_BP)?;
    let cholesterol = float_column(df, columns::CHOLESTEROL)?;
    let fasting_bs = code_column(df, columns::FASTING_BS)?;
    let resting_ecg = token_column(df, columns::RESTING_ECG)?;
    let max_hr = float_column(df, columns::MAX_HR)?;
    let exercise_angina = token_column(df, columns::EXERCISE_ANGINA)?;
    let old_peak = float_column(df, columns::OLD_PEAK)?;
    let st_slope = token_column(df, columns::ST_SLOPE)?;

    fn token(values: &[Option<String>], row: usize) -> Option<CategoricalInput> {
        values[row].clone().map(CategoricalInput::Token)
    }

    let inputs = (0..df.height())
        .map(|row| PatientInput {
            sex: token(&sex, row),
            age: age[row],
            chest_pain_type: token(&chest_pain_type, row),
            resting_bp: resting_bp[row],
            cholesterol: cholesterol[row],
            fasting_bs: fasting_bs[row].map(CategoricalInput::Code),
            resting_ecg: token(&resting_ecg, row),
            max_hr: max_hr[row],
            exercise_angina: token(&exercise_angina, row),
            old_peak: old_peak[row],
            st_slope: token(&st_slope, row),
        })
        .collect();
    Ok(inputs)
}

/// Ground-truth labels, if the frame has a `HeartDisease` column.
pub fn labels_from_frame(df: &DataFrame) -> Result<Option<Vec<Option<bool>>>, BatchError> {
    if !df.get_column_names().contains(&columns::HEART_DISEASE) {
        return Ok(None);
    }
    let labels = code_column(df, columns::HEART_DISEASE)?
        .into_iter()
        .map(|label| label.map(|value| value != 0))
        .collect();
    Ok(Some(labels))
}

/// Scores every input, keeping input order, with at most `concurrency`
/// requests in flight.
pub async fn score_inputs(
    client: &PredictionClient,
    inputs: Vec<PatientInput>,
    concurrency: usize,
) -> Vec<RowOutcome> {
    stream::iter(inputs.into_iter().enumerate())
        .map(|(row, input)| async move {
            match client.predict_input(&input).await {
                Ok(probability) => RowOutcome::Scored(probability),
                Err(err) => {
                    debug!("row {row} not scored: {err}");
                    RowOutcome::Failed(err.to_string())
                }
            }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await
}

/// Appends the `probability` and `error` columns.
pub fn with_outcomes(df: &DataFrame, outcomes: &[RowOutcome]) -> Result<DataFrame, BatchError> {
    let probabilities: Vec<Option<f64>> = outcomes
        .iter()
        .map(|outcome| match outcome {
            RowOutcome::Scored(probability) => Some(*probability),
            RowOutcome::Failed(_) => None,
        })
        .collect();
    let errors: Vec<Option<&str>> = outcomes
        .iter()
        .map(|outcome| match outcome {
            RowOutcome::Scored(_) => None,
            RowOutcome::Failed(message) => Some(message.as_str()),
        })
        .collect();
    let scored = df.hstack(&[
        Series::new(PROBABILITY_COLUMN, probabilities),
        Series::new(ERROR_COLUMN, errors),
    ])?;
    Ok(scored)
}

/// Confusion matrix over the rows that have both a label and a score.
pub fn evaluate(labels: &[Option<bool>], outcomes: &[RowOutcome], threshold: f64) -> ConfusionMatrix {
    let (truth, scores): (Vec<bool>, Vec<f64>) = labels
        .iter()
        .zip(outcomes)
        .filter_map(|(label, outcome)| match (label, outcome) {
            (Some(label), RowOutcome::Scored(probability)) => Some((*label, *probability)),
            _ => None,
        })
        .unzip();
    ConfusionMatrix::from_scores(&truth, &scores, threshold)
}

/// Reads `input`, scores every row and writes the result to `output`.
pub async fn score_file(
    client: &PredictionClient,
    input: &Path,
    output: &Path,
    concurrency: usize,
    threshold: f64,
) -> Result<BatchSummary, BatchError> {
    let format = OutputFormat::from_path(output)?;
    let df = read_records(input)?;
    info!("read {} rows from {:?}", df.height(), input);

    let inputs = inputs_from_frame(&df)?;
    let labels = labels_from_frame(&df)?;
    let outcomes = score_inputs(client, inputs, concurrency).await;

    let scored = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, RowOutcome::Scored(_)))
        .count();
    let confusion = labels.map(|labels| evaluate(&labels, &outcomes, threshold));

    let mut result = with_outcomes(&df, &outcomes)?;
    match format {
        OutputFormat::Csv => write_csv(output, &mut result)?,
        OutputFormat::Parquet => write_parquet(output, &mut result)?,
    }
    info!("wrote {} rows to {:?}", result.height(), output);

    Ok(BatchSummary {
        rows: outcomes.len(),
        scored,
        failed: outcomes.len() - scored,
        confusion,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::encode;
    use crate::records::{ChestPainType, FastingBs, RestingEcg, StSlope};
    use std::io::Write;

    const SAMPLE: &str = "\
Age,Sex,ChestPainType,RestingBP,Cholesterol,FastingBS,RestingECG,MaxHR,ExerciseAngina,Oldpeak,ST_Slope,HeartDisease
40,M,ATA,140,289,0,Normal,172,N,0,Up,0
49,F,NAP,160,180,0,Normal,156,N,1,Flat,1
37,M,ASY,140,207,1,ST,130,Y,1.5,Flat,1
";

    fn sample_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        file
    }

    #[test]
    fn dataset_rows_encode_to_records() {
        let file = sample_file();
        let df = read_records(file.path()).unwrap();
        assert_eq!(df.height(), 3);

        let inputs = inputs_from_frame(&df).unwrap();
        let records: Vec<_> = inputs.iter().map(|input| encode(input).unwrap()).collect();
        assert_eq!(records[0].age, 40);
        assert_eq!(records[0].chest_pain_type, ChestPainType::AtypicalAngina);
        assert_eq!(records[0].old_peak, 0.0);
        assert_eq!(records[1].st_slope, StSlope::Flat);
        assert_eq!(records[2].fasting_bs, FastingBs::High);
        assert_eq!(records[2].resting_ecg, RestingEcg::St);
        assert_eq!(records[2].old_peak, 1.5);
    }

    #[test]
    fn labels_are_read_when_present() {
        let file = sample_file();
        let df = read_records(file.path()).unwrap();
        let labels = labels_from_frame(&df).unwrap().unwrap();
        assert_eq!(labels, vec![Some(false), Some(true), Some(true)]);

        let unlabeled = df.drop(columns::HEART_DISEASE).unwrap();
        assert!(labels_from_frame(&unlabeled).unwrap().is_none());
    }

    #[test]
    fn outcomes_become_columns() {
        let file = sample_file();
        let df = read_records(file.path()).unwrap();
        let outcomes = vec![
            RowOutcome::Scored(0.1),
            RowOutcome::Failed("no usable prediction".to_string()),
            RowOutcome::Scored(0.8),
        ];
        let scored = with_outcomes(&df, &outcomes).unwrap();
        let probabilities: Vec<Option<f64>> =
            scored.column(PROBABILITY_COLUMN).unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(probabilities, vec![Some(0.1), None, Some(0.8)]);
        let errors: Vec<Option<&str>> =
            scored.column(ERROR_COLUMN).unwrap().utf8().unwrap().into_iter().collect();
        assert_eq!(errors, vec![None, Some("no usable prediction"), None]);
    }

    #[test]
    fn evaluation_skips_unscored_rows() {
        let labels = [Some(false), Some(true), Some(true), None];
        let outcomes = [
            RowOutcome::Scored(0.1),
            RowOutcome::Failed("x".to_string()),
            RowOutcome::Scored(0.8),
            RowOutcome::Scored(0.9),
        ];
        let matrix = evaluate(&labels, &outcomes, 0.5);
        assert_eq!(matrix.total(), 2);
        assert_eq!(matrix.accuracy(), 1.0);
    }

    #[test]
    fn output_format_follows_extension() {
        assert_eq!(OutputFormat::from_path(Path::new("out.csv")).unwrap(), OutputFormat::Csv);
        assert_eq!(
            OutputFormat::from_path(Path::new("out/scores.PARQUET")).unwrap(),
            OutputFormat::Parquet
        );
        assert!(OutputFormat::from_path(Path::new("out.json")).is_err());
    }
}
