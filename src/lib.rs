//! Client side of the heart-failure risk service: turns operator-entered
//! clinical measurements into the service's feature record, submits it, and
//! hands back the predicted probability.

pub mod batch;
pub mod client;
pub mod config;
pub mod encoder;
pub mod error;
pub mod metrics;
pub mod records;
pub mod slot;

pub use client::{extract_prediction, PredictionClient, PredictionResponse};
pub use config::{PredictionConfig, ZeroPolicy};
pub use encoder::{encode, CategoricalInput, PatientInput};
pub use error::{
    ExtractionFailure, FailureKind, FieldError, PredictError, RiskError, ValidationError,
};
pub use records::{
    ChestPainType, ExerciseAngina, FastingBs, PatientRecord, RestingEcg, Sex, StSlope,
};
pub use slot::{PredictionSlot, Submission};
