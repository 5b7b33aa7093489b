use polars::prelude::{DataType, Field, Schema};
use serde::{Deserialize, Serialize};

use crate::error::FieldError;

// Each categorical field is a closed table of (variant, code, token). Codes and
// tokens must stay unique within a table.
macro_rules! categorical {
    (
        $(#[$meta:meta])*
        $name:ident as $field:literal {
            $($(#[$vmeta:meta])* $variant:ident = $code:literal => $token:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(into = "u8", try_from = "i64")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Key of this field in the request body.
            pub const FIELD: &'static str = $field;

            /// Every category, in code order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Integer code sent to the inference service.
            pub fn code(self) -> u8 {
                match self {
                    $($name::$variant => $code),+
                }
            }

            /// Canonical label, as found in the heart-failure dataset.
            pub fn token(self) -> &'static str {
                match self {
                    $($name::$variant => $token),+
                }
            }

            pub fn from_code(code: i64) -> Option<Self> {
                match code {
                    $($code => Some($name::$variant),)+
                    _ => None,
                }
            }

            /// Accepts either the canonical label (any case) or the decimal code
            /// string that form selects submit.
            pub fn from_token(token: &str) -> Option<Self> {
                let token = token.trim();
                if let Ok(code) = token.parse::<i64>() {
                    return Self::from_code(code);
                }
                Self::ALL
                    .iter()
                    .copied()
                    .find(|category| category.token().eq_ignore_ascii_case(token))
            }
        }

        impl From<$name> for u8 {
            fn from(category: $name) -> u8 {
                category.code()
            }
        }

        impl TryFrom<i64> for $name {
            type Error = FieldError;

            fn try_from(code: i64) -> Result<Self, Self::Error> {
                Self::from_code(code).ok_or(FieldError::UnknownCode { field: $field, code })
            }
        }
    };
}

categorical! {
    /// Biological sex.
    Sex as "sex" {
        Female = 0 => "F",
        Male = 1 => "M",
    }
}

categorical! {
    /// Chest pain presentation.
    ChestPainType as "chestPainType" {
        Asymptomatic = 0 => "ASY",
        AtypicalAngina = 1 => "ATA",
        NonAnginalPain = 2 => "NAP",
        TypicalAngina = 3 => "TA",
    }
}

categorical! {
    /// Resting electrocardiogram result.
    RestingEcg as "restingECG" {
        /// Probable or definite left ventricular hypertrophy.
        Lvh = 0 => "LVH",
        Normal = 1 => "Normal",
        /// ST-T wave abnormality.
        St = 2 => "ST",
    }
}

categorical! {
    /// Exercise-induced angina.
    ExerciseAngina as "exerciseAngina" {
        No = 0 => "N",
        Yes = 1 => "Y",
    }
}

categorical! {
    /// Slope of the peak exercise ST segment.
    StSlope as "stSlope" {
        Down = 0 => "Down",
        Flat = 1 => "Flat",
        Up = 2 => "Up",
    }
}

categorical! {
    /// Fasting blood sugar, high meaning above 120 mg/dL.
    FastingBs as "fastingBS" {
        Normal = 0 => "Normal",
        High = 1 => "High",
    }
}

/// Feature order of the model behind the inference service.
pub const FEATURE_ORDER: [&str; 11] = [
    "age",
    "sex",
    "chestPainType",
    "restingBP",
    "cholesterol",
    "fastingBS",
    "restingECG",
    "maxHR",
    "exerciseAngina",
    "oldPeak",
    "stSlope",
];

/// The eleven-field feature record submitted for inference.
///
/// Serializes to the exact request body of `POST /predict`, with every
/// categorical field as its integer code.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub sex: Sex,
    pub age: u16,
    #[serde(rename = "chestPainType")]
    pub chest_pain_type: ChestPainType,
    #[serde(rename = "restingBP")]
    pub resting_bp: f64,
    pub cholesterol: f64,
    #[serde(rename = "fastingBS")]
    pub fasting_bs: FastingBs,
    #[serde(rename = "restingECG")]
    pub resting_ecg: RestingEcg,
    #[serde(rename = "maxHR")]
    pub max_hr: f64,
    #[serde(rename = "exerciseAngina")]
    pub exercise_angina: ExerciseAngina,
    #[serde(rename = "oldPeak")]
    pub old_peak: f64,
    #[serde(rename = "stSlope")]
    pub st_slope: StSlope,
}

impl PatientRecord {
    /// Numeric vector in `FEATURE_ORDER`.
    pub fn to_features(&self) -> [f64; 11] {
        [
            f64::from(self.age),
            f64::from(self.sex.code()),
            f64::from(self.chest_pain_type.code()),
            self.resting_bp,
            self.cholesterol,
            f64::from(self.fasting_bs.code()),
            f64::from(self.resting_ecg.code()),
            self.max_hr,
            f64::from(self.exercise_angina.code()),
            self.old_peak,
            f64::from(self.st_slope.code()),
        ]
    }

    /// Pairs each value of [`to_features`](Self::to_features) with its name.
    pub fn named_features(&self) -> Vec<(&'static str, f64)> {
        FEATURE_ORDER.into_iter().zip(self.to_features()).collect()
    }

    /// Column types of the heart-failure CSV consumed by batch scoring.
    pub fn raw_schema() -> Schema {
        Schema::from_iter(vec![
            Field::new(columns::AGE, DataType::Int32),
            Field::new(columns::SEX, DataType::Utf8),
            Field::new(columns::CHEST_PAIN_TYPE, DataType::Utf8),
            Field::new(columns::RESTING_BP, DataType::Float64),
            Field::new(columns::CHOLESTEROL, DataType::Float64),
            Field::new(columns::FASTING_BS, DataType::Int32),
            Field::new(columns::RESTING_ECG, DataType::Utf8),
            Field::new(columns::MAX_HR, DataType::Float64),
            Field::new(columns::EXERCISE_ANGINA, DataType::Utf8),
            Field::new(columns::OLD_PEAK, DataType::Float64),
            Field::new(columns::ST_SLOPE, DataType::Utf8),
        ])
    }
}

/// Column names of the public heart-failure dataset.
pub mod columns {
    pub const AGE: &str = "Age";
    pub const SEX: &str = "Sex";
    pub const CHEST_PAIN_TYPE: &str = "ChestPainType";
    pub const RESTING_BP: &str = "RestingBP";
    pub const CHOLESTEROL: &str = "Cholesterol";
    pub const FASTING_BS: &str = "FastingBS";
    pub const RESTING_ECG: &str = "RestingECG";
    pub const MAX_HR: &str = "MaxHR";
    pub const EXERCISE_ANGINA: &str = "ExerciseAngina";
    pub const OLD_PEAK: &str = "Oldpeak";
    pub const ST_SLOPE: &str = "ST_Slope";
    pub const HEART_DISEASE: &str = "HeartDisease";
}
