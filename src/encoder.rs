//! Turns operator-entered values into a validated [`PatientRecord`].

use serde::{Deserialize, Serialize};

use crate::error::{FieldError, ValidationError};
use crate::records::{
    ChestPainType, ExerciseAngina, FastingBs, PatientRecord, RestingEcg, Sex, StSlope,
};

pub const AGE_MIN: f64 = 18.0;
pub const AGE_MAX: f64 = 120.0;
pub const MAX_HR_MIN: f64 = 60.0;
pub const MAX_HR_MAX: f64 = 202.0;
pub const OLD_PEAK_MIN: f64 = 0.0;
pub const OLD_PEAK_MAX: f64 = 3.0;

/// A categorical selection, either already a code or a string token.
/// JSON producers that write every number as a float (`1.0`) land in
/// `Number`, which must hold a whole value to name a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CategoricalInput {
    Code(i64),
    Number(f64),
    Token(String),
}

impl From<i64> for CategoricalInput {
    fn from(code: i64) -> Self {
        CategoricalInput::Code(code)
    }
}

impl From<&str> for CategoricalInput {
    fn from(token: &str) -> Self {
        CategoricalInput::Token(token.to_string())
    }
}

/// Raw field values as handed over by the presentation layer. `None` means the
/// field was never supplied; zero is an ordinary value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientInput {
    pub sex: Option<CategoricalInput>,
    pub age: Option<f64>,
    #[serde(rename = "chestPainType")]
    pub chest_pain_type: Option<CategoricalInput>,
    #[serde(rename = "restingBP")]
    pub resting_bp: Option<f64>,
    pub cholesterol: Option<f64>,
    #[serde(rename = "fastingBS")]
    pub fasting_bs: Option<CategoricalInput>,
    #[serde(rename = "restingECG")]
    pub resting_ecg: Option<CategoricalInput>,
    #[serde(rename = "maxHR")]
    pub max_hr: Option<f64>,
    #[serde(rename = "exerciseAngina")]
    pub exercise_angina: Option<CategoricalInput>,
    #[serde(rename = "oldPeak")]
    pub old_peak: Option<f64>,
    #[serde(rename = "stSlope")]
    pub st_slope: Option<CategoricalInput>,
}

impl From<&PatientRecord> for PatientInput {
    fn from(record: &PatientRecord) -> Self {
        Self {
            sex: Some(i64::from(record.sex.code()).into()),
            age: Some(f64::from(record.age)),
            chest_pain_type: Some(i64::from(record.chest_pain_type.code()).into()),
            resting_bp: Some(record.resting_bp),
            cholesterol: Some(record.cholesterol),
            fasting_bs: Some(i64::from(record.fasting_bs.code()).into()),
            resting_ecg: Some(i64::from(record.resting_ecg.code()).into()),
            max_hr: Some(record.max_hr),
            exercise_angina: Some(i64::from(record.exercise_angina.code()).into()),
            old_peak: Some(record.old_peak),
            st_slope: Some(i64::from(record.st_slope.code()).into()),
        }
    }
}

/// Validates every field and builds the wire record. All offending fields are
/// reported together.
pub fn encode(input: &PatientInput) -> Result<PatientRecord, ValidationError> {
    let mut errors = Vec::new();

    let sex = categorical(&mut errors, Sex::FIELD, &input.sex, Sex::from_code, Sex::from_token);
    let age = numeric(&mut errors, "age", input.age, Some(AGE_MIN), Some(AGE_MAX))
        .and_then(|age| whole(&mut errors, "age", age));
    let chest_pain_type = categorical(
        &mut errors,
        ChestPainType::FIELD,
        &input.chest_pain_type,
        ChestPainType::from_code,
        ChestPainType::from_token,
    );
    let resting_bp = numeric(&mut errors, "restingBP", input.resting_bp, Some(0.0), None);
    let cholesterol = numeric(&mut errors, "cholesterol", input.cholesterol, Some(0.0), None);
    let fasting_bs = categorical(
        &mut errors,
        FastingBs::FIELD,
        &input.fasting_bs,
        FastingBs::from_code,
        FastingBs::from_token,
    );
    let resting_ecg = categorical(
        &mut errors,
        RestingEcg::FIELD,
        &input.resting_ecg,
        RestingEcg::from_code,
        RestingEcg::from_token,
    );
    let max_hr = numeric(&mut errors, "maxHR", input.max_hr, Some(MAX_HR_MIN), Some(MAX_HR_MAX));
    let exercise_angina = categorical(
        &mut errors,
        ExerciseAngina::FIELD,
        &input.exercise_angina,
        ExerciseAngina::from_code,
        ExerciseAngina::from_token,
    );
    let old_peak = numeric(
        &mut errors,
        "oldPeak",
        input.old_peak,
        Some(OLD_PEAK_MIN),
        Some(OLD_PEAK_MAX),
    );
    let st_slope = categorical(
        &mut errors,
        StSlope::FIELD,
        &input.st_slope,
        StSlope::from_code,
        StSlope::from_token,
    );

    match (
        sex,
        age,
        chest_pain_type,
        resting_bp,
        cholesterol,
        fasting_bs,
        resting_ecg,
        max_hr,
        exercise_angina,
        old_peak,
        st_slope,
    ) {
        (
            Some(sex),
            Some(age),
            Some(chest_pain_type),
            Some(resting_bp),
            Some(cholesterol),
            Some(fasting_bs),
            Some(resting_ecg),
            Some(max_hr),
            Some(exercise_angina),
            Some(old_peak),
            Some(st_slope),
        ) if errors.is_empty() => Ok(PatientRecord {
            sex,
            age,
            chest_pain_type,
            resting_bp,
            cholesterol,
            fasting_bs,
            resting_ecg,
            max_hr,
            exercise_angina,
            old_peak,
            st_slope,
        }),
        _ => Err(ValidationError::new(errors)),
    }
}

fn categorical<T>(
    errors: &mut Vec<FieldError>,
    field: &'static str,
    value: &Option<CategoricalInput>,
    from_code: impl Fn(i64) -> Option<T>,
    from_token: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    let result = match value {
        None => Err(FieldError::Missing { field }),
        Some(CategoricalInput::Code(code)) => from_code(*code).ok_or(FieldError::UnknownCode {
            field,
            code: *code,
        }),
        Some(CategoricalInput::Number(value)) if !value.is_finite() => {
            Err(FieldError::NotFinite { field })
        }
        Some(CategoricalInput::Number(value)) if value.fract() != 0.0 => {
            Err(FieldError::NotWhole { field, value: *value })
        }
        Some(CategoricalInput::Number(value)) => {
            let code = *value as i64;
            from_code(code).ok_or(FieldError::UnknownCode { field, code })
        }
        Some(CategoricalInput::Token(token)) => from_token(token).ok_or_else(|| FieldError::UnknownToken {
            field,
            token: token.clone(),
        }),
    };
    record(errors, result)
}

fn numeric(
    errors: &mut Vec<FieldError>,
    field: &'static str,
    value: Option<f64>,
    min: Option<f64>,
    max: Option<f64>,
) -> Option<f64> {
    let result = match value {
        None => Err(FieldError::Missing { field }),
        Some(value) if !value.is_finite() => Err(FieldError::NotFinite { field }),
        Some(value) if min.is_some_and(|min| value < min) => Err(FieldError::BelowMinimum {
            field,
            min: min.unwrap_or_default(),
        }),
        Some(value) if max.is_some_and(|max| value > max) => Err(FieldError::AboveMaximum {
            field,
            max: max.unwrap_or_default(),
        }),
        Some(value) => Ok(value),
    };
    record(errors, result)
}

fn whole(errors: &mut Vec<FieldError>, field: &'static str, value: f64) -> Option<u16> {
    if value.fract() == 0.0 {
        // bounds were checked before, so the cast is lossless
        Some(value as u16)
    } else {
        record(errors, Err(FieldError::NotWhole { field, value }))
    }
}

fn record<T>(errors: &mut Vec<FieldError>, result: Result<T, FieldError>) -> Option<T> {
    result.map_err(|error| errors.push(error)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_input() -> PatientInput {
        PatientInput {
            sex: Some("1".into()),
            age: Some(50.0),
            chest_pain_type: Some("2".into()),
            resting_bp: Some(95.0),
            cholesterol: Some(95.0),
            fasting_bs: Some("1".into()),
            resting_ecg: Some("1".into()),
            max_hr: Some(100.0),
            exercise_angina: Some("1".into()),
            old_peak: Some(0.6),
            st_slope: Some("2".into()),
        }
    }

    #[test]
    fn encodes_form_selections_to_codes() {
        let record = encode(&valid_input()).unwrap();
        assert_eq!(record.sex, Sex::Male);
        assert_eq!(record.age, 50);
        assert_eq!(record.chest_pain_type, ChestPainType::NonAnginalPain);
        assert_eq!(record.fasting_bs, FastingBs::High);
        assert_eq!(record.resting_ecg, RestingEcg::Normal);
        assert_eq!(record.exercise_angina, ExerciseAngina::Yes);
        assert_eq!(record.st_slope, StSlope::Up);
        assert_eq!(record.old_peak, 0.6);
    }

    #[test]
    fn zero_codes_and_values_are_not_missing() {
        let input = PatientInput {
            sex: Some(0.into()),
            chest_pain_type: Some(0.into()),
            fasting_bs: Some(0.into()),
            resting_ecg: Some(0.into()),
            exercise_angina: Some("0".into()),
            st_slope: Some(0.into()),
            resting_bp: Some(0.0),
            cholesterol: Some(0.0),
            old_peak: Some(0.0),
            ..valid_input()
        };
        let record = encode(&input).unwrap();
        assert_eq!(record.sex, Sex::Female);
        assert_eq!(record.chest_pain_type, ChestPainType::Asymptomatic);
        assert_eq!(record.fasting_bs, FastingBs::Normal);
        assert_eq!(record.resting_ecg, RestingEcg::Lvh);
        assert_eq!(record.exercise_angina, ExerciseAngina::No);
        assert_eq!(record.st_slope, StSlope::Down);
        assert_eq!(record.cholesterol, 0.0);
    }

    #[test]
    fn dataset_labels_are_accepted() {
        let input = PatientInput {
            sex: Some("F".into()),
            chest_pain_type: Some("ATA".into()),
            resting_ecg: Some("ST".into()),
            exercise_angina: Some("N".into()),
            st_slope: Some("flat".into()),
            ..valid_input()
        };
        let record = encode(&input).unwrap();
        assert_eq!(record.chest_pain_type.code(), 1);
        assert_eq!(record.resting_ecg.code(), 2);
        assert_eq!(record.st_slope.code(), 1);
    }

    #[test]
    fn bounds_name_the_offending_field() {
        let cases = [
            (PatientInput { age: Some(17.0), ..valid_input() }, "age", "age below minimum 18"),
            (PatientInput { age: Some(121.0), ..valid_input() }, "age", "age above maximum 120"),
            (PatientInput { max_hr: Some(59.0), ..valid_input() }, "maxHR", "maxHR below minimum 60"),
            (PatientInput { max_hr: Some(203.0), ..valid_input() }, "maxHR", "maxHR above maximum 202"),
            (PatientInput { old_peak: Some(3.1), ..valid_input() }, "oldPeak", "oldPeak above maximum 3"),
            (PatientInput { old_peak: Some(-0.1), ..valid_input() }, "oldPeak", "oldPeak below minimum 0"),
            (
                PatientInput { cholesterol: Some(-1.0), ..valid_input() },
                "cholesterol",
                "cholesterol below minimum 0",
            ),
            (
                PatientInput { resting_bp: Some(-5.0), ..valid_input() },
                "restingBP",
                "restingBP below minimum 0",
            ),
        ];
        for (input, field, message) in cases {
            let err = encode(&input).unwrap_err();
            assert_eq!(err.fields(), vec![field]);
            assert_eq!(err.to_string(), message);
        }
    }

    #[test]
    fn bounds_are_inclusive() {
        let input = PatientInput {
            age: Some(18.0),
            max_hr: Some(202.0),
            old_peak: Some(3.0),
            ..valid_input()
        };
        assert!(encode(&input).is_ok());
        let input = PatientInput {
            age: Some(120.0),
            max_hr: Some(60.0),
            ..valid_input()
        };
        assert!(encode(&input).is_ok());
    }

    #[test]
    fn resting_bp_has_no_upper_bound() {
        let input = PatientInput { resting_bp: Some(400.0), ..valid_input() };
        assert_eq!(encode(&input).unwrap().resting_bp, 400.0);
    }

    #[test]
    fn reports_all_problems_at_once() {
        let input = PatientInput {
            sex: None,
            age: Some(50.5),
            chest_pain_type: Some(4.into()),
            st_slope: Some("Sideways".into()),
            max_hr: Some(f64::NAN),
            ..valid_input()
        };
        let err = encode(&input).unwrap_err();
        assert_eq!(err.fields(), vec!["sex", "age", "chestPainType", "maxHR", "stSlope"]);
        assert_eq!(err.error_for("sex"), Some(&FieldError::Missing { field: "sex" }));
        assert_eq!(
            err.error_for("chestPainType"),
            Some(&FieldError::UnknownCode { field: "chestPainType", code: 4 })
        );
        assert_eq!(
            err.error_for("stSlope"),
            Some(&FieldError::UnknownToken { field: "stSlope", token: "Sideways".into() })
        );
    }

    #[test]
    fn empty_input_reports_every_field_missing() {
        let err = encode(&PatientInput::default()).unwrap_err();
        assert_eq!(err.errors().len(), 11);
        assert!(err
            .errors()
            .iter()
            .all(|error| matches!(error, FieldError::Missing { .. })));
    }

    #[test]
    fn input_accepts_numbers_and_strings_from_json() {
        let input: PatientInput = serde_json::from_value(serde_json::json!({
            "sex": 0, "age": 61, "chestPainType": "TA", "restingBP": 140,
            "cholesterol": 0, "fastingBS": "0", "restingECG": 0, "maxHR": 120,
            "exerciseAngina": "Y", "oldPeak": 0, "stSlope": "1"
        }))
        .unwrap();
        let record = encode(&input).unwrap();
        assert_eq!(record.sex, Sex::Female);
        assert_eq!(record.chest_pain_type, ChestPainType::TypicalAngina);
        assert_eq!(record.resting_ecg, RestingEcg::Lvh);
        assert_eq!(record.old_peak, 0.0);
    }

    #[test]
    fn whole_floats_are_category_codes() {
        let mut body = serde_json::to_value(PatientInput::from(&encode(&valid_input()).unwrap())).unwrap();
        body["sex"] = serde_json::json!(1.0);
        body["stSlope"] = serde_json::json!(0.0);
        let input: PatientInput = serde_json::from_value(body.clone()).unwrap();
        assert_eq!(input.sex, Some(CategoricalInput::Number(1.0)));
        let record = encode(&input).unwrap();
        assert_eq!(record.sex, Sex::Male);
        assert_eq!(record.st_slope, StSlope::Down);

        body["sex"] = serde_json::json!(0.5);
        body["restingECG"] = serde_json::json!(7.0);
        let input: PatientInput = serde_json::from_value(body).unwrap();
        let err = encode(&input).unwrap_err();
        assert_eq!(err.fields(), vec!["sex", "restingECG"]);
        assert_eq!(
            err.error_for("sex"),
            Some(&FieldError::NotWhole { field: "sex", value: 0.5 })
        );
        assert_eq!(
            err.error_for("restingECG"),
            Some(&FieldError::UnknownCode { field: "restingECG", code: 7 })
        );
    }

    #[test]
    fn record_converts_back_to_equal_input() {
        let record = encode(&valid_input()).unwrap();
        assert_eq!(encode(&PatientInput::from(&record)).unwrap(), record);
    }
}
