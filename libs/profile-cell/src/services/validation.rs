use crate::error::ValidationError;
use crate::models::{BmiCategory, BodyMeasure, Gender, ProfileForm, ProfileInput};
use crate::services::bmi::{calculate_bmi, parse_positive, round_to_tenth};

/// Checks the form in order (name, age, gender, body measure) and stops at
/// the first failure. Height and weight win over a direct BMI when both
/// are usable.
pub fn validate(form: &ProfileForm) -> Result<ProfileInput, ValidationError> {
    let name = form.name.trim();
    if name.is_empty() {
        return Err(ValidationError::MissingName);
    }

    let age = parse_positive(&form.age).ok_or(ValidationError::InvalidAge)?;
    let gender = Gender::parse(&form.gender).ok_or(ValidationError::MissingGender)?;
    let measure = body_measure(form).ok_or(ValidationError::MissingMeasure)?;

    Ok(ProfileInput {
        name: name.to_string(),
        age,
        gender,
        measure,
    })
}

fn body_measure(form: &ProfileForm) -> Option<BodyMeasure> {
    let height = parse_positive(&form.height);
    let weight = parse_positive(&form.weight);
    if let (Some(height_cm), Some(weight_kg)) = (height, weight) {
        if calculate_bmi(height_cm, weight_kg).is_some() {
            return Some(BodyMeasure::HeightWeight { height_cm, weight_kg });
        }
    }

    parse_positive(&form.bmi).map(|bmi| BodyMeasure::Direct { bmi })
}

impl BodyMeasure {
    /// The BMI submitted with this measure, one decimal place.
    pub fn bmi(&self) -> f64 {
        match *self {
            BodyMeasure::HeightWeight { height_cm, weight_kg } => {
                calculate_bmi(height_cm, weight_kg).unwrap_or_default()
            }
            BodyMeasure::Direct { bmi } => round_to_tenth(bmi),
        }
    }

    pub fn height_cm(&self) -> Option<f64> {
        match *self {
            BodyMeasure::HeightWeight { height_cm, .. } => Some(height_cm),
            BodyMeasure::Direct { .. } => None,
        }
    }

    pub fn weight_kg(&self) -> Option<f64> {
        match *self {
            BodyMeasure::HeightWeight { weight_kg, .. } => Some(weight_kg),
            BodyMeasure::Direct { .. } => None,
        }
    }
}

impl ProfileInput {
    pub fn bmi(&self) -> f64 {
        self.measure.bmi()
    }

    pub fn bmi_category(&self) -> BmiCategory {
        BmiCategory::from_bmi(self.bmi())
    }
}
