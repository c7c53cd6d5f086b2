use crate::models::BmiCategory;

/// Rounds half away from zero to one decimal place.
pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Parses a form field as a finite number greater than zero.
pub fn parse_positive(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value > 0.0)
}

/// weight / (height in metres)^2, rounded to one decimal.
pub fn calculate_bmi(height_cm: f64, weight_kg: f64) -> Option<f64> {
    if !(height_cm.is_finite() && weight_kg.is_finite()) || height_cm <= 0.0 || weight_kg <= 0.0 {
        return None;
    }
    let height_m = height_cm / 100.0;
    let bmi = round_to_tenth(weight_kg / (height_m * height_m));
    bmi.is_finite().then_some(bmi)
}

/// BMI as the form shows it, or empty when either input is unusable.
pub fn bmi_text(height: &str, weight: &str) -> String {
    match (parse_positive(height), parse_positive(weight)) {
        (Some(h), Some(w)) => calculate_bmi(h, w).map(format_bmi).unwrap_or_default(),
        _ => String::new(),
    }
}

pub fn format_bmi(bmi: f64) -> String {
    format!("{:.1}", round_to_tenth(bmi))
}

impl BmiCategory {
    /// Half-open bands: [0, 18.5), [18.5, 25), [25, 30), [30, inf).
    pub fn from_bmi(bmi: f64) -> BmiCategory {
        if bmi < 18.5 {
            BmiCategory::Underweight
        } else if bmi < 25.0 {
            BmiCategory::Normal
        } else if bmi < 30.0 {
            BmiCategory::Overweight
        } else {
            BmiCategory::Obese
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_bmi() {
        assert_eq!(calculate_bmi(175.0, 70.0), Some(22.9));
        assert_eq!(calculate_bmi(160.0, 90.0), Some(35.2));
        assert_eq!(calculate_bmi(0.0, 70.0), None);
        assert_eq!(calculate_bmi(175.0, -1.0), None);
        assert_eq!(calculate_bmi(f64::NAN, 70.0), None);
    }

    #[test]
    fn test_bmi_text() {
        assert_eq!(bmi_text("175", "70"), "22.9");
        assert_eq!(bmi_text("200", "80"), "20.0");
        assert_eq!(bmi_text("175", ""), "");
        assert_eq!(bmi_text("abc", "70"), "");
        assert_eq!(bmi_text("0", "70"), "");
    }

    #[test]
    fn test_category_boundaries() {
        assert_eq!(BmiCategory::from_bmi(18.4), BmiCategory::Underweight);
        assert_eq!(BmiCategory::from_bmi(18.5), BmiCategory::Normal);
        assert_eq!(BmiCategory::from_bmi(24.9), BmiCategory::Normal);
        assert_eq!(BmiCategory::from_bmi(24.95), BmiCategory::Normal);
        assert_eq!(BmiCategory::from_bmi(25.0), BmiCategory::Overweight);
        assert_eq!(BmiCategory::from_bmi(29.99), BmiCategory::Overweight);
        assert_eq!(BmiCategory::from_bmi(30.0), BmiCategory::Obese);
        assert_eq!(BmiCategory::Obese.label(), "Obese");
    }

    #[test]
    fn test_parse_positive() {
        assert_eq!(parse_positive(" 72.5 "), Some(72.5));
        assert_eq!(parse_positive("0"), None);
        assert_eq!(parse_positive("-3"), None);
        assert_eq!(parse_positive("inf"), None);
        assert_eq!(parse_positive(""), None);
    }
}
