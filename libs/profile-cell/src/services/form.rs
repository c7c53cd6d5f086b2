use crate::models::{BmiCategory, ClinicalEdit, ClinicalForm, ClinicalParameters, FieldEdit, ProfileForm, NOT_AVAILABLE};
use crate::services::bmi::{bmi_text, parse_positive};

impl ProfileForm {
    /// Applies one edit. The last edit decides the body measure: a non-empty
    /// BMI clears height and weight, and touching height or weight replaces
    /// the BMI with the derived value (or empties it).
    pub fn apply(&mut self, edit: FieldEdit) {
        match edit {
            FieldEdit::Name(value) => self.name = value,
            FieldEdit::Age(value) => self.age = value,
            FieldEdit::Gender(value) => self.gender = value,
            FieldEdit::Bmi(value) => {
                if !value.trim().is_empty() {
                    self.height.clear();
                    self.weight.clear();
                }
                self.bmi = value;
            }
            FieldEdit::Height(value) => {
                self.height = value;
                self.bmi = self.derived_bmi_text();
            }
            FieldEdit::Weight(value) => {
                self.weight = value;
                self.bmi = self.derived_bmi_text();
            }
        }
    }

    pub fn applied(mut self, edit: FieldEdit) -> Self {
        self.apply(edit);
        self
    }

    fn derived_bmi_text(&self) -> String {
        if self.height.trim().is_empty() || self.weight.trim().is_empty() {
            return String::new();
        }
        bmi_text(&self.height, &self.weight)
    }

    /// Category of whatever BMI the form currently holds.
    pub fn bmi_category(&self) -> Option<BmiCategory> {
        parse_positive(&self.bmi).map(BmiCategory::from_bmi)
    }

    pub fn reset(&mut self) {
        *self = ProfileForm::default();
    }
}

impl ClinicalForm {
    pub fn apply(&mut self, edit: ClinicalEdit) {
        match edit {
            ClinicalEdit::Nfatc3(value) => self.nfatc3 = value,
            ClinicalEdit::Dm(value) => self.dm = value,
            ClinicalEdit::ProBnp(value) => self.pro_bnp = value,
            ClinicalEdit::Ef(value) => self.ef = value,
            ClinicalEdit::Gls(value) => self.gls = value,
        }
    }

    /// Parameters as submitted: blank fields become "Not Available".
    pub fn to_parameters(&self) -> ClinicalParameters {
        ClinicalParameters {
            nfatc3: or_not_available(&self.nfatc3),
            dm: or_not_available(&self.dm),
            pro_bnp: or_not_available(&self.pro_bnp),
            ef: or_not_available(&self.ef),
            gls: or_not_available(&self.gls),
        }
    }

    pub fn reset(&mut self) {
        *self = ClinicalForm::default();
    }
}

fn or_not_available(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        value.to_string()
    }
}
