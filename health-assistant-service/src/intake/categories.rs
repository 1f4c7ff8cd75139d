use serde::{Deserialize, Deserializer, Serialize};

/// Medical specialty an intake conversation is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MedicalCategory {
    Gastro,
    Respiratory,
    Cardio,
    Neuro,
    Ortho,
    Derm,
    Ent,
    Endocrine,
    Urology,
    Gynecology,
    Ophthalmo,
    Dental,
    General,
}

#[derive(Debug)]
pub struct CategoryProfile {
    pub category: MedicalCategory,
    pub name: &'static str,
    pub specialist: &'static str,
    pub keywords: &'static [&'static str],
}

/// Declaration order doubles as the tie-break when two categories score the same.
pub static CATEGORIES: [CategoryProfile; 13] = [
    CategoryProfile {
        category: MedicalCategory::Gastro,
        name: "Gastroenterology",
        specialist: "Gastroenterologist",
        keywords: &[
            "stomach", "nausea", "vomiting", "diarrhea", "constipation", "abdominal pain",
            "heartburn", "indigestion", "bloating", "gas", "bowel",
        ],
    },
    CategoryProfile {
        category: MedicalCategory::Respiratory,
        name: "Respiratory",
        specialist: "Pulmonologist",
        keywords: &[
            "chest pain", "breathing", "shortness of breath", "cough", "wheezing", "lung",
            "respiratory",
        ],
    },
    CategoryProfile {
        category: MedicalCategory::Cardio,
        name: "Cardiology",
        specialist: "Cardiologist",
        keywords: &[
            "heart", "palpitation", "chest pain", "hypertension", "blood pressure", "cholesterol",
            "arrhythmia",
        ],
    },
    CategoryProfile {
        category: MedicalCategory::Neuro,
        name: "Neurology",
        specialist: "Neurologist",
        keywords: &[
            "headache", "migraine", "seizure", "dizziness", "tremor", "memory", "numbness",
            "tingling", "brain",
        ],
    },
    CategoryProfile {
        category: MedicalCategory::Ortho,
        name: "Orthopedics",
        specialist: "Orthopedic surgeon",
        keywords: &[
            "joint", "bone", "muscle", "back pain", "neck pain", "fracture", "sprain", "arthritis",
        ],
    },
    CategoryProfile {
        category: MedicalCategory::Derm,
        name: "Dermatology",
        specialist: "Dermatologist",
        keywords: &[
            "skin", "rash", "acne", "eczema", "psoriasis", "mole", "itching", "hair loss",
        ],
    },
    CategoryProfile {
        category: MedicalCategory::Ent,
        name: "Ear, Nose & Throat",
        specialist: "ENT specialist",
        keywords: &[
            "ear", "nose", "throat", "sinus", "hearing", "voice", "tonsil", "snoring",
        ],
    },
    CategoryProfile {
        category: MedicalCategory::Endocrine,
        name: "Endocrinology",
        specialist: "Endocrinologist",
        keywords: &[
            "diabetes", "thyroid", "hormone", "weight gain", "weight loss", "fatigue", "thirst",
        ],
    },
    CategoryProfile {
        category: MedicalCategory::Urology,
        name: "Urology",
        specialist: "Urologist",
        keywords: &[
            "urination", "kidney", "bladder", "prostate", "urine", "erectile", "testicular",
        ],
    },
    CategoryProfile {
        category: MedicalCategory::Gynecology,
        name: "Gynecology",
        specialist: "Gynecologist",
        keywords: &[
            "menstrual", "period", "pelvic pain", "vaginal", "ovarian", "uterus", "pregnancy",
        ],
    },
    CategoryProfile {
        category: MedicalCategory::Ophthalmo,
        name: "Ophthalmology",
        specialist: "Ophthalmologist",
        keywords: &["eye", "vision", "blurry", "glaucoma", "cataract"],
    },
    CategoryProfile {
        category: MedicalCategory::Dental,
        name: "Dentistry",
        specialist: "Dentist",
        keywords: &[
            "tooth", "teeth", "gum", "jaw", "cavity", "toothache", "dental pain", "mouth",
            "tongue", "bad breath", "bleeding gums", "sensitive teeth", "wisdom tooth",
        ],
    },
    CategoryProfile {
        category: MedicalCategory::General,
        name: "General Medicine",
        specialist: "Primary care physician",
        keywords: &["fever", "flu", "cold", "fatigue", "pain", "infection", "general"],
    },
];

impl MedicalCategory {
    pub fn profile(self) -> &'static CategoryProfile {
        CATEGORIES
            .iter()
            .find(|profile| profile.category == self)
            .unwrap_or(&CATEGORIES[CATEGORIES.len() - 1])
    }

    pub fn name(self) -> &'static str {
        self.profile().name
    }

    pub fn specialist(self) -> &'static str {
        self.profile().specialist
    }

    /// Clarifying question asked before the diagnosis, for the categories that have one.
    pub fn follow_up_question(self) -> Option<&'static str> {
        match self {
            MedicalCategory::Gastro => {
                Some("Do your symptoms improve or worsen after eating? (Improve/Worsen/Neither)")
            }
            MedicalCategory::Respiratory | MedicalCategory::Cardio => {
                Some("Do your symptoms worsen with physical activity? (Yes/No)")
            }
            MedicalCategory::Neuro => Some(
                "Do your symptoms include any changes in vision, hearing, or sense of touch? (Yes/No)",
            ),
            MedicalCategory::Derm => Some(
                "Is there any itching, pain, or discomfort associated with your skin condition? (Yes/No)",
            ),
            _ => None,
        }
    }
}

/// Number of the category's keywords found in `lowered` (already lower-cased).
fn keyword_hits(profile: &CategoryProfile, lowered: &str) -> usize {
    profile
        .keywords
        .iter()
        .filter(|keyword| lowered.contains(*keyword))
        .count()
}

/// Pick the category whose keywords appear most often in a free-text symptom description.
///
/// Matching is plain case-insensitive substring search. Ties go to the category
/// declared first; no match at all falls back to general medicine.
pub fn determine_category(symptoms: &str) -> &'static CategoryProfile {
    let lowered = symptoms.to_lowercase();

    let mut best: Option<(&'static CategoryProfile, usize)> = None;
    for profile in &CATEGORIES {
        let hits = keyword_hits(profile, &lowered);
        if hits > best.map_or(0, |(_, top)| top) {
            best = Some((profile, hits));
        }
    }

    best.map_or_else(|| MedicalCategory::General.profile(), |(profile, _)| profile)
}

/// Reads a category key, treating `""` and `null` as "not chosen yet".
pub fn optional_category<'de, D>(deserializer: D) -> Result<Option<MedicalCategory>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(key) => MedicalCategory::deserialize(serde::de::value::StrDeserializer::new(key)).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_falls_back_to_general() {
        assert_eq!(determine_category("").category, MedicalCategory::General);
        assert_eq!(
            determine_category("I just feel off").category,
            MedicalCategory::General
        );
    }

    #[test]
    fn most_keyword_hits_wins() {
        // respiratory: "chest pain" + "breathing"; cardiology: "chest pain"
        let profile = determine_category("chest pain and breathing trouble");
        assert_eq!(profile.category, MedicalCategory::Respiratory);
        assert_eq!(profile.specialist, "Pulmonologist");

        for _ in 0..5 {
            assert_eq!(
                determine_category("chest pain and breathing trouble").category,
                MedicalCategory::Respiratory
            );
        }
    }

    #[test]
    fn ties_go_to_declaration_order() {
        // one hit each for respiratory and cardiology; respiratory is declared first
        assert_eq!(
            determine_category("CHEST PAIN").category,
            MedicalCategory::Respiratory
        );
    }

    #[test]
    fn substring_matching_has_no_word_boundaries() {
        // "ear" inside "heart" scores for ENT as well as cardiology
        let lowered = "heart racing";
        assert_eq!(keyword_hits(MedicalCategory::Ent.profile(), lowered), 1);
        assert_eq!(keyword_hits(MedicalCategory::Cardio.profile(), lowered), 1);
        assert_eq!(determine_category(lowered).category, MedicalCategory::Cardio);
    }

    #[test]
    fn clarifying_questions_only_for_five_categories() {
        let with_question: Vec<_> = CATEGORIES
            .iter()
            .filter(|p| p.category.follow_up_question().is_some())
            .map(|p| p.category)
            .collect();
        assert_eq!(
            with_question,
            vec![
                MedicalCategory::Gastro,
                MedicalCategory::Respiratory,
                MedicalCategory::Cardio,
                MedicalCategory::Neuro,
                MedicalCategory::Derm,
            ]
        );
    }

    #[test]
    fn keys_serialize_in_screaming_case() {
        assert_eq!(
            serde_json::to_string(&MedicalCategory::Cardio).unwrap(),
            "\"CARDIO\""
        );
        assert_eq!(
            serde_json::from_str::<MedicalCategory>("\"OPHTHALMO\"").unwrap(),
            MedicalCategory::Ophthalmo
        );
    }
}
