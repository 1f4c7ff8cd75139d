//! Static emergency-care guides.

use serde::Serialize;

pub const EMERGENCY_NUMBER: &str = "108";

const REMINDER: &str =
    "This is a guide only. Always call emergency services (108 in India) in case of emergency.";

#[derive(Debug, Clone, Serialize)]
pub struct GuideStep {
    pub title: &'static str,
    pub instruction: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tip: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuideSection {
    pub heading: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<GuideStep>,
    /// Unordered points, such as symptom lists
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub points: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyGuide {
    pub id: &'static str,
    pub title: &'static str,
    pub sections: Vec<GuideSection>,
    pub reminder: &'static str,
    pub emergency_number: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct GuideSummary {
    pub id: &'static str,
    pub title: &'static str,
}

fn step(title: &'static str, instruction: &'static str, tip: Option<&'static str>) -> GuideStep {
    GuideStep {
        title,
        instruction,
        tip,
    }
}

fn steps_section(heading: &'static str, steps: Vec<GuideStep>) -> GuideSection {
    GuideSection {
        heading,
        steps,
        points: Vec::new(),
    }
}

fn points_section(heading: &'static str, points: Vec<&'static str>) -> GuideSection {
    GuideSection {
        heading,
        steps: Vec::new(),
        points,
    }
}

fn guide(id: &'static str, title: &'static str, sections: Vec<GuideSection>) -> EmergencyGuide {
    EmergencyGuide {
        id,
        title,
        sections,
        reminder: REMINDER,
        emergency_number: EMERGENCY_NUMBER,
    }
}

fn cpr() -> EmergencyGuide {
    guide(
        "cpr",
        "CPR Guide",
        vec![steps_section(
            "Cardiopulmonary Resuscitation",
            vec![
                step(
                    "Check Responsiveness",
                    "Tap the person's shoulder and shout 'Are you OK?'. Check for breathing and signs of life.",
                    Some("Look for chest rise, listen for breath, feel for air from mouth and nose."),
                ),
                step(
                    "Call Emergency Services",
                    "If the person is unresponsive, call emergency services (108 in India) or ask someone else to call while you begin CPR.",
                    Some("Put your phone on speaker mode so you can follow emergency dispatcher instructions."),
                ),
                step(
                    "Position the Person",
                    "Place the person on their back on a firm, flat surface. Kneel beside them at chest level.",
                    Some("Remove bulky clothing that may interfere with chest compressions."),
                ),
                step(
                    "Hand Position",
                    "Place the heel of one hand on the center of the chest (lower half of sternum), place your other hand on top and interlace your fingers.",
                    Some("Keep your shoulders directly over your hands with arms straight."),
                ),
                step(
                    "Perform Compressions",
                    "Push hard and fast in the center of the chest. Aim for a depth of at least 2 inches (5 cm) at a rate of 100-120 compressions per minute.",
                    Some("Allow the chest to completely recoil between compressions."),
                ),
                step(
                    "Airway & Breathing",
                    "After 30 compressions, tilt the head back, lift the chin, pinch the nose and give 2 rescue breaths.",
                    Some("Each breath should last about 1 second and make the chest rise visibly."),
                ),
                step(
                    "Continue CPR",
                    "Repeat cycles of 30 chest compressions followed by 2 rescue breaths until help arrives or the person shows signs of life.",
                    Some("If you're unable or unwilling to give rescue breaths, continue with chest compressions only."),
                ),
                step(
                    "AED Use (If Available)",
                    "If an Automated External Defibrillator (AED) becomes available, turn it on and follow the voice prompts.",
                    Some("Minimize interruptions to CPR when using the AED."),
                ),
            ],
        )],
    )
}

fn first_aid() -> EmergencyGuide {
    guide(
        "first-aid",
        "Bleeding and Choking First Aid",
        vec![
            steps_section(
                "Severe Bleeding",
                vec![
                    step(
                        "Apply direct pressure",
                        "Use a clean cloth or bandage and press firmly on the wound. If blood soaks through, add another cloth on top without removing the first one.",
                        None,
                    ),
                    step(
                        "Elevate the wound",
                        "If possible, raise the injured area above the level of the heart to help reduce blood flow.",
                        None,
                    ),
                    step(
                        "Apply a tourniquet only as a last resort",
                        "For life-threatening limb bleeding that won't stop, apply a tourniquet 2-3 inches above the wound (not on a joint). Note the time of application.",
                        None,
                    ),
                    step(
                        "Seek immediate medical attention",
                        "Call emergency services (108 in India) or get to a hospital immediately.",
                        None,
                    ),
                ],
            ),
            steps_section(
                "Choking: For a Conscious Adult or Child",
                vec![
                    step(
                        "Ask \"Are you choking?\"",
                        "If the person cannot speak, cough, or breathe, proceed with the Heimlich maneuver.",
                        None,
                    ),
                    step(
                        "Stand behind the person",
                        "Wrap your arms around their waist. Lean the person slightly forward.",
                        None,
                    ),
                    step(
                        "Make a fist",
                        "Place your fist just above the person's navel (belly button), thumb side in.",
                        None,
                    ),
                    step(
                        "Perform abdominal thrusts",
                        "Grasp your fist with your other hand and press inward and upward with quick, forceful thrusts.",
                        None,
                    ),
                    step(
                        "Repeat until object is expelled",
                        "Continue thrusts until the object is dislodged or the person becomes unconscious.",
                        None,
                    ),
                ],
            ),
            steps_section(
                "Choking: If the Person Becomes Unconscious",
                vec![
                    step("Lower the person to the ground", "Carefully place them on their back.", None),
                    step(
                        "Call emergency services",
                        "Call emergency services (108 in India).",
                        None,
                    ),
                    step(
                        "Begin CPR",
                        "Start with chest compressions rather than rescue breaths.",
                        None,
                    ),
                    step(
                        "Check the mouth",
                        "Before giving breaths, look in the mouth. If you can see the object, remove it.",
                        None,
                    ),
                ],
            ),
        ],
    )
}

fn allergic_reaction() -> EmergencyGuide {
    guide(
        "allergic-reaction",
        "Allergic Reaction Emergency Guide",
        vec![
            points_section(
                "Recognizing a Severe Allergic Reaction (Anaphylaxis)",
                vec![
                    "Swelling of face, lips, tongue, or throat",
                    "Difficulty breathing or wheezing",
                    "Rapid, weak pulse",
                    "Skin rash, hives, or itching",
                    "Nausea, vomiting, or diarrhea",
                    "Dizziness, fainting, or loss of consciousness",
                    "Anaphylaxis is a medical emergency! Call emergency services (108 in India) immediately if you suspect someone is having a severe allergic reaction.",
                ],
            ),
            steps_section(
                "Using an EpiPen (Epinephrine Auto-Injector)",
                vec![
                    step(
                        "Remove the EpiPen from its carrier tube",
                        "Hold it in your dominant hand with the orange tip pointing downward. Do not put your thumb, fingers, or hand over the orange tip.",
                        None,
                    ),
                    step(
                        "Remove the blue safety cap",
                        "Pull it straight off. Don't bend or twist it.",
                        None,
                    ),
                    step(
                        "Administer the injection",
                        "Place the orange tip against the middle of the outer thigh at a right angle. Swing and push firmly until it clicks. Hold in place for 3 seconds.",
                        None,
                    ),
                    step(
                        "Remove the EpiPen and massage the injection site",
                        "Rub the area for 10 seconds to help with absorption.",
                        None,
                    ),
                    step(
                        "Seek immediate medical attention",
                        "Call emergency services (108 in India) if not already done. The effects of the EpiPen may wear off, and a second dose may be needed.",
                        None,
                    ),
                ],
            ),
            points_section(
                "Important Notes",
                vec![
                    "An EpiPen can inject through light clothing if necessary",
                    "The used EpiPen should be given to emergency responders",
                    "Always check the expiration date on your EpiPen",
                ],
            ),
        ],
    )
}

/// All guides, CPR first.
pub fn all_guides() -> Vec<EmergencyGuide> {
    vec![cpr(), first_aid(), allergic_reaction()]
}

pub fn summaries() -> Vec<GuideSummary> {
    all_guides()
        .into_iter()
        .map(|g| GuideSummary {
            id: g.id,
            title: g.title,
        })
        .collect()
}

pub fn find_guide(id: &str) -> Option<EmergencyGuide> {
    all_guides().into_iter().find(|g| g.id == id)
}
