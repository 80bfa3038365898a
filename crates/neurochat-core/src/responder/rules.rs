//! The CVST keyword rule table.
//!
//! Rules are matched in order; earlier rules shadow later ones for
//! overlapping keywords (a greeting that also asks a question gets the
//! greeting reply).

use super::Topic;

/// One keyword rule: any keyword substring-matches the lowercased
/// message.
pub struct Rule {
    pub keywords: &'static [&'static str],
    pub reply: &'static str,
    pub topic: Topic,
}

/// Reply for messages no rule matches.
pub const FALLBACK_REPLY: &str = "I'm sorry, I can only provide information about Cerebral Venous Sinus Thrombosis (CVST). Could you please ask a question related to CVST?";

pub const RULES: &[Rule] = &[
    Rule {
        keywords: &["hello", "hi", "good morning"],
        reply: "Hello! How can I assist you with CVST today? Ask me about symptoms, diagnosis, treatment, or risk factors.",
        topic: Topic::Overview,
    },
    Rule {
        keywords: &["what is cvst", "explain cvst", "define cvst"],
        reply: "Cerebral Venous Sinus Thrombosis (CVST) is a rare type of stroke where a blood clot forms in the brain\u{2019}s venous sinuses, blocking blood drainage and increasing brain pressure.",
        topic: Topic::Overview,
    },
    Rule {
        keywords: &["symptom", "feel like", "signs"],
        reply: "Common symptoms of CVST include severe headache (often worsening), vision problems, seizures, nausea, vomiting, and sometimes weakness or speech difficulties. Seek medical help if you suspect these.",
        topic: Topic::Clinical,
    },
    Rule {
        keywords: &["diagnos", "scan", "test"],
        reply: "CVST is typically diagnosed using brain imaging like MRI with MR venography (MRV) or CT venography (CTV) to visualize the clots. Blood tests might check for underlying conditions.",
        topic: Topic::Clinical,
    },
    Rule {
        keywords: &["treat", "medic", "cure", "help"],
        reply: "Treatment usually involves anticoagulant medications (blood thinners) like heparin or warfarin. Sometimes, clot-dissolving drugs (thrombolysis) or surgical clot removal (thrombectomy) are needed.",
        topic: Topic::Medication,
    },
    Rule {
        keywords: &["cause", "risk factor", "get cvst"],
        reply: "Risk factors include pregnancy, hormonal contraceptives, dehydration, infections, head trauma, clotting disorders, and certain autoimmune diseases.",
        topic: Topic::General,
    },
    Rule {
        keywords: &["prevent", "avoid"],
        reply: "Prevention focuses on managing risk factors: careful use of hormones, staying hydrated, treating infections promptly, and managing clotting disorders. Discuss specific risks with your doctor.",
        topic: Topic::General,
    },
    Rule {
        keywords: &["long term", "outlook", "prognosis"],
        reply: "With prompt treatment, many patients recover well from CVST. Some may need long-term anticoagulation. Recovery depends on the severity and speed of treatment.",
        topic: Topic::Overview,
    },
    Rule {
        keywords: &["thank", "thanks"],
        reply: "You're welcome! If you have more questions about CVST, feel free to ask. Remember, this is not medical advice; consult a healthcare professional for personal concerns.",
        topic: Topic::Overview,
    },
];
