//! Rule-based CVST responder.
//!
//! A pure, deterministic keyword lookup: the user's message is lowercased
//! and matched against an ordered substring rule table; the first rule
//! that matches wins. No I/O, no inference.

pub mod rules;

use self::rules::{FALLBACK_REPLY, RULES};

/// Render-hint category for a message, derived from its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    /// Definition, outlook and greeting material.
    Overview,
    /// Symptoms and diagnostics.
    Clinical,
    /// Treatment and medication.
    Medication,
    /// Risk factors, prevention and fallback guidance.
    General,
    /// Error notices.
    Error,
}

impl Topic {
    /// Classifies arbitrary message text for display purposes.
    ///
    /// Branches are checked in a fixed order so overlapping keywords
    /// resolve deterministically.
    pub fn for_text(text: &str) -> Topic {
        let lower = text.to_lowercase();
        let has = |keys: &[&str]| keys.iter().any(|k| lower.contains(k));

        if has(&["symptom", "feel like", "signs"]) {
            Topic::Clinical
        } else if has(&["diagnos", "scan", "test", "mri", "ctv"]) {
            Topic::Clinical
        } else if has(&["treat", "medic", "heparin", "warfarin", "pill", "help", "cure"]) {
            Topic::Medication
        } else if has(&["what is cvst", "explain cvst", "define cvst", "outlook", "prognosis"]) {
            Topic::Overview
        } else if has(&[
            "cause",
            "risk factor",
            "prevent",
            "avoid",
            "get cvst",
            "sorry",
            "only provide information",
        ]) {
            Topic::General
        } else if has(&["error"]) {
            Topic::Error
        } else if has(&["hello", "hi", "welcome"]) {
            Topic::Overview
        } else {
            Topic::General
        }
    }
}

/// A canned reply produced by [`respond`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotReply {
    /// The reply text.
    pub text: &'static str,
    /// Render-hint category of the reply.
    pub topic: Topic,
}

/// Produces the canned reply for a user message.
///
/// The message is matched case-insensitively against the rule table in
/// order; an unmatched message gets the fallback reply redirecting the
/// user to CVST topics.
pub fn respond(message: &str) -> BotReply {
    let lower = message.to_lowercase();
    for rule in RULES {
        if rule.keywords.iter().any(|k| lower.contains(k)) {
            return BotReply {
                text: rule.reply,
                topic: rule.topic,
            };
        }
    }
    BotReply {
        text: FALLBACK_REPLY,
        topic: Topic::General,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definition_question() {
        let reply = respond("What is CVST?");
        assert!(reply.text.contains("Cerebral Venous Sinus Thrombosis"));
        assert_eq!(reply.topic, Topic::Overview);
    }

    #[test]
    fn test_symptom_question() {
        let reply = respond("what does it feel like?");
        assert!(reply.text.contains("headache"));
        assert_eq!(reply.topic, Topic::Clinical);
    }

    #[test]
    fn test_treatment_question() {
        let reply = respond("how do doctors treat it");
        assert!(reply.text.contains("anticoagulant"));
        assert_eq!(reply.topic, Topic::Medication);
    }

    #[test]
    fn test_unrelated_message_gets_fallback() {
        let reply = respond("zzz qqq");
        assert!(reply.text.starts_with("I'm sorry"));
        assert_eq!(reply.topic, Topic::General);
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        assert_eq!(respond("SYMPTOMS please"), respond("symptoms please"));
    }

    #[test]
    fn test_first_matching_rule_wins() {
        // "hello" is checked before "what is cvst".
        let reply = respond("hello, what is cvst?");
        assert!(reply.text.starts_with("Hello!"));
    }

    #[test]
    fn test_topic_for_text_error() {
        assert_eq!(Topic::for_text("request failed with error 7"), Topic::Error);
    }

    #[test]
    fn test_topic_for_text_fallback_reply_is_general() {
        let reply = respond("zzz qqq");
        assert_eq!(Topic::for_text(reply.text), Topic::General);
    }
}
