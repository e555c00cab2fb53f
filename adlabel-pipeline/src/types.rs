use adlabel_llm::completion::TokenUsage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Outcome of classifying one ad: the three model answers plus two failure
/// markers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Label {
    Presidential,
    Other,
    Unsure,
    /// The model answered, but not with one of the three labels.
    InvalidResponse,
    /// No usable answer: request failure, malformed body or a crashed record.
    Error,
}

impl Label {
    pub const ALL: [Label; 5] = [
        Label::Presidential,
        Label::Other,
        Label::Unsure,
        Label::InvalidResponse,
        Label::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Presidential => "Presidential",
            Label::Other => "Other",
            Label::Unsure => "Unsure",
            Label::InvalidResponse => "InvalidResponse",
            Label::Error => "Error",
        }
    }

    /// Map model output to a label. Only an exact (whitespace-trimmed) match
    /// of one of the three answers counts.
    ///
    /// ```
    /// use adlabel_pipeline::Label;
    ///
    /// assert_eq!(Label::from_response(" Presidential\n"), Label::Presidential);
    /// assert_eq!(Label::from_response("presidential"), Label::InvalidResponse);
    /// assert_eq!(Label::from_response("Error"), Label::InvalidResponse);
    /// ```
    pub fn from_response(text: &str) -> Label {
        match text.trim() {
            "Presidential" => Label::Presidential,
            "Other" => Label::Other,
            "Unsure" => Label::Unsure,
            _ => Label::InvalidResponse,
        }
    }

    /// Rows worth another run.
    pub fn is_failure(&self) -> bool {
        matches!(self, Label::InvalidResponse | Label::Error)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Label::ALL
            .into_iter()
            .find(|label| label.as_str() == s)
            .ok_or_else(|| format!("unknown label `{s}`"))
    }
}

/// Label plus token usage for one prompt, before an ad id is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub label: Label,
    pub usage: TokenUsage,
}

impl Classification {
    pub fn error() -> Self {
        Self {
            label: Label::Error,
            usage: TokenUsage::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationResult {
    pub ad_id: String,
    pub label: Label,
    pub usage: TokenUsage,
}

impl ClassificationResult {
    pub fn new(ad_id: impl Into<String>, classification: Classification) -> Self {
        Self {
            ad_id: ad_id.into(),
            label: classification.label,
            usage: classification.usage,
        }
    }

    pub fn error(ad_id: impl Into<String>) -> Self {
        Self::new(ad_id, Classification::error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_form_round_trips_for_every_label() {
        for label in Label::ALL {
            assert_eq!(label.as_str().parse::<Label>().unwrap(), label);
            assert_eq!(label.to_string(), label.as_str());
        }
        assert!("President".parse::<Label>().is_err());
    }

    #[test]
    fn model_output_outside_the_three_answers_is_invalid() {
        for text in ["", "Other.", "Unsure, leaning Other", "OTHER", "InvalidResponse"] {
            assert_eq!(Label::from_response(text), Label::InvalidResponse, "{text:?}");
        }
        assert_eq!(Label::from_response("\tUnsure "), Label::Unsure);
    }

    #[test]
    fn failures_are_flagged() {
        let flagged: Vec<Label> = Label::ALL.into_iter().filter(Label::is_failure).collect();
        assert_eq!(flagged, vec![Label::InvalidResponse, Label::Error]);
    }

    #[test]
    fn error_results_have_zero_usage() {
        let result = ClassificationResult::error("123");
        assert_eq!(result.ad_id, "123");
        assert_eq!(result.label, Label::Error);
        assert_eq!(result.usage, TokenUsage::default());
    }
}
