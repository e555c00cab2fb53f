use crate::normalize::normalize;
use crate::record::{AdField, AdRecord};

/// Task description placed ahead of the ad fields in every prompt.
pub const PREAMBLE: &str = concat!(
    "Your task is to determine if the ad is **explicitly** about the 2024 US Presidential Election.\n",
    "Only classify the ad as:\n",
    "- \"Presidential\": if it directly mentions the 2024 Presidential Election, backs, attacks or mentions a candidate (Trump or Harris), mentions campaign slogans, calls to action or events/conventions.\n",
    "- \"Other\": political content unrelated to the 2024 US Presidential race.\n",
    "- \"Unsure\": if the ad lacks enough information to determine its context.\n",
    "Reply with only one of: \"Presidential\", \"Other\", or \"Unsure\". Do not explain your answer.\n\n",
);

/// Rendered fields, in prompt order. The delivery start time is not shown.
const PROMPT_FIELDS: [(AdField, &str); 6] = [
    (AdField::Bylines, "Bylines"),
    (AdField::LinkTitle, "Link Title"),
    (AdField::Body, "Ad Text"),
    (AdField::PageName, "Page Name"),
    (AdField::DeliveryStop, "Stop Time"),
    (AdField::Transcript, "Transcript"),
];

fn is_free_text(field: AdField) -> bool {
    matches!(field, AdField::Body | AdField::Transcript)
}

/// Build the user prompt for one ad.
///
/// Present fields render as `"<Label>: <value>"` lines after [`PREAMBLE`];
/// free-text fields go through [`normalize`] first. The result is trimmed.
pub fn build_prompt(record: &AdRecord) -> String {
    let mut prompt = String::from(PREAMBLE);
    for (field, label) in PROMPT_FIELDS {
        let Some(value) = record.get(field) else {
            continue;
        };
        prompt.push_str(label);
        prompt.push_str(": ");
        if is_free_text(field) {
            prompt.push_str(&normalize(value));
        } else {
            prompt.push_str(value);
        }
        prompt.push('\n');
    }
    prompt.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRUMP_BODY: &str = "We have entered the final stretch of this race, and we need to look at Donald Trump and remember -- I mean really remember -- who he is.\n\n\
Trump is the guy who prefers to run on problems instead of finding solutions.\n\n\
That is who Donald Trump and his allies are. Now, we must remember who we are and fight for the country we so love. Donate right away. #gotrump";

    fn harris_ad() -> AdRecord {
        AdRecord::new("1946402405848135")
            .with(AdField::Body, TRUMP_BODY)
            .with(AdField::LinkTitle, "['Now or never']")
            .with(AdField::DeliveryStart, "2024-10-28")
            .with(AdField::DeliveryStop, "2024-10-29")
            .with(AdField::Bylines, "HARRIS VICTORY FUND")
            .with(AdField::Transcript, "you")
    }

    #[test]
    fn fields_render_in_fixed_order_after_preamble() {
        let prompt = build_prompt(&harris_ad());
        let fields = prompt
            .strip_prefix(PREAMBLE.trim_end())
            .expect("preamble first")
            .trim_start();
        let lines: Vec<&str> = fields.lines().collect();

        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "Bylines: HARRIS VICTORY FUND");
        assert_eq!(lines[1], "Link Title: Now or never");
        assert!(lines[2].starts_with("Ad Text: We have entered the final stretch"));
        assert!(lines[2].ends_with(" #gotrump"));
        assert_eq!(lines[3], "Stop Time: 2024-10-29");
        assert_eq!(lines[4], "Transcript: you");
    }

    #[test]
    fn start_time_and_absent_fields_are_not_rendered() {
        let prompt = build_prompt(&harris_ad());
        assert!(!prompt.contains("2024-10-28"));
        assert!(!prompt.contains("Page Name:"));
    }

    #[test]
    fn ad_text_is_normalized_but_other_fields_are_not() {
        let ad = AdRecord::new("7")
            .with(AdField::Body, "So, um, vote\nnow")
            .with(AdField::PageName, "Really  Big PAC");
        let prompt = build_prompt(&ad);
        assert!(prompt.contains("Ad Text: , , vote now\n"));
        assert!(prompt.ends_with("Page Name: Really  Big PAC"));
    }

    #[test]
    fn record_without_fields_yields_trimmed_preamble() {
        assert_eq!(build_prompt(&AdRecord::new("empty")), PREAMBLE.trim());
    }

    #[test]
    fn identical_records_give_identical_prompts() {
        let a = build_prompt(&harris_ad());
        let b = build_prompt(&harris_ad());
        assert_eq!(a, b);

        let other_id = AdRecord::new("other")
            .with(AdField::Body, TRUMP_BODY)
            .with(AdField::LinkTitle, "['Now or never']")
            .with(AdField::DeliveryStop, "2024-10-29")
            .with(AdField::Bylines, "HARRIS VICTORY FUND")
            .with(AdField::Transcript, "you");
        assert_eq!(build_prompt(&other_id), a);
    }
}
