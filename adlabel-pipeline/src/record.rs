use crate::literal::first_list_element;

/// Column holding the ad identifier in every tabular file.
pub const AD_ID_COLUMN: &str = "_id";

/// Cell values tabular exports use for "no value".
const NA_MARKERS: &[&str] = &[
    "NaN", "nan", "NA", "N/A", "n/a", "null", "NULL", "None", "#N/A", "<NA>",
];

/// Optional ad columns the pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AdField {
    Body,
    LinkTitle,
    DeliveryStart,
    DeliveryStop,
    Bylines,
    PageName,
    Transcript,
}

impl AdField {
    pub const ALL: [AdField; 7] = [
        AdField::Body,
        AdField::LinkTitle,
        AdField::DeliveryStart,
        AdField::DeliveryStop,
        AdField::Bylines,
        AdField::PageName,
        AdField::Transcript,
    ];

    pub fn column(&self) -> &'static str {
        match self {
            AdField::Body => "ad_creative_bodies",
            AdField::LinkTitle => "ad_creative_link_titles",
            AdField::DeliveryStart => "ad_delivery_start_time",
            AdField::DeliveryStop => "ad_delivery_stop_time",
            AdField::Bylines => "bylines",
            AdField::PageName => "page_name",
            AdField::Transcript => "transcript_translated",
        }
    }

    pub fn from_column(name: &str) -> Option<AdField> {
        AdField::ALL.into_iter().find(|f| f.column() == name)
    }
}

/// One ad as read from the source table. Field presence is settled here,
/// once: later stages only see `Some(value)` or `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdRecord {
    id: String,
    body: Option<String>,
    link_title: Option<String>,
    delivery_start: Option<String>,
    delivery_stop: Option<String>,
    bylines: Option<String>,
    page_name: Option<String>,
    transcript: Option<String>,
}

impl AdRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Set `field` from a raw cell.
    ///
    /// Empty cells and NA markers leave the field absent. A cell holding a
    /// list literal contributes its first element; a cell that only looks
    /// like one is kept verbatim.
    ///
    /// ```
    /// use adlabel_pipeline::{AdField, AdRecord};
    ///
    /// let ad = AdRecord::new("1946402405848135")
    ///     .with(AdField::LinkTitle, "['Now or never']")
    ///     .with(AdField::Transcript, "NaN")
    ///     .with(AdField::PageName, "[draft");
    ///
    /// assert_eq!(ad.get(AdField::LinkTitle), Some("Now or never"));
    /// assert_eq!(ad.get(AdField::Transcript), None);
    /// assert_eq!(ad.get(AdField::PageName), Some("[draft"));
    /// ```
    pub fn with(mut self, field: AdField, raw: impl AsRef<str>) -> Self {
        *self.slot(field) = clean_cell(raw.as_ref());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn get(&self, field: AdField) -> Option<&str> {
        let value = match field {
            AdField::Body => &self.body,
            AdField::LinkTitle => &self.link_title,
            AdField::DeliveryStart => &self.delivery_start,
            AdField::DeliveryStop => &self.delivery_stop,
            AdField::Bylines => &self.bylines,
            AdField::PageName => &self.page_name,
            AdField::Transcript => &self.transcript,
        };
        value.as_deref()
    }

    fn slot(&mut self, field: AdField) -> &mut Option<String> {
        match field {
            AdField::Body => &mut self.body,
            AdField::LinkTitle => &mut self.link_title,
            AdField::DeliveryStart => &mut self.delivery_start,
            AdField::DeliveryStop => &mut self.delivery_stop,
            AdField::Bylines => &mut self.bylines,
            AdField::PageName => &mut self.page_name,
            AdField::Transcript => &mut self.transcript,
        }
    }
}

/// Whether a raw cell holds a value rather than a blank or NA marker.
pub(crate) fn has_value(raw: &str) -> bool {
    let trimmed = raw.trim();
    !trimmed.is_empty() && !NA_MARKERS.contains(&trimmed)
}

fn clean_cell(raw: &str) -> Option<String> {
    if !has_value(raw) {
        return None;
    }
    Some(first_list_element(raw).unwrap_or_else(|| raw.to_string()))
}
