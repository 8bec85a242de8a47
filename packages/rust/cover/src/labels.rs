//! Display strings for the cover layout.
//!
//! Kept in one place so the printed wording can be swapped for another
//! locale without touching layout code. Dates render as `%d.%m.%Y`.

pub(crate) const TITLE: &str = "WORK ORDER";
pub(crate) const ORDER_NUMBER_PREFIX: &str = "Order no.";

pub(crate) const FIELD_TITLE: &str = "Title";
pub(crate) const FIELD_CLIENT: &str = "Client";
pub(crate) const FIELD_COST_CENTER: &str = "Cost center";
pub(crate) const FIELD_DEADLINE: &str = "Deadline";
pub(crate) const FIELD_PRIORITY: &str = "Priority";
pub(crate) const FIELD_STATUS: &str = "Status";
pub(crate) const FIELD_ESTIMATED_HOURS: &str = "Estimated hours";
pub(crate) const FIELD_ACTUAL_HOURS: &str = "Actual hours";
pub(crate) const FIELD_ASSIGNEE: &str = "Assigned to";
pub(crate) const FIELD_CREATED: &str = "Created";

pub(crate) const SECTION_DESCRIPTION: &str = "Description";
pub(crate) const SECTION_NOTES: &str = "Notes";
pub(crate) const SECTION_MATERIAL: &str = "Material status";
pub(crate) const SECTION_COMPONENTS: &str = "Components";
pub(crate) const SECTION_SUBTASKS: &str = "Sub-tasks";

pub(crate) const MATERIAL_ORDERED_WORKSHOP: &str = "Ordered by workshop";
pub(crate) const MATERIAL_ORDERED_CLIENT: &str = "Ordered by client";
pub(crate) const MATERIAL_CONFIRMED: &str = "Client order confirmed";
pub(crate) const MATERIAL_AVAILABLE: &str = "Material available";

pub(crate) const YES: &str = "Yes";
pub(crate) const NO: &str = "No";
pub(crate) const NOT_AVAILABLE: &str = "N/A";
pub(crate) const UNASSIGNED: &str = "unassigned";

pub(crate) const ESTIMATED_PREFIX: &str = "Estimated:";
pub(crate) const DATE_FORMAT: &str = "%d.%m.%Y";

/// Localized yes/no for the material flags.
pub(crate) fn yes_no(value: bool) -> &'static str {
    if value { YES } else { NO }
}

/// Hours rendering for the field table and sub-task lines.
pub(crate) fn hours(value: Option<f64>) -> String {
    match value {
        Some(h) => format!("{h:.1} h"),
        None => NOT_AVAILABLE.to_string(),
    }
}
