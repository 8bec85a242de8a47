//! Core domain types for workshop orders and the compilation pipeline.
//!
//! These records arrive from the job-tracking web front end as camelCase
//! JSON. They are read-only inputs for the duration of one pipeline
//! invocation; the pipeline never mutates them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Priority / OrderStatus
// ---------------------------------------------------------------------------

/// Order priority. Unrecognized values are preserved verbatim and
/// rendered literally on the cover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    #[serde(untagged)]
    Other(String),
}

impl Priority {
    /// Display text for the cover's field table.
    pub fn display_label(&self) -> &str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Other(s) => s,
        }
    }
}

/// Order lifecycle status. Unrecognized values are preserved verbatim and
/// rendered literally on the cover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Accepted,
    InProgress,
    Revision,
    Rework,
    Completed,
    Archived,
    WaitingConfirmation,
    #[serde(untagged)]
    Other(String),
}

impl OrderStatus {
    /// Display text for the cover's field table.
    pub fn display_label(&self) -> &str {
        match self {
            Self::Pending => "Pending",
            Self::Accepted => "Accepted",
            Self::InProgress => "In progress",
            Self::Revision => "Revision",
            Self::Rework => "Rework",
            Self::Completed => "Completed",
            Self::Archived => "Archived",
            Self::WaitingConfirmation => "Waiting for confirmation",
            Self::Other(s) => s,
        }
    }
}

// ---------------------------------------------------------------------------
// Order and its children
// ---------------------------------------------------------------------------

/// A workshop order as supplied by the front end.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Unique order identifier.
    pub id: String,
    /// Human-facing order number; display falls back to `id` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_number: Option<String>,
    /// Order title.
    pub title: String,
    /// Free-text description of the work.
    #[serde(default)]
    pub description: String,
    /// Client name.
    pub client_name: String,
    /// Billing cost center.
    pub cost_center: String,
    /// Agreed deadline.
    pub deadline: NaiveDate,
    /// Priority classification.
    pub priority: Priority,
    /// Lifecycle status.
    pub status: OrderStatus,
    /// Estimated effort in hours.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,
    /// Actual effort in hours.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_hours: Option<f64>,
    /// Assigned worker, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    /// Free-text notes; the cover omits the notes section when empty.
    #[serde(default)]
    pub notes: String,
    /// When the order was created.
    pub created_at: DateTime<Utc>,
    /// Ordered component list.
    #[serde(default)]
    pub components: Vec<Component>,
    /// Ordered sub-task list.
    #[serde(default)]
    pub subtasks: Vec<SubTask>,
    /// Ordered list of attached document references.
    #[serde(default)]
    pub documents: Vec<DocumentDescriptor>,
    /// Material procurement flags.
    #[serde(default)]
    pub material: MaterialStatus,
}

impl Order {
    /// The string shown as order number and encoded into the scan code:
    /// the order number when present, the identifier otherwise.
    pub fn display_number(&self) -> &str {
        self.order_number.as_deref().unwrap_or(&self.id)
    }
}

/// A reference to an externally stored binary document. Bytes are fetched
/// on demand through the document store; an unresolvable identifier is
/// recorded as a per-document fault during the merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDescriptor {
    /// Store identifier used for retrieval.
    pub id: String,
    /// Display name shown on error pages and in reports.
    pub name: String,
}

/// A component of the order. The pipeline lists title and description
/// only; a component's own documents are never expanded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub documents: Vec<DocumentDescriptor>,
}

/// A sub-task of the order, listed for information only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubTask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,
}

/// Material procurement flags, rendered as localized yes/no on the cover.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialStatus {
    #[serde(default)]
    pub ordered_by_workshop: bool,
    #[serde(default)]
    pub ordered_by_client: bool,
    #[serde(default)]
    pub client_order_confirmed: bool,
    #[serde(default)]
    pub available: bool,
}

// ---------------------------------------------------------------------------
// CompositionOptions
// ---------------------------------------------------------------------------

/// Per-call switches for the compilation pipeline. Supplied fresh for
/// every invocation; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionOptions {
    /// Append the attached documents after the cover.
    pub include_documents: bool,
    /// Render the components section on the cover.
    pub include_components: bool,
    /// Render the scan code on the cover.
    pub include_code: bool,
}

impl Default for CompositionOptions {
    fn default() -> Self {
        Self {
            include_documents: true,
            include_components: true,
            include_code: true,
        }
    }
}
