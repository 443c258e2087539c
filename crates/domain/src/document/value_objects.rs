//! Value objects for the BA document domain.

use chrono::{DateTime, NaiveDate, Utc};
use common::UserId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::workflow::StepType;

/// Kind of BA document.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    /// Berita Acara Pemeriksaan: certifies inspected goods.
    #[default]
    Inspection,

    /// Berita Acara Serah Terima Barang: certifies handed-over goods.
    Handover,
}

impl DocumentType {
    /// Prefix used in document numbers.
    pub fn number_prefix(&self) -> &'static str {
        match self {
            DocumentType::Inspection => "BAP",
            DocumentType::Handover => "BAST",
        }
    }

    /// Human-readable title.
    pub fn label(&self) -> &'static str {
        match self {
            DocumentType::Inspection => "Pemeriksaan",
            DocumentType::Handover => "Serah Terima Barang",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Inspection => "INSPECTION",
            DocumentType::Handover => "HANDOVER",
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which organization a party acts for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Vendor,
    Pln,
}

/// Role a party plays on a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RoleType {
    #[serde(rename = "Maker Vendor")]
    MakerVendor,
    #[serde(rename = "Maker PLN")]
    MakerPln,
    #[serde(rename = "Checker Vendor")]
    CheckerVendor,
    #[serde(rename = "Checker PLN")]
    CheckerPln,
    #[serde(rename = "Approver Vendor")]
    ApproverVendor,
    #[serde(rename = "Approver PLN")]
    ApproverPln,
}

impl RoleType {
    /// All roles, in workflow sequence order.
    pub const ALL: [RoleType; 6] = [
        RoleType::MakerVendor,
        RoleType::MakerPln,
        RoleType::CheckerVendor,
        RoleType::CheckerPln,
        RoleType::ApproverVendor,
        RoleType::ApproverPln,
    ];

    pub fn side(&self) -> Side {
        match self {
            RoleType::MakerVendor | RoleType::CheckerVendor | RoleType::ApproverVendor => {
                Side::Vendor
            }
            RoleType::MakerPln | RoleType::CheckerPln | RoleType::ApproverPln => Side::Pln,
        }
    }

    pub fn is_maker(&self) -> bool {
        matches!(self, RoleType::MakerVendor | RoleType::MakerPln)
    }

    /// The step a party in this role acts on; makers have none.
    pub fn step_type(&self) -> Option<StepType> {
        match self {
            RoleType::MakerVendor | RoleType::MakerPln => None,
            RoleType::CheckerVendor | RoleType::CheckerPln => Some(StepType::Review),
            RoleType::ApproverVendor | RoleType::ApproverPln => Some(StepType::Approve),
        }
    }

    /// Parallel group the role's steps belong to.
    pub fn group_id(&self) -> Option<&'static str> {
        match self {
            RoleType::MakerVendor | RoleType::MakerPln => None,
            RoleType::CheckerVendor => Some("CHECKER_VENDOR"),
            RoleType::CheckerPln => Some("CHECKER_PLN"),
            RoleType::ApproverVendor => Some("APPROVER_VENDOR"),
            RoleType::ApproverPln => Some("APPROVER_PLN"),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleType::MakerVendor => "Maker Vendor",
            RoleType::MakerPln => "Maker PLN",
            RoleType::CheckerVendor => "Checker Vendor",
            RoleType::CheckerPln => "Checker PLN",
            RoleType::ApproverVendor => "Approver Vendor",
            RoleType::ApproverPln => "Approver PLN",
        }
    }
}

impl std::fmt::Display for RoleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a party stands on its part of the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartyActionStatus {
    Pending,
    InProgress,
    Approved,
    Rejected,
    NotRequired,
}

/// Identity of a party as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyProfile {
    pub role: RoleType,
    pub user_id: UserId,
    pub name: String,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl PartyProfile {
    pub fn new(role: RoleType, user_id: impl Into<UserId>, name: impl Into<String>) -> Self {
        Self {
            role,
            user_id: user_id.into(),
            name: name.into(),
            position: None,
            unit: None,
            email: None,
            phone: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_position(mut self, position: impl Into<String>) -> Self {
        self.position = Some(position.into());
        self
    }
}

/// A party assigned to a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub id: Uuid,
    #[serde(flatten)]
    pub profile: PartyProfile,
    pub side: Side,
    pub action_required: bool,
    pub action_status: PartyActionStatus,
    pub action_at: Option<DateTime<Utc>>,
    pub action_comment: Option<String>,
}

impl Party {
    /// Turns a profile into an assigned party with its initial action status.
    pub fn assign(profile: PartyProfile) -> Self {
        let action_required = !profile.role.is_maker();
        Self {
            id: Uuid::new_v4(),
            side: profile.role.side(),
            action_required,
            action_status: Self::initial_status(action_required),
            action_at: None,
            action_comment: None,
            profile,
        }
    }

    pub fn role(&self) -> RoleType {
        self.profile.role
    }

    pub fn user_id(&self) -> &UserId {
        &self.profile.user_id
    }

    /// Clears any recorded action, as after a reopen.
    pub fn reset_action(&mut self) {
        self.action_status = Self::initial_status(self.action_required);
        self.action_at = None;
        self.action_comment = None;
    }

    fn initial_status(action_required: bool) -> PartyActionStatus {
        if action_required {
            PartyActionStatus::Pending
        } else {
            PartyActionStatus::NotRequired
        }
    }
}

/// Outcome of inspecting a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityResult {
    Passed,
    Failed,
    Conditional,
}

/// Physical condition of handed-over goods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemCondition {
    Good,
    Damaged,
    Incomplete,
}

/// One inspected material line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectionDetail {
    #[serde(default)]
    pub material_code: Option<String>,
    pub material_description: String,
    pub unit_of_measure: String,
    pub ordered_quantity: Decimal,
    #[serde(default)]
    pub previously_received_quantity: Decimal,
    pub inspected_quantity: Decimal,
    pub approved_quantity: Decimal,
    #[serde(default)]
    pub rejected_quantity: Decimal,
    pub inspection_date: Option<NaiveDate>,
    #[serde(default)]
    pub inspection_location: Option<String>,
    #[serde(default)]
    pub verified_by_both_parties: bool,
    pub quality_result: QualityResult,
    #[serde(default)]
    pub notes: Option<String>,
}

/// One handed-over material line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoverDetail {
    #[serde(default)]
    pub material_code: Option<String>,
    pub material_description: String,
    pub unit_of_measure: String,
    pub ordered_quantity: Decimal,
    #[serde(default)]
    pub already_handed_over_quantity: Decimal,
    pub this_handover_quantity: Decimal,
    pub remaining_quantity: Decimal,
    pub handover_date: Option<NaiveDate>,
    pub delivery_location: String,
    #[serde(default)]
    pub verified_by_both_parties: bool,
    pub condition: ItemCondition,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Detail lines of a document; the variant matches the document type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "lines", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DetailLines {
    Inspection(Vec<InspectionDetail>),
    Handover(Vec<HandoverDetail>),
}

impl DetailLines {
    /// No lines yet for a document of the given type.
    pub fn empty_for(document_type: DocumentType) -> Self {
        match document_type {
            DocumentType::Inspection => DetailLines::Inspection(Vec::new()),
            DocumentType::Handover => DetailLines::Handover(Vec::new()),
        }
    }

    pub fn document_type(&self) -> DocumentType {
        match self {
            DetailLines::Inspection(_) => DocumentType::Inspection,
            DetailLines::Handover(_) => DocumentType::Handover,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            DetailLines::Inspection(lines) => lines.len(),
            DetailLines::Handover(lines) => lines.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn handover_lines(&self) -> Option<&[HandoverDetail]> {
        match self {
            DetailLines::Handover(lines) => Some(lines),
            DetailLines::Inspection(_) => None,
        }
    }
}

impl Default for DetailLines {
    fn default() -> Self {
        DetailLines::empty_for(DocumentType::default())
    }
}

/// Supporting file listed on a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Uuid,
    pub file_name: String,
    pub content_type: String,
    /// Where the file lives in external storage.
    pub storage_ref: String,
    pub uploaded_by: UserId,
    pub uploaded_at: DateTime<Utc>,
}

/// ERP goods-receipt status of a handover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GoodsReceiptStatus {
    #[default]
    NotApplicable,
    Pending,
    Success,
    Failed,
}

/// Order-monitoring sync status of a handover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MonitoringSyncStatus {
    #[default]
    NotApplicable,
    Pending,
    Synced,
    Failed,
}

/// A point in the lifecycle and who reached it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub at: DateTime<Utc>,
    pub by: UserId,
}

impl Milestone {
    pub fn new(at: DateTime<Utc>, by: UserId) -> Self {
        Self { at, by }
    }
}

/// Advisory lock held by one actor while editing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditLock {
    pub holder: UserId,
    pub acquired_at: DateTime<Utc>,
}
