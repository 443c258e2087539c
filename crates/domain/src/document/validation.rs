//! Validation engine for parties and detail lines.
//!
//! Every check is a pure function over borrowed input. Errors block the
//! operation that ran the check; warnings are handed back to the caller and
//! recorded on the event, but never block.

use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::value_objects::{DetailLines, HandoverDetail, InspectionDetail, PartyProfile, RoleType};

/// Maximum parties per Checker/Approver role.
pub const MAX_PARTIES_PER_ROLE: usize = 3;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single problem found in the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Path of the offending field, e.g. `parties[2].email`.
    pub field: String,
    pub message: String,
    pub severity: Severity,
}

/// Outcome of a validation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// False as soon as one finding is an error.
    pub is_valid: bool,
    pub findings: Vec<Finding>,
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            is_valid: true,
            findings: Vec::new(),
        }
    }

    fn error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.is_valid = false;
        self.findings.push(Finding {
            field: field.into(),
            message: message.into(),
            severity: Severity::Error,
        });
    }

    fn warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.findings.push(Finding {
            field: field.into(),
            message: message.into(),
            severity: Severity::Warning,
        });
    }

    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Error)
    }

    /// Warnings only, for recording alongside a successful operation.
    pub fn warnings(&self) -> Vec<Finding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Warning)
            .cloned()
            .collect()
    }

    /// Combines two reports; the result is valid only if both are.
    pub fn merge(mut self, other: ValidationReport) -> Self {
        self.is_valid &= other.is_valid;
        self.findings.extend(other.findings);
        self
    }

    /// Returns the report as an error if it contains any error finding.
    pub fn into_result(self) -> Result<Self, Self> {
        if self.is_valid { Ok(self) } else { Err(self) }
    }
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let errors: Vec<String> = self
            .errors()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", errors.join("; "))
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn same_person(a: &PartyProfile, b: &PartyProfile) -> bool {
    (!is_blank(a.user_id.as_str()) && a.user_id == b.user_id)
        || (!is_blank(&a.name) && a.name.trim().eq_ignore_ascii_case(b.name.trim()))
}

/// Checks party cardinality and identity fields.
pub fn validate_parties(parties: &[PartyProfile]) -> ValidationReport {
    let mut report = ValidationReport::new();

    for role in RoleType::ALL {
        let count = parties.iter().filter(|p| p.role == role).count();
        if role.is_maker() {
            if count == 0 {
                report.error("parties", format!("a {role} is required"));
            } else if count > 1 {
                report.error("parties", format!("only one {role} is allowed, found {count}"));
            }
        } else if count > MAX_PARTIES_PER_ROLE {
            report.error(
                "parties",
                format!("at most {MAX_PARTIES_PER_ROLE} {role} parties are allowed, found {count}"),
            );
        }
    }

    let pln_makers: Vec<&PartyProfile> = parties
        .iter()
        .filter(|p| p.role == RoleType::MakerPln)
        .collect();

    for (i, party) in parties.iter().enumerate() {
        if is_blank(&party.name) {
            report.error(format!("parties[{i}].name"), "name is required");
        }
        if is_blank(party.user_id.as_str()) {
            report.error(format!("parties[{i}].user_id"), "user id is required");
        }
        if let Some(email) = party.email.as_deref().filter(|e| !is_blank(e))
            && !EMAIL_RE.is_match(email.trim())
        {
            report.error(
                format!("parties[{i}].email"),
                format!("invalid email address: {email}"),
            );
        }

        let reviews_for_pln = matches!(party.role, RoleType::CheckerPln | RoleType::ApproverPln);
        if reviews_for_pln && pln_makers.iter().any(|maker| same_person(maker, party)) {
            report.warning(
                format!("parties[{i}]"),
                format!("{} is both Maker PLN and {}", party.name.trim(), party.role),
            );
        }
    }

    report
}

fn check_not_negative(report: &mut ValidationReport, prefix: &str, name: &str, value: Decimal) {
    if value.is_sign_negative() && !value.is_zero() {
        report.error(format!("{prefix}.{name}"), "must not be negative");
    }
}

/// Checks inspection lines.
pub fn validate_inspection_details(details: &[InspectionDetail]) -> ValidationReport {
    let mut report = ValidationReport::new();

    if details.is_empty() {
        report.error("details", "at least one inspection detail is required");
        return report;
    }

    for (i, line) in details.iter().enumerate() {
        let prefix = format!("details[{i}]");

        if is_blank(&line.material_description) {
            report.error(
                format!("{prefix}.material_description"),
                "material description is required",
            );
        }

        let quantities = [
            ("ordered_quantity", line.ordered_quantity),
            ("previously_received_quantity", line.previously_received_quantity),
            ("inspected_quantity", line.inspected_quantity),
            ("approved_quantity", line.approved_quantity),
            ("rejected_quantity", line.rejected_quantity),
        ];
        for (name, value) in quantities {
            check_not_negative(&mut report, &prefix, name, value);
        }

        if line.approved_quantity + line.rejected_quantity != line.inspected_quantity {
            report.error(
                format!("{prefix}.approved_quantity"),
                "approved and rejected quantities must add up to the inspected quantity",
            );
        }

        let outstanding = line.ordered_quantity - line.previously_received_quantity;
        if line.inspected_quantity > outstanding {
            report.error(
                format!("{prefix}.inspected_quantity"),
                format!("inspected quantity exceeds the outstanding {outstanding}"),
            );
        }

        if line.inspection_date.is_none() {
            report.error(
                format!("{prefix}.inspection_date"),
                "inspection date is required",
            );
        }

        if !line.verified_by_both_parties {
            report.warning(
                format!("{prefix}.verified_by_both_parties"),
                "not yet verified by both parties",
            );
        }
    }

    report
}

/// Checks handover lines.
pub fn validate_handover_details(details: &[HandoverDetail]) -> ValidationReport {
    let mut report = ValidationReport::new();

    if details.is_empty() {
        report.error("details", "at least one handover detail is required");
        return report;
    }

    for (i, line) in details.iter().enumerate() {
        let prefix = format!("details[{i}]");

        if is_blank(&line.material_description) {
            report.error(
                format!("{prefix}.material_description"),
                "material description is required",
            );
        }

        let quantities = [
            ("ordered_quantity", line.ordered_quantity),
            ("already_handed_over_quantity", line.already_handed_over_quantity),
            ("this_handover_quantity", line.this_handover_quantity),
            ("remaining_quantity", line.remaining_quantity),
        ];
        for (name, value) in quantities {
            check_not_negative(&mut report, &prefix, name, value);
        }

        let outstanding = line.ordered_quantity - line.already_handed_over_quantity;
        if line.this_handover_quantity > outstanding {
            report.error(
                format!("{prefix}.this_handover_quantity"),
                format!("handover quantity exceeds the outstanding {outstanding}"),
            );
        }

        let expected_remaining = outstanding - line.this_handover_quantity;
        if line.remaining_quantity != expected_remaining {
            report.warning(
                format!("{prefix}.remaining_quantity"),
                format!("remaining quantity should be {expected_remaining}"),
            );
        }

        if line.handover_date.is_none() {
            report.error(
                format!("{prefix}.handover_date"),
                "handover date is required",
            );
        }

        if is_blank(&line.delivery_location) {
            report.error(
                format!("{prefix}.delivery_location"),
                "delivery location is required",
            );
        }

        if !line.verified_by_both_parties {
            report.warning(
                format!("{prefix}.verified_by_both_parties"),
                "not yet verified by both parties",
            );
        }
    }

    report
}

/// Dispatches to the checker matching the detail variant.
pub fn validate_details(details: &DetailLines) -> ValidationReport {
    match details {
        DetailLines::Inspection(lines) => validate_inspection_details(lines),
        DetailLines::Handover(lines) => validate_handover_details(lines),
    }
}
