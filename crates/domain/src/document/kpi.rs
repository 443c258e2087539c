//! Read-only aggregates over all documents: dashboard counts and action items.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, Utc};
use common::{AggregateId, UserId};
use serde::Serialize;

use crate::aggregate::Aggregate;

use super::{BaDocument, DocumentStatus, DocumentType, RoleType, workflow::StepType};

/// Dashboard counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KpiCounts {
    pub total: usize,
    pub by_status: BTreeMap<DocumentStatus, usize>,
    pub by_type: BTreeMap<DocumentType, usize>,
    /// In flight and submitted longer ago than the overdue threshold.
    pub overdue: usize,
    /// Approved within the calendar month of `now`.
    pub completed_this_month: usize,
}

impl KpiCounts {
    pub fn compute<'a>(
        documents: impl IntoIterator<Item = &'a BaDocument>,
        now: DateTime<Utc>,
        overdue_after: Duration,
    ) -> Self {
        let mut counts = KpiCounts::default();

        for doc in documents {
            counts.total += 1;
            *counts.by_status.entry(doc.status()).or_default() += 1;
            *counts.by_type.entry(doc.document_type()).or_default() += 1;

            let submitted_long_ago = doc
                .submitted()
                .is_some_and(|m| now - m.at > overdue_after);
            if doc.status().is_in_flight() && submitted_long_ago {
                counts.overdue += 1;
            }

            let approved_this_month = doc
                .final_approved()
                .is_some_and(|m| m.at.year() == now.year() && m.at.month() == now.month());
            if doc.status() == DocumentStatus::Approved && approved_this_month {
                counts.completed_this_month += 1;
            }
        }

        counts
    }
}

/// A document waiting on the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionItem {
    pub document_id: AggregateId,
    pub document_number: String,
    pub document_type: DocumentType,
    pub status: DocumentStatus,
    pub step_type: StepType,
    pub role: RoleType,
    /// When the current stage started.
    pub waiting_since: Option<DateTime<Utc>>,
}

/// Documents where `user` holds a pending step of the current stage,
/// longest waiting first.
pub fn action_items_for<'a>(
    documents: impl IntoIterator<Item = &'a BaDocument>,
    user: &UserId,
) -> Vec<ActionItem> {
    let mut items: Vec<ActionItem> = documents
        .into_iter()
        .filter_map(|doc| {
            let document_id = doc.id()?;
            let step = doc.pending_step_for(user)?;
            let stage_start = match step.step_type {
                StepType::Review => doc.review_started(),
                StepType::Approve => doc.approval_started(),
            };
            Some(ActionItem {
                document_id,
                document_number: doc.document_number().to_string(),
                document_type: doc.document_type(),
                status: doc.status(),
                step_type: step.step_type,
                role: step.role,
                waiting_since: stage_start.map(|m| m.at),
            })
        })
        .collect();

    items.sort_by_key(|item| item.waiting_since);
    items
}
