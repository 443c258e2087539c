//! Workflow steps: materialization from parties and group completion.

use chrono::{DateTime, Utc};
use common::UserId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::value_objects::{Party, RoleType};

/// Kind of decision a step asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepType {
    /// Performed by Checkers while the document is under review.
    Review,
    /// Performed by Approvers while the document is under approval.
    Approve,
}

impl StepType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepType::Review => "REVIEW",
            StepType::Approve => "APPROVE",
        }
    }
}

impl std::fmt::Display for StepType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Pending,
    Approved,
    Rejected,
}

/// What an actor decided on their step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    pub fn step_status(&self) -> StepStatus {
        match self {
            Decision::Approved => StepStatus::Approved,
            Decision::Rejected => StepStatus::Rejected,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approved => "approved",
            Decision::Rejected => "rejected",
        }
    }
}

/// One actor's pending or completed decision on a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: Uuid,
    pub step_type: StepType,
    pub role: RoleType,
    pub sequence: u32,
    pub party_id: Uuid,
    pub actor_id: UserId,
    pub actor_name: String,
    pub status: StepStatus,
    pub acted_at: Option<DateTime<Utc>>,
    pub comment: Option<String>,
    pub group_id: String,
    /// Every member of the group must approve.
    pub requires_all: bool,
}

impl WorkflowStep {
    pub fn is_pending(&self) -> bool {
        self.status == StepStatus::Pending
    }
}

/// Builds one step per Checker/Approver party.
///
/// Steps are ordered Checker Vendor, Checker PLN, Approver Vendor, Approver
/// PLN; within a role they keep the party order.
pub fn materialize_steps(parties: &[Party]) -> Vec<WorkflowStep> {
    let mut steps = Vec::new();

    for role in RoleType::ALL {
        let (Some(step_type), Some(group_id)) = (role.step_type(), role.group_id()) else {
            continue;
        };

        for party in parties.iter().filter(|p| p.role() == role) {
            steps.push(WorkflowStep {
                id: Uuid::new_v4(),
                step_type,
                role,
                sequence: steps.len() as u32 + 1,
                party_id: party.id,
                actor_id: party.user_id().clone(),
                actor_name: party.profile.name.clone(),
                status: StepStatus::Pending,
                acted_at: None,
                comment: None,
                group_id: group_id.to_string(),
                requires_all: true,
            });
        }
    }

    steps
}

/// True if there is at least one step of the type.
pub fn has_steps(steps: &[WorkflowStep], step_type: StepType) -> bool {
    steps.iter().any(|s| s.step_type == step_type)
}

/// The user's first pending step of the type, by sequence.
pub fn find_pending_step<'a>(
    steps: &'a [WorkflowStep],
    step_type: StepType,
    user: &UserId,
) -> Option<&'a WorkflowStep> {
    steps
        .iter()
        .filter(|s| s.step_type == step_type && s.is_pending() && &s.actor_id == user)
        .min_by_key(|s| s.sequence)
}

/// Every step in the group is approved. An empty group is complete.
pub fn group_complete(steps: &[WorkflowStep], group_id: &str) -> bool {
    steps
        .iter()
        .filter(|s| s.group_id == group_id)
        .all(|s| s.status == StepStatus::Approved)
}

/// Every step of the type, across all groups, is approved.
pub fn stage_complete(steps: &[WorkflowStep], step_type: StepType) -> bool {
    steps
        .iter()
        .filter(|s| s.step_type == step_type)
        .all(|s| s.status == StepStatus::Approved)
}

/// What a decision does to the stage it was made in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// A step was rejected; the document is rejected.
    Rejected,
    /// The stage is finished; move on.
    Complete,
    /// Other steps are still pending.
    Waiting,
}

/// Evaluates a stage after the step `decided` has been updated in `steps`.
pub fn evaluate_stage(steps: &[WorkflowStep], decided: &WorkflowStep) -> StageOutcome {
    if decided.status == StepStatus::Rejected {
        return StageOutcome::Rejected;
    }

    if group_complete(steps, &decided.group_id) && stage_complete(steps, decided.step_type) {
        StageOutcome::Complete
    } else {
        StageOutcome::Waiting
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::value_objects::PartyProfile;

    fn parties() -> Vec<Party> {
        vec![
            Party::assign(PartyProfile::new(RoleType::ApproverPln, "p.appr", "Ayu")),
            Party::assign(PartyProfile::new(RoleType::MakerVendor, "v.maker", "Vera")),
            Party::assign(PartyProfile::new(RoleType::CheckerPln, "p.check1", "Putu")),
            Party::assign(PartyProfile::new(RoleType::CheckerVendor, "v.check", "Rudi")),
            Party::assign(PartyProfile::new(RoleType::CheckerPln, "p.check2", "Wayan")),
            Party::assign(PartyProfile::new(RoleType::MakerPln, "p.maker", "Dewi")),
        ]
    }

    fn decide(steps: &mut [WorkflowStep], actor: &str, decision: Decision) -> WorkflowStep {
        let step = steps
            .iter_mut()
            .find(|s| s.actor_id.as_str() == actor)
            .unwrap();
        step.status = decision.step_status();
        step.clone()
    }

    #[test]
    fn materializes_one_step_per_checker_and_approver() {
        let steps = materialize_steps(&parties());

        let order: Vec<_> = steps.iter().map(|s| s.actor_id.as_str()).collect();
        assert_eq!(order, vec!["v.check", "p.check1", "p.check2", "p.appr"]);
        assert_eq!(
            steps.iter().map(|s| s.sequence).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
        assert_eq!(steps[1].group_id, "CHECKER_PLN");
        assert_eq!(steps[3].step_type, StepType::Approve);
        assert!(steps.iter().all(|s| s.requires_all && s.is_pending()));
    }

    #[test]
    fn makers_only_produce_no_steps() {
        let makers: Vec<_> = parties()
            .into_iter()
            .filter(|p| p.role().is_maker())
            .collect();
        assert!(materialize_steps(&makers).is_empty());
    }

    #[test]
    fn pending_step_lookup_matches_type_and_user() {
        let steps = materialize_steps(&parties());
        let user = UserId::new("p.check2");

        let step = find_pending_step(&steps, StepType::Review, &user).unwrap();
        assert_eq!(step.actor_name, "Wayan");
        assert!(find_pending_step(&steps, StepType::Approve, &user).is_none());
    }

    #[test]
    fn stage_waits_until_every_group_is_approved() {
        let mut steps = materialize_steps(&parties());

        let decided = decide(&mut steps, "p.check1", Decision::Approved);
        assert_eq!(evaluate_stage(&steps, &decided), StageOutcome::Waiting);

        let decided = decide(&mut steps, "p.check2", Decision::Approved);
        assert!(group_complete(&steps, "CHECKER_PLN"));
        assert_eq!(evaluate_stage(&steps, &decided), StageOutcome::Waiting);

        let decided = decide(&mut steps, "v.check", Decision::Approved);
        assert_eq!(evaluate_stage(&steps, &decided), StageOutcome::Complete);
        assert!(!stage_complete(&steps, StepType::Approve));
    }

    #[test]
    fn rejection_short_circuits() {
        let mut steps = materialize_steps(&parties());

        let decided = decide(&mut steps, "p.check1", Decision::Rejected);

        assert_eq!(evaluate_stage(&steps, &decided), StageOutcome::Rejected);
        assert!(steps.iter().filter(|s| s.actor_id.as_str() != "p.check1").all(|s| s.is_pending()));
    }

    #[test]
    fn empty_groups_are_vacuously_complete() {
        assert!(group_complete(&[], "APPROVER_VENDOR"));
        assert!(stage_complete(&[], StepType::Review));
    }
}
