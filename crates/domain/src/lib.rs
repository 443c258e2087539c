//! Domain layer for BA (Berita Acara) documents.
//!
//! This crate provides:
//! - Aggregate and DomainEvent traits for event-sourced entities
//! - Command trait and CommandHandler with optimistic-concurrency retries
//! - The BA document aggregate, its validation engine and approval workflow
//! - DocumentService, the orchestrator every outer surface calls

pub mod aggregate;
pub mod command;
pub mod document;
pub mod error;

pub use aggregate::{Aggregate, DomainEvent};
pub use command::{Command, CommandHandler, CommandResult, DEFAULT_MAX_CONFLICT_RETRIES};
pub use document::{
    ActionItem, AddAttachment, AssignParties, BaDocument, CancelDocument, CreateDocument,
    Decision, DetailLines, DocumentDetail, DocumentError, DocumentEvent, DocumentService,
    DocumentStatus, DocumentType, FieldChanges, HistoryAction, KpiCounts, PartyProfile,
    ProcessHistoryEntry, RecordDecision, RecordIntegrationResult, RecordSignatures,
    ReopenDocument, RoleType, SaveDetails, StepType, SubmitDocument, TransitionStatus,
    UpdateFields, ValidationReport, WorkflowSettings,
};
pub use error::DomainError;
