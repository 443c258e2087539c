//! Read model views for the query side.

pub mod audit_log;
pub mod document_board;

pub use audit_log::AuditLogView;
pub use document_board::{DocumentBoardView, DocumentSummary};
