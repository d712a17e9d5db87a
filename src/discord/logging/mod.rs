mod audit_log;

pub use audit_log::{on_error, AuditLog};
