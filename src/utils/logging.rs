use tracing::{debug, error, info, warn};

/// Logs command start with consistent format
pub fn log_command_start(command: &str, user: &str, chat_id: i64, details: Option<&str>) {
    match details {
        Some(d) => info!("CMD_START: {} by {}({}) - {}", command, user, chat_id, d),
        None => info!("CMD_START: {} by {}({})", command, user, chat_id),
    }
}

/// Logs command completion with consistent format
pub fn log_command_success(command: &str, user: &str, chat_id: i64, details: Option<&str>) {
    match details {
        Some(d) => info!("CMD_SUCCESS: {} by {}({}) - {}", command, user, chat_id, d),
        None => info!("CMD_SUCCESS: {} by {}({})", command, user, chat_id),
    }
}

/// Logs command errors with the error kind
pub fn log_command_error(command: &str, user: &str, chat_id: i64, kind: &str, error: &str) {
    error!(
        "CMD_ERROR: {} by {}({}) - {}: {}",
        command, user, chat_id, kind, error
    );
}

/// Logs validation errors with consistent format
pub fn log_validation_error(command: &str, field: &str, value: &str, error: &str, user: &str, chat_id: i64) {
    warn!(
        "VALIDATION_ERROR: {} - {} field '{}' invalid: {} - user {}({})",
        command, field, value, error, user, chat_id
    );
}

/// Logs store operations with consistent format
pub fn log_store_operation(operation: &str, collection: &str, details: Option<&str>) {
    match details {
        Some(d) => debug!("STORE_OP: {} on {} - {}", operation, collection, d),
        None => debug!("STORE_OP: {} on {}", operation, collection),
    }
}

/// Logs store errors with consistent format
pub fn log_store_error(operation: &str, collection: &str, error: &str, details: Option<&str>) {
    match details {
        Some(d) => error!("STORE_ERROR: {} on {} failed: {} - {}", operation, collection, error, d),
        None => error!("STORE_ERROR: {} on {} failed: {}", operation, collection, error),
    }
}

/// Logs a failed delivery to one recipient; callers keep going.
pub fn log_send_failure(chat_id: i64, context: &str, error: &str) {
    warn!("SEND_FAILED: TRANSIENT_SEND to {} during {} - {}", chat_id, context, error);
}

/// Logs scheduler job lifecycle with consistent format
pub fn log_job_event(job: &str, event: &str, details: Option<&str>) {
    match details {
        Some(d) => info!("JOB: {} {} - {}", job, event, d),
        None => info!("JOB: {} {}", job, event),
    }
}

/// Logs system events with consistent format
pub fn log_system_event(event: &str, details: Option<&str>) {
    match details {
        Some(d) => info!("SYSTEM: {} - {}", event, d),
        None => info!("SYSTEM: {}", event),
    }
}
