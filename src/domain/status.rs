use crate::domain::model::Status;

pub const STATUS_CODE_SUCCESS: i32 = 0;
pub const STATUS_CODE_IDEMPOTENT: i32 = 409;
pub const STATUS_CODE_OPERATION_LOSS: i32 = 410;
pub const STATUS_CODE_TOO_MANY_REQUEST: i32 = 429;

/// A repeated upload of the same request id is reported as idempotent, which still counts.
pub fn is_upload_success(status: &Status) -> bool {
    status.code == STATUS_CODE_SUCCESS || status.code == STATUS_CODE_IDEMPOTENT
}

pub fn is_success(status: &Status) -> bool {
    status.code == STATUS_CODE_SUCCESS
}

pub fn is_server_overload(status: &Status) -> bool {
    status.code == STATUS_CODE_TOO_MANY_REQUEST
}

pub fn is_loss_operation(status: &Status) -> bool {
    status.code == STATUS_CODE_OPERATION_LOSS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idempotent_counts_as_upload_success_only() {
        let status = Status::new(STATUS_CODE_IDEMPOTENT, "duplicated request");
        assert!(is_upload_success(&status));
        assert!(!is_success(&status));
    }

    #[test]
    fn test_overload_and_loss_codes() {
        assert!(is_server_overload(&Status::new(429, "")));
        assert!(!is_server_overload(&Status::new(0, "")));
        assert!(is_loss_operation(&Status::new(410, "")));
        assert!(!is_upload_success(&Status::new(410, "")));
    }
}
