use chrono::Utc;

use sha2::{Digest, Sha256};

use uuid::Uuid;

/// Length of the activation codes handed out to subscribers
pub const ACTIVATION_CODE_LEN: usize = 40;

/// Generate a random, hex encoded activation code for confirming
/// subscription changes by email
pub fn make_activation_code() -> String {
    let mut hasher = Sha256::new();
    hasher.update(Uuid::new_v4().as_bytes());
    hasher.update(Utc::now().timestamp_nanos_opt().unwrap_or_default().to_be_bytes());

    let mut code = format!("{:x}", hasher.finalize());
    code.truncate(ACTIVATION_CODE_LEN);
    code
}
