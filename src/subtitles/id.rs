/// Cue identifier generation
use chrono::Utc;
use uuid::Uuid;

/// Generate a cue id of the form `<unix-millis>-<6 lowercase alphanumerics>`
pub fn generate_cue_id() -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("{}-{}", Utc::now().timestamp_millis(), &random[..6])
}

/// Generate a session id
pub fn generate_session_id() -> String {
    Uuid::new_v4().to_string()
}
