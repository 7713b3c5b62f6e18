/// Opaque ID types
pub type SessionId = String;
pub type MessageId = String;
pub type StreamId = String;

/// Generate a fresh identifier (ULID string)
pub fn new_id() -> String {
    ulid::Ulid::new().to_string()
}
