use serde::{Deserialize, Serialize};

/// Payload of a `print` job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintPayload {
    pub message: String,
}

/// Payload of an `email` job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailPayload {
    pub subject: String,
    pub body: String,
    pub sender: String,
    pub to: Vec<String>,
}
