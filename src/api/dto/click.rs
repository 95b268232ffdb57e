use serde::Serialize;

/// Response for an accepted click.
#[derive(Debug, Serialize)]
pub struct ClickAcceptedResponse {
    pub status: &'static str,
    pub message: &'static str,
}

impl ClickAcceptedResponse {
    pub fn accepted() -> Self {
        Self {
            status: "success",
            message: "Click event received",
        }
    }
}
