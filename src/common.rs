use serde::Serialize;

/// `{"status": "ok"}` for endpoints with nothing else to say.
#[derive(Debug, Serialize)]
pub struct StatusOut {
    pub status: &'static str,
}

impl StatusOut {
    pub fn ok() -> Self {
        Self { status: "ok" }
    }
}
