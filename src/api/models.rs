#[derive(Debug, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct AddResponse {
    pub msg: String,
    /// Reports written to the store.
    pub stored: usize,
    /// Reports dropped because they failed validation.
    pub skipped: usize,
}

impl AddResponse {
    pub fn success(stored: usize, skipped: usize) -> Self {
        Self {
            msg: "success".to_owned(),
            stored,
            skipped,
        }
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ErrorResponse {
    pub error_message: String,
}
