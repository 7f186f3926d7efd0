//! Raw record page - PageFetcher output

/// One raw vendor record: a flat-ish field mapping whose shape varies by
/// firmware and response format. No invariants beyond key -> value.
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// The extraction result of one response page
#[derive(Debug, Clone, Default)]
pub struct RawPage {
    /// Records located in the response body (empty for unparsable bodies)
    pub records: Vec<RawRecord>,
    /// `totalMatches` when the firmware reports it
    pub total_matches: Option<u64>,
    /// `numOfMatches`, falling back to the located record count
    pub num_matches: u64,
    /// `searchResultPosition` echoed by the device, when present
    pub search_position: Option<u64>,
}

impl RawPage {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
