use serde::{Deserialize, Serialize};

/// Per-player obligation created by charging a training.
///
/// Once `paid` is set it is never cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Debt {
    pub player_id: String,
    pub training_fingerprint: String,
    pub amount: u64,
    pub training_label: String,
    pub card: String,
    pub paid: bool,
}

impl Debt {
    pub fn key(&self) -> String {
        debt_key(&self.training_fingerprint, &self.player_id)
    }
}

/// `"<training_fingerprint>_<player_id>"`
pub fn debt_key(fingerprint: &str, player_id: &str) -> String {
    format!("{fingerprint}_{player_id}")
}
