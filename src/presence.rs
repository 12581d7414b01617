use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Display names handed out to new sessions.
pub const NAMES: &[&str] = &["🦊 Fox", "🐼 Panda", "🐧 Penguin", "🦁 Lion", "🐸 Frog"];

const SATURATION: u8 = 70;
const LIGHTNESS: u8 = 60;

/// Ephemeral identity of a connected session. Serialized as the `userData`
/// attribute map of presence envelopes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: String,
    pub user_name: String,
    pub user_color: String,
}

/// Assign a random name and color to the session identified by `user_id`.
pub fn assign_identity<R: Rng>(user_id: &str, rng: &mut R) -> Identity {
    let user_name = NAMES.choose(rng).copied().unwrap_or(NAMES[0]);
    let hue: u16 = rng.gen_range(0..360);
    Identity {
        user_id: user_id.to_string(),
        user_name: user_name.to_string(),
        user_color: format!("hsl({hue}, {SATURATION}%, {LIGHTNESS}%)"),
    }
}
