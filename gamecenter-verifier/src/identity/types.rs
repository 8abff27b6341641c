use serde::Deserialize;

use crate::identity::errors::IdentityError;
use crate::identity::util::decode_b64;

#[derive(Debug, Clone, PartialEq, Eq)]
/// The five caller-supplied fields of one identity verification.
pub struct IdentityRequest {
    pub player_id: String,
    pub public_key_url: String,
    /// Claimed issuance time, milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    pub salt: Vec<u8>,
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Summary returned to callers after successful verification.
pub struct VerifiedIdentity {
    pub player_id: String,
    pub timestamp_ms: u64,
    pub certificate_name: String,
    pub leaf_fingerprint_sha256: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
/// JSON shape a game client forwards after calling GameKit's identity verification API.
pub struct IdentityPayload {
    /// Legacy player identifier (`G:` prefix).
    #[serde(default)]
    pub player_id: Option<String>,
    /// Team-scoped identifier (`T:` prefix).
    #[serde(default)]
    pub team_player_id: Option<String>,
    /// Game-scoped identifier (`A:` prefix).
    #[serde(default)]
    pub game_player_id: Option<String>,
    pub public_key_url: String,
    pub timestamp: u64,
    /// Base64
    pub salt: String,
    /// Base64
    pub signature: String,
}

impl IdentityPayload {
    /// Decodes the base64 fields; the player id is picked as team, then game, then legacy id.
    pub fn into_request(self) -> Result<IdentityRequest, IdentityError> {
        let player_id = self
            .team_player_id
            .or(self.game_player_id)
            .or(self.player_id)
            .ok_or_else(|| IdentityError::Decode("payload carries no player id".into()))?;
        Ok(IdentityRequest {
            player_id,
            public_key_url: self.public_key_url,
            timestamp_ms: self.timestamp,
            salt: decode_b64("salt", &self.salt)?,
            signature: decode_b64("signature", &self.signature)?,
        })
    }
}
