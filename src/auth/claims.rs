use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT payload of a session token. Role is deliberately absent: it is
/// re-read from the store on every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,   // user ID
    pub iat: usize,  // issued at (unix timestamp)
    pub exp: usize,  // expires at (unix timestamp)
    pub iss: String, // issuer
    pub aud: String, // audience
}
