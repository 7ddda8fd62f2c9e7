mod conversation;
mod message;
mod user;

pub use conversation::*;
pub use message::*;
pub use user::*;

/// The authenticated principal attached to a request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub username: String,
    pub token: String,
}
