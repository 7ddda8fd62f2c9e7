// Limits
pub const MAX_MESSAGE_LENGTH: usize = 4000;
pub const MAX_GROUP_NAME_LENGTH: usize = 100;
pub const MAX_USERNAME_LENGTH: usize = 32;
pub const MIN_USERNAME_LENGTH: usize = 2;
pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_DISPLAY_NAME_LENGTH: usize = 64;
pub const MAX_BIO_LENGTH: usize = 500;

// Group conversations need this many members besides the creator
pub const MIN_GROUP_PARTICIPANTS: usize = 2;

// Pagination
pub const CONVERSATION_PAGE_SIZE: i64 = 50;
pub const CONVERSATION_MESSAGE_WINDOW: i64 = 100;

pub const GLOBAL_CONVERSATION_NAME: &str = "Global Conversation";
pub const GUEST_USERNAME: &str = "Guest";
