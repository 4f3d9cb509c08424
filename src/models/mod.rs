pub mod conversation;
pub mod message;
pub mod user;

pub use conversation::{ConversationDto, ConversationType, ParticipantDto, ParticipantRole};
pub use message::{MessageDto, MessageType, ReactionDto, ReadReceiptDto};
pub use user::{UserProfile, UserRole};
