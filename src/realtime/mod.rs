pub mod auth;
pub mod channel;
pub mod events;
pub mod fanout;
pub mod presence;
pub mod registry;

pub use auth::ChannelAuthorizer;
pub use channel::Channel;
pub use events::RealtimeEvent;
pub use fanout::FanoutClient;
pub use presence::PresenceTracker;
pub use registry::ChannelRegistry;
