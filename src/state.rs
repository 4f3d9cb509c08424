use std::sync::Arc;

use sqlx::{Pool, Postgres};

use crate::config::Config;
use crate::realtime::{ChannelAuthorizer, ChannelRegistry, FanoutClient, PresenceTracker};

#[derive(Clone)]
pub struct AppState {
    pub db: Pool<Postgres>,
    pub registry: ChannelRegistry,
    pub fanout: Arc<FanoutClient>,
    pub presence: Arc<PresenceTracker>,
    pub authorizer: Arc<ChannelAuthorizer>,
    pub config: Arc<Config>,
}
