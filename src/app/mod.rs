use std::sync::Arc;

use crate::{
    cache::TokenStore,
    config::Config,
    recommender::Recommender,
    rendezvous::{CallbackPayload, Rendezvous, StatusBoard},
    spotify::{auth::PendingLogins, Connector},
};

/// Everything a request handler needs, shared across connections.
pub struct App {
    pub config: Config,
    pub tokens: Arc<dyn TokenStore>,
    pub connector: Arc<dyn Connector>,
    pub recommender: Recommender,
    pub logins: PendingLogins,
    pub callbacks: Rendezvous<CallbackPayload>,
    pub statuses: StatusBoard,
}

impl App {
    pub fn new(config: Config, tokens: Arc<dyn TokenStore>, connector: Arc<dyn Connector>) -> Self {
        let callbacks = Rendezvous::new(config.callback_timeout);
        App {
            recommender: Recommender::new(connector.clone(), tokens.clone()),
            config,
            tokens,
            connector,
            logins: PendingLogins::new(),
            callbacks,
            statuses: StatusBoard::new(),
        }
    }
}
