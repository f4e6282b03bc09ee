pub mod app;
pub mod auth;
pub mod authz;
pub mod comments;
pub mod config;
pub mod credentials;
pub mod error;
pub mod extract;
pub mod issues;
pub mod mail;
pub mod notifications;
pub mod posts;
pub mod studies;

use std::sync::Arc;

use study_db::Database;

use crate::config::Config;
use crate::mail::Mailer;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub config: Config,
    pub mailer: Mailer,
}

impl AppStateInner {
    pub fn new(db: Database, config: Config) -> AppState {
        let mailer = Mailer::new(config.mail.clone());
        Arc::new(Self { db, config, mailer })
    }
}
