use std::sync::Arc;

use tracing::warn;

use crate::config::AppConfig;
use crate::users::{
    memory::MemoryUserRepository,
    repo::{PgUserRepository, UserRepository},
};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let users = match &config.database_url {
            Some(url) => Arc::new(PgUserRepository::connect(url, config.max_connections).await?)
                as Arc<dyn UserRepository>,
            None => {
                warn!("DATABASE_URL not set; users are kept in memory and lost on restart");
                Arc::new(MemoryUserRepository::new()) as Arc<dyn UserRepository>
            }
        };

        Ok(Self::from_parts(users, Arc::new(config)))
    }

    pub fn from_parts(users: Arc<dyn UserRepository>, config: Arc<AppConfig>) -> Self {
        Self { users, config }
    }

    #[cfg(test)]
    pub fn fake(config: AppConfig) -> Self {
        Self::from_parts(Arc::new(MemoryUserRepository::new()), Arc::new(config))
    }
}
