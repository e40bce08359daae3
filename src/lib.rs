pub mod api;
pub mod config;
pub mod db;
pub mod generation;
pub mod ledger;
pub mod lessons;
pub mod payments;

pub use db::DbPool;

use std::sync::Arc;

use config::Config;
use generation::TextGenerator;
use payments::PaymentGateway;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub generator: Arc<dyn TextGenerator>,
    pub payments: Arc<dyn PaymentGateway>,
}

impl AppState {
    pub fn new(
        config: Config,
        db: DbPool,
        generator: Arc<dyn TextGenerator>,
        payments: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            config,
            db,
            generator,
            payments,
        }
    }
}
