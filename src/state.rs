use crate::config::Config;
use crate::errors::AppError;
use crate::events::EventBus;
use crate::models::StoreData;
use crate::operator::OperatorAuth;
use crate::payments::PaymentGateway;
use crate::storage::persist_data;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub data: Arc<Mutex<StoreData>>,
    pub events: EventBus,
    pub auth: Arc<OperatorAuth>,
    pub gateway: Arc<PaymentGateway>,
}

impl AppState {
    pub fn new(config: Config, data: StoreData) -> Self {
        Self {
            auth: Arc::new(OperatorAuth::new(config.operator_pin_hash.clone())),
            gateway: Arc::new(PaymentGateway::from_config(&config)),
            config: Arc::new(config),
            data: Arc::new(Mutex::new(data)),
            events: EventBus::new(),
        }
    }

    /// Writes the store to disk; call while still holding the data lock.
    pub async fn persist(&self, data: &StoreData) -> Result<(), AppError> {
        persist_data(&self.config.data_path, data).await
    }
}
