pub mod app;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod loyalty;
pub mod models;
pub mod operator;
pub mod orders;
pub mod payments;
pub mod settings;
pub mod state;
pub mod stats;
pub mod status;
pub mod storage;
pub mod ui;

pub use app::router;
pub use config::Config;
pub use state::AppState;
pub use storage::load_data;
