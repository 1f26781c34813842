//! 领域模型模块

pub mod derivation;
pub mod model;
pub mod token_registry;
pub mod transaction_status;

pub use derivation::AddressDeriver;
pub use model::{Network, TokenSymbol, Transaction, TransactionType};
pub use token_registry::{NetworkInfo, TokenListing, TokenRegistry};
pub use transaction_status::TransactionStatus;
