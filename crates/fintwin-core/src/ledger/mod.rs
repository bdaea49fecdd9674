pub mod history;
pub mod repository;

pub use history::TransactionHistory;
pub use repository::{FinancialDataSource, InMemoryStore};
