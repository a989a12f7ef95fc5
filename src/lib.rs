pub mod api;
pub mod config;
pub mod error;
pub mod expand;
pub mod history;
pub mod normalize;
pub mod provider;
pub mod request;
pub mod service;
pub mod table;

pub use error::{AppError, Result, ValidationError};
pub use table::{Cell, Table};
