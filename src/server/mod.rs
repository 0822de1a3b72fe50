mod audit;
mod auth;
mod contract_configs;
mod contract_groups;
pub mod dto;
mod goals;
mod locations;
mod records;
mod reports;
pub mod response;
mod router;
mod services;
mod units;
mod users;
mod validation;

pub use router::{AppState, create_router};
