pub mod audit;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod orders;
pub mod routes;
pub mod shops;
pub mod ws;

pub use routes::create_router;
