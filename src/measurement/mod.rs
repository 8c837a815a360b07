//! Crude oil measurement module.
//!
//! Corrects observed API gravity, temperature and gross volume to 60 °F
//! standard volumes for run tickets, exposed as HTTP endpoints so the ticket
//! form can recompute on every field change.

mod calculator;
mod models;
mod routes;

pub use routes::router;
