// Library for tests to access modules

pub mod config;
pub mod connection;
pub mod context;
pub mod controller;
pub mod error;
pub mod history;
pub mod models;
pub mod routes;
pub mod transport;
pub mod view;
