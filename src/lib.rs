// Library for tests to access modules

pub mod config;
pub mod coordinator;
pub mod fetcher;
pub mod history;
pub mod models;
pub mod routes;
pub mod version;
pub mod view;
