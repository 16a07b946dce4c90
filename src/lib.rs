// Library for tests to access modules

pub mod audit_repo;
pub mod auth;
pub mod broadcaster;
pub mod config;
pub mod docker_repo;
pub mod host_repo;
pub mod models;
pub mod routes;
pub mod version;
