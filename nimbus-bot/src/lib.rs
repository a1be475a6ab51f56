pub mod actions;
pub mod chat;
pub mod commands;
pub mod dispatcher;
pub mod formatters;
pub mod provider_manager;
pub mod routes;
pub mod settings;
