pub mod admin;
pub mod auth;
pub mod contact;
pub mod content;
pub mod health;
pub mod notifications;
pub mod projects;
pub mod transactions;
