pub mod cli;
pub mod config;
pub mod domain;
pub mod journal;
pub mod mailchimp_client;
pub mod mailer;
pub mod message_source;
pub mod notifier;
pub mod repository;
pub mod startup;
pub mod telemetry;
