/// Prompt Party - social backend for sharing and remixing AI prompts
///
/// Accounts, a paginated prompt feed, version history, a remix (fork)
/// tree, likes/bookmarks/comments, collections, teams, gamification, a
/// key-gated public API, and live presence over WebSockets.
pub mod access_gate;
pub mod account;
pub mod api;
pub mod api_keys;
pub mod auth;
pub mod collections;
pub mod config;
pub mod context;
pub mod db;
pub mod engagement;
pub mod error;
pub mod gamification;
pub mod i18n;
pub mod jobs;
pub mod mailer;
pub mod metrics;
pub mod notifications;
pub mod presence;
pub mod prompts;
pub mod rate_limit;
pub mod server;
pub mod teams;
