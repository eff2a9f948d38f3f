//! # Volley Club Bot
//!
//! A Telegram bot that runs the attendance and billing cycle of a volleyball club.
//!
//! ## Features
//! - Player registration with team assignment
//! - One-off and weekly trainings with per-team attendance polls
//! - Capacity-limited voting and admin surrogate votes
//! - Charging attendees, payment confirmation and debtor reminders
//! - End-of-day reconciliation and vote archiving
//! - Persistent storage in SQLite or JSON files

/// Bot command handlers and message processing
pub mod bot;
/// Configuration management and environment variables
pub mod config;
/// Store backends, typed collections and models
pub mod database;
/// Error types shared across the bot
pub mod error;
/// Domain services and scheduled jobs
pub mod services;
/// Utility functions for datetime, validation, logging and feedback
pub mod utils;
