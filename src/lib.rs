//! QuestAdmin media service
//!
//! Uploads, resizes and removes course images for the QuestAdmin education
//! platform. Images land in Firebase Storage or Supabase Storage and are
//! recorded on the course's Firestore document.

pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod firestore;
pub mod google;
pub mod image;
pub mod models;
pub mod server;
pub mod service;
pub mod storage;

pub use error::{Error, Result};
