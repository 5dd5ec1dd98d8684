//! ar-translate - Read text from the AR camera view and translate it
//!
//! A capture is snapshotted from the host view, passed through text
//! recognition, translated in one batched request and handed to the
//! presentation layer. Accounts and preferences live in a local SQLite store.

pub mod app;
pub mod capture;
pub mod config;
pub mod error;
pub mod overlay;
pub mod pipeline;
pub mod session;
pub mod storage;
pub mod translation;
pub mod vision;
