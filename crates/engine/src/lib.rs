//! Producer-side services: scheduling, listing, status lookup and deletion
//! of notifications, plus the broker publisher.

pub mod publisher;
pub mod service;
