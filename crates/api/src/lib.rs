//! HTTP surface for scheduling, inspecting and cancelling notifications.
//!
//! Endpoints:
//! - POST   /api/notifications: schedule a notification
//! - GET    /api/notifications: list all notifications, newest first
//! - GET    /api/notifications/{id}/status: current delivery status
//! - DELETE /api/notifications/{id}: remove a notification
//! - GET    /health
//! - GET    /: web UI (static files)

pub mod routes;
pub mod state;
