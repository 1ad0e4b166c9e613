//! MySQL/MariaDB backend for the Senator registry sync.
//!
//! Talks to the production database through [`sqlx`] over a pool capped at a
//! single connection, so a sync run holds exactly one session for its whole
//! lifetime. The tables are owned by the wider application; this crate never
//! creates or migrates them. It expects:
//!
//! - `access_logs(id, badge_number, person_id, person_type, person_name,
//!   group_name, event_date DATE, event_time TIME, processed TINYINT)`; a
//!   swipe's timestamp is `TIMESTAMP(event_date, event_time)`
//! - `employees(badge_number UNIQUE, first_name, last_name, department,
//!   position, status, first_seen, last_seen, access_count BIGINT, created_at,
//!   updated_at)`
//! - `visitors(badge_number UNIQUE, first_name, last_name, company, status,
//!   first_seen, last_seen, access_count BIGINT, created_at, updated_at)`

mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::{ConnectParams, MySqlStore};
