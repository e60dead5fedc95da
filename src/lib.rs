//! # Billing Quarantine
//!
//! Validates billing CSV files as they land in object storage and moves
//! files containing an invalid record to a quarantine bucket.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌───────────────┐
//! │   Event     │──▶│  Controller  │──▶│  ObjectStore  │
//! │ (created)   │   │ scan+decide  │   │  S3/FS/Memory │
//! └─────────────┘   └──────┬───────┘   └───────────────┘
//!                          │
//!                          ▼
//!                    ┌───────────┐
//!                    │ Validator │
//!                    │ rule set  │
//!                    └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export BILLING_ERROR=billing-errors
//! billq handle --event event.json      # run on an object-created event
//! billq process billing jan-2023.csv   # run on one object
//! billq check ./jan-2023.csv           # validate a local file, no storage
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`validate`] | Rule set, record validator, row scan |
//! | [`quarantine`] | File controller and invocation results |
//! | [`event`] | Object-created notification parsing |
//! | [`store`] | Object storage trait and backends |

pub mod config;
pub mod event;
pub mod models;
pub mod quarantine;
pub mod store;
pub mod validate;
