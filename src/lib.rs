//!# SABnzbd API Client
//!
//! A Rust client library for the SABnzbd HTTP API. Every operation sends a single
//! command to the `/sabnzbd/api` endpoint and returns the interesting part of the
//! JSON answer.
//!
//! ## Features
//!
//! - Get the server version, the queue and the history
//! - Pause and resume the queue or single jobs
//! - Delete, purge, move and sort jobs
//! - Change category, script, priority and post-processing of a job
//! - List and remove the files of a job
//! - Add downloads by URL or by a file on the server
//! - Set the speed limit and the action to run when the queue is complete
//! - Human-readable file sizes for queue, history and file entries
//!
//! SABnzbd reports some failures inside a successful answer, e.g.
//! `{"status": false, "error": "..."}`. Those are returned as a regular
//! [`entities::Payload`]; use [`entities::Payload::as_status()`] and
//! [`entities::Payload::error()`] to inspect them.
//!
//! ## Usage example
//!
//! ```rust,no_run
//! use anyhow::Result;
//! use std::env;
//! use sabnzbd_client::client::Sabnzbd;
//! use sabnzbd_client::entities::{AddOptions, Priority, Queue};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<()> {
//!     let sabnzbd = Sabnzbd::builder()
//!         .url(env::var("SABNZBD_URL")?)
//!         .api_key(env::var("SABNZBD_API_KEY")?)
//!         .build()?;
//!
//!     let queue: Queue = sabnzbd.queue(None, None, None).await?.parse()?;
//!     for slot in queue.slots {
//!         println!("job: {}, name: {}, size: {}", slot.nzo_id, slot.filename, slot.calculate_size());
//!     }
//!
//!     let options = AddOptions::default().category("linux").priority(Priority::High);
//!     let added = sabnzbd.add_by_url("https://example.com/ubuntu.nzb", &options).await?;
//!     println!("added: {:?}", added.value());
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod entities;
pub mod utils;
