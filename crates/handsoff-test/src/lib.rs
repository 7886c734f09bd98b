//! Handsoff Test - shared test utilities.
//!
//! Mock collaborators for the traits in `handsoff-core` plus fixtures for
//! the on-disk state the gate and the server read.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! handsoff-test.workspace = true
//! ```
//!
//! ```rust,ignore
//! use handsoff_test::MockMessenger;
//!
//! #[tokio::test(start_paused = true)]
//! async fn approval_is_granted() {
//!     let messenger = MockMessenger::new().with_reply(7, "/allow");
//!     // ... drive an ApprovalChannel against `messenger` ...
//!     assert_eq!(messenger.sent_texts().len(), 2);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;
