//! Common imports for consumers of the Telegram crate.
//!
//! ```
//! use handsoff_telegram::prelude::*;
//! ```

pub use crate::{
    ApprovalChannel, ApprovalOutcome, ApprovalSettings, Inconclusive, Notifier, StartupInfo,
    TelegramBot,
};
