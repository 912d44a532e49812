//! Lyrebird - always-on voice assistant runtime
//!
//! The runtime sequences one conversation cycle end to end:
//!
//! ```text
//! ┌────────────┐  wake   ┌──────────────┐  order   ┌────────────┐
//! │  Trigger    │────────▶│  Feedback    │─────────▶│  Listener  │
//! │ (armed)     │         │ (wake answer)│          │ (one shot) │
//! └────────────┘         └──────────────┘          └─────┬──────┘
//!       ▲                                                │ transcript
//!       │ re-arm        ┌──────────────┐                 │
//!       └───────────────│  Dispatcher  │◀────────────────┘
//!                       └──────────────┘
//! ```
//!
//! The trigger lives for the whole process and is paused while a
//! listener runs; a fresh listener is created for every order. The
//! [`orchestrator`] module holds the cycle; everything else is a
//! component behind it.

pub mod api;
pub mod audio;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod feedback;
pub mod listener;
pub mod orchestrator;
pub mod stt;
pub mod trigger;

pub use config::Settings;
pub use dispatch::Dispatcher;
pub use error::{Error, Result};
pub use feedback::{Feedback, SpokenFeedback};
pub use listener::{OrderListener, OrderListenerHandle};
pub use orchestrator::{Orchestrator, Phase};
pub use stt::Transcriber;
pub use trigger::{TriggerHandle, TriggerRegistry};
