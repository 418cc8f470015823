#![forbid(unsafe_code)]

//! View counting for the Castify player.
//!
//! The interesting part lives in [`session`] (when does watching become a
//! view) and [`tracker`] (hooking that decision to a [`media::MediaElement`]
//! and reporting it once). [`podcast`] talks to the remote Podcast Service;
//! the remaining modules are shared plumbing for the binaries.

pub mod config;
pub mod format;
pub mod logging;
pub mod media;
pub mod podcast;
pub mod session;
pub mod trace;
pub mod tracker;
