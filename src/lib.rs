//! zwm: a dynamic tiling window manager for X.

#[macro_use]
extern crate log;

#[macro_use]
extern crate lazy_static;

pub mod bindings;
pub mod client;
pub mod config;
pub mod draw;
pub mod layout;
pub mod monitor;
pub mod rules;
pub mod signals;
pub mod tag;
pub mod wm;
pub mod xconnection;
pub mod xerror;

mod actions;
mod bar;
mod events;
mod mouse;

#[cfg(test)]
mod mock;

pub use config::Config;
pub use draw::XcbDraw;
pub use wm::WindowManager;
pub use xconnection::{XConn, XcbConnection};
