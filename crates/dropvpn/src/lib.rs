//! Throwaway DigitalOcean VPN droplets: create one, pull the generated
//! client profile over SSH, run OpenVPN locally, destroy the droplet on
//! exit.

pub mod config;
pub mod error;
pub mod provision;
pub mod remote;
pub mod session;
pub mod ssh;
pub mod vpn;

pub use error::{Error, Result};
