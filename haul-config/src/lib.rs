//! Configuration types and loading for `haul` deployments.
//!
//! Configuration is layered: `configuration/base.*`, then `configuration/{environment}.*`, then
//! `APP_`-prefixed environment variables. See [`load::load_config`].

pub mod environment;
pub mod load;
pub mod shared;
