pub mod activity;
pub mod api;
pub mod cluster;
pub mod error;
pub mod export;
pub mod filter;
pub mod heat;
pub mod interaction;
pub mod layout;
pub mod model;
pub mod pipeline;
pub mod search;
pub mod settings;
pub mod theme;
pub mod timeline;
pub mod view_state;
pub mod visual;

pub use error::{BrainMapError, Result};
