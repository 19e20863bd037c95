//! Parsers for player pages and media URLs
//!
//! Contains the script scanners used by embed strategies.

pub mod packer;
pub mod player;

pub use packer::{expand_packed, is_packed, unpack_all};
pub use player::{
    container_from_url, decode_html_entities, find_media_url, find_script_assignment,
    label_from_url, parse_jwplayer_sources, parse_videojs_sources, resolution_from_text,
};
