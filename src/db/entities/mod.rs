//! Database entities

pub mod wallpapers;
