pub mod args;
pub mod info;
pub mod tracks;
