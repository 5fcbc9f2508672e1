pub use mailbox::*;
pub use mint_controller::*;
pub use warp_ism::*;

mod mailbox;
mod mint_controller;
mod warp_ism;
