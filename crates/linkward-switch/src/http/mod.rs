// REST-managed switches: transport mechanics in `client`, the primitive
// mapping in `driver`.

pub mod client;
pub mod driver;

pub use client::HttpClient;
pub use driver::{HttpSession, HttpSwitch};
