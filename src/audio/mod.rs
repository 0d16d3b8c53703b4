pub mod beats;
pub mod decode;
