pub mod http;
pub mod ordered_stream;
pub mod path;
