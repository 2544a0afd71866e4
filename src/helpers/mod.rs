pub mod media;
pub mod multipart_parsing;
pub mod response;
pub mod tokens;
