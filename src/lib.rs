pub mod assets;
pub mod background;
pub mod color;
pub mod compositor;
pub mod encoding;
pub mod error_codes;
pub mod font_assets;
pub mod pipeline;
pub mod schema;
pub mod sequence;
pub mod tables;
pub mod text_measure;
pub mod translations;
pub mod units;
