/// The fixed melody and lyric table.
pub mod melody;
