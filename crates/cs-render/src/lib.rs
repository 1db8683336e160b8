// Spectrogram rasterisation, segment extraction, compression and JPEG tiling for chirospec.

pub mod colormap;
pub mod compressed;
pub mod raster;
pub mod render;
pub mod resize;
pub mod segments;
pub mod tiles;

pub use compressed::{CompressedSpectrogram, build_mask, compress};
pub use raster::{GrayRaster, RgbRaster};
pub use render::{RenderedSpectrogram, render_spectrogram};
pub use segments::{SegmentOutcome, extract_segments};
pub use tiles::{TileImage, TileKind, TileSet, read_rgb_tiles, read_tiles, write_tiles};
