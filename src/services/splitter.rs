// src/services/splitter.rs
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;

use crate::errors::EaselError;

/// Tiles per side of the split grid.
pub const GRID_DIM: u32 = 3;

/// Longest edge of a history thumbnail. Thumbnails land in the consumer's
/// small persisted-state budget, so they stay well under preview size.
pub const THUMBNAIL_MAX_EDGE: u32 = 160;

/// Decodes `bytes` and returns the lazy 3x3 tile sequence. The image is
/// decoded once; every tile is cropped independently from that shared
/// immutable source, so re-splitting the same bytes yields byte-identical
/// tiles and the sequence can be restarted at will.
pub fn split(bytes: &[u8]) -> Result<TileGrid, EaselError> {
    let image =
        image::load_from_memory(bytes).map_err(|e| EaselError::DecodeFailed(e.to_string()))?;
    let (width, height) = image.dimensions();
    if width < GRID_DIM || height < GRID_DIM {
        return Err(EaselError::InvalidInput(format!(
            "{}x{} image is too small to split into a {}x{} grid",
            width, height, GRID_DIM, GRID_DIM
        )));
    }
    Ok(TileGrid { image, index: 0 })
}

/// Downsized JPEG preview of a generated image, for history entries.
pub fn thumbnail(bytes: &[u8]) -> Result<Vec<u8>, EaselError> {
    let image =
        image::load_from_memory(bytes).map_err(|e| EaselError::DecodeFailed(e.to_string()))?;
    let thumb = image.thumbnail(THUMBNAIL_MAX_EDGE, THUMBNAIL_MAX_EDGE);
    // JPEG has no alpha channel.
    let thumb = DynamicImage::ImageRgb8(thumb.to_rgb8());

    let mut output = Vec::new();
    thumb
        .write_to(&mut Cursor::new(&mut output), ImageFormat::Jpeg)
        .map_err(|e| EaselError::Internal(format!("failed to encode thumbnail: {}", e)))?;
    Ok(output)
}

/// Finite, restartable iterator over the nine grid tiles, row-major.
#[derive(Debug)]
pub struct TileGrid {
    image: DynamicImage,
    index: u32,
}

impl TileGrid {
    /// Encodes the tile at (row, col) as PNG. Tile edges sit at
    /// `floor(dim * i / 3)`, so each row's widths sum to the image width
    /// and each column's heights to the image height, with no fractional
    /// pixels even for non-divisible dimensions.
    pub fn tile(&self, row: u32, col: u32) -> Result<Vec<u8>, EaselError> {
        let (width, height) = self.image.dimensions();
        let x0 = edge(width, col);
        let x1 = edge(width, col + 1);
        let y0 = edge(height, row);
        let y1 = edge(height, row + 1);

        let tile = self.image.crop_imm(x0, y0, x1 - x0, y1 - y0);
        let mut output = Vec::new();
        tile.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)
            .map_err(|e| EaselError::Internal(format!("failed to encode tile: {}", e)))?;
        Ok(output)
    }

    pub fn restart(&mut self) {
        self.index = 0;
    }
}

fn edge(dim: u32, i: u32) -> u32 {
    (dim as u64 * i as u64 / GRID_DIM as u64) as u32
}

impl Iterator for TileGrid {
    type Item = Result<Vec<u8>, EaselError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= GRID_DIM * GRID_DIM {
            return None;
        }
        let row = self.index / GRID_DIM;
        let col = self.index % GRID_DIM;
        self.index += 1;
        Some(self.tile(row, col))
    }
}
