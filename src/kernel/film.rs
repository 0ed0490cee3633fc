use super::RenderError;
use crate::math::Vec3;
use std::path::Path;

/// A worker's output region. Tiles cover disjoint pixel ranges, so workers
/// accumulate without any synchronization; the film stitches them afterward.
pub struct Tile {
	pub index: u32,
	pub x: u32,
	pub y: u32,
	pub width: u32,
	pub height: u32,
	/// Radiance sums per pixel, row-major within the tile.
	pub pixels: Vec<Vec3>,
	/// Set when cancellation interrupted the tile.
	pub incomplete: bool,
}

impl Tile {
	pub fn new(index: u32, x: u32, y: u32, width: u32, height: u32) -> Self {
		Self {
			index,
			x,
			y,
			width,
			height,
			pixels: vec![Vec3::ZERO; (width * height) as usize],
			incomplete: false,
		}
	}

	pub fn add(&mut self, local_index: u32, value: Vec3) {
		self.pixels[local_index as usize] += value;
	}
}

/// Final radiance image, mean over samples.
pub struct Film {
	pub width: u32,
	pub height: u32,
	pixels: Vec<Vec3>,
}

impl Film {
	pub fn new(width: u32, height: u32) -> Self {
		Self { width, height, pixels: vec![Vec3::ZERO; (width * height) as usize] }
	}

	pub fn pixel(&self, x: u32, y: u32) -> Vec3 {
		self.pixels[(y * self.width + x) as usize]
	}

	pub fn pixels(&self) -> &[Vec3] {
		&self.pixels
	}

	pub fn mean_luminance(&self) -> f32 {
		if self.pixels.is_empty() {
			return 0.0;
		}
		self.pixels.iter().map(|p| p.luminance_avg()).sum::<f32>() / self.pixels.len() as f32
	}

	/// Resolves a tile's sums into the image, dividing by the sample count.
	pub fn merge_tile(&mut self, tile: &Tile, samples_per_pixel: u32) {
		let scale = 1.0 / samples_per_pixel as f32;
		for local_y in 0..tile.height {
			for local_x in 0..tile.width {
				let local = (local_y * tile.width + local_x) as usize;
				let global = ((tile.y + local_y) * self.width + tile.x + local_x) as usize;
				self.pixels[global] = tile.pixels[local] * scale;
			}
		}
	}

	/// Writes the image as RGB OpenEXR. The file appears atomically: a
	/// temporary sibling is written first and renamed over the target.
	pub fn write_exr(&self, path: impl AsRef<Path>) -> Result<(), RenderError> {
		let path = path.as_ref();
		let tmp = path.with_extension("exr.tmp");

		exr::prelude::write_rgb_file(
			&tmp,
			self.width as usize,
			self.height as usize,
			|x, y| {
				let p = self.pixel(x as u32, y as u32);
				(p.x, p.y, p.z)
			},
		)
		.map_err(|e| RenderError::Image(e.to_string()))?;

		std::fs::rename(&tmp, path)?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn tile_merge_resolves_means() {
		let mut film = Film::new(4, 4);
		let mut tile = Tile::new(0, 2, 2, 2, 2);
		tile.add(0, Vec3::splat(4.0));
		tile.add(3, Vec3::splat(8.0));

		film.merge_tile(&tile, 4);
		assert_eq!(film.pixel(2, 2), Vec3::splat(1.0));
		assert_eq!(film.pixel(3, 3), Vec3::splat(2.0));
		assert_eq!(film.pixel(0, 0), Vec3::ZERO);
	}

	#[test]
	fn mean_luminance_averages_pixels() {
		let mut film = Film::new(2, 1);
		let mut tile = Tile::new(0, 0, 0, 2, 1);
		tile.add(0, Vec3::splat(2.0));
		tile.add(1, Vec3::ZERO);
		film.merge_tile(&tile, 1);
		assert_eq!(film.mean_luminance(), 1.0);
	}
}
