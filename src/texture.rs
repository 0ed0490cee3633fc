use crate::math::{Vec2, Vec4};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TextureError {
	/// IO error while reading a texture file.
	#[error("io error: {0}")]
	Io(#[from] std::io::Error),

	/// The texture file exists but could not be decoded.
	#[error("failed to decode texture '{name}': {reason}")]
	Decode { name: String, reason: String },

	/// No texture file for the requested name.
	#[error("missing texture '{0}'")]
	Missing(String),
}

/// Decode contract, implemented outside the core. [`ExrTextureLoader`] covers
/// tests and tools.
pub trait TextureLoader: Send + Sync {
	fn read_texture_resource(&self, name: &str) -> Result<TextureResource, TextureError>;
}

/// Decoded texture. Texels are interleaved f32 channels, row-major from the
/// top-left. Immutable after load; lookups are lock-free and thread-safe.
pub struct TextureResource {
	pub name: String,
	pub width: u32,
	pub height: u32,
	pub channels: u32,
	pub texels: Vec<f32>,
}

impl TextureResource {
	pub fn new(name: String, width: u32, height: u32, channels: u32, texels: Vec<f32>) -> Self {
		assert_eq!(texels.len(), (width * height * channels) as usize);
		Self { name, width, height, channels, texels }
	}

	/// Constant-color 1x1 texture.
	pub fn constant(name: String, value: Vec4) -> Self {
		Self::new(name, 1, 1, 4, vec![value.x, value.y, value.z, value.w])
	}

	fn texel(&self, x: u32, y: u32) -> Vec4 {
		let base = ((y * self.width + x) * self.channels) as usize;
		let channel = |i: u32, default: f32| {
			if i < self.channels { self.texels[base + i as usize] } else { default }
		};
		Vec4::new(channel(0, 0.0), channel(1, 0.0), channel(2, 0.0), channel(3, 1.0))
	}

	fn wrap(value: f32, size: u32) -> u32 {
		let size = size as i64;
		(((value.floor() as i64) % size + size) % size) as u32
	}

	/// Bilinear lookup with repeat wrapping.
	pub fn sample(&self, uv: Vec2) -> Vec4 {
		let x = uv.x * self.width as f32 - 0.5;
		let y = uv.y * self.height as f32 - 0.5;

		let x0 = Self::wrap(x, self.width);
		let y0 = Self::wrap(y, self.height);
		let x1 = (x0 + 1) % self.width;
		let y1 = (y0 + 1) % self.height;

		let fx = x - x.floor();
		let fy = y - y.floor();

		let lerp4 = |a: Vec4, b: Vec4, t: f32| a + (b - a) * t;
		let top = lerp4(self.texel(x0, y0), self.texel(x1, y0), fx);
		let bottom = lerp4(self.texel(x0, y1), self.texel(x1, y1), fx);
		lerp4(top, bottom, fy)
	}

	/// Footprint-filtered lookup. The screen-space uv derivatives select a
	/// box-filter width; without differentials this degenerates to bilinear.
	pub fn sample_filtered(&self, uv: Vec2, duvdx: Vec2, duvdy: Vec2) -> Vec4 {
		let width_texels = (duvdx.length().max(duvdy.length()) * self.width.max(self.height) as f32).ceil();
		if width_texels <= 1.0 {
			return self.sample(uv);
		}

		// Bounded tap count; beyond this the filter is close enough to the
		// texture mean that extra taps do not pay off.
		let taps = (width_texels as u32).min(4);
		let mut sum = Vec4::ZERO;
		for j in 0..taps {
			for i in 0..taps {
				let s = (i as f32 + 0.5) / taps as f32 - 0.5;
				let t = (j as f32 + 0.5) / taps as f32 - 0.5;
				sum = sum + self.sample(uv + duvdx * s + duvdy * t);
			}
		}
		sum * (1.0 / (taps * taps) as f32)
	}

	/// Point-sampled alpha, used by the intersection filter. Textures without
	/// an alpha channel are fully opaque.
	pub fn alpha(&self, uv: Vec2) -> f32 {
		if self.channels < 4 {
			return 1.0;
		}
		let x = Self::wrap(uv.x * self.width as f32, self.width);
		let y = Self::wrap(uv.y * self.height as f32, self.height);
		self.texel(x, y).w
	}
}

/// Reads OpenEXR images from a root directory, resolving `name` to
/// `<root>/<name>.exr`.
pub struct ExrTextureLoader {
	pub root: PathBuf,
}

impl ExrTextureLoader {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}
}

impl TextureLoader for ExrTextureLoader {
	fn read_texture_resource(&self, name: &str) -> Result<TextureResource, TextureError> {
		let path = self.root.join(format!("{name}.exr"));
		if !path.exists() {
			return Err(TextureError::Missing(name.to_string()));
		}

		let image = exr::prelude::read_first_rgba_layer_from_file(
			&path,
			|resolution, _| {
				(resolution.width() as u32, resolution.height() as u32,
					vec![0.0f32; resolution.width() * resolution.height() * 4])
			},
			|(width, _, texels), position, (r, g, b, a): (f32, f32, f32, f32)| {
				let base = (position.y() * *width as usize + position.x()) * 4;
				texels[base] = r;
				texels[base + 1] = g;
				texels[base + 2] = b;
				texels[base + 3] = a;
			},
		).map_err(|e| TextureError::Decode { name: name.to_string(), reason: e.to_string() })?;

		let (width, height, texels) = image.layer_data.channel_data.pixels;
		Ok(TextureResource::new(name.to_string(), width, height, 4, texels))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn checker() -> TextureResource {
		// 2x2 black/white checker.
		let texels = vec![
			0.0, 0.0, 0.0, 1.0,  1.0, 1.0, 1.0, 1.0,
			1.0, 1.0, 1.0, 1.0,  0.0, 0.0, 0.0, 1.0,
		];
		TextureResource::new("checker".into(), 2, 2, 4, texels)
	}

	#[test]
	fn texel_centers_sample_exactly() {
		let tex = checker();
		assert_eq!(tex.sample(Vec2::new(0.25, 0.25)).x, 0.0);
		assert_eq!(tex.sample(Vec2::new(0.75, 0.25)).x, 1.0);
	}

	#[test]
	fn uv_wraps_around() {
		let tex = checker();
		assert_eq!(tex.sample(Vec2::new(1.25, 0.25)).x, tex.sample(Vec2::new(0.25, 0.25)).x);
		assert_eq!(tex.sample(Vec2::new(-0.75, 0.25)).x, tex.sample(Vec2::new(0.25, 0.25)).x);
	}

	#[test]
	fn wide_footprint_averages_toward_mean() {
		let tex = checker();
		let wide = tex.sample_filtered(
			Vec2::new(0.5, 0.5),
			Vec2::new(1.0, 0.0),
			Vec2::new(0.0, 1.0),
		);
		assert!((wide.x - 0.5).abs() < 0.26, "filtered {wide:?}");
	}

	#[test]
	fn rgb_texture_is_opaque() {
		let tex = TextureResource::new("rgb".into(), 1, 1, 3, vec![0.2, 0.3, 0.4]);
		assert_eq!(tex.alpha(Vec2::ZERO), 1.0);
		assert_eq!(tex.sample(Vec2::ZERO).w, 1.0);
	}
}
