use crate::math::Vec2;
use rand::{Rng, SeedableRng, rngs::StdRng};

// splitmix64 finalizer, mixes the seed tuple into rng state
fn mix(mut x: u64) -> u64 {
	x = (x ^ (x >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
	x = (x ^ (x >> 27)).wrapping_mul(0x94d049bb133111eb);
	x ^ (x >> 31)
}

/// Per-worker sampler state.
///
/// Seeded by (tile, sample) so a render is reproducible under re-run and
/// independent of how tiles are interleaved across workers. `begin_pixel`
/// re-derives the stream per (pixel, sample), which keeps results identical
/// no matter how many pixels a worker has consumed before.
pub struct SamplerSession {
	rng: StdRng,
	base_seed: u64,
	sample_index: u32,
}

impl SamplerSession {
	pub fn new(tile_index: u32, sample_index: u32) -> Self {
		let base_seed = mix(((tile_index as u64) << 32) | sample_index as u64);
		Self {
			rng: StdRng::seed_from_u64(base_seed),
			base_seed,
			sample_index,
		}
	}

	pub fn sample_index(&self) -> u32 {
		self.sample_index
	}

	/// Rebinds the stream to a pixel. Call before the first dimension of
	/// every path.
	pub fn begin_pixel(&mut self, pixel_index: u32) {
		self.rng = StdRng::seed_from_u64(mix(self.base_seed ^ ((pixel_index as u64) << 20)));
	}

	pub fn next_1d(&mut self) -> f32 {
		self.rng.gen::<f32>()
	}

	pub fn next_2d(&mut self) -> Vec2 {
		Vec2::new(self.rng.gen::<f32>(), self.rng.gen::<f32>())
	}

	/// Jittered sample within stratum `cell` of an n-by-n grid.
	pub fn stratified_2d(&mut self, cell: u32, n: u32) -> Vec2 {
		let jitter = self.next_2d();
		let x = (cell % n) as f32;
		let y = (cell / n) as f32;
		Vec2::new((x + jitter.x) / n as f32, (y + jitter.y) / n as f32)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn same_seed_same_stream() {
		let mut a = SamplerSession::new(3, 7);
		let mut b = SamplerSession::new(3, 7);
		a.begin_pixel(42);
		b.begin_pixel(42);
		for _ in 0..32 {
			assert_eq!(a.next_1d(), b.next_1d());
		}
	}

	#[test]
	fn pixel_rebind_is_order_independent() {
		let mut a = SamplerSession::new(1, 0);
		a.begin_pixel(5);
		let _ = a.next_2d();
		a.begin_pixel(9);
		let first_after_detour = a.next_1d();

		let mut b = SamplerSession::new(1, 0);
		b.begin_pixel(9);
		assert_eq!(b.next_1d(), first_after_detour);
	}

	#[test]
	fn stratified_stays_in_cell() {
		let mut s = SamplerSession::new(0, 0);
		s.begin_pixel(0);
		for cell in 0..16 {
			let p = s.stratified_2d(cell, 4);
			let x0 = (cell % 4) as f32 / 4.0;
			let y0 = (cell / 4) as f32 / 4.0;
			assert!(p.x >= x0 && p.x < x0 + 0.25);
			assert!(p.y >= y0 && p.y < y0 + 0.25);
		}
	}
}
