pub mod film;
pub mod integrator;

pub use film::{Film, Tile};
pub use integrator::{EnergySource, HitParameters, KernelContext, KernelStats, Ray};

use crate::scene::{BindOptions, Scene};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
	/// The settings violate a documented bound.
	#[error("invalid render settings: {0}")]
	Config(&'static str),

	/// IO failure while persisting the film.
	#[error("io error: {0}")]
	Io(#[from] std::io::Error),

	/// The image encoder rejected the film.
	#[error("failed to write image: {0}")]
	Image(String),
}

/// Kernel configuration. The CLI or host application fills this in; the
/// kernel itself never touches argument parsing.
#[derive(Clone, Copy, Debug)]
pub struct RenderSettings {
	pub width: u32,
	pub height: u32,
	pub max_path_length: u32,
	pub ray_stack_capacity: u32,
	pub roulette_start: u32,
	pub samples_per_pixel: u32,
	/// Power of two; tiles at the right/bottom edge are clipped.
	pub tile_size: u32,
	pub preserve_ray_differentials: bool,
	pub enable_displacement: bool,
	pub tessellation_rate: f32,
}

impl Default for RenderSettings {
	fn default() -> Self {
		Self {
			width: 256,
			height: 256,
			max_path_length: 8,
			ray_stack_capacity: 16,
			roulette_start: 3,
			samples_per_pixel: 16,
			tile_size: 16,
			preserve_ray_differentials: true,
			enable_displacement: false,
			tessellation_rate: 4.0,
		}
	}
}

impl RenderSettings {
	pub fn validate(&self) -> Result<(), RenderError> {
		if self.width == 0 || self.height == 0 {
			return Err(RenderError::Config("image resolution must be nonzero"));
		}
		if self.max_path_length < 1 {
			return Err(RenderError::Config("max path length must be at least 1"));
		}
		if self.ray_stack_capacity < self.max_path_length + 2 {
			return Err(RenderError::Config("ray stack capacity must be at least max path length + 2"));
		}
		if self.samples_per_pixel < 1 {
			return Err(RenderError::Config("samples per pixel must be at least 1"));
		}
		if !self.tile_size.is_power_of_two() {
			return Err(RenderError::Config("tile size must be a power of two"));
		}
		if !(self.tessellation_rate > 0.0) {
			return Err(RenderError::Config("tessellation rate must be positive"));
		}
		Ok(())
	}

	pub fn bind_options(&self) -> BindOptions {
		BindOptions {
			enable_displacement: self.enable_displacement,
			tessellation_rate: self.tessellation_rate,
		}
	}

	fn tile_grid(&self) -> (u32, u32) {
		(self.width.div_ceil(self.tile_size), self.height.div_ceil(self.tile_size))
	}
}

/// Session outcome next to the film.
#[derive(Clone, Copy, Debug, Default)]
pub struct RenderSummary {
	pub tiles: u32,
	pub incomplete_tiles: u32,
	pub stats: KernelStats,
}

impl RenderSummary {
	pub fn cancelled(&self) -> bool {
		self.incomplete_tiles > 0
	}
}

/// Renders the scene over tiled worker threads.
///
/// Tiles are pulled from a shared counter; each worker owns its
/// `KernelContext` and accumulates into a private tile, so no pixel is ever
/// written concurrently. Seeding is by (tile, sample), which makes the image
/// identical for any worker count or tile interleaving. `cancel` is polled
/// between pixels; cancelled tiles come back marked incomplete.
pub fn render(
	scene: &Scene,
	settings: &RenderSettings,
	cancel: &AtomicBool,
) -> Result<(Film, RenderSummary), RenderError> {
	settings.validate()?;

	let (tiles_x, tiles_y) = settings.tile_grid();
	let tile_count = tiles_x * tiles_y;

	let next_tile = AtomicUsize::new(0);
	let finished: Mutex<Vec<(Tile, KernelStats)>> = Mutex::new(Vec::with_capacity(tile_count as usize));

	let worker_count = std::thread::available_parallelism()
		.map(|n| n.get())
		.unwrap_or(1)
		.min(tile_count.max(1) as usize);

	std::thread::scope(|scope| {
		for _ in 0..worker_count {
			scope.spawn(|| loop {
				let index = next_tile.fetch_add(1, Ordering::Relaxed) as u32;
				if index >= tile_count {
					break;
				}

				let tile_x = (index % tiles_x) * settings.tile_size;
				let tile_y = (index / tiles_x) * settings.tile_size;
				let tile = Tile::new(
					index,
					tile_x,
					tile_y,
					settings.tile_size.min(settings.width - tile_x),
					settings.tile_size.min(settings.height - tile_y),
				);

				let mut context = KernelContext::new(scene, settings, tile);
				context.run(cancel);

				let mut finished = finished.lock().unwrap();
				finished.push((context.tile, context.stats));
			});
		}
	});

	let mut film = Film::new(settings.width, settings.height);
	let mut summary = RenderSummary { tiles: tile_count, ..Default::default() };

	let mut results = finished.into_inner().unwrap();
	results.sort_by_key(|(tile, _)| tile.index);
	for (tile, stats) in &results {
		film.merge_tile(tile, settings.samples_per_pixel);
		summary.stats.merge(stats);
		if tile.incomplete {
			summary.incomplete_tiles += 1;
		}
	}

	log::info!(
		target: "kernel",
		"rendered {}x{} with {} spp: {} paths, {} rays, {} nee samples, {} dropped, {}/{} tiles incomplete",
		settings.width, settings.height, settings.samples_per_pixel,
		summary.stats.paths, summary.stats.rays, summary.stats.nee_samples,
		summary.stats.dropped_non_finite, summary.incomplete_tiles, summary.tiles
	);

	Ok((film, summary))
}
