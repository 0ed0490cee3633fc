use crate::math::{Mat4, Vec2, Vec3};

/// Physical pinhole camera. Focal length and sensor size are in millimeters,
/// the focus distance in meters; together they span the image plane.
#[derive(Clone, Copy, Debug)]
pub struct Camera {
	pub position: Vec3,
	pub right: Vec3,
	pub up: Vec3,
	pub forward: Vec3,

	/// Focal length in millimeters.
	pub focal_length: f32,
	/// Focus distance in meters.
	pub focus_distance: f32,

	// full-frame is 36x24mm
	pub sensor_width: f32,
	pub sensor_height: f32,
}

/// Primary ray with its image-plane differential directions.
#[derive(Clone, Copy, Debug)]
pub struct CameraRay {
	pub origin: Vec3,
	pub direction: Vec3,
	pub rx_direction: Vec3,
	pub ry_direction: Vec3,
}

impl Default for Camera {
	fn default() -> Self {
		Self {
			position: Vec3::ZERO,
			right: Vec3::X,
			up: Vec3::Y,
			forward: -Vec3::Z,

			focal_length: 50.0,
			focus_distance: 3.0,

			sensor_width: 36.0,
			sensor_height: 24.0,
		}
	}
}

impl Camera {
	/// Orients the camera by extracting the basis from a view matrix, so
	/// this and [`Mat4::look_at`] can never disagree.
	pub fn look_at(position: Vec3, target: Vec3, up: Vec3) -> Self {
		let view = Mat4::look_at(position, target, up);
		let row = |i: usize| view.row(i).truncate();

		Self {
			position,
			right: row(0),
			up: row(1),
			forward: -row(2),
			..Default::default()
		}
	}

	/// Vertical field of view in radians spanned by the sensor.
	pub fn vertical_fov(&self) -> f32 {
		2.0 * (0.5 * self.sensor_height / self.focal_length).atan()
	}

	/// Half-extents of the image plane at the focus distance.
	fn plane_scale(&self) -> Vec2 {
		Vec2::new(
			0.5 * self.sensor_width / self.focal_length * self.focus_distance,
			0.5 * self.sensor_height / self.focal_length * self.focus_distance,
		)
	}

	fn direction_at(&self, ndc: Vec2) -> Vec3 {
		let scale = self.plane_scale();
		(self.right * (ndc.x * scale.x)
			+ self.up * (ndc.y * scale.y)
			+ self.forward * self.focus_distance)
			.normalize()
	}

	/// Generates the primary ray for a pixel. `jitter` is the sub-pixel
	/// position in [0, 1)^2; the differentials are the one-pixel neighbor
	/// directions used for texture footprints.
	pub fn generate_ray(&self, pixel_x: u32, pixel_y: u32, width: u32, height: u32, jitter: Vec2) -> CameraRay {
		let to_ndc = |px: f32, py: f32| {
			Vec2::new(
				(px / width as f32) * 2.0 - 1.0,
				// Image rows grow downward, ndc y grows upward.
				1.0 - (py / height as f32) * 2.0,
			)
		};

		let px = pixel_x as f32 + jitter.x;
		let py = pixel_y as f32 + jitter.y;

		CameraRay {
			origin: self.position,
			direction: self.direction_at(to_ndc(px, py)),
			rx_direction: self.direction_at(to_ndc(px + 1.0, py)),
			ry_direction: self.direction_at(to_ndc(px, py + 1.0)),
		}
	}
}
