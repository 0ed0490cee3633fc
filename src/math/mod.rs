pub mod aabb;
pub mod matrix;
pub mod vector;

pub use aabb::{Aabb, BoundingSphere};
pub use matrix::Mat4;
pub use vector::{Vec2, Vec3, Vec4};

pub const PI: f32 = std::f32::consts::PI;
pub const INV_PI: f32 = std::f32::consts::FRAC_1_PI;
pub const TWO_PI: f32 = 2.0 * std::f32::consts::PI;

/// Clamps x to be in the range [min, max].
pub fn clamp(x: f32, min: f32, max: f32) -> f32 {
	f32::max(min, f32::min(max, x))
}

/// Clamps x to be in the range [0, 1].
pub fn saturate(x: f32) -> f32 {
	clamp(x, 0.0, 1.0)
}

/// Linearly interpolates between a and b.
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
	a + (b - a) * t
}

/// Builds a right-handed orthonormal basis around a unit vector.
/// Branchless construction after Duff et al.
pub fn orthonormal_basis(n: Vec3) -> (Vec3, Vec3) {
	let sign = 1.0f32.copysign(n.z);
	let a = -1.0 / (sign + n.z);
	let b = n.x * n.y * a;

	let t = Vec3::new(1.0 + sign * n.x * n.x * a, sign * b, -sign * n.x);
	let bt = Vec3::new(b, sign + n.y * n.y * a, -n.y);

	(t, bt)
}
