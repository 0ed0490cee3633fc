use crate::math::{clamp, Vec3};

/// Schlick's fifth-power weight.
pub fn schlick_weight(cos_theta: f32) -> f32 {
	let m = clamp(1.0 - cos_theta, 0.0, 1.0);
	let m2 = m * m;
	m2 * m2 * m
}

pub fn schlick(f0: Vec3, cos_theta: f32) -> Vec3 {
	f0 + (Vec3::ONE - f0) * schlick_weight(cos_theta)
}

pub fn schlick_scalar(f0: f32, cos_theta: f32) -> f32 {
	f0 + (1.0 - f0) * schlick_weight(cos_theta)
}

/// Exact dielectric Fresnel. `eta` is incident over transmitted ior;
/// `cos_i` may be negative for rays arriving from inside.
pub fn dielectric(cos_i: f32, eta: f32) -> f32 {
	let cos_i = clamp(cos_i.abs(), 0.0, 1.0);

	let sin_t_sq = eta * eta * (1.0 - cos_i * cos_i);
	if sin_t_sq >= 1.0 {
		// Total internal reflection.
		return 1.0;
	}
	let cos_t = (1.0 - sin_t_sq).sqrt();

	let r_parallel = (cos_i - eta * cos_t) / (cos_i + eta * cos_t);
	let r_perpendicular = (eta * cos_i - cos_t) / (eta * cos_i + cos_t);
	0.5 * (r_parallel * r_parallel + r_perpendicular * r_perpendicular)
}
