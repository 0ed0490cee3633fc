use crate::math::{INV_PI, PI, TWO_PI, Vec2, Vec3};

/// Uniformly samples a direction on the unit sphere.
pub fn sample_uniform_sphere(u: Vec2) -> Vec3 {
	let z = 1.0 - 2.0 * u.x;
	let r = (1.0 - z * z).max(0.0).sqrt();
	let phi = TWO_PI * u.y;
	Vec3::new(r * phi.cos(), r * phi.sin(), z)
}

pub fn uniform_sphere_pdf() -> f32 {
	1.0 / (4.0 * PI)
}

/// Concentric disk mapping, preserves stratification better than polar.
pub fn sample_concentric_disk(u: Vec2) -> Vec2 {
	let offset = u * 2.0 - Vec2::ONE;
	if offset.x == 0.0 && offset.y == 0.0 {
		return Vec2::ZERO;
	}

	let (r, theta) = if offset.x.abs() > offset.y.abs() {
		(offset.x, (PI / 4.0) * (offset.y / offset.x))
	} else {
		(offset.y, (PI / 2.0) - (PI / 4.0) * (offset.x / offset.y))
	};

	Vec2::new(r * theta.cos(), r * theta.sin())
}

/// Cosine-weighted hemisphere about +z, via the disk mapping.
pub fn sample_cosine_hemisphere(u: Vec2) -> Vec3 {
	let d = sample_concentric_disk(u);
	let z = (1.0 - d.length_sq()).max(0.0).sqrt();
	d.extend(z)
}

pub fn cosine_hemisphere_pdf(cos_theta: f32) -> f32 {
	cos_theta.max(0.0) * INV_PI
}

/// GGX half-vector about +z for the given roughness alpha.
pub fn sample_ggx_half_vector(u: Vec2, alpha: f32) -> Vec3 {
	let phi = TWO_PI * u.x;
	let cos_theta_sq = (1.0 - u.y) / (1.0 + (alpha * alpha - 1.0) * u.y);
	let cos_theta = cos_theta_sq.sqrt();
	let sin_theta = (1.0 - cos_theta_sq).max(0.0).sqrt();

	Vec3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta)
}

/// Uniform barycentrics over a triangle.
pub fn sample_uniform_triangle(u: Vec2) -> (f32, f32) {
	let su = u.x.sqrt();
	(1.0 - su, u.y * su)
}

/// Free-flight distance through a homogeneous medium with extinction sigma_t.
/// Returns infinity for vacuum.
pub fn sample_exponential_distance(u: f32, sigma_t: f32) -> f32 {
	if sigma_t <= 0.0 {
		f32::INFINITY
	} else {
		-(1.0 - u).max(f32::MIN_POSITIVE).ln() / sigma_t
	}
}

pub fn exponential_distance_pdf(d: f32, sigma_t: f32) -> f32 {
	sigma_t * (-sigma_t * d).exp()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sampling::SamplerSession;

	#[test]
	fn sphere_samples_are_unit_length() {
		let mut s = SamplerSession::new(0, 0);
		s.begin_pixel(0);
		for _ in 0..256 {
			let d = sample_uniform_sphere(s.next_2d());
			assert!((d.length() - 1.0).abs() < 1e-5);
		}
	}

	#[test]
	fn cosine_hemisphere_stays_above_plane() {
		let mut s = SamplerSession::new(0, 1);
		s.begin_pixel(0);
		for _ in 0..256 {
			let d = sample_cosine_hemisphere(s.next_2d());
			assert!(d.z >= 0.0);
			assert!((d.length() - 1.0).abs() < 1e-4);
		}
	}

	#[test]
	fn cosine_pdf_integrates_to_one() {
		// Monte-Carlo estimate of the pdf integral over the hemisphere.
		let mut s = SamplerSession::new(0, 2);
		s.begin_pixel(0);
		let n = 100_000;
		let mut sum = 0.0;
		for _ in 0..n {
			let d = sample_uniform_sphere(s.next_2d());
			if d.z > 0.0 {
				sum += cosine_hemisphere_pdf(d.z);
			}
		}
		let integral = sum / n as f32 * 4.0 * PI;
		assert!((integral - 1.0).abs() < 0.02, "integral {integral}");
	}

	#[test]
	fn triangle_barycentrics_are_valid() {
		let mut s = SamplerSession::new(0, 3);
		s.begin_pixel(0);
		for _ in 0..256 {
			let (a, b) = sample_uniform_triangle(s.next_2d());
			assert!(a >= 0.0 && b >= 0.0 && a + b <= 1.0 + 1e-6);
		}
	}

	#[test]
	fn vacuum_never_scatters() {
		assert_eq!(sample_exponential_distance(0.5, 0.0), f32::INFINITY);
	}

	#[test]
	fn exponential_mean_matches_extinction() {
		let mut s = SamplerSession::new(0, 4);
		s.begin_pixel(0);
		let sigma_t = 2.0;
		let n = 100_000;
		let mean: f32 = (0..n)
			.map(|_| sample_exponential_distance(s.next_1d(), sigma_t))
			.sum::<f32>() / n as f32;
		assert!((mean - 1.0 / sigma_t).abs() < 0.01, "mean {mean}");
	}
}
