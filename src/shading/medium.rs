use crate::math::{Vec2, Vec3};
use crate::sampling::{sample_exponential_distance, sample_uniform_sphere, uniform_sphere_pdf};

/// Homogeneous isotropic participating medium.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MediumParameters {
	/// Absorption coefficient per unit distance.
	pub sigma_a: f32,
	/// Scattering coefficient per unit distance.
	pub sigma_s: f32,
}

impl MediumParameters {
	pub const VACUUM: Self = Self { sigma_a: 0.0, sigma_s: 0.0 };

	pub fn new(sigma_a: f32, sigma_s: f32) -> Self {
		Self { sigma_a, sigma_s }
	}

	pub fn extinction(&self) -> f32 {
		self.sigma_a + self.sigma_s
	}

	pub fn is_vacuum(&self) -> bool {
		self.extinction() <= 0.0
	}

	/// Probability of a scattering (rather than absorption) event.
	pub fn scattering_albedo(&self) -> f32 {
		let sigma_t = self.extinction();
		if sigma_t > 0.0 {
			self.sigma_s / sigma_t
		} else {
			0.0
		}
	}

	/// Free-flight distance; infinite in vacuum.
	pub fn sample_distance(&self, u: f32) -> f32 {
		sample_exponential_distance(u, self.extinction())
	}

	/// Isotropic phase function: uniform over the sphere.
	pub fn sample_scatter_direction(&self, u: Vec2) -> Vec3 {
		sample_uniform_sphere(u)
	}

	pub fn phase_pdf(&self) -> f32 {
		uniform_sphere_pdf()
	}

	/// Beam transmittance over a distance.
	pub fn transmission(&self, distance: f32) -> Vec3 {
		if distance.is_infinite() {
			return if self.is_vacuum() { Vec3::ONE } else { Vec3::ZERO };
		}
		Vec3::splat((-self.extinction() * distance).exp())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn vacuum_is_transparent() {
		let vacuum = MediumParameters::VACUUM;
		assert!(vacuum.is_vacuum());
		assert_eq!(vacuum.transmission(10.0), Vec3::ONE);
		assert_eq!(vacuum.sample_distance(0.7), f32::INFINITY);
	}

	#[test]
	fn transmission_decays_exponentially() {
		let medium = MediumParameters::new(0.5, 1.0);
		let t1 = medium.transmission(1.0).x;
		let t2 = medium.transmission(2.0).x;
		assert!((t1 - (-1.5f32).exp()).abs() < 1e-6);
		// Doubling the distance squares the transmittance.
		assert!((t2 - t1 * t1).abs() < 1e-6);
	}

	#[test]
	fn albedo_splits_extinction() {
		let medium = MediumParameters::new(1.0, 3.0);
		assert_eq!(medium.extinction(), 4.0);
		assert_eq!(medium.scattering_albedo(), 0.75);
	}
}
