//! GGX microfacet helpers in tangent space (+z is the shading normal).

use crate::math::{Vec2, Vec3, PI, TWO_PI};

/// Roughness below this is treated as a delta lobe by the transparent
/// shader; opaque shaders clamp to it instead.
pub const MIN_ALPHA: f32 = 1e-3;

pub fn roughness_to_alpha(roughness: f32) -> f32 {
	(roughness * roughness).max(MIN_ALPHA)
}

/// GGX (Trowbridge-Reitz) normal distribution.
pub fn ggx_ndf(h: Vec3, alpha: f32) -> f32 {
	let a2 = alpha * alpha;
	let d = h.z * h.z * (a2 - 1.0) + 1.0;
	a2 / (PI * d * d)
}

fn smith_lambda(v: Vec3, alpha: f32) -> f32 {
	let cos2 = (v.z * v.z).max(1e-12);
	let tan2 = (1.0 - cos2) / cos2;
	0.5 * ((1.0 + alpha * alpha * tan2).sqrt() - 1.0)
}

pub fn smith_g1(v: Vec3, alpha: f32) -> f32 {
	1.0 / (1.0 + smith_lambda(v, alpha))
}

/// Height-correlated Smith masking-shadowing.
pub fn smith_g2(wo: Vec3, wi: Vec3, alpha: f32) -> f32 {
	1.0 / (1.0 + smith_lambda(wo, alpha) + smith_lambda(wi, alpha))
}

/// Samples a half vector from the distribution of visible normals
/// (Heitz 2018). `wo` must be in the upper hemisphere.
pub fn sample_vndf(wo: Vec3, alpha: f32, u: Vec2) -> Vec3 {
	// Stretch the view to the hemisphere configuration.
	let v = Vec3::new(alpha * wo.x, alpha * wo.y, wo.z).normalize();

	let t1 = if v.z < 0.999 {
		Vec3::Z.cross(v).normalize()
	} else {
		Vec3::X
	};
	let t2 = v.cross(t1);

	// Parameterize the projected area.
	let r = u.x.sqrt();
	let phi = TWO_PI * u.y;
	let p1 = r * phi.cos();
	let mut p2 = r * phi.sin();
	let s = 0.5 * (1.0 + v.z);
	p2 = (1.0 - s) * (1.0 - p1 * p1).max(0.0).sqrt() + s * p2;

	let n = t1 * p1 + t2 * p2 + v * (1.0 - p1 * p1 - p2 * p2).max(0.0).sqrt();

	// Unstretch.
	Vec3::new(alpha * n.x, alpha * n.y, n.z.max(1e-6)).normalize()
}

/// Pdf of [`sample_vndf`] returning `h`, in the half-vector measure.
pub fn vndf_pdf(wo: Vec3, h: Vec3, alpha: f32) -> f32 {
	let cos_oh = wo.dot(h).max(0.0);
	smith_g1(wo, alpha) * ggx_ndf(h, alpha) * cos_oh / wo.z.abs().max(1e-6)
}

/// Pdf of the reflected direction when `h` was drawn from the VNDF.
pub fn vndf_reflection_pdf(wo: Vec3, h: Vec3, alpha: f32) -> f32 {
	let cos_oh = wo.dot(h);
	if cos_oh <= 0.0 {
		return 0.0;
	}
	vndf_pdf(wo, h, alpha) / (4.0 * cos_oh)
}

/// GTR1 distribution, the clearcoat lobe's longer-tailed cousin.
pub fn gtr1_ndf(h: Vec3, alpha: f32) -> f32 {
	let a2 = alpha * alpha;
	if a2 >= 1.0 {
		return 1.0 / PI;
	}
	(a2 - 1.0) / (PI * a2.ln() * (1.0 + (a2 - 1.0) * h.z * h.z))
}

/// Samples a GTR1 half vector; pdf is `gtr1_ndf * h.z`.
pub fn sample_gtr1(u: Vec2, alpha: f32) -> Vec3 {
	let a2 = (alpha * alpha).min(0.999);
	let cos2 = (1.0 - a2.powf(1.0 - u.x)) / (1.0 - a2);
	let cos_theta = cos2.max(0.0).sqrt();
	let sin_theta = (1.0 - cos2).max(0.0).sqrt();
	let phi = TWO_PI * u.y;

	Vec3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta)
}
