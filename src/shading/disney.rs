//! Disney-family shaders: the opaque solid and the two-sided thin sheet.
//!
//! All lobe math runs in tangent space with the outgoing direction in the
//! upper hemisphere. Sampling picks one lobe by weight; evaluation always
//! sums every lobe and the pdf is the weight-blended mix, which keeps
//! sample/evaluate/pdf mutually consistent for MIS.

use super::fresnel::{schlick, schlick_scalar, schlick_weight};
use super::microfacet::{
	ggx_ndf, gtr1_ndf, roughness_to_alpha, sample_gtr1, sample_vndf, smith_g2,
	vndf_reflection_pdf,
};
use super::surface::SurfaceParameters;
use super::{BsdfSample, LobeFlags};
use crate::math::{lerp, saturate, Vec3, INV_PI};
use crate::sampling::{cosine_hemisphere_pdf, sample_cosine_hemisphere, SamplerSession};

const CLEARCOAT_SMITH_ALPHA: f32 = 0.25;
const CLEARCOAT_F0: f32 = 0.04;

fn luminance(color: Vec3) -> f32 {
	0.2126 * color.x + 0.7152 * color.y + 0.0722 * color.z
}

// Hue-preserving normalization of the base color, used to tint the
// dielectric specular and the sheen.
fn tint_color(base_color: Vec3) -> Vec3 {
	let lum = luminance(base_color);
	if lum > 0.0 {
		base_color / lum
	} else {
		Vec3::ONE
	}
}

fn specular_f0(surface: &SurfaceParameters) -> Vec3 {
	let tint = Vec3::ONE.lerp(tint_color(surface.base_color), surface.specular_tint);
	let dielectric = tint * (0.08 * surface.specular);
	dielectric.lerp(surface.base_color, surface.metallic)
}

fn clearcoat_alpha(surface: &SurfaceParameters) -> f32 {
	lerp(0.1, 0.001, surface.clearcoat_gloss)
}

// Burley diffuse with the flatness-blended Hanrahan-Krueger subsurface
// approximation. `cos_d` is the half-vector cosine.
fn diffuse_factor(surface: &SurfaceParameters, wo_z: f32, wi_z: f32, cos_d: f32) -> f32 {
	let fl = schlick_weight(wi_z);
	let fv = schlick_weight(wo_z);

	let fd90 = 0.5 + 2.0 * surface.roughness * cos_d * cos_d;
	let fd = lerp(1.0, fd90, fl) * lerp(1.0, fd90, fv);

	let fss90 = surface.roughness * cos_d * cos_d;
	let fss = lerp(1.0, fss90, fl) * lerp(1.0, fss90, fv);
	let ss = 1.25 * (fss * (1.0 / (wi_z + wo_z).max(1e-4) - 0.5) + 0.5);

	lerp(fd, ss, surface.flatness)
}

fn sheen_term(surface: &SurfaceParameters, cos_d: f32) -> Vec3 {
	if surface.sheen <= 0.0 {
		return Vec3::ZERO;
	}
	let color = Vec3::ONE.lerp(tint_color(surface.base_color), surface.sheen_tint);
	color * (surface.sheen * schlick_weight(cos_d))
}

// Relative frequencies for lobe selection. Normalized by the caller.
fn lobe_weights(surface: &SurfaceParameters) -> (f32, f32, f32) {
	let diffuse = (1.0 - surface.metallic) * lerp(0.5, 1.0, surface.roughness)
		+ 0.25 * surface.sheen * (1.0 - surface.metallic);
	let specular = 1.0;
	let clearcoat = 0.25 * saturate(surface.clearcoat);

	let total = diffuse + specular + clearcoat;
	(diffuse / total, specular / total, clearcoat / total)
}

// Weight-blended pdf of the solid lobes for a direction pair in the upper
// hemisphere. The single source of truth for both `pdf` and `evaluate`.
fn solid_pdf_local(surface: &SurfaceParameters, wo: Vec3, wi: Vec3) -> f32 {
	let h = (wo + wi).normalize_or(Vec3::Z);
	let cos_d = wi.dot(h);
	let alpha = roughness_to_alpha(surface.roughness);

	let (w_diffuse, w_specular, w_clearcoat) = lobe_weights(surface);
	let mut pdf = w_diffuse * cosine_hemisphere_pdf(wi.z)
		+ w_specular * vndf_reflection_pdf(wo, h, alpha);
	if w_clearcoat > 0.0 && cos_d > 0.0 {
		pdf += w_clearcoat * gtr1_ndf(h, clearcoat_alpha(surface)) * h.z / (4.0 * cos_d);
	}
	pdf
}

// Sum of all solid lobes and the blended pdf for a direction pair in the
// upper hemisphere.
fn eval_solid_local(surface: &SurfaceParameters, wo: Vec3, wi: Vec3) -> (Vec3, f32) {
	let h = (wo + wi).normalize_or(Vec3::Z);
	let cos_d = wi.dot(h);
	let alpha = roughness_to_alpha(surface.roughness);

	// Diffuse, subsurface and sheen, all suppressed by metalness.
	let diffuse_weight = 1.0 - surface.metallic;
	let mut f = (surface.base_color * diffuse_factor(surface, wo.z, wi.z, cos_d)
		+ sheen_term(surface, cos_d))
		* (INV_PI * diffuse_weight);

	// Primary GGX specular.
	let d = ggx_ndf(h, alpha);
	let g = smith_g2(wo, wi, alpha);
	let fresnel = schlick(specular_f0(surface), cos_d);
	f += fresnel * (d * g / (4.0 * wo.z * wi.z).max(1e-6));

	// Clearcoat: GTR1 over a fixed-roughness Smith term and fixed 1.5 ior.
	if surface.clearcoat > 0.0 {
		let dc = gtr1_ndf(h, clearcoat_alpha(surface));
		let gc = smith_g2(wo, wi, CLEARCOAT_SMITH_ALPHA);
		let fc = schlick_scalar(CLEARCOAT_F0, cos_d);
		f += Vec3::splat(0.25 * surface.clearcoat * dc * gc * fc / (4.0 * wo.z * wi.z).max(1e-6));
	}

	(f, solid_pdf_local(surface, wo, wi))
}

pub fn sample_solid(
	surface: &SurfaceParameters,
	wo_world: Vec3,
	sampler: &mut SamplerSession,
) -> Option<BsdfSample> {
	let frame = surface.frame();
	let wo = frame.to_local(wo_world);
	if wo.z <= 1e-6 {
		return None;
	}

	let (w_diffuse, w_specular, _) = lobe_weights(surface);
	let pick = sampler.next_1d();
	let u = sampler.next_2d();
	let alpha = roughness_to_alpha(surface.roughness);

	let (wi, lobe) = if pick < w_diffuse {
		(sample_cosine_hemisphere(u), LobeFlags::DIFFUSE)
	} else if pick < w_diffuse + w_specular {
		let h = sample_vndf(wo, alpha, u);
		(h * (2.0 * wo.dot(h)) - wo, LobeFlags::SPECULAR)
	} else {
		let h = sample_gtr1(u, clearcoat_alpha(surface));
		(h * (2.0 * wo.dot(h)) - wo, LobeFlags::SPECULAR)
	};

	if wi.z <= 1e-6 {
		return None;
	}

	let (f, pdf) = eval_solid_local(surface, wo, wi);
	if pdf <= 0.0 {
		return None;
	}

	Some(BsdfSample {
		wi: frame.to_world(wi),
		reflectance: f,
		pdf,
		lobe,
		throughput: f * (wi.z / pdf),
	})
}

pub fn evaluate_solid(surface: &SurfaceParameters, wo_world: Vec3, wi_world: Vec3) -> (Vec3, f32) {
	let frame = surface.frame();
	let wo = frame.to_local(wo_world);
	let wi = frame.to_local(wi_world);
	if wo.z <= 1e-6 || wi.z <= 1e-6 {
		return (Vec3::ZERO, 0.0);
	}
	eval_solid_local(surface, wo, wi)
}

/// Analytic pdf only, without the reflectance work.
pub fn pdf_solid(surface: &SurfaceParameters, wo_world: Vec3, wi_world: Vec3) -> f32 {
	let frame = surface.frame();
	let wo = frame.to_local(wo_world);
	let wi = frame.to_local(wi_world);
	if wo.z <= 1e-6 || wi.z <= 1e-6 {
		return 0.0;
	}
	solid_pdf_local(surface, wo, wi)
}

// The thin shader reuses the solid lobes on the viewer's side and adds a
// rough pass-through transmission lobe: the refracted direction is bent back
// along the normal, so transmitted light continues with a mirrored-below
// distribution. Transmission color is the square root of base color since
// light crosses the sheet's pigment twice... once per interface.
fn thin_transmission_color(surface: &SurfaceParameters) -> Vec3 {
	Vec3::new(
		surface.base_color.x.max(0.0).sqrt(),
		surface.base_color.y.max(0.0).sqrt(),
		surface.base_color.z.max(0.0).sqrt(),
	)
}

fn thin_weights(surface: &SurfaceParameters) -> (f32, f32) {
	// Transmission probability next to the reflective side.
	let transmission = saturate(surface.transmission) * (1.0 - surface.metallic);
	(1.0 - transmission, transmission)
}

// Pdf of the thin shader's reflective side plus the mirrored-below
// transmission lobe. Shared by `pdf` and `evaluate`.
fn thin_pdf_local(surface: &SurfaceParameters, wo: Vec3, wi: Vec3) -> f32 {
	let (w_reflect, w_transmit) = thin_weights(surface);

	if wi.z > 0.0 {
		return w_reflect * solid_pdf_local(surface, wo, wi);
	}
	if w_transmit <= 0.0 {
		return 0.0;
	}

	let wi_mirrored = Vec3::new(wi.x, wi.y, -wi.z);
	let h = (wo + wi_mirrored).normalize_or(Vec3::Z);
	let alpha = roughness_to_alpha(surface.roughness);
	w_transmit * vndf_reflection_pdf(wo, h, alpha)
}

fn eval_thin_local(surface: &SurfaceParameters, wo: Vec3, wi: Vec3) -> (Vec3, f32) {
	let (w_reflect, w_transmit) = thin_weights(surface);
	let pdf = thin_pdf_local(surface, wo, wi);

	if wi.z > 0.0 {
		let (f, _) = eval_solid_local(surface, wo, wi);
		return (f * w_reflect, pdf);
	}

	if w_transmit <= 0.0 {
		return (Vec3::ZERO, 0.0);
	}

	// Mirror the transmitted direction above the sheet and evaluate the
	// specular distribution there.
	let wi_mirrored = Vec3::new(wi.x, wi.y, -wi.z);
	let h = (wo + wi_mirrored).normalize_or(Vec3::Z);
	let alpha = roughness_to_alpha(surface.roughness);
	let cos_d = wi_mirrored.dot(h);

	let d = ggx_ndf(h, alpha);
	let g = smith_g2(wo, wi_mirrored, alpha);
	let eta = 1.0 / surface.ior.max(1.01);
	let fresnel = super::fresnel::dielectric(cos_d, eta);

	let f = thin_transmission_color(surface)
		* ((1.0 - fresnel) * d * g / (4.0 * wo.z * wi_mirrored.z).max(1e-6))
		* w_transmit;

	(f, pdf)
}

pub fn sample_thin(
	surface: &SurfaceParameters,
	wo_world: Vec3,
	sampler: &mut SamplerSession,
) -> Option<BsdfSample> {
	let frame = surface.frame();
	let mut wo = frame.to_local(wo_world);
	let mut flipped = false;
	if wo.z < 0.0 {
		// Thin sheets shade identically from either side.
		wo.z = -wo.z;
		flipped = true;
	}
	if wo.z <= 1e-6 {
		return None;
	}

	let (_, w_transmit) = thin_weights(surface);
	let pick = sampler.next_1d();

	let (wi, f, pdf, lobe) = if pick < w_transmit {
		let u = sampler.next_2d();
		let alpha = roughness_to_alpha(surface.roughness);
		let h = sample_vndf(wo, alpha, u);
		let reflected = h * (2.0 * wo.dot(h)) - wo;
		if reflected.z <= 1e-6 {
			return None;
		}
		let wi = Vec3::new(reflected.x, reflected.y, -reflected.z);
		let (f, pdf) = eval_thin_local(surface, wo, wi);
		(wi, f, pdf, LobeFlags::SPECULAR | LobeFlags::TRANSMISSION)
	} else {
		// Solid-side lobes, rescaled by the reflection weight inside eval.
		let (w_diffuse, w_specular, _) = lobe_weights(surface);
		let u = sampler.next_2d();
		let alpha = roughness_to_alpha(surface.roughness);
		let inner = sampler.next_1d();
		let (wi, lobe) = if inner < w_diffuse {
			(sample_cosine_hemisphere(u), LobeFlags::DIFFUSE)
		} else if inner < w_diffuse + w_specular {
			let h = sample_vndf(wo, alpha, u);
			(h * (2.0 * wo.dot(h)) - wo, LobeFlags::SPECULAR)
		} else {
			let h = sample_gtr1(u, clearcoat_alpha(surface));
			(h * (2.0 * wo.dot(h)) - wo, LobeFlags::SPECULAR)
		};
		if wi.z <= 1e-6 {
			return None;
		}
		let (f, pdf) = eval_thin_local(surface, wo, wi);
		(wi, f, pdf, lobe)
	};

	if pdf <= 0.0 {
		return None;
	}

	let wi = if flipped { Vec3::new(wi.x, wi.y, -wi.z) } else { wi };

	Some(BsdfSample {
		wi: frame.to_world(wi),
		reflectance: f,
		pdf,
		lobe,
		throughput: f * (wi.z.abs() / pdf),
	})
}

pub fn evaluate_thin(surface: &SurfaceParameters, wo_world: Vec3, wi_world: Vec3) -> (Vec3, f32) {
	let frame = surface.frame();
	let mut wo = frame.to_local(wo_world);
	let mut wi = frame.to_local(wi_world);
	if wo.z < 0.0 {
		wo.z = -wo.z;
		wi.z = -wi.z;
	}
	if wo.z <= 1e-6 || wi.z.abs() <= 1e-6 {
		return (Vec3::ZERO, 0.0);
	}
	eval_thin_local(surface, wo, wi)
}

/// Analytic pdf only, without the reflectance work.
pub fn pdf_thin(surface: &SurfaceParameters, wo_world: Vec3, wi_world: Vec3) -> f32 {
	let frame = surface.frame();
	let mut wo = frame.to_local(wo_world);
	let mut wi = frame.to_local(wi_world);
	if wo.z < 0.0 {
		wo.z = -wo.z;
		wi.z = -wi.z;
	}
	if wo.z <= 1e-6 || wi.z.abs() <= 1e-6 {
		return 0.0;
	}
	thin_pdf_local(surface, wo, wi)
}
