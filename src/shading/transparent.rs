//! Refractive GGX dielectric after Walter et al., with a delta path for
//! polished surfaces.
//!
//! The relative ior comes from which side the ray arrives on; the exterior
//! medium is assumed to be vacuum/air. Reflection off the interface is
//! untinted; transmission picks up the base color and the radiance scaling
//! for the ior change.

use super::fresnel::dielectric;
use super::microfacet::{
	ggx_ndf, sample_vndf, smith_g2, vndf_pdf, vndf_reflection_pdf, MIN_ALPHA,
};
use super::surface::SurfaceParameters;
use super::{BsdfSample, LobeFlags};
use crate::math::Vec3;
use crate::sampling::SamplerSession;

struct Interface {
	/// Transmitted over incident ior.
	eta_rel: f32,
	/// Incident over transmitted, the fresnel/refraction ratio.
	eta: f32,
}

fn interface(surface: &SurfaceParameters, entering: bool) -> Interface {
	let ior = surface.ior.max(1.0001);
	let eta_rel = if entering { ior } else { 1.0 / ior };
	Interface { eta_rel, eta: 1.0 / eta_rel }
}

fn alpha_of(surface: &SurfaceParameters) -> f32 {
	surface.roughness * surface.roughness
}

// Pdf of the fresnel-weighted reflection and transmission lobes in the
// oriented frame (wo.z > 0, transmission below). The single source of truth
// for both `pdf` and `evaluate`.
fn pdf_local(surface: &SurfaceParameters, interface: &Interface, wo: Vec3, wi: Vec3) -> f32 {
	let alpha = alpha_of(surface).max(MIN_ALPHA);

	if wi.z > 1e-6 {
		let h = (wo + wi).normalize_or(Vec3::Z);
		let cos_oh = wo.dot(h);
		if cos_oh <= 0.0 {
			return 0.0;
		}
		let fresnel = dielectric(cos_oh, interface.eta);
		return fresnel * vndf_reflection_pdf(wo, h, alpha);
	}

	if wi.z > -1e-6 {
		return 0.0;
	}

	let mut wh = (wo + wi * interface.eta_rel).normalize_or(Vec3::Z);
	if wh.z < 0.0 {
		wh = -wh;
	}
	let cos_oh = wo.dot(wh);
	let cos_ih = wi.dot(wh);
	if cos_oh <= 0.0 || cos_ih >= 0.0 {
		return 0.0;
	}
	let fresnel = dielectric(cos_oh, interface.eta);
	if fresnel >= 1.0 {
		return 0.0;
	}
	let sqrt_denom = cos_oh + interface.eta_rel * cos_ih;
	if sqrt_denom.abs() < 1e-6 {
		return 0.0;
	}

	let dwh_dwi = (interface.eta_rel * interface.eta_rel * cos_ih).abs() / (sqrt_denom * sqrt_denom);
	(1.0 - fresnel) * vndf_pdf(wo, wh, alpha) * dwh_dwi
}

// Both lobes of the rough dielectric for directions in the oriented frame
// (wo.z > 0, transmission below).
fn eval_local(surface: &SurfaceParameters, interface: &Interface, wo: Vec3, wi: Vec3) -> (Vec3, f32) {
	let alpha = alpha_of(surface).max(MIN_ALPHA);

	if wi.z > 1e-6 {
		// Reflection side.
		let h = (wo + wi).normalize_or(Vec3::Z);
		let cos_oh = wo.dot(h);
		if cos_oh <= 0.0 {
			return (Vec3::ZERO, 0.0);
		}
		let fresnel = dielectric(cos_oh, interface.eta);
		let d = ggx_ndf(h, alpha);
		let g = smith_g2(wo, wi, alpha);

		let f = Vec3::splat(fresnel * d * g / (4.0 * wo.z * wi.z).max(1e-6));
		return (f, pdf_local(surface, interface, wo, wi));
	}

	if wi.z > -1e-6 {
		return (Vec3::ZERO, 0.0);
	}

	// Transmission side, half vector per Walter et al. eq. 16.
	let mut wh = (wo + wi * interface.eta_rel).normalize_or(Vec3::Z);
	if wh.z < 0.0 {
		wh = -wh;
	}

	let cos_oh = wo.dot(wh);
	let cos_ih = wi.dot(wh);
	if cos_oh <= 0.0 || cos_ih >= 0.0 {
		return (Vec3::ZERO, 0.0);
	}

	let fresnel = dielectric(cos_oh, interface.eta);
	if fresnel >= 1.0 {
		return (Vec3::ZERO, 0.0);
	}

	let d = ggx_ndf(wh, alpha);
	let g = smith_g2(wo, wi, alpha);
	let sqrt_denom = cos_oh + interface.eta_rel * cos_ih;
	if sqrt_denom.abs() < 1e-6 {
		return (Vec3::ZERO, 0.0);
	}

	// The eta^2 of the half-vector Jacobian cancels the radiance
	// compression here; only the delta path carries the ratio explicitly.
	let magnitude = (1.0 - fresnel) * d * g
		* (cos_ih * cos_oh / (wi.z * wo.z * sqrt_denom * sqrt_denom)).abs();
	let f = surface.base_color * magnitude;

	(f, pdf_local(surface, interface, wo, wi))
}

fn sample_delta(
	surface: &SurfaceParameters,
	interface: &Interface,
	wo: Vec3,
	pick: f32,
) -> Option<(Vec3, Vec3, LobeFlags)> {
	let fresnel = dielectric(wo.z, interface.eta);

	if pick < fresnel {
		let wi = Vec3::new(-wo.x, -wo.y, wo.z);
		return Some((wi, Vec3::ONE, LobeFlags::SPECULAR | LobeFlags::DELTA));
	}

	let eta = interface.eta;
	let sin_t_sq = eta * eta * (1.0 - wo.z * wo.z);
	if sin_t_sq >= 1.0 {
		// Unreachable past total internal reflection; fresnel is one there.
		return None;
	}
	let cos_t = (1.0 - sin_t_sq).sqrt();
	let wi = Vec3::new(-eta * wo.x, -eta * wo.y, -cos_t);

	let throughput = surface.base_color * (eta * eta);
	Some((wi, throughput, LobeFlags::SPECULAR | LobeFlags::TRANSMISSION | LobeFlags::DELTA))
}

pub fn sample(
	surface: &SurfaceParameters,
	wo_world: Vec3,
	sampler: &mut SamplerSession,
) -> Option<BsdfSample> {
	let frame = surface.frame();
	let mut wo = frame.to_local(wo_world);
	let entering = wo.z > 0.0;
	if !entering {
		wo.z = -wo.z;
	}
	if wo.z <= 1e-6 {
		return None;
	}
	let interface = interface(surface, entering);

	let pick = sampler.next_1d();

	// Polished interface: both branches are delta lobes. pdf reports one and
	// the throughput already folds the lobe-choice probability.
	if alpha_of(surface) <= MIN_ALPHA {
		let (wi, throughput, lobe) = sample_delta(surface, &interface, wo, pick)?;
		let wi = if entering { wi } else { Vec3::new(wi.x, wi.y, -wi.z) };
		return Some(BsdfSample {
			wi: frame.to_world(wi),
			reflectance: throughput,
			pdf: 1.0,
			lobe,
			throughput,
		});
	}

	let u = sampler.next_2d();
	let alpha = alpha_of(surface);
	let h = sample_vndf(wo, alpha, u);
	let cos_oh = wo.dot(h);
	if cos_oh <= 0.0 {
		return None;
	}
	let fresnel = dielectric(cos_oh, interface.eta);

	let (wi, lobe) = if pick < fresnel {
		let wi = h * (2.0 * cos_oh) - wo;
		if wi.z <= 1e-6 {
			return None;
		}
		(wi, LobeFlags::SPECULAR)
	} else {
		let eta = interface.eta;
		let sin_t_sq = eta * eta * (1.0 - cos_oh * cos_oh);
		if sin_t_sq >= 1.0 {
			return None;
		}
		let cos_t = (1.0 - sin_t_sq).sqrt();
		let wi = h * (eta * cos_oh - cos_t) - wo * eta;
		if wi.z >= -1e-6 {
			return None;
		}
		(wi, LobeFlags::SPECULAR | LobeFlags::TRANSMISSION)
	};

	let (f, pdf) = eval_local(surface, &interface, wo, wi);
	if pdf <= 0.0 {
		return None;
	}

	let throughput = f * (wi.z.abs() / pdf);
	let wi = if entering { wi } else { Vec3::new(wi.x, wi.y, -wi.z) };

	Some(BsdfSample {
		wi: frame.to_world(wi),
		reflectance: f,
		pdf,
		lobe,
		throughput,
	})
}

pub fn evaluate(surface: &SurfaceParameters, wo_world: Vec3, wi_world: Vec3) -> (Vec3, f32) {
	// Delta lobes evaluate to zero for any sampled pair of directions.
	if alpha_of(surface) <= MIN_ALPHA {
		return (Vec3::ZERO, 0.0);
	}

	let frame = surface.frame();
	let mut wo = frame.to_local(wo_world);
	let mut wi = frame.to_local(wi_world);
	let entering = wo.z > 0.0;
	if !entering {
		wo.z = -wo.z;
		wi.z = -wi.z;
	}
	if wo.z <= 1e-6 {
		return (Vec3::ZERO, 0.0);
	}

	eval_local(surface, &interface(surface, entering), wo, wi)
}

/// Analytic pdf only, without the reflectance work. Zero for polished
/// (delta) interfaces.
pub fn pdf(surface: &SurfaceParameters, wo_world: Vec3, wi_world: Vec3) -> f32 {
	if alpha_of(surface) <= MIN_ALPHA {
		return 0.0;
	}

	let frame = surface.frame();
	let mut wo = frame.to_local(wo_world);
	let mut wi = frame.to_local(wi_world);
	let entering = wo.z > 0.0;
	if !entering {
		wo.z = -wo.z;
		wi.z = -wi.z;
	}
	if wo.z <= 1e-6 {
		return 0.0;
	}

	pdf_local(surface, &interface(surface, entering), wo, wi)
}
