pub mod disney;
pub mod fresnel;
pub mod medium;
pub mod microfacet;
pub mod surface;
pub mod transparent;

pub use medium::MediumParameters;
pub use surface::{
	reflect_differentials, refract_differentials, resolve_surface, ShadingFrame,
	SurfaceParameters,
};

use crate::math::Vec3;
use crate::sampling::SamplerSession;
use crate::scene::ShaderTag;
use bitflags::bitflags;

bitflags! {
	#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
	pub struct LobeFlags: u32 {
		const DIFFUSE = 1 << 0;
		const SPECULAR = 1 << 1;
		/// The sampled direction crosses the surface.
		const TRANSMISSION = 1 << 2;
		/// Dirac lobe: pdf is reported as one and the sample is excluded
		/// from MIS partner pdfs.
		const DELTA = 1 << 3;
	}
}

/// A drawn scattering direction with everything the kernel needs to continue
/// the path.
#[derive(Clone, Copy, Debug)]
pub struct BsdfSample {
	/// Unit world-space continuation direction.
	pub wi: Vec3,
	/// BSDF value at (wo, wi); for delta lobes the full weight.
	pub reflectance: Vec3,
	/// Solid-angle pdf; one for delta lobes.
	pub pdf: f32,
	pub lobe: LobeFlags,
	/// `reflectance * |cos| / pdf`, or the weight itself for delta lobes.
	pub throughput: Vec3,
}

/// Draws a continuation direction from the surface's shader.
///
/// Returns `None` for geometrically invalid configurations (grazing view,
/// sampled direction on the wrong side, vanishing pdf); callers terminate
/// the path on it.
pub fn sample(
	surface: &SurfaceParameters,
	wo: Vec3,
	sampler: &mut SamplerSession,
) -> Option<BsdfSample> {
	match surface.shader {
		ShaderTag::DisneySolid => disney::sample_solid(surface, wo, sampler),
		ShaderTag::DisneyThin => disney::sample_thin(surface, wo, sampler),
		ShaderTag::TransparentGgx => transparent::sample(surface, wo, sampler),
	}
}

/// BSDF value and solid-angle pdf for a fixed direction pair; next-event
/// estimation pairs this with the light sampler's pdf. Delta lobes evaluate
/// to zero.
pub fn evaluate(surface: &SurfaceParameters, wo: Vec3, wi: Vec3) -> (Vec3, f32) {
	match surface.shader {
		ShaderTag::DisneySolid => disney::evaluate_solid(surface, wo, wi),
		ShaderTag::DisneyThin => disney::evaluate_thin(surface, wo, wi),
		ShaderTag::TransparentGgx => transparent::evaluate(surface, wo, wi),
	}
}

/// Solid-angle pdf alone, the MIS partner term for light sampling. Cheaper
/// than [`evaluate`] when the reflectance is not needed, zero for delta
/// lobes and wrong-side directions.
pub fn pdf(surface: &SurfaceParameters, wo: Vec3, wi: Vec3) -> f32 {
	match surface.shader {
		ShaderTag::DisneySolid => disney::pdf_solid(surface, wo, wi),
		ShaderTag::DisneyThin => disney::pdf_thin(surface, wo, wi),
		ShaderTag::TransparentGgx => transparent::pdf(surface, wo, wi),
	}
}
