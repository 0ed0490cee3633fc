use crate::math::Vec3;
use bitflags::bitflags;

bitflags! {
	#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
	pub struct MaterialFlags: u32 {
		/// Install an intersection filter that alpha-tests candidate hits.
		const ALPHA_TESTED = 1 << 0;
		/// Promote the mesh to a displaced subdivision surface when the
		/// build-time displacement gate is on.
		const DISPLACEMENT_ENABLED = 1 << 1;
		/// Propagate ray differentials through reflection and refraction.
		const PRESERVE_RAY_DIFFERENTIALS = 1 << 2;
		/// Two-sided thin sheet, shading normal flips toward the viewer.
		const THIN_SURFACE = 1 << 3;
	}
}

/// Shader dispatch tag. A closed set so the kernel can switch without
/// virtual dispatch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ShaderTag {
	#[default]
	DisneySolid,
	DisneyThin,
	TransparentGgx,
}

impl ShaderTag {
	pub fn to_u32(self) -> u32 {
		match self {
			Self::DisneySolid => 0,
			Self::DisneyThin => 1,
			Self::TransparentGgx => 2,
		}
	}

	pub fn from_u32(value: u32) -> Option<Self> {
		match value {
			0 => Some(Self::DisneySolid),
			1 => Some(Self::DisneyThin),
			2 => Some(Self::TransparentGgx),
			_ => None,
		}
	}
}

/// Index into the material's scalar attribute table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(usize)]
pub enum ScalarAttribute {
	Roughness,
	Metallic,
	SpecularTint,
	Anisotropic,
	Sheen,
	SheenTint,
	Clearcoat,
	ClearcoatGloss,
	Ior,
	Transmission,
	Specular,
	Flatness,
}

pub const SCALAR_ATTRIBUTE_COUNT: usize = 12;

/// Texture slot index when no texture is bound.
pub const NO_TEXTURE: u32 = u32::MAX;

#[derive(Clone, Debug)]
pub struct Material {
	/// 32-bit name hash; the material array is sorted by it.
	pub hash: u32,
	pub base_color: Vec3,
	pub emission: Vec3,
	pub shader: ShaderTag,
	pub flags: MaterialFlags,
	pub scalars: [f32; SCALAR_ATTRIBUTE_COUNT],
	/// Texture slots, indices into the model's texture array.
	pub albedo_texture: u32,
	pub normal_texture: u32,
	pub roughness_metallic_texture: u32,
	pub displacement_texture: u32,
	/// Interior medium, extinction is the sum.
	pub sigma_a: f32,
	pub sigma_s: f32,
}

impl Material {
	pub fn scalar(&self, attribute: ScalarAttribute) -> f32 {
		self.scalars[attribute as usize]
	}

	pub fn set_scalar(&mut self, attribute: ScalarAttribute, value: f32) {
		self.scalars[attribute as usize] = value;
	}

	pub fn is_emissive(&self) -> bool {
		self.emission != Vec3::ZERO
	}

	pub fn has_medium(&self) -> bool {
		self.sigma_a + self.sigma_s > 0.0
	}
}

impl Default for Material {
	/// The fallback bound when a mesh's material hash has no match.
	fn default() -> Self {
		let mut scalars = [0.0; SCALAR_ATTRIBUTE_COUNT];
		scalars[ScalarAttribute::Roughness as usize] = 0.5;
		scalars[ScalarAttribute::Ior as usize] = 1.5;
		scalars[ScalarAttribute::Specular as usize] = 0.5;

		Self {
			hash: 0,
			base_color: Vec3::splat(0.6),
			emission: Vec3::ZERO,
			shader: ShaderTag::DisneySolid,
			flags: MaterialFlags::empty(),
			scalars,
			albedo_texture: NO_TEXTURE,
			normal_texture: NO_TEXTURE,
			roughness_metallic_texture: NO_TEXTURE,
			displacement_texture: NO_TEXTURE,
			sigma_a: 0.0,
			sigma_s: 0.0,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_material_matches_fallback_contract() {
		let material = Material::default();
		assert_eq!(material.base_color, Vec3::splat(0.6));
		assert_eq!(material.shader, ShaderTag::DisneySolid);
		assert_eq!(material.scalar(ScalarAttribute::Ior), 1.5);
		assert!(!material.is_emissive());
	}

	#[test]
	fn shader_tag_round_trips() {
		for tag in [ShaderTag::DisneySolid, ShaderTag::DisneyThin, ShaderTag::TransparentGgx] {
			assert_eq!(ShaderTag::from_u32(tag.to_u32()), Some(tag));
		}
		assert_eq!(ShaderTag::from_u32(9), None);
	}
}
