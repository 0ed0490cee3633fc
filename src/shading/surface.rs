use crate::math::{orthonormal_basis, Vec2, Vec3};
use crate::scene::{MaterialFlags, ScalarAttribute, Scene, ShaderTag, NO_TEXTURE};
use crate::traversal::GeometryHit;

/// Orthonormal tangent frame; +z of local space is the shading normal.
#[derive(Clone, Copy, Debug)]
pub struct ShadingFrame {
	pub tangent: Vec3,
	pub bitangent: Vec3,
	pub normal: Vec3,
}

impl ShadingFrame {
	pub fn to_local(&self, v: Vec3) -> Vec3 {
		Vec3::new(v.dot(self.tangent), v.dot(self.bitangent), v.dot(self.normal))
	}

	pub fn to_world(&self, v: Vec3) -> Vec3 {
		self.tangent * v.x + self.bitangent * v.y + self.normal * v.z
	}
}

/// Resolved shading state at a hit point.
pub struct SurfaceParameters {
	pub position: Vec3,
	pub geometric_normal: Vec3,
	pub shading_normal: Vec3,
	pub tangent: Vec3,
	pub bitangent: Vec3,
	/// Unit direction toward the ray origin.
	pub view: Vec3,

	pub base_color: Vec3,
	pub emission: Vec3,
	pub roughness: f32,
	pub metallic: f32,
	pub specular_tint: f32,
	pub anisotropic: f32,
	pub sheen: f32,
	pub sheen_tint: f32,
	pub clearcoat: f32,
	pub clearcoat_gloss: f32,
	pub ior: f32,
	pub transmission: f32,
	pub specular: f32,
	pub flatness: f32,

	pub flags: MaterialFlags,
	pub shader: ShaderTag,
	pub sigma_a: f32,
	pub sigma_s: f32,

	// Normal and uv derivatives for texture footprints and differential
	// propagation.
	pub dndu: Vec3,
	pub dndv: Vec3,
	pub duvdx: Vec2,
	pub duvdy: Vec2,
	pub rx_direction: Option<Vec3>,
	pub ry_direction: Option<Vec3>,

	/// Hit-local length scale for ray-origin offsets.
	pub offset_scale: f32,
}

impl SurfaceParameters {
	pub fn frame(&self) -> ShadingFrame {
		ShadingFrame {
			tangent: self.tangent,
			bitangent: self.bitangent,
			normal: self.shading_normal,
		}
	}

	/// Spawn origin for a secondary ray, displaced along the geometric
	/// normal. The sign follows the outgoing direction so reflection rays
	/// leave the front and refraction rays the back.
	pub fn offset_origin(&self, direction: Vec3) -> Vec3 {
		let sign = if direction.dot(self.geometric_normal) >= 0.0 { 1.0 } else { -1.0 };
		self.position + self.geometric_normal * (sign * self.offset_scale)
	}

	pub fn is_emissive(&self) -> bool {
		self.emission != Vec3::ZERO
	}
}

// Triangle partial derivatives with respect to uv, used for both dp/duv and
// dn/duv. Falls back to zero when the uv parameterization is degenerate.
fn uv_derivatives(values: [Vec3; 3], uvs: [Vec2; 3]) -> (Vec3, Vec3) {
	let duv1 = uvs[1] - uvs[0];
	let duv2 = uvs[2] - uvs[0];
	let dv1 = values[1] - values[0];
	let dv2 = values[2] - values[0];

	let det = duv1.x * duv2.y - duv1.y * duv2.x;
	if det.abs() < 1e-12 {
		return (Vec3::ZERO, Vec3::ZERO);
	}
	let inv_det = 1.0 / det;

	(
		(dv1 * duv2.y - dv2 * duv1.y) * inv_det,
		(dv2 * duv1.x - dv1 * duv2.x) * inv_det,
	)
}

// Solves dpdx = dudx * dpdu + dvdx * dpdv in the two dimensions where the
// normal is largest.
fn solve_uv_offset(dpdx: Vec3, dpdu: Vec3, dpdv: Vec3, normal: Vec3) -> Vec2 {
	let (i0, i1) = if normal.x.abs() > normal.y.abs() && normal.x.abs() > normal.z.abs() {
		(1, 2)
	} else if normal.y.abs() > normal.z.abs() {
		(0, 2)
	} else {
		(0, 1)
	};

	let a = [[dpdu[i0], dpdv[i0]], [dpdu[i1], dpdv[i1]]];
	let b = [dpdx[i0], dpdx[i1]];
	let det = a[0][0] * a[1][1] - a[0][1] * a[1][0];
	if det.abs() < 1e-12 {
		return Vec2::ZERO;
	}

	Vec2::new(
		(a[1][1] * b[0] - a[0][1] * b[1]) / det,
		(a[0][0] * b[1] - a[1][0] * b[0]) / det,
	)
}

/// Builds the full shading state for a hit.
///
/// `ray_origin`/`ray_direction` describe the incoming ray; the differential
/// directions are carried through when present so texture lookups get
/// screen-space footprints.
pub fn resolve_surface(
	scene: &Scene,
	hit: &GeometryHit,
	ray_origin: Vec3,
	ray_direction: Vec3,
	rx_direction: Option<Vec3>,
	ry_direction: Option<Vec3>,
) -> SurfaceParameters {
	let record = scene.record(hit.geometry);
	let material = &record.material;
	let view = (-ray_direction).normalize_or(Vec3::Z);

	let mut geometric_normal = hit.geometric_normal.normalize_or(Vec3::Z);

	let (position, mut shading_normal, tangent4, uv, dpdu, dpdv, dndu, dndv, primitive_extent) =
		match &record.mesh {
			Some(mesh) => {
				let position = mesh.interpolate_position(hit.primitive, hit.u, hit.v);
				let shading_normal = mesh
					.interpolate_normal(hit.primitive, hit.u, hit.v)
					.map(|n| n.normalize_or(geometric_normal))
					.unwrap_or(geometric_normal);
				let tangent4 = mesh.interpolate_tangent(hit.primitive, hit.u, hit.v);
				let uv = mesh.interpolate_uv(hit.primitive, hit.u, hit.v).unwrap_or(Vec2::ZERO);

				// Per-primitive derivatives from the first triangle of the
				// face; quads reuse it as a local approximation.
				let corner = |k| mesh.positions[mesh.face_vertex(hit.primitive, k) as usize];
				let corners = [corner(0), corner(1), corner(2)];
				let corner_uvs = if mesh.uvs.is_empty() {
					[Vec2::ZERO, Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)]
				} else {
					let uv_of = |k| mesh.uvs[mesh.face_vertex(hit.primitive, k) as usize];
					[uv_of(0), uv_of(1), uv_of(2)]
				};
				let (dpdu, dpdv) = uv_derivatives(corners, corner_uvs);

				let (dndu, dndv) = if mesh.normals.is_empty() {
					(Vec3::ZERO, Vec3::ZERO)
				} else {
					let n_of = |k: u32| mesh.normals[mesh.face_vertex(hit.primitive, k) as usize];
					uv_derivatives([n_of(0), n_of(1), n_of(2)], corner_uvs)
				};

				let extent = (corners[1] - corners[0])
					.length()
					.max((corners[2] - corners[0]).length())
					.max((corners[2] - corners[1]).length());

				(position, shading_normal, tangent4, uv, dpdu, dpdv, dndu, dndv, extent)
			}
			None => {
				// Curves carry no vertex attribute interpolation; the hit
				// record's geometry is all there is.
				let position = ray_origin + ray_direction * hit.t;
				(position, geometric_normal, None, Vec2::new(hit.u, hit.v),
					Vec3::ZERO, Vec3::ZERO, Vec3::ZERO, Vec3::ZERO, 1.0)
			}
		};

	// Keep the geometric normal in the shading normal's hemisphere so
	// sidedness tests agree between the two.
	if geometric_normal.dot(shading_normal) < 0.0 {
		geometric_normal = -geometric_normal;
	}

	// Tangent frame: interpolated tangent re-orthogonalized against the
	// shading normal, falling back to the uv parameterization and finally to
	// an arbitrary basis.
	let (mut tangent, mut bitangent) = match tangent4 {
		Some(t4) => {
			let t = t4.truncate();
			let t = (t - shading_normal * shading_normal.dot(t)).normalize_or(Vec3::X);
			(t, shading_normal.cross(t) * t4.w.signum())
		}
		None if dpdu != Vec3::ZERO => {
			let t = (dpdu - shading_normal * shading_normal.dot(dpdu)).normalize_or(Vec3::X);
			(t, shading_normal.cross(t))
		}
		None => orthonormal_basis(shading_normal),
	};

	// Screen-space uv footprint from the differential rays.
	let (duvdx, duvdy) = {
		let transfer = |differential: Option<Vec3>| -> Vec2 {
			let Some(direction) = differential else { return Vec2::ZERO };
			let denom = geometric_normal.dot(direction);
			if denom.abs() < 1e-9 || dpdu == Vec3::ZERO {
				return Vec2::ZERO;
			}
			let t = geometric_normal.dot(position - ray_origin) / denom;
			if !(t.is_finite() && t > 0.0) {
				return Vec2::ZERO;
			}
			let offset_hit = ray_origin + direction * t;
			solve_uv_offset(offset_hit - position, dpdu, dpdv, geometric_normal)
		};
		(transfer(rx_direction), transfer(ry_direction))
	};

	// Texture resolve.
	let mut base_color = material.base_color;
	if material.albedo_texture != NO_TEXTURE {
		if let Some(texture) = scene.texture(material.albedo_texture) {
			base_color = base_color.cmul(texture.sample_filtered(uv, duvdx, duvdy).truncate());
		}
	}

	let mut roughness = material.scalar(ScalarAttribute::Roughness);
	let mut metallic = material.scalar(ScalarAttribute::Metallic);
	if material.roughness_metallic_texture != NO_TEXTURE {
		if let Some(texture) = scene.texture(material.roughness_metallic_texture) {
			// Packed convention: roughness in g, metallic in b.
			let packed = texture.sample_filtered(uv, duvdx, duvdy);
			roughness *= packed.y;
			metallic *= packed.z;
		}
	}

	if material.normal_texture != NO_TEXTURE {
		if let Some(texture) = scene.texture(material.normal_texture) {
			let texel = texture.sample_filtered(uv, duvdx, duvdy).truncate();
			let mapped = texel * 2.0 - Vec3::ONE;
			shading_normal = (tangent * mapped.x + bitangent * mapped.y + shading_normal * mapped.z)
				.normalize_or(shading_normal);
			tangent = (tangent - shading_normal * shading_normal.dot(tangent)).normalize_or(tangent);
			bitangent = shading_normal.cross(tangent);
		}
	}

	SurfaceParameters {
		position,
		geometric_normal,
		shading_normal,
		tangent,
		bitangent,
		view,
		base_color,
		emission: material.emission,
		roughness,
		metallic,
		specular_tint: material.scalar(ScalarAttribute::SpecularTint),
		anisotropic: material.scalar(ScalarAttribute::Anisotropic),
		sheen: material.scalar(ScalarAttribute::Sheen),
		sheen_tint: material.scalar(ScalarAttribute::SheenTint),
		clearcoat: material.scalar(ScalarAttribute::Clearcoat),
		clearcoat_gloss: material.scalar(ScalarAttribute::ClearcoatGloss),
		ior: material.scalar(ScalarAttribute::Ior),
		transmission: material.scalar(ScalarAttribute::Transmission),
		specular: material.scalar(ScalarAttribute::Specular),
		flatness: material.scalar(ScalarAttribute::Flatness),
		flags: material.flags,
		shader: material.shader,
		sigma_a: material.sigma_a,
		sigma_s: material.sigma_s,
		dndu,
		dndv,
		duvdx,
		duvdy,
		rx_direction,
		ry_direction,
		offset_scale: (primitive_extent * 1e-4).max(1e-6),
	}
}

/// Analytic differential transfer through mirror reflection.
///
/// Requires the inbound differentials; absent ones propagate as `None` so
/// downstream lookups fall back to unfiltered sampling.
pub fn reflect_differentials(surface: &SurfaceParameters, wi: Vec3) -> (Option<Vec3>, Option<Vec3>) {
	let n = surface.shading_normal;
	let wo = surface.view;

	let propagate = |differential: Option<Vec3>, duv: Vec2| -> Option<Vec3> {
		let rx = differential?;
		let dndx = surface.dndu * duv.x + surface.dndv * duv.y;
		let dwodx = -rx - wo;
		let ddndx = dwodx.dot(n) + wo.dot(dndx);
		Some((wi - dwodx + (dndx * wo.dot(n) + n * ddndx) * 2.0).normalize_or(wi))
	};

	(
		propagate(surface.rx_direction, surface.duvdx),
		propagate(surface.ry_direction, surface.duvdy),
	)
}

/// Analytic differential transfer through refraction with relative ior
/// `eta` (incident over transmitted).
///
/// Grazing transmission is numerically fragile; when the transmitted cosine
/// nearly vanishes the differential is dropped rather than exploded.
pub fn refract_differentials(
	surface: &SurfaceParameters,
	wi: Vec3,
	eta: f32,
) -> (Option<Vec3>, Option<Vec3>) {
	let n = surface.shading_normal;
	let wo = surface.view;

	let cos_i = wo.dot(n);
	let cos_t = wi.dot(n);
	if cos_t * cos_t < 1e-6 {
		return (None, None);
	}
	let mu = eta * cos_i.abs() - cos_t.abs();

	let propagate = |differential: Option<Vec3>, duv: Vec2| -> Option<Vec3> {
		let rx = differential?;
		let dndx = surface.dndu * duv.x + surface.dndv * duv.y;
		let dwodx = -rx - wo;
		let ddndx = dwodx.dot(n) + wo.dot(dndx);
		let dmudx = (eta - (eta * eta * cos_i) / cos_t) * ddndx;
		Some((wi + dwodx * eta - (dndx * mu + n * dmudx)).normalize_or(wi))
	};

	(
		propagate(surface.rx_direction, surface.duvdx),
		propagate(surface.ry_direction, surface.duvdy),
	)
}
