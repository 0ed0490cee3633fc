use super::vector::{Vec3, Vec4};
use bytemuck::{Pod, Zeroable};
use std::ops::Mul;

/// Row-major 4x4 matrix.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Mat4 {
	pub data: [[f32; 4]; 4],
}

impl Mat4 {
	pub const IDENTITY: Self = Self {
		data: [
			[1.0, 0.0, 0.0, 0.0],
			[0.0, 1.0, 0.0, 0.0],
			[0.0, 0.0, 1.0, 0.0],
			[0.0, 0.0, 0.0, 1.0],
		],
	};

	pub const fn from_rows(rows: [[f32; 4]; 4]) -> Self {
		Self { data: rows }
	}

	pub fn from_translation(t: Vec3) -> Self {
		Self::from_rows([
			[1.0, 0.0, 0.0, t.x],
			[0.0, 1.0, 0.0, t.y],
			[0.0, 0.0, 1.0, t.z],
			[0.0, 0.0, 0.0, 1.0],
		])
	}

	pub fn from_scale(s: Vec3) -> Self {
		Self::from_rows([
			[s.x, 0.0, 0.0, 0.0],
			[0.0, s.y, 0.0, 0.0],
			[0.0, 0.0, s.z, 0.0],
			[0.0, 0.0, 0.0, 1.0],
		])
	}

	/// Basis vectors become the upper-left 3x3 columns.
	pub fn from_basis(x: Vec3, y: Vec3, z: Vec3, origin: Vec3) -> Self {
		Self::from_rows([
			[x.x, y.x, z.x, origin.x],
			[x.y, y.y, z.y, origin.y],
			[x.z, y.z, z.z, origin.z],
			[0.0, 0.0, 0.0, 1.0],
		])
	}

	/// Right-handed world-to-view transform looking from `eye` toward
	/// `target`; view space looks down -z.
	pub fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Self {
		let forward = (target - eye).normalize();
		let right = forward.cross(up).normalize();
		let up = right.cross(forward);

		Self::from_rows([
			[right.x, right.y, right.z, -right.dot(eye)],
			[up.x, up.y, up.z, -up.dot(eye)],
			[-forward.x, -forward.y, -forward.z, forward.dot(eye)],
			[0.0, 0.0, 0.0, 1.0],
		])
	}

	/// Right-handed perspective projection with a [0, 1] depth range.
	/// `fov_y` is the vertical field of view in radians.
	pub fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
		let f = 1.0 / (0.5 * fov_y).tan();

		Self::from_rows([
			[f / aspect, 0.0, 0.0, 0.0],
			[0.0, f, 0.0, 0.0],
			[0.0, 0.0, far / (near - far), near * far / (near - far)],
			[0.0, 0.0, -1.0, 0.0],
		])
	}

	pub fn row(&self, i: usize) -> Vec4 {
		Vec4::new(self.data[i][0], self.data[i][1], self.data[i][2], self.data[i][3])
	}

	pub fn transpose(&self) -> Self {
		let mut out = Self::IDENTITY;
		for r in 0..4 {
			for c in 0..4 {
				out.data[c][r] = self.data[r][c];
			}
		}
		out
	}

	pub fn transform_point(&self, p: Vec3) -> Vec3 {
		let v = p.extend(1.0);
		Vec3::new(self.row(0).dot(v), self.row(1).dot(v), self.row(2).dot(v))
	}

	pub fn transform_vector(&self, d: Vec3) -> Vec3 {
		let v = d.extend(0.0);
		Vec3::new(self.row(0).dot(v), self.row(1).dot(v), self.row(2).dot(v))
	}

	pub fn inverse(&self) -> Self {
		let m = &self.data;

		let a2323 = m[2][2] * m[3][3] - m[2][3] * m[3][2];
		let a1323 = m[2][1] * m[3][3] - m[2][3] * m[3][1];
		let a1223 = m[2][1] * m[3][2] - m[2][2] * m[3][1];
		let a0323 = m[2][0] * m[3][3] - m[2][3] * m[3][0];
		let a0223 = m[2][0] * m[3][2] - m[2][2] * m[3][0];
		let a0123 = m[2][0] * m[3][1] - m[2][1] * m[3][0];
		let a2313 = m[1][2] * m[3][3] - m[1][3] * m[3][2];
		let a1313 = m[1][1] * m[3][3] - m[1][3] * m[3][1];
		let a1213 = m[1][1] * m[3][2] - m[1][2] * m[3][1];
		let a2312 = m[1][2] * m[2][3] - m[1][3] * m[2][2];
		let a1312 = m[1][1] * m[2][3] - m[1][3] * m[2][1];
		let a1212 = m[1][1] * m[2][2] - m[1][2] * m[2][1];
		let a0313 = m[1][0] * m[3][3] - m[1][3] * m[3][0];
		let a0213 = m[1][0] * m[3][2] - m[1][2] * m[3][0];
		let a0312 = m[1][0] * m[2][3] - m[1][3] * m[2][0];
		let a0212 = m[1][0] * m[2][2] - m[1][2] * m[2][0];
		let a0113 = m[1][0] * m[3][1] - m[1][1] * m[3][0];
		let a0112 = m[1][0] * m[2][1] - m[1][1] * m[2][0];

		let det = m[0][0] * (m[1][1] * a2323 - m[1][2] * a1323 + m[1][3] * a1223)
			- m[0][1] * (m[1][0] * a2323 - m[1][2] * a0323 + m[1][3] * a0223)
			+ m[0][2] * (m[1][0] * a1323 - m[1][1] * a0323 + m[1][3] * a0123)
			- m[0][3] * (m[1][0] * a1223 - m[1][1] * a0223 + m[1][2] * a0123);
		let inv_det = 1.0 / det;

		Self::from_rows([
			[
				inv_det * (m[1][1] * a2323 - m[1][2] * a1323 + m[1][3] * a1223),
				inv_det * -(m[0][1] * a2323 - m[0][2] * a1323 + m[0][3] * a1223),
				inv_det * (m[0][1] * a2313 - m[0][2] * a1313 + m[0][3] * a1213),
				inv_det * -(m[0][1] * a2312 - m[0][2] * a1312 + m[0][3] * a1212),
			],
			[
				inv_det * -(m[1][0] * a2323 - m[1][2] * a0323 + m[1][3] * a0223),
				inv_det * (m[0][0] * a2323 - m[0][2] * a0323 + m[0][3] * a0223),
				inv_det * -(m[0][0] * a2313 - m[0][2] * a0313 + m[0][3] * a0213),
				inv_det * (m[0][0] * a2312 - m[0][2] * a0312 + m[0][3] * a0212),
			],
			[
				inv_det * (m[1][0] * a1323 - m[1][1] * a0323 + m[1][3] * a0123),
				inv_det * -(m[0][0] * a1323 - m[0][1] * a0323 + m[0][3] * a0123),
				inv_det * (m[0][0] * a1313 - m[0][1] * a0313 + m[0][3] * a0113),
				inv_det * -(m[0][0] * a1312 - m[0][1] * a0312 + m[0][3] * a0112),
			],
			[
				inv_det * -(m[1][0] * a1223 - m[1][1] * a0223 + m[1][2] * a0123),
				inv_det * (m[0][0] * a1223 - m[0][1] * a0223 + m[0][2] * a0123),
				inv_det * -(m[0][0] * a1213 - m[0][1] * a0213 + m[0][2] * a0113),
				inv_det * (m[0][0] * a1212 - m[0][1] * a0212 + m[0][2] * a0112),
			],
		])
	}
}

impl Mul for Mat4 {
	type Output = Self;

	fn mul(self, rhs: Self) -> Self {
		let mut out = Self::IDENTITY;
		for r in 0..4 {
			for c in 0..4 {
				let mut sum = 0.0;
				for k in 0..4 {
					sum += self.data[r][k] * rhs.data[k][c];
				}
				out.data[r][c] = sum;
			}
		}
		out
	}
}
