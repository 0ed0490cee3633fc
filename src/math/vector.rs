use bytemuck::{Pod, Zeroable};
use std::ops::{Add, AddAssign, Div, DivAssign, Index, IndexMut, Mul, MulAssign, Neg, Sub, SubAssign};

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vec2 {
	pub x: f32,
	pub y: f32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vec3 {
	pub x: f32,
	pub y: f32,
	pub z: f32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vec4 {
	pub x: f32,
	pub y: f32,
	pub z: f32,
	pub w: f32,
}

impl Vec2 {
	pub const ZERO: Self = Self::splat(0.0);
	pub const ONE: Self = Self::splat(1.0);

	pub const fn new(x: f32, y: f32) -> Self {
		Self { x, y }
	}

	pub const fn splat(value: f32) -> Self {
		Self { x: value, y: value }
	}

	pub fn extend(&self, z: f32) -> Vec3 {
		Vec3::new(self.x, self.y, z)
	}

	pub fn dot(&self, rhs: Self) -> f32 {
		self.x * rhs.x + self.y * rhs.y
	}

	pub fn length_sq(&self) -> f32 {
		self.dot(*self)
	}

	pub fn length(&self) -> f32 {
		self.length_sq().sqrt()
	}

	/// Componentwise multiply.
	pub fn cmul(&self, rhs: Self) -> Self {
		Self::new(self.x * rhs.x, self.y * rhs.y)
	}
}

impl Vec3 {
	pub const ZERO: Self = Self::splat(0.0);
	pub const ONE: Self = Self::splat(1.0);
	pub const X: Self = Self::new(1.0, 0.0, 0.0);
	pub const Y: Self = Self::new(0.0, 1.0, 0.0);
	pub const Z: Self = Self::new(0.0, 0.0, 1.0);

	pub const fn new(x: f32, y: f32, z: f32) -> Self {
		Self { x, y, z }
	}

	pub const fn splat(value: f32) -> Self {
		Self { x: value, y: value, z: value }
	}

	pub fn truncate(&self) -> Vec2 {
		Vec2::new(self.x, self.y)
	}

	pub fn extend(&self, w: f32) -> Vec4 {
		Vec4::new(self.x, self.y, self.z, w)
	}

	pub fn dot(&self, rhs: Self) -> f32 {
		self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
	}

	pub fn cross(&self, rhs: Self) -> Self {
		Self::new(
			self.y * rhs.z - self.z * rhs.y,
			self.z * rhs.x - self.x * rhs.z,
			self.x * rhs.y - self.y * rhs.x,
		)
	}

	pub fn length_sq(&self) -> f32 {
		self.dot(*self)
	}

	pub fn length(&self) -> f32 {
		self.length_sq().sqrt()
	}

	pub fn normalize(&self) -> Self {
		*self / self.length()
	}

	/// Normalizes, falling back to `fallback` for degenerate input.
	pub fn normalize_or(&self, fallback: Self) -> Self {
		let len_sq = self.length_sq();
		if len_sq > 0.0 && len_sq.is_finite() {
			*self / len_sq.sqrt()
		} else {
			fallback
		}
	}

	pub fn distance(&self, rhs: Self) -> f32 {
		(*self - rhs).length()
	}

	/// Componentwise multiply.
	pub fn cmul(&self, rhs: Self) -> Self {
		Self::new(self.x * rhs.x, self.y * rhs.y, self.z * rhs.z)
	}

	pub fn min(&self, rhs: Self) -> Self {
		Self::new(self.x.min(rhs.x), self.y.min(rhs.y), self.z.min(rhs.z))
	}

	pub fn max(&self, rhs: Self) -> Self {
		Self::new(self.x.max(rhs.x), self.y.max(rhs.y), self.z.max(rhs.z))
	}

	pub fn abs(&self) -> Self {
		Self::new(self.x.abs(), self.y.abs(), self.z.abs())
	}

	pub fn max_element(&self) -> f32 {
		self.x.max(self.y).max(self.z)
	}

	pub fn lerp(&self, rhs: Self, t: f32) -> Self {
		*self + (rhs - *self) * t
	}

	pub fn is_finite(&self) -> bool {
		self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
	}

	/// Reflects this direction about a unit normal.
	pub fn reflect(&self, n: Self) -> Self {
		*self - n * (2.0 * self.dot(n))
	}

	/// Average of the three components.
	pub fn luminance_avg(&self) -> f32 {
		(self.x + self.y + self.z) / 3.0
	}
}

impl Vec4 {
	pub const ZERO: Self = Self::splat(0.0);
	pub const ONE: Self = Self::splat(1.0);

	pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
		Self { x, y, z, w }
	}

	pub const fn splat(value: f32) -> Self {
		Self { x: value, y: value, z: value, w: value }
	}

	pub fn truncate(&self) -> Vec3 {
		Vec3::new(self.x, self.y, self.z)
	}

	pub fn dot(&self, rhs: Self) -> f32 {
		self.x * rhs.x + self.y * rhs.y + self.z * rhs.z + self.w * rhs.w
	}
}

macro_rules! impl_vector_ops {
	($ty:ty { $($field:ident),+ }) => {
		impl Add for $ty {
			type Output = Self;
			fn add(self, rhs: Self) -> Self {
				Self { $($field: self.$field + rhs.$field),+ }
			}
		}

		impl Sub for $ty {
			type Output = Self;
			fn sub(self, rhs: Self) -> Self {
				Self { $($field: self.$field - rhs.$field),+ }
			}
		}

		impl Mul<f32> for $ty {
			type Output = Self;
			fn mul(self, rhs: f32) -> Self {
				Self { $($field: self.$field * rhs),+ }
			}
		}

		impl Div<f32> for $ty {
			type Output = Self;
			fn div(self, rhs: f32) -> Self {
				Self { $($field: self.$field / rhs),+ }
			}
		}

		impl Neg for $ty {
			type Output = Self;
			fn neg(self) -> Self {
				Self { $($field: -self.$field),+ }
			}
		}

		impl AddAssign for $ty {
			fn add_assign(&mut self, rhs: Self) {
				$(self.$field += rhs.$field;)+
			}
		}

		impl SubAssign for $ty {
			fn sub_assign(&mut self, rhs: Self) {
				$(self.$field -= rhs.$field;)+
			}
		}

		impl MulAssign<f32> for $ty {
			fn mul_assign(&mut self, rhs: f32) {
				$(self.$field *= rhs;)+
			}
		}

		impl DivAssign<f32> for $ty {
			fn div_assign(&mut self, rhs: f32) {
				$(self.$field /= rhs;)+
			}
		}
	};
}

impl_vector_ops!(Vec2 { x, y });
impl_vector_ops!(Vec3 { x, y, z });
impl_vector_ops!(Vec4 { x, y, z, w });

impl Index<usize> for Vec3 {
	type Output = f32;

	fn index(&self, index: usize) -> &f32 {
		match index {
			0 => &self.x,
			1 => &self.y,
			2 => &self.z,
			_ => panic!("Vec3 index {index} out of range"),
		}
	}
}

impl IndexMut<usize> for Vec3 {
	fn index_mut(&mut self, index: usize) -> &mut f32 {
		match index {
			0 => &mut self.x,
			1 => &mut self.y,
			2 => &mut self.z,
			_ => panic!("Vec3 index {index} out of range"),
		}
	}
}
