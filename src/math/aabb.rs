use super::vector::Vec3;
use bytemuck::{Pod, Zeroable};

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Aabb {
	pub min: Vec3,
	pub max: Vec3,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct BoundingSphere {
	pub center: Vec3,
	pub radius: f32,
}

impl Aabb {
	/// Inverted bounds, neutral element for `union`.
	pub const EMPTY: Self = Self {
		min: Vec3::splat(f32::INFINITY),
		max: Vec3::splat(f32::NEG_INFINITY),
	};

	pub const fn new(min: Vec3, max: Vec3) -> Self {
		Self { min, max }
	}

	pub fn expand(&mut self, point: Vec3) {
		self.min = self.min.min(point);
		self.max = self.max.max(point);
	}

	pub fn union(&self, rhs: Self) -> Self {
		Self {
			min: self.min.min(rhs.min),
			max: self.max.max(rhs.max),
		}
	}

	pub fn center(&self) -> Vec3 {
		(self.min + self.max) * 0.5
	}

	pub fn extent(&self) -> Vec3 {
		self.max - self.min
	}

	pub fn is_empty(&self) -> bool {
		self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
	}

	pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
		let mut aabb = Self::EMPTY;
		for p in points {
			aabb.expand(p);
		}
		aabb
	}

	pub fn bounding_sphere(&self) -> BoundingSphere {
		let center = self.center();
		BoundingSphere {
			center,
			radius: if self.is_empty() { 0.0 } else { center.distance(self.max) },
		}
	}
}
