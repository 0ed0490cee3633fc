//! Contract with the external ray-traversal kernel.
//!
//! The backend owns acceleration structures and ray-scene queries; this crate
//! registers geometry with it, installs the alpha-test intersection filter
//! and the displacement callback, and consumes hit records. Callbacks may be
//! invoked from backend threads and therefore only capture immutable scene
//! data.

use crate::math::{Vec2, Vec3, Vec4};
use std::sync::Arc;
use thiserror::Error;

pub type GeometryId = u32;

#[derive(Debug, Error)]
#[error("traversal backend: {0}")]
pub struct BackendError(pub String);

/// Candidate hit handed to intersection filters before it is accepted.
#[derive(Clone, Copy, Debug)]
pub struct CandidateHit {
	pub geometry: GeometryId,
	pub primitive: u32,
	pub u: f32,
	pub v: f32,
}

/// Returns false to reject the candidate so traversal continues behind it.
pub type IntersectFilter = Arc<dyn Fn(&CandidateHit) -> bool + Send + Sync>;

/// Normal-directed offset for a tessellated vertex, sampled at (position, uv).
pub type DisplacementFn = Arc<dyn Fn(Vec3, Vec2) -> f32 + Send + Sync>;

/// Indexed triangle or quad mesh. `indices_per_face` selects the topology.
pub struct MeshDesc<'a> {
	pub positions: &'a [Vec3],
	pub indices: &'a [u32],
	pub indices_per_face: u32,
	pub filter: Option<IntersectFilter>,
}

/// Subdivision surface with displacement, used when a displaced material is
/// bound and the build-time displacement gate is enabled.
pub struct SubdivisionMeshDesc<'a> {
	pub positions: &'a [Vec3],
	pub indices: &'a [u32],
	pub indices_per_face: u32,
	pub tessellation_rate: f32,
	pub displacement: DisplacementFn,
	pub filter: Option<IntersectFilter>,
}

/// Round B-spline curves; control points are xyz + radius.
pub struct CurveDesc<'a> {
	pub control_points: &'a [Vec4],
	pub first_vertex_indices: &'a [u32],
}

/// Ray for backend queries. Directions need not be normalized.
#[derive(Clone, Copy, Debug)]
pub struct TraversalRay {
	pub origin: Vec3,
	pub direction: Vec3,
	pub t_min: f32,
	pub t_max: f32,
}

/// Accepted hit record as returned by `intersect1`.
#[derive(Clone, Copy, Debug)]
pub struct GeometryHit {
	pub geometry: GeometryId,
	pub primitive: u32,
	pub t: f32,
	pub u: f32,
	pub v: f32,
	/// Unnormalized geometric normal of the hit primitive.
	pub geometric_normal: Vec3,
}

/// Device factory, created once per process.
pub trait TraversalBackend: Send + Sync {
	fn new_scene(&self) -> Box<dyn SceneBuilder>;
}

/// Accumulates geometry until commit. Geometry ids are assigned by the
/// caller and dense from zero; the backend indexes hits by them.
pub trait SceneBuilder {
	fn attach_mesh(&mut self, id: GeometryId, desc: &MeshDesc<'_>) -> Result<(), BackendError>;
	fn attach_subdivision_mesh(&mut self, id: GeometryId, desc: &SubdivisionMeshDesc<'_>) -> Result<(), BackendError>;
	fn attach_curves(&mut self, id: GeometryId, desc: &CurveDesc<'_>) -> Result<(), BackendError>;
	fn commit(self: Box<Self>) -> Result<Arc<dyn TraversalScene>, BackendError>;
}

/// Committed, immutable scene. Shared read-only between workers; the
/// backend's handle is reference-counted so release happens on last drop.
pub trait TraversalScene: Send + Sync {
	fn intersect1(&self, ray: &TraversalRay) -> Option<GeometryHit>;
	fn occluded1(&self, ray: &TraversalRay) -> bool;
}
