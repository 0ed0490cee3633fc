pub mod distribution;
pub mod sampler;
pub mod sequence;

pub use distribution::*;
pub use sampler::SamplerSession;
pub use sequence::QuasiRandom;
