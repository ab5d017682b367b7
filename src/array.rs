pub mod attention;
pub mod geometry;
pub mod mic_pair;
pub mod projector;

pub use crate::array::attention::AttentionPattern;
pub use crate::array::geometry::ArrayMicrophoneGeometry;
pub use crate::array::mic_pair::MicPair;
pub use crate::array::projector::Projector;
