pub mod cache;
pub mod context;
pub mod decode;
pub mod lanes;
pub mod nearest;
pub mod phase;
pub mod unseq;

pub use cache::{default_context, ContextCache};
pub use context::{Calibration, ConverterContext, MagnitudeTable, PhaseDirectionTable};
pub use decode::{decode, DecodeTable};
pub use nearest::encode;
pub use unseq::LaneWidth;
