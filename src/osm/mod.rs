pub mod overpass;
pub mod parser;

pub use overpass::{OverpassResponse, load_response};
pub use parser::{ExtractedFeatures, extract_features, projector_for};
