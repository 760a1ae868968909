pub mod artifact;
pub mod encoder;
pub mod prediction;
pub mod ranker;
pub mod scorer;
pub mod vocabulary;

pub use artifact::{ArtifactBundle, ArtifactStore};
pub use encoder::{parse_basket, BasketEncoder, EncodedBasket, EncoderState};
pub use prediction::PredictionService;
pub use ranker::{Ranker, DEFAULT_TOP_K};
pub use scorer::{validate_scores, DenseScorer, OnnxScorer, Scorer};
pub use vocabulary::Vocabulary;
