//! Failure taxonomy for town generation
//!
//! Structural failures are expected during generation and recovered by the
//! orchestrator retry loop. Contract violations (for example building a
//! Voronoi diagram from an empty site list) panic instead: they indicate
//! misuse of the API, not bad luck with the dice.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    /// The outer edges of a walled patch set did not chain into a closed loop,
    /// or no gate candidate survived selection.
    #[error("bad walled area shape")]
    BadWallShape,

    /// A gate could not be connected to the town center along patch edges.
    #[error("unable to build a street")]
    UnreachableStreet,

    /// The citadel patch is too ragged to carry a castle wall.
    #[error("bad citadel shape (compactness {compactness:.3})")]
    BadCitadelShape { compactness: f64 },

    /// The site layout produced fewer usable parcels than requested.
    #[error("degenerate patch layout")]
    BadPatchLayout,

    /// Every attempt ended in a structural failure.
    #[error("failed to generate a town after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
}

pub type Result<T> = std::result::Result<T, GenerationError>;
