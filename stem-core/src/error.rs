use thiserror::Error;

/// Failures surfaced by the growth engine.
///
/// Both kinds are fatal for the current step only: previously cached state
/// is preserved and the engine stays in whatever state it was in. There is
/// no retry policy; callers fix the input and re-invoke.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum GrowthError {
    /// The grammar source was missing, unreadable, or empty.
    #[error("grammar source is empty or unreadable")]
    EmptyGrammar,
    /// The grammar engine ran but produced zero branch segments. Also
    /// returned when growth is requested before any base tree exists.
    #[error("grammar engine produced no geometry")]
    NoGeometry,
}
