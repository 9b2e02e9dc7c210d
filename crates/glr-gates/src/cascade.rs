//! Ordered fallback cascades.
//!
//! Every heuristic in a run (label extraction, status resolution,
//! contingent detection) is a slice of named [`Step`]s tried in order; the
//! first step returning `Some` decides. Keeping the order as data lets each
//! step be tested alone and lets the winning step's name flow into
//! provenance.

/// One named strategy in a cascade.
pub struct Step<I: ?Sized, O> {
    pub name: &'static str,
    pub attempt: fn(&I) -> Option<O>,
}

impl<I: ?Sized, O> Clone for Step<I, O> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<I: ?Sized, O> Copy for Step<I, O> {}

impl<I: ?Sized, O> std::fmt::Debug for Step<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step").field("name", &self.name).finish()
    }
}

/// Run `steps` in order and return the first verdict with the deciding step's name.
pub fn first_match<I: ?Sized, O>(steps: &[Step<I, O>], input: &I) -> Option<(&'static str, O)> {
    steps
        .iter()
        .find_map(|s| (s.attempt)(input).map(|out| (s.name, out)))
}
