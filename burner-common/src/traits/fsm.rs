/// A state machine that may refuse an input.
///
/// A refused input leaves the machine where it was: the unchanged state is
/// handed back inside [`Rejected`] together with the reason.
pub trait FiniteStateMachine: Sized {
    type Input;
    type Context;
    type Error;

    /// Consume `input`, producing the next state.
    ///
    /// # Errors
    ///
    /// Returns the current state and the reason if `input` is not allowed
    /// from here.
    fn transition(
        self,
        input: Self::Input,
        context: &mut Self::Context,
    ) -> Result<Self, Rejected<Self, Self::Error>>;
}

#[derive(Debug, PartialEq, Eq)]
pub struct Rejected<State, Error> {
    pub state: State,
    pub error: Error,
}

impl<State, Error> Rejected<State, Error> {
    pub const fn new(state: State, error: Error) -> Self {
        Self { state, error }
    }
}
