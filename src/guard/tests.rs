//! Unit tests for the deletion gates.

use std::cell::Cell;

use super::*;
use rstest::rstest;

struct CountingConfirmer {
    answer: bool,
    asked: Cell<usize>,
}

impl Confirmer for CountingConfirmer {
    fn confirm(&self, prompt: &str) -> Result<bool, GuardError> {
        assert_eq!(prompt, DELETE_PROMPT);
        self.asked.set(self.asked.get() + 1);
        Ok(self.answer)
    }
}

#[rstest]
fn protection_refuses_without_prompting() {
    let confirmer = CountingConfirmer {
        answer: true,
        asked: Cell::new(0),
    };

    let err = authorize_delete(true, &confirmer).expect_err("protected");

    assert_eq!(err, GuardError::TerminationProtected);
    assert_eq!(confirmer.asked.get(), 0);
}

#[rstest]
#[case(true, Ok(()))]
#[case(false, Err(GuardError::Aborted))]
fn confirmation_decides_unprotected_delete(
    #[case] answer: bool,
    #[case] expected: Result<(), GuardError>,
) {
    let confirmer = CountingConfirmer {
        answer,
        asked: Cell::new(0),
    };

    assert_eq!(authorize_delete(false, &confirmer), expected);
    assert_eq!(confirmer.asked.get(), 1);
}

#[rstest]
fn prompt_failures_propagate() {
    struct Broken;
    impl Confirmer for Broken {
        fn confirm(&self, _prompt: &str) -> Result<bool, GuardError> {
            Err(GuardError::Prompt {
                message: String::from("not a terminal"),
            })
        }
    }

    assert!(matches!(
        authorize_delete(false, &Broken),
        Err(GuardError::Prompt { .. })
    ));
}
