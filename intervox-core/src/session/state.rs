use crate::api::Question;
use crate::events::SessionPhase;

/// Interview progress owned by the session loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub phase: SessionPhase,
    pub elapsed_seconds: u64,
    /// Number of questions received so far; the opening question is 1.
    pub question_index: u32,
    pub question: Option<Question>,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.phase == SessionPhase::Active
    }

    /// Make `text` the current question.
    pub fn advance(&mut self, text: String) -> Question {
        self.question_index += 1;
        let question = Question {
            text,
            ordinal: self.question_index,
        };
        self.question = Some(question.clone());
        question
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_numbers_questions_from_one() {
        let mut session = Session::default();
        let first = session.advance("Tell me about yourself".into());
        assert_eq!(first.ordinal, 1);
        let second = session.advance("What languages do you use?".into());
        assert_eq!(second.ordinal, 2);
        assert_eq!(session.question_index, 2);
        assert_eq!(session.question.as_ref(), Some(&second));
    }
}
