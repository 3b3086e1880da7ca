use common::{PatternStep, DEFAULT_STEP, MAX_PATTERN_STEPS};
use thiserror::Error;

mod generate;

pub use generate::{RAINBOW_STEPS, RANDOM_STEPS};

/// Reasons an edit to the pattern was refused
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatternError {
    #[error("a pattern needs at least one step")]
    LastStep,
    #[error("step {index} does not exist (pattern has {len} steps)")]
    IndexOutOfRange { index: usize, len: usize },
}

/// The sequence of timed colour steps being edited, plus the step the user
/// has selected.
///
/// There is always at least one step and never more than
/// [`MAX_PATTERN_STEPS`], and `selected` always points at an existing step.
#[derive(Clone, Debug, PartialEq)]
pub struct Pattern {
    steps: Vec<PatternStep>,
    selected: usize,
}

impl Default for Pattern {
    fn default() -> Self {
        Self {
            steps: vec![DEFAULT_STEP],
            selected: 0,
        }
    }
}

impl Pattern {
    pub fn steps(&self) -> &[PatternStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.steps.len() >= MAX_PATTERN_STEPS
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected_step(&self) -> &PatternStep {
        &self.steps[self.selected]
    }

    pub fn select(&mut self, index: usize) -> Result<(), PatternError> {
        self.check_index(index)?;
        self.selected = index;
        Ok(())
    }

    /// Append a copy of the last step and select it. Returns the index of the
    /// new step, or `None` if the pattern is already full.
    pub fn add_step(&mut self) -> Option<usize> {
        if self.is_full() {
            return None;
        }

        let step = self.steps.last().copied().unwrap_or(DEFAULT_STEP);
        self.steps.push(step);
        self.selected = self.steps.len() - 1;

        Some(self.selected)
    }

    /// Replace every field of the step at `index`.
    pub fn update_step(&mut self, index: usize, step: PatternStep) -> Result<(), PatternError> {
        self.check_index(index)?;
        self.steps[index] = PatternStep::new(step.color, step.duration, step.brightness);
        Ok(())
    }

    /// Remove the step at `index`. The last remaining step cannot be removed.
    pub fn delete_step(&mut self, index: usize) -> Result<PatternStep, PatternError> {
        self.check_index(index)?;
        if self.steps.len() <= 1 {
            return Err(PatternError::LastStep);
        }

        let removed = self.steps.remove(index);

        // Keep the cursor on a real step
        if self.selected >= self.steps.len() {
            self.selected = self.steps.len() - 1;
        }

        Ok(removed)
    }

    /// Reset to a single default step. Callers are expected to have asked the
    /// user first.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Swap in a whole new sequence and select its first step. Anything past
    /// [`MAX_PATTERN_STEPS`] is dropped and an empty sequence falls back to the
    /// default step.
    pub fn replace(&mut self, mut steps: Vec<PatternStep>) {
        steps.truncate(MAX_PATTERN_STEPS);
        if steps.is_empty() {
            steps.push(DEFAULT_STEP);
        }

        self.steps = steps;
        self.selected = 0;
    }

    fn check_index(&self, index: usize) -> Result<(), PatternError> {
        if index < self.steps.len() {
            Ok(())
        } else {
            Err(PatternError::IndexOutOfRange {
                index,
                len: self.steps.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use common::Color;

    use super::*;

    fn pattern_of(len: usize) -> Pattern {
        let mut pattern = Pattern::default();
        pattern.replace(
            (0..len)
                .map(|i| PatternStep::new(Color::new(i as u8, 0, 0), 100, 100))
                .collect(),
        );
        pattern
    }

    #[test]
    fn test_add_copies_last_and_selects_it() {
        let mut pattern = pattern_of(3);
        let last = *pattern.steps().last().unwrap();

        assert_eq!(pattern.add_step(), Some(3));
        assert_eq!(pattern.len(), 4);
        assert_eq!(pattern.selected_index(), 3);
        assert_eq!(pattern.steps()[3], last);
    }

    #[test]
    fn test_add_when_full_is_noop() {
        let mut pattern = pattern_of(MAX_PATTERN_STEPS);
        pattern.select(10).unwrap();

        assert_eq!(pattern.add_step(), None);
        assert_eq!(pattern.len(), MAX_PATTERN_STEPS);
        assert_eq!(pattern.selected_index(), 10);
    }

    #[test]
    fn test_cannot_delete_last_step() {
        let mut pattern = Pattern::default();
        assert_eq!(pattern.delete_step(0), Err(PatternError::LastStep));
        assert_eq!(pattern.len(), 1);
    }

    #[test]
    fn test_delete_selected_last_moves_selection() {
        let mut pattern = pattern_of(4);
        pattern.select(3).unwrap();

        pattern.delete_step(3).unwrap();
        assert_eq!(pattern.len(), 3);
        assert_eq!(pattern.selected_index(), 2);
    }

    #[test]
    fn test_delete_middle_keeps_selection() {
        let mut pattern = pattern_of(4);
        pattern.select(1).unwrap();

        let removed = pattern.delete_step(1).unwrap();
        assert_eq!(removed.color, Color::new(1, 0, 0));
        assert_eq!(pattern.selected_index(), 1);
        assert_eq!(pattern.selected_step().color, Color::new(2, 0, 0));
    }

    #[test]
    fn test_update_step() {
        let mut pattern = pattern_of(2);
        let step = PatternStep::new(Color::new(9, 9, 9), 1500, 30);

        pattern.update_step(1, step).unwrap();
        assert_eq!(pattern.steps()[1], step);
        assert_eq!(
            pattern.update_step(2, step),
            Err(PatternError::IndexOutOfRange { index: 2, len: 2 })
        );
    }

    #[test]
    fn test_update_clamps_out_of_range_fields() {
        let mut pattern = Pattern::default();
        let step = PatternStep {
            color: Color::OFF,
            duration: 5,
            brightness: 250,
        };

        pattern.update_step(0, step).unwrap();
        assert_eq!(pattern.steps()[0].duration, 50);
        assert_eq!(pattern.steps()[0].brightness, 100);
    }

    #[test]
    fn test_clear() {
        let mut pattern = pattern_of(12);
        pattern.select(7).unwrap();

        pattern.clear();
        assert_eq!(pattern.steps(), &[DEFAULT_STEP]);
        assert_eq!(pattern.selected_index(), 0);
    }

    #[test]
    fn test_select_out_of_range() {
        let mut pattern = pattern_of(2);
        assert!(pattern.select(2).is_err());
        assert_eq!(pattern.selected_index(), 0);
    }

    #[test]
    fn test_replace_bounds() {
        let mut pattern = Pattern::default();

        pattern.replace(Vec::new());
        assert_eq!(pattern.len(), 1);

        pattern.replace(vec![DEFAULT_STEP; MAX_PATTERN_STEPS + 10]);
        assert_eq!(pattern.len(), MAX_PATTERN_STEPS);
    }
}
