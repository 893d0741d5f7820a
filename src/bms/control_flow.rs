//! `#RANDOM` / `#IF` nesting.
//!
//! Two explicit stacks: one of selected random values, one of conditions. A line is realized only
//! when every open condition is active. Each random frame remembers how deep the condition stack
//! was when it opened, so `#ENDRANDOM` can close the conditions it owns.

use crate::decode::ControlFlowIssue;

#[derive(Debug, Clone, Copy)]
struct RandomFrame {
    value: u64,
    conditions_base: usize,
}

#[derive(Debug, Clone, Copy)]
struct Condition {
    active: bool,
    /// Some branch of this `#IF` chain already matched.
    taken: bool,
}

/// The two control-flow stacks of a text decode.
#[derive(Debug, Default)]
pub struct ControlFlow {
    randoms: Vec<RandomFrame>,
    conditions: Vec<Condition>,
}

impl ControlFlow {
    /// Whether lines are currently discarded.
    #[must_use]
    pub fn is_skipping(&self) -> bool {
        self.conditions.iter().any(|cond| !cond.active)
    }

    /// Opens a random block with the selected `value`.
    pub fn push_random(&mut self, value: u64) {
        self.randoms.push(RandomFrame {
            value,
            conditions_base: self.conditions.len(),
        });
    }

    fn current_value(&self) -> Result<u64, ControlFlowIssue> {
        self.randoms
            .last()
            .map(|frame| frame.value)
            .ok_or(ControlFlowIssue::IfWithoutRandom)
    }

    fn owns_top_condition(&self) -> bool {
        let base = self.randoms.last().map_or(0, |frame| frame.conditions_base);
        self.conditions.len() > base
    }

    /// `#IF target`. A `None` target never matches.
    ///
    /// # Errors
    ///
    /// [`ControlFlowIssue::IfWithoutRandom`] outside any random block; nothing is pushed.
    pub fn begin_if(&mut self, target: Option<u64>) -> Result<(), ControlFlowIssue> {
        let value = self.current_value()?;
        let matched = target == Some(value);
        self.conditions.push(Condition {
            active: matched,
            taken: matched,
        });
        Ok(())
    }

    /// `#ELSEIF target`.
    ///
    /// # Errors
    ///
    /// [`ControlFlowIssue::ElseWithoutIf`] when no `#IF` of the current block is open.
    pub fn else_if(&mut self, target: Option<u64>) -> Result<(), ControlFlowIssue> {
        if !self.owns_top_condition() {
            return Err(ControlFlowIssue::ElseWithoutIf);
        }
        let value = self.current_value()?;
        if let Some(cond) = self.conditions.last_mut() {
            let matched = !cond.taken && target == Some(value);
            cond.active = matched;
            cond.taken |= matched;
        }
        Ok(())
    }

    /// `#ELSE`.
    ///
    /// # Errors
    ///
    /// [`ControlFlowIssue::ElseWithoutIf`] when no `#IF` of the current block is open.
    pub fn else_branch(&mut self) -> Result<(), ControlFlowIssue> {
        if !self.owns_top_condition() {
            return Err(ControlFlowIssue::ElseWithoutIf);
        }
        if let Some(cond) = self.conditions.last_mut() {
            cond.active = !cond.taken;
            cond.taken = true;
        }
        Ok(())
    }

    /// `#ENDIF`.
    ///
    /// # Errors
    ///
    /// [`ControlFlowIssue::EndIfWithoutIf`] when no `#IF` of the current block is open.
    pub fn end_if(&mut self) -> Result<(), ControlFlowIssue> {
        if !self.owns_top_condition() {
            return Err(ControlFlowIssue::EndIfWithoutIf);
        }
        self.conditions.pop();
        Ok(())
    }

    /// `#ENDRANDOM`. Conditions left open inside the block are closed with it.
    ///
    /// # Errors
    ///
    /// [`ControlFlowIssue::EndRandomWithoutRandom`] outside any random block, and
    /// [`ControlFlowIssue::UnclosedIf`] after closing a block that still had an open `#IF`.
    pub fn end_random(&mut self) -> Result<(), ControlFlowIssue> {
        let frame = self
            .randoms
            .pop()
            .ok_or(ControlFlowIssue::EndRandomWithoutRandom)?;
        if self.conditions.len() > frame.conditions_base {
            self.conditions.truncate(frame.conditions_base);
            return Err(ControlFlowIssue::UnclosedIf);
        }
        Ok(())
    }
}
